//! GPU-adjacent core: the RHI trait facade (§6.1), the deferred-destruction
//! queue (C4), and the ring staging allocator (C5).

pub mod deletion_queue;
pub mod rhi;
pub mod ring_allocator;

pub use deletion_queue::DeferredDestructionQueue;
pub use ring_allocator::{Reservation, RingStagingAllocator};
