//! Frame-indexed deferred destruction queue (C4).
//!
//! Grounded in
//! `original_source/engine/src/rhi/vulkan/VulkanDeletionQueue.{hpp,cpp}`:
//! a mutex-guarded FIFO of `(frameIndex, destructor)` entries, plus an
//! optional debug-only object-tracking sidecar.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::gpu::rhi::RhiDevice;

/// A destructor closure is handed the device at `process`/`flush` time — the
/// source's equivalent lambda captures the owning renderer for the same
/// reason (its destructor calls back into `RHIRenderer::destroyBuffer`).
type Destructor = Box<dyn FnOnce(&mut dyn RhiDevice) + Send>;

struct Entry {
    frame_index: u64,
    destroy: Destructor,
}

/// Metadata recorded for a tracked handle in debug builds, grounded in
/// `VulkanDeletionQueue::TrackedObject`.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub object_type: &'static str,
    pub name: String,
}

/// Thread-safe FIFO of pending RHI resource destructions (spec §4.4).
pub struct DeferredDestructionQueue {
    queue: Mutex<VecDeque<Entry>>,
    traces: Mutex<FxHashMap<u64, TrackedObject>>,
}

impl Default for DeferredDestructionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredDestructionQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            traces: Mutex::new(FxHashMap::default()),
        }
    }

    /// Pushes a destructor to run once `current_frame` has completed on the
    /// GPU side. The destructor is handed the device when it finally runs.
    pub fn enqueue(&self, current_frame: u64, destroy: impl FnOnce(&mut dyn RhiDevice) + Send + 'static) {
        self.queue.lock().push_back(Entry { frame_index: current_frame, destroy: Box::new(destroy) });
    }

    /// Invokes every entry whose `frame_index <= completed_frame`, in FIFO
    /// order.
    pub fn process(&self, completed_frame: u64, device: &mut dyn RhiDevice) {
        loop {
            let entry = {
                let mut q = self.queue.lock();
                match q.front() {
                    Some(e) if e.frame_index <= completed_frame => q.pop_front(),
                    _ => None,
                }
            };
            match entry {
                Some(e) => (e.destroy)(device),
                None => break,
            }
        }
    }

    /// Unconditionally runs every pending destructor. Used at shutdown.
    pub fn flush(&self, device: &mut dyn RhiDevice) {
        loop {
            let entry = self.queue.lock().pop_front();
            match entry {
                Some(e) => (e.destroy)(device),
                None => break,
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Debug-only: records a handle's type/name so a leak report at shutdown
    /// can name anything still tracked. `handle == 0` is ignored, matching
    /// the source's "null handle" guard.
    pub fn track_object(&self, handle: u64, object_type: &'static str, name: impl Into<String>) {
        if handle == 0 {
            return;
        }
        self.traces.lock().insert(handle, TrackedObject { object_type, name: name.into() });
    }

    pub fn untrack_object(&self, handle: u64) {
        if handle == 0 {
            return;
        }
        self.traces.lock().remove(&handle);
    }

    pub fn tracked_object(&self, handle: u64) -> Option<TrackedObject> {
        self.traces.lock().get(&handle).cloned()
    }

    /// Every handle still tracked — a non-empty result at shutdown indicates
    /// a leak.
    pub fn tracked_handles(&self) -> Vec<u64> {
        self.traces.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::rhi::null_rhi::NullRhi;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn process_before_frame_completes_is_noop() {
        let q = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        q.enqueue(100, move |_| {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        q.process(99, &mut device);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        q.process(100, &mut device);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn process_runs_exactly_once() {
        let q = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        q.enqueue(5, move |_| {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        q.process(10, &mut device);
        q.process(20, &mut device);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flush_runs_everything_regardless_of_frame() {
        let q = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for frame in [1_000, 2_000, 3_000] {
            let ran2 = ran.clone();
            q.enqueue(frame, move |_| {
                ran2.fetch_add(1, Ordering::SeqCst);
            });
        }
        q.flush(&mut device);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(q.pending_len(), 0);
    }

    #[test]
    fn fifo_order_preserved_within_same_completed_frame() {
        let q = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order2 = order.clone();
            q.enqueue(1, move |_| order2.lock().push(i));
        }
        q.process(1, &mut device);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn track_and_untrack_object() {
        let q = DeferredDestructionQueue::new();
        q.track_object(42, "Buffer", "UnifiedVBO");
        assert!(q.tracked_object(42).is_some());
        q.untrack_object(42);
        assert!(q.tracked_object(42).is_none());
    }

    #[test]
    fn null_handle_is_ignored() {
        let q = DeferredDestructionQueue::new();
        q.track_object(0, "Buffer", "ignored");
        assert!(q.tracked_handles().is_empty());
    }
}
