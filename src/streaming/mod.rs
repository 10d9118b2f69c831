//! Asynchronous texture streaming: per-request upload state machine (C6) and
//! the priority work queue draining it onto the transfer path (C7).

pub mod loader;
pub mod request;

pub use loader::{AsyncLoader, CompletedTexture, LoadStatus, DEFAULT_MAX_RETRIES};
pub use request::{
    advance_request_state, plan_next_copy, BlockFormat, CopyRegionPlan, CopySource, Direction,
    ImageData, StreamRequestState, StreamingRequest,
};
