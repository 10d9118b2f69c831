#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Core of a real-time, GPU-driven indirect rendering engine: the
//! entity/component registry, scene graph, asset database, GPU resource
//! lifetime machinery, texture streaming, and the per-frame batch-and-draw
//! path that turns a built scene into recorded indirect draw calls.
//!
//! This crate is the engine's core only — window/surface setup, input,
//! concrete RHI backends, and content-creation tooling (asset baking,
//! procedural mesh generation) live outside it.

pub mod assets;
pub mod ecs;
pub mod errors;
pub mod gpu;
pub mod render;
pub mod scene;
pub mod streaming;

pub use assets::{AssetDatabase, Mesh, UploadResult};
pub use ecs::{Entity, Registry, NULL_ENTITY};
pub use errors::EngineError;
pub use gpu::rhi::{BufferHandle, CommandList, RhiDevice, TextureHandle};
pub use gpu::{DeferredDestructionQueue, RingStagingAllocator};
pub use render::{DrawStats, FrameParams, IndirectRenderer};
pub use scene::SceneGraph;
pub use streaming::{AsyncLoader, StreamingRequest};
