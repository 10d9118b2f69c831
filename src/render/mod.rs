//! Render Batcher (C8) and Indirect Renderer (C9): the per-frame path from
//! a built scene to recorded indirect draw calls.

pub mod batcher;
pub mod renderer;
pub mod sort_key;
pub mod system_meshes;

pub use batcher::{classify, IndirectCommand, InstanceData, RenderBatchResult};
pub use renderer::{DrawStats, FrameParams, IndirectRenderer};
pub use sort_key::{build_sort_key, float_to_ordered_int, layer_of, SortingType};
pub use system_meshes::{system_mesh_type_from_mesh_id, SystemMeshes};
