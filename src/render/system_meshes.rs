//! Built-in primitive shapes addressed by a negative `MeshRenderer::mesh_id`
//! (spec §4.8 collect phase: "for system meshes identified by negative mesh
//! IDs, a single built-in primitive").
//!
//! Grounded in `original_source/engine/include/pnkr/renderer/SystemMeshes.hpp`:
//! system meshes live in their own vertex/index buffer, separate from the
//! per-model unified geometry, and are addressed by a small fixed table
//! instead of growing `AssetDatabase::meshes`.

use crate::assets::mesh::Primitive;
use crate::gpu::rhi::BufferHandle;
use crate::scene::components::SystemMeshType;

/// Registry of the engine's built-in primitive shapes. Generating the actual
/// geometry is a content-creation concern outside this crate; callers upload
/// vertex/index data through the RHI and register the resulting buffer and
/// per-shape primitive ranges here.
#[derive(Default)]
pub struct SystemMeshes {
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    primitives: [Option<Primitive>; SystemMeshType::COUNT as usize],
}

impl SystemMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buffers(&mut self, vertex_buffer: BufferHandle, index_buffer: BufferHandle) {
        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
    }

    pub fn set_primitive(&mut self, kind: SystemMeshType, primitive: Primitive) {
        self.primitives[kind.ordinal() as usize] = Some(primitive);
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn primitive(&self, kind: SystemMeshType) -> Option<Primitive> {
        self.primitives[kind.ordinal() as usize]
    }
}

/// `MeshRenderer::mesh_id` encodes a system mesh as `-(ordinal + 1)`, keeping
/// `0` available as a valid real-mesh index (spec §3's "negative = absent"
/// convention, specialized: here negative means "system", not "absent").
pub fn system_mesh_type_from_mesh_id(mesh_id: i32) -> Option<SystemMeshType> {
    if mesh_id >= 0 {
        return None;
    }
    SystemMeshType::from_ordinal(-(mesh_id + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_mesh_id_decodes_to_system_mesh_ordinal() {
        assert_eq!(system_mesh_type_from_mesh_id(-1), Some(SystemMeshType::Plane));
        assert_eq!(system_mesh_type_from_mesh_id(-2), Some(SystemMeshType::Cube));
        assert_eq!(system_mesh_type_from_mesh_id(0), None);
        assert_eq!(system_mesh_type_from_mesh_id(5), None);
    }

    #[test]
    fn out_of_range_negative_id_decodes_to_none() {
        assert_eq!(system_mesh_type_from_mesh_id(-100), None);
    }

    #[test]
    fn set_and_read_primitive_by_kind() {
        let mut meshes = SystemMeshes::new();
        let prim = Primitive { first_index: 0, index_count: 36, vertex_offset: 0, material_index: 0 };
        meshes.set_primitive(SystemMeshType::Cube, prim);
        assert_eq!(meshes.primitive(SystemMeshType::Cube).unwrap().index_count, 36);
        assert!(meshes.primitive(SystemMeshType::Plane).is_none());
    }
}
