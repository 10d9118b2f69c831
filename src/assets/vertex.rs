//! Unified per-vertex layout shared by every mesh in the asset database.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// One vertex of the unified CPU geometry buffer.
///
/// `mesh_index`/`local_index` let a GPU skinning/morph pass find a vertex's
/// owning mesh and its position within that mesh after all primitives have
/// been flattened into one buffer (spec §4.3).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec4,
    pub uv0: Vec2,
    pub uv1: Vec2,
    pub color: Vec4,
    pub joints: [u16; 4],
    pub weights: Vec4,
    pub mesh_index: u32,
    pub local_index: u32,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            uv0: Vec2::ZERO,
            uv1: Vec2::ZERO,
            color: Vec4::ONE,
            joints: [0; 4],
            weights: Vec4::ZERO,
            mesh_index: 0,
            local_index: 0,
        }
    }
}
