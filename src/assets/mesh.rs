//! Mesh/primitive metadata kept alongside the unified geometry buffers.

use glam::Vec3;

/// Object-space axis-aligned bounding box.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self { min: Vec3::ZERO, max: Vec3::ZERO }
    }
}

impl Aabb {
    pub fn from_points(points: impl Iterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;
        for p in points {
            any = true;
            min = min.min(p);
            max = max.max(p);
        }
        if any {
            Self { min, max }
        } else {
            Self::default()
        }
    }
}

/// One drawable range within the unified vertex/index buffers.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
    pub material_index: u32,
}

/// A mesh: an ordered list of primitives (spec §3 C3).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}
