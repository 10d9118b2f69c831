//! Asset database (C3): owned arrays of materials/meshes/bounds/skins, plus
//! the unified CPU geometry buffers and their GPU upload.
//!
//! Grounded in
//! `original_source/engine/include/pnkr/renderer/scene/SceneAssetDatabase.hpp`
//! and its `.cpp`.

use crate::assets::material::MaterialData;
use crate::assets::mesh::{Aabb, Mesh, Primitive};
use crate::assets::vertex::Vertex;
use crate::gpu::deletion_queue::DeferredDestructionQueue;
use crate::gpu::rhi::{BufferDescriptor, BufferHandle, MemoryUsage, RhiDevice};

/// Placeholder for skin joint data; consumed by out-of-scope animation
/// systems (spec §3 "later consumed by other (out-of-scope) systems").
#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub joint_node_indices: Vec<i32>,
    pub inverse_bind_matrices: Vec<glam::Mat4>,
}

/// Opaque animation sampler data, out of scope for this crate beyond
/// storage.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: String,
}

/// Camera parameters imported alongside a model, out of scope beyond
/// storage.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub yfov: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { yfov: 0.8, znear: 0.01, zfar: 1000.0 }
    }
}

/// One primitive's raw geometry plus material index, as fed to
/// [`AssetDatabase::append_mesh_data`].
pub struct PrimitiveData<'a> {
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
    pub material_index: u32,
}

/// Unit container of every asset array the renderer reads from, plus the
/// unified geometry buffers (spec §3/§4.3 C3).
#[derive(Default)]
pub struct AssetDatabase {
    pub materials: Vec<MaterialData>,
    pub textures: Vec<crate::gpu::rhi::TextureHandle>,
    pub texture_files: Vec<String>,
    pub texture_is_srgb: Vec<bool>,
    pub meshes: Vec<Mesh>,
    pub mesh_bounds: Vec<Aabb>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
    pub cameras: Vec<Camera>,

    cpu_vertices: Vec<Vertex>,
    cpu_indices: Vec<u32>,

    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub bounds_buffer: Option<BufferHandle>,
}

impl AssetDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cpu_vertices(&self) -> &[Vertex] {
        &self.cpu_vertices
    }

    pub fn cpu_indices(&self) -> &[u32] {
        &self.cpu_indices
    }

    /// Copies every primitive's `vertices`/`indices` into the unified CPU
    /// arrays, patching each vertex's `mesh_index`/`local_index`, and pushes
    /// one `Mesh` holding all of them plus their combined AABB. Returns the
    /// new mesh index (spec §4.3; one db mesh per imported mesh, matching the
    /// 1:1 node→mesh mapping the scene upload relies on).
    pub fn append_mesh_data(&mut self, primitives: &[PrimitiveData<'_>], name: impl Into<String>) -> u32 {
        let mesh_id = self.meshes.len() as u32;
        let mut pushed = Vec::with_capacity(primitives.len());

        for prim in primitives {
            let first_index = self.cpu_indices.len() as u32;
            let vertex_offset = self.cpu_vertices.len() as i32;

            self.cpu_vertices.reserve(prim.vertices.len());
            for (i, v) in prim.vertices.iter().enumerate() {
                let mut v = *v;
                v.mesh_index = mesh_id;
                v.local_index = i as u32;
                self.cpu_vertices.push(v);
            }
            self.cpu_indices.extend_from_slice(prim.indices);

            let material_index =
                if (prim.material_index as usize) < self.materials.len() { prim.material_index } else { 0 };

            pushed.push(Primitive { first_index, index_count: prim.indices.len() as u32, vertex_offset, material_index });
        }

        let bounds = Aabb::from_points(primitives.iter().flat_map(|p| p.vertices.iter().map(|v| v.position)));
        self.meshes.push(Mesh { name: name.into(), primitives: pushed });
        self.mesh_bounds.push(bounds);

        mesh_id
    }

    /// Convenience wrapper over [`Self::append_mesh_data`] for the common
    /// single-primitive case.
    pub fn append_primitive_mesh_data(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        material_index: u32,
        name: impl Into<String>,
    ) -> u32 {
        self.append_mesh_data(&[PrimitiveData { vertices, indices, material_index }], name)
    }

    /// Releases the CPU geometry arrays, retaining only GPU buffers and
    /// per-mesh metadata (spec §4.3).
    pub fn drop_cpu_geometry(&mut self) {
        self.cpu_vertices = Vec::new();
        self.cpu_indices = Vec::new();
    }

    /// (Re)creates the three unified GPU buffers, uploading the current CPU
    /// arrays. Stale buffers, if any, are handed to `deletion_queue` for
    /// destruction no earlier than `current_frame` (spec §4.3).
    pub fn upload_unified_buffers(
        &mut self,
        device: &mut dyn RhiDevice,
        deletion_queue: &DeferredDestructionQueue,
        current_frame: u64,
    ) {
        if let Some(old) = self.vertex_buffer.take() {
            deletion_queue.enqueue(current_frame, move |device| device.destroy_buffer(old));
        }
        if !self.cpu_vertices.is_empty() {
            let bytes = bytemuck::cast_slice(&self.cpu_vertices);
            let handle = device.create_buffer(&BufferDescriptor {
                size: bytes.len() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                memory_usage: MemoryUsage::CpuToGpu,
                debug_name: "ModelDOD_UnifiedVBO".to_string(),
            });
            device.upload_buffer_data(handle, 0, bytes);
            self.vertex_buffer = Some(handle);
        }

        if let Some(old) = self.index_buffer.take() {
            deletion_queue.enqueue(current_frame, move |device| device.destroy_buffer(old));
        }
        if !self.cpu_indices.is_empty() {
            let bytes = bytemuck::cast_slice(&self.cpu_indices);
            let handle = device.create_buffer(&BufferDescriptor {
                size: bytes.len() as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                memory_usage: MemoryUsage::CpuToGpu,
                debug_name: "ModelDOD_UnifiedIBO".to_string(),
            });
            device.upload_buffer_data(handle, 0, bytes);
            self.index_buffer = Some(handle);
        }

        if let Some(old) = self.bounds_buffer.take() {
            deletion_queue.enqueue(current_frame, move |device| device.destroy_buffer(old));
        }
        if !self.mesh_bounds.is_empty() {
            let bytes = bytemuck::cast_slice(&self.mesh_bounds);
            let handle = device.create_buffer(&BufferDescriptor {
                size: bytes.len() as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                memory_usage: MemoryUsage::CpuToGpu,
                debug_name: "ModelDOD_UnifiedBounds".to_string(),
            });
            device.upload_buffer_data(handle, 0, bytes);
            self.bounds_buffer = Some(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::rhi::null_rhi::NullRhi;

    fn vtx(x: f32) -> Vertex {
        Vertex { position: glam::Vec3::new(x, 0.0, 0.0), ..Default::default() }
    }

    #[test]
    fn append_primitive_mesh_data_patches_vertex_indices() {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        let verts = vec![vtx(0.0), vtx(1.0), vtx(2.0)];
        let id = db.append_primitive_mesh_data(&verts, &[0, 1, 2], 0, "tri");
        assert_eq!(id, 0);
        assert_eq!(db.cpu_vertices()[0].mesh_index, 0);
        assert_eq!(db.cpu_vertices()[1].local_index, 1);
        assert_eq!(db.mesh_bounds[0].min.x, 0.0);
        assert_eq!(db.mesh_bounds[0].max.x, 2.0);
    }

    #[test]
    fn append_remaps_out_of_range_material_to_zero() {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(&[vtx(0.0)], &[0], 7, "m");
        assert_eq!(db.meshes[0].primitives[0].material_index, 0);
    }

    #[test]
    fn drop_cpu_geometry_clears_arrays_but_keeps_mesh_metadata() {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(&[vtx(0.0)], &[0], 0, "m");
        db.drop_cpu_geometry();
        assert!(db.cpu_vertices().is_empty());
        assert!(db.cpu_indices().is_empty());
        assert_eq!(db.meshes.len(), 1);
    }

    #[test]
    fn upload_unified_buffers_defers_destruction_of_stale_buffers() {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(&[vtx(0.0), vtx(1.0)], &[0, 1], 0, "m");

        let mut rhi = NullRhi::new();
        let queue = DeferredDestructionQueue::new();
        db.upload_unified_buffers(&mut rhi, &queue, 1);
        assert!(db.vertex_buffer.is_some());
        assert!(db.index_buffer.is_some());
        assert!(db.bounds_buffer.is_some());

        db.upload_unified_buffers(&mut rhi, &queue, 2);
        assert_eq!(queue.pending_len(), 3);
        queue.process(2, &mut rhi);
        assert_eq!(queue.pending_len(), 0);
    }
}
