//! Indirect Renderer (C9): the per-frame orchestrator wiring the entity
//! registry (C1), scene graph (C2), asset database (C3), ring staging
//! allocator (C5) and render batcher (C8) through the RHI (spec §4.9).
//!
//! Grounded in the indirect draw path of
//! `original_source/samples/rhiIndirectGLTF/main.cpp` and
//! `original_source/engine/src/renderer/scene/RenderBatcher.cpp`'s
//! `buildBatches`/emit step: ensure uploaded geometry, rebuild batches,
//! upload the frame's transform/indirect-command arrays through the staging
//! ring, then record one `drawIndexedIndirect` per non-empty bucket —
//! shadow pass first, then opaque → transmission → transparent layers
//! (spec §4.9 step 3).

use bumpalo::Bump;
use glam::Vec3;

use crate::assets::database::AssetDatabase;
use crate::gpu::deletion_queue::DeferredDestructionQueue;
use crate::gpu::rhi::{BufferDescriptor, BufferHandle, CommandList, MemoryUsage, RhiDevice};
use crate::gpu::ring_allocator::RingStagingAllocator;
use crate::render::batcher::{build_batches, IndirectCommand, RenderBatchResult, RenderItem};
use crate::render::system_meshes::SystemMeshes;
use crate::scene::graph::SceneGraph;

/// Per-frame camera/viewport/debug inputs to [`IndirectRenderer::draw`]
/// (spec §4.9 `draw(cmd, camera, width, height, debugOverlay, postRecord)`).
pub struct FrameParams {
    pub camera_position: Vec3,
    /// The "frozen" camera captured for debug (spec §4.9 step 1); when set,
    /// batching and sorting use this position instead of `camera_position`
    /// while the live camera keeps moving, so a debug overlay can visualize
    /// culling/sorting from a fixed vantage point.
    pub frozen_camera_position: Option<Vec3>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub ignore_visibility: bool,
}

/// Per-bucket draw counts and the volumetric-material flag returned by
/// [`IndirectRenderer::draw`], mirroring [`RenderBatchResult`]'s scalar
/// counters for callers that only need the summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawStats {
    pub shadow_count: u32,
    pub opaque_count: u32,
    pub opaque_double_sided_count: u32,
    pub transmission_count: u32,
    pub transmission_double_sided_count: u32,
    pub transparent_count: u32,
    pub volumetric_material: bool,
}

/// One GPU-resident upload target reused across frames, growing (never
/// shrinking) to the largest byte size seen so far. Oversized buffers are
/// handed to the deletion queue rather than freed immediately, matching C3's
/// own stale-buffer handling.
#[derive(Default)]
struct UploadSlot {
    handle: Option<BufferHandle>,
    capacity_bytes: u64,
}

impl UploadSlot {
    /// Stages `bytes` through the ring allocator and records a device-local
    /// copy into this slot's buffer, growing it first if needed. Returns the
    /// slot's buffer handle, or `None` if `bytes` is empty (nothing to draw)
    /// or the ring could not satisfy the reservation this frame.
    #[allow(clippy::too_many_arguments)]
    fn upload(
        &mut self,
        bytes: &[u8],
        usage: wgpu::BufferUsages,
        debug_name: &str,
        ring: &RingStagingAllocator,
        staging_buffer: BufferHandle,
        device: &mut dyn RhiDevice,
        commands: &mut dyn CommandList,
        deletion_queue: &DeferredDestructionQueue,
        frame_index: u64,
    ) -> Option<BufferHandle> {
        if bytes.is_empty() {
            return None;
        }

        let size = bytes.len() as u64;
        let batch_id = ring.begin_batch();
        let reservation = match ring.reserve(size, batch_id) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("indirect renderer: staging reservation for {debug_name} failed this frame: {e}");
                return self.handle;
            }
        };

        device.upload_buffer_data(staging_buffer, reservation.offset, bytes);

        if self.handle.is_none() || self.capacity_bytes < size {
            if let Some(old) = self.handle.take() {
                deletion_queue.enqueue(frame_index, move |device| device.destroy_buffer(old));
            }
            let handle = device.create_buffer(&BufferDescriptor {
                size,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                memory_usage: MemoryUsage::GpuOnly,
                debug_name: debug_name.to_string(),
            });
            self.handle = Some(handle);
            self.capacity_bytes = size;
        }

        let dst = self.handle.expect("just ensured");
        commands.copy_buffer(staging_buffer, reservation.offset, dst, 0, size);

        ring.mark_pages(reservation.offset, reservation.size, batch_id);
        ring.notify_batch_complete(batch_id);
        reservation.release();

        self.handle
    }
}

/// Owns no component storage (spec §4.9): every frame it reads C1/C2/C3 and
/// writes only RHI resources plus its own small set of per-frame GPU upload
/// buffers.
pub struct IndirectRenderer {
    bump: Bump,
    scratch: Vec<RenderItem>,
    system_meshes: SystemMeshes,
    frame_index: u64,
    staging_buffer: BufferHandle,

    transforms: UploadSlot,
    shadow_transforms: UploadSlot,
    indirect_shadow: UploadSlot,
    indirect_opaque: UploadSlot,
    indirect_opaque_double_sided: UploadSlot,
    indirect_transmission: UploadSlot,
    indirect_transmission_double_sided: UploadSlot,
    indirect_transparent: UploadSlot,
}

impl IndirectRenderer {
    pub fn new(staging_buffer: BufferHandle) -> Self {
        Self {
            bump: Bump::new(),
            scratch: Vec::new(),
            system_meshes: SystemMeshes::new(),
            frame_index: 0,
            staging_buffer,
            transforms: UploadSlot::default(),
            shadow_transforms: UploadSlot::default(),
            indirect_shadow: UploadSlot::default(),
            indirect_opaque: UploadSlot::default(),
            indirect_opaque_double_sided: UploadSlot::default(),
            indirect_transmission: UploadSlot::default(),
            indirect_transmission_double_sided: UploadSlot::default(),
            indirect_transparent: UploadSlot::default(),
        }
    }

    pub fn system_meshes_mut(&mut self) -> &mut SystemMeshes {
        &mut self.system_meshes
    }

    /// Ticks the animation state machine. Out of scope for this crate (spec
    /// §4.9): present only to preserve the per-frame call order a caller
    /// expects before `draw`.
    pub fn update(&mut self, _dt: f32) {}

    /// Hands a command list to the skinning compute pass. Out of scope for
    /// this crate (spec §4.9): no-op placeholder preserving call order.
    pub fn dispatch_skinning(&mut self, _commands: &mut dyn CommandList) {}

    /// Rebuilds this frame's batches and records one `drawIndexedIndirect`
    /// per non-empty bucket, in shadow → opaque → transmission → transparent
    /// order (spec §4.9 step 3). Runs `post_record` last for debug
    /// overlay/UI.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        db: &mut AssetDatabase,
        graph: &SceneGraph,
        ring: &RingStagingAllocator,
        deletion_queue: &DeferredDestructionQueue,
        device: &mut dyn RhiDevice,
        commands: &mut dyn CommandList,
        params: &FrameParams,
        mut post_record: impl FnMut(&mut dyn CommandList),
    ) -> DrawStats {
        self.frame_index += 1;

        if db.vertex_buffer.is_none() {
            db.upload_unified_buffers(device, deletion_queue, self.frame_index);
        }

        let camera_pos = params.frozen_camera_position.unwrap_or(params.camera_position);
        // Real backends resolve a buffer's GPU-visible address through the
        // RHI; this core addresses the unified buffers by their opaque
        // handle value, leaving the real device-address query to the
        // concrete RHI implementation (see DESIGN.md).
        let vertex_buffer_address = db.vertex_buffer.map_or(0, |h| h.0);
        let system_vertex_buffer_address = self.system_meshes.vertex_buffer().map_or(0, |h| h.0);

        self.bump.reset();
        let result: RenderBatchResult<'_> = build_batches(
            &self.bump,
            &mut self.scratch,
            graph.registry(),
            db,
            &self.system_meshes,
            camera_pos,
            vertex_buffer_address,
            system_vertex_buffer_address,
            params.ignore_visibility,
        );

        let stats = DrawStats {
            shadow_count: result.shadow_count,
            opaque_count: result.opaque_count,
            opaque_double_sided_count: result.opaque_double_sided_count,
            transmission_count: result.transmission_count,
            transmission_double_sided_count: result.transmission_double_sided_count,
            transparent_count: result.transparent_count,
            volumetric_material: result.volumetric_material,
        };

        if result.transform_count == 0 {
            post_record(commands);
            return stats;
        }

        let transforms_bytes: &[u8] = bytemuck::cast_slice(&result.transforms[..result.transform_count as usize]);
        let transforms_buffer = self.transforms.upload(
            transforms_bytes,
            wgpu::BufferUsages::STORAGE,
            "IndirectRenderer_Transforms",
            ring,
            self.staging_buffer,
            device,
            commands,
            deletion_queue,
            self.frame_index,
        );

        if result.shadow_count > 0 {
            let shadow_transforms_bytes: &[u8] =
                bytemuck::cast_slice(&result.shadow_transforms[..result.shadow_transform_count as usize]);
            let shadow_transforms_buffer = self.shadow_transforms.upload(
                shadow_transforms_bytes,
                wgpu::BufferUsages::STORAGE,
                "IndirectRenderer_ShadowTransforms",
                ring,
                self.staging_buffer,
                device,
                commands,
                deletion_queue,
                self.frame_index,
            );

            if shadow_transforms_buffer.is_some() {
                let shadow_bytes: &[u8] = bytemuck::cast_slice(&result.indirect_shadow[..result.shadow_count as usize]);
                let shadow_buffer = self.indirect_shadow.upload(
                    shadow_bytes,
                    wgpu::BufferUsages::INDIRECT,
                    "IndirectRenderer_Shadow",
                    ring,
                    self.staging_buffer,
                    device,
                    commands,
                    deletion_queue,
                    self.frame_index,
                );
                if let Some(indirect_buffer) = shadow_buffer {
                    commands.draw_indexed_indirect(indirect_buffer, 0, result.shadow_count);
                }
            }
        }

        let layers: [(&mut UploadSlot, &[IndirectCommand], u32, &str); 5] = [
            (&mut self.indirect_opaque, &*result.indirect_opaque, result.opaque_count, "IndirectRenderer_Opaque"),
            (
                &mut self.indirect_opaque_double_sided,
                &*result.indirect_opaque_double_sided,
                result.opaque_double_sided_count,
                "IndirectRenderer_OpaqueDoubleSided",
            ),
            (
                &mut self.indirect_transmission,
                &*result.indirect_transmission,
                result.transmission_count,
                "IndirectRenderer_Transmission",
            ),
            (
                &mut self.indirect_transmission_double_sided,
                &*result.indirect_transmission_double_sided,
                result.transmission_double_sided_count,
                "IndirectRenderer_TransmissionDoubleSided",
            ),
            (
                &mut self.indirect_transparent,
                &*result.indirect_transparent,
                result.transparent_count,
                "IndirectRenderer_Transparent",
            ),
        ];

        if transforms_buffer.is_some() {
            for (slot, cmds, count, name) in layers {
                if count == 0 {
                    continue;
                }
                let bytes: &[u8] = bytemuck::cast_slice(&cmds[..count as usize]);
                let buffer = slot.upload(
                    bytes,
                    wgpu::BufferUsages::INDIRECT,
                    name,
                    ring,
                    self.staging_buffer,
                    device,
                    commands,
                    deletion_queue,
                    self.frame_index,
                );
                if let Some(indirect_buffer) = buffer {
                    commands.draw_indexed_indirect(indirect_buffer, 0, count);
                }
            }
        }

        post_record(commands);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::material::MaterialData;
    use crate::assets::mesh::{Mesh, Primitive};
    use crate::gpu::rhi::null_rhi::{NullCommandList, NullRhi};
    use crate::scene::components::{LocalTransform, MeshRenderer, Relationship, Visibility, WorldBounds, WorldTransform};
    use glam::Mat4;

    fn scene_with_one_opaque_triangle() -> (AssetDatabase, SceneGraph, crate::ecs::Entity) {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(
            &[crate::assets::vertex::Vertex::default(); 3],
            &[0, 1, 2],
            0,
            "tri",
        );

        let mut graph = SceneGraph::new();
        let e = graph.registry_mut().create();
        graph.registry_mut().emplace(e, LocalTransform { matrix: Mat4::IDENTITY });
        graph.registry_mut().emplace(e, WorldTransform { matrix: Mat4::IDENTITY });
        graph.registry_mut().emplace(e, Visibility { visible: true });
        graph.registry_mut().emplace(e, WorldBounds { min: Vec3::splat(-1.0), max: Vec3::splat(1.0) });
        graph.registry_mut().emplace(e, Relationship::new());
        graph.registry_mut().emplace(e, MeshRenderer::new(0));

        (db, graph, e)
    }

    #[test]
    fn draw_uploads_unified_buffers_once_and_issues_one_indirect_draw() {
        let (mut db, graph, _e) = scene_with_one_opaque_triangle();
        let ring = RingStagingAllocator::new(1 << 20, 4096, 4);
        let deletion_queue = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let mut commands = NullCommandList::default();

        let mut renderer = IndirectRenderer::new(BufferHandle(1));
        let params = FrameParams {
            camera_position: Vec3::ZERO,
            frozen_camera_position: None,
            viewport_width: 1920,
            viewport_height: 1080,
            ignore_visibility: false,
        };

        let stats =
            renderer.draw(&mut db, &graph, &ring, &deletion_queue, &mut device, &mut commands, &params, |_| {});

        assert_eq!(stats.opaque_count, 1);
        assert!(db.vertex_buffer.is_some());
        assert_eq!(commands.indirect_draws.len(), 1);
        assert_eq!(commands.indirect_draws[0].2, 1);
    }

    #[test]
    fn draw_records_shadow_pass_before_opaque_layer() {
        let (mut db, mut graph, e) = scene_with_one_opaque_triangle();
        graph.registry_mut().emplace(e, crate::scene::components::CastShadowTag);

        let ring = RingStagingAllocator::new(1 << 20, 4096, 4);
        let deletion_queue = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let mut commands = NullCommandList::default();

        let mut renderer = IndirectRenderer::new(BufferHandle(1));
        let params = FrameParams {
            camera_position: Vec3::ZERO,
            frozen_camera_position: None,
            viewport_width: 1920,
            viewport_height: 1080,
            ignore_visibility: false,
        };

        let stats =
            renderer.draw(&mut db, &graph, &ring, &deletion_queue, &mut device, &mut commands, &params, |_| {});

        assert_eq!(stats.shadow_count, 1);
        assert_eq!(commands.indirect_draws.len(), 2, "shadow draw plus the opaque draw");
        assert_eq!(commands.indirect_draws[0].2, 1, "shadow pass is recorded first");
        assert_eq!(commands.indirect_draws[1].2, 1);
    }

    #[test]
    fn draw_with_no_visible_entities_records_no_indirect_draws() {
        let mut db = AssetDatabase::new();
        let graph = SceneGraph::new();
        let ring = RingStagingAllocator::new(1 << 20, 4096, 4);
        let deletion_queue = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let mut commands = NullCommandList::default();

        let mut renderer = IndirectRenderer::new(BufferHandle(1));
        let params = FrameParams {
            camera_position: Vec3::ZERO,
            frozen_camera_position: None,
            viewport_width: 640,
            viewport_height: 480,
            ignore_visibility: false,
        };

        let stats =
            renderer.draw(&mut db, &graph, &ring, &deletion_queue, &mut device, &mut commands, &params, |_| {});
        assert_eq!(stats.opaque_count, 0);
        assert!(commands.indirect_draws.is_empty());
    }

    #[test]
    fn frozen_camera_overrides_live_camera_for_sort_order() {
        let mut db = AssetDatabase::new();
        let mut blend = MaterialData::default();
        blend.alpha_mode = crate::assets::material::AlphaMode::Blend as u32;
        db.materials.push(blend);
        db.meshes.push(Mesh {
            name: "m".into(),
            primitives: vec![Primitive { first_index: 0, index_count: 3, vertex_offset: 0, material_index: 0 }],
        });
        db.mesh_bounds.push(crate::assets::mesh::Aabb::default());

        let mut graph = SceneGraph::new();
        let e = graph.registry_mut().create();
        let world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        graph.registry_mut().emplace(e, LocalTransform { matrix: world });
        graph.registry_mut().emplace(e, WorldTransform { matrix: world });
        graph.registry_mut().emplace(e, Visibility { visible: true });
        graph.registry_mut().emplace(e, WorldBounds { min: Vec3::splat(-1.0), max: Vec3::splat(1.0) });
        graph.registry_mut().emplace(e, Relationship::new());
        graph.registry_mut().emplace(e, MeshRenderer::new(0));

        let ring = RingStagingAllocator::new(1 << 20, 4096, 4);
        let deletion_queue = DeferredDestructionQueue::new();
        let mut device = NullRhi::new();
        let mut commands = NullCommandList::default();
        let mut renderer = IndirectRenderer::new(BufferHandle(1));

        let params = FrameParams {
            camera_position: Vec3::new(10.0, 0.0, 0.0),
            frozen_camera_position: Some(Vec3::ZERO),
            viewport_width: 800,
            viewport_height: 600,
            ignore_visibility: false,
        };
        let stats =
            renderer.draw(&mut db, &graph, &ring, &deletion_queue, &mut device, &mut commands, &params, |_| {});
        assert_eq!(stats.transparent_count, 1);
    }
}
