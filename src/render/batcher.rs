//! Render Batcher (C8): per-frame classification, sort-key construction, and
//! indirect-command emission (spec §4.8).
//!
//! Grounded in
//! `original_source/engine/src/renderer/scene/RenderBatcher.cpp`'s
//! `buildBatches`: collect visible mesh-renderer entities into a scratch
//! queue, stable-sort by sort key, then emit each item into its bucket's
//! flat arrays. All per-frame output arrays come from a caller-supplied
//! `bumpalo::Bump` so a frame's batching cost is one arena reset, not five
//! `Vec` growths.

use bumpalo::Bump;
use bytemuck::Zeroable;
use glam::Vec3;

use crate::assets::database::AssetDatabase;
use crate::assets::mesh::{Aabb, Primitive};
use crate::ecs::Registry;
use crate::render::sort_key::{build_sort_key, float_to_ordered_int, layer_of, SortingType};
use crate::render::system_meshes::{system_mesh_type_from_mesh_id, SystemMeshes};
use crate::scene::components::{CastShadowTag, MeshRenderer, Visibility, WorldBounds, WorldTransform};

/// One per-instance transform record uploaded alongside the indirect
/// commands (spec §3 "Indirect draw buffers").
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub world: glam::Mat4,
    pub world_it: glam::Mat4,
    pub vertex_buffer_address: u64,
    pub material_index: u32,
    pub mesh_index: u32,
    pub _pad: [u32; 2],
}

/// One GPU-side indirect draw command, laid out to match the RHI's expected
/// `drawIndexedIndirect` argument struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

const ZERO_COMMAND: IndirectCommand =
    IndirectCommand { index_count: 0, instance_count: 0, first_index: 0, vertex_offset: 0, first_instance: 0 };

/// A collected, sorted, not-yet-emitted draw (spec §4.8 collect phase).
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderItem {
    sort_key: u64,
    cmd: IndirectCommand,
    bounds: Aabb,
    mesh_index: u32,
}

/// The five draw-bucket layers plus the shared transform array, all arena
/// allocated for exactly this frame (spec §4.8 Output).
pub struct RenderBatchResult<'bump> {
    pub transforms: &'bump mut [InstanceData],
    pub transform_count: u32,

    /// Shadow-caster instances, collected from the `CastShadowTag` set
    /// (spec §4.9 step 3 "shadow pass"). Has its own transform array since
    /// it is driven by a separate query and may include entities skipped by
    /// the main passes (e.g. a caster culled from the main view but still
    /// visible to the shadow-casting light is out of scope here; this engine
    /// reuses the same `Visibility` gate for both).
    pub shadow_transforms: &'bump mut [InstanceData],
    pub shadow_transform_count: u32,
    pub indirect_shadow: &'bump mut [IndirectCommand],
    pub shadow_mesh_indices: &'bump mut [u32],
    pub shadow_bounds: &'bump mut [Aabb],
    pub shadow_count: u32,

    pub indirect_opaque: &'bump mut [IndirectCommand],
    pub opaque_mesh_indices: &'bump mut [u32],
    pub opaque_bounds: &'bump mut [Aabb],
    pub opaque_count: u32,

    pub indirect_opaque_double_sided: &'bump mut [IndirectCommand],
    pub opaque_double_sided_mesh_indices: &'bump mut [u32],
    pub opaque_double_sided_bounds: &'bump mut [Aabb],
    pub opaque_double_sided_count: u32,

    pub indirect_transmission: &'bump mut [IndirectCommand],
    pub transmission_mesh_indices: &'bump mut [u32],
    pub transmission_bounds: &'bump mut [Aabb],
    pub transmission_count: u32,

    pub indirect_transmission_double_sided: &'bump mut [IndirectCommand],
    pub transmission_double_sided_mesh_indices: &'bump mut [u32],
    pub transmission_double_sided_bounds: &'bump mut [Aabb],
    pub transmission_double_sided_count: u32,

    pub indirect_transparent: &'bump mut [IndirectCommand],
    pub transparent_mesh_indices: &'bump mut [u32],
    pub transparent_bounds: &'bump mut [Aabb],
    pub transparent_count: u32,

    pub volumetric_material: bool,
}

impl<'bump> RenderBatchResult<'bump> {
    fn empty_in(bump: &'bump Bump) -> Self {
        Self {
            transforms: bump.alloc_slice_fill_copy(0, InstanceData::zeroed()),
            transform_count: 0,
            shadow_transforms: bump.alloc_slice_fill_copy(0, InstanceData::zeroed()),
            shadow_transform_count: 0,
            indirect_shadow: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            shadow_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            shadow_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            shadow_count: 0,
            indirect_opaque: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            opaque_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            opaque_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            opaque_count: 0,
            indirect_opaque_double_sided: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            opaque_double_sided_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            opaque_double_sided_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            opaque_double_sided_count: 0,
            indirect_transmission: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            transmission_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            transmission_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            transmission_count: 0,
            indirect_transmission_double_sided: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            transmission_double_sided_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            transmission_double_sided_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            transmission_double_sided_count: 0,
            indirect_transparent: bump.alloc_slice_fill_copy(0, ZERO_COMMAND),
            transparent_mesh_indices: bump.alloc_slice_fill_copy(0, 0u32),
            transparent_bounds: bump.alloc_slice_fill_copy(0, Aabb::default()),
            transparent_count: 0,
            volumetric_material: false,
        }
    }
}

/// Classifies a material index into a draw bucket (spec §4.8 Classification).
/// Out-of-range indices fall back to `Opaque` rather than failing, matching
/// the collect phase's tolerance of stale material references.
pub fn classify(db: &AssetDatabase, mat_index: u32, volumetric_material: &mut bool) -> SortingType {
    let Some(mat) = db.materials.get(mat_index as usize) else {
        return SortingType::Opaque;
    };

    if mat.is_volumetric() {
        *volumetric_material = true;
    }

    if mat.alpha_mode() == crate::assets::material::AlphaMode::Blend {
        return SortingType::Transparent;
    }

    if mat.transmission_factor > 0.0 {
        return if mat.is_double_sided() { SortingType::TransmissionDoubleSided } else { SortingType::Transmission };
    }

    if mat.is_double_sided() {
        SortingType::OpaqueDoubleSided
    } else {
        SortingType::Opaque
    }
}

/// Builds this frame's draw batches from the scene (spec §4.8).
///
/// `scratch` is a caller-owned, reused-across-frames collect buffer
/// (mirroring the original's `thread_local` render queue) so collection
/// never allocates once warmed up. `bump` is reset by the caller at frame
/// begin; every output array in the returned [`RenderBatchResult`] is
/// allocated from it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_batches<'bump>(
    bump: &'bump Bump,
    scratch: &mut Vec<RenderItem>,
    registry: &Registry,
    db: &AssetDatabase,
    system_meshes: &SystemMeshes,
    camera_pos: Vec3,
    vertex_buffer_address: u64,
    system_vertex_buffer_address: u64,
    ignore_visibility: bool,
) -> RenderBatchResult<'bump> {
    let view = registry.view4::<MeshRenderer, WorldTransform, Visibility, WorldBounds>();
    let shadow_view =
        registry.view5::<MeshRenderer, WorldTransform, Visibility, WorldBounds, CastShadowTag>();

    let mut total_instances: u32 = 0;
    view.each(|_entity, (mesh, _world, vis, _bounds)| {
        if !ignore_visibility && !vis.visible {
            return;
        }
        if mesh.mesh_id < 0 {
            total_instances += 1;
        } else if let Some(m) = db.meshes.get(mesh.mesh_id as usize) {
            total_instances += m.primitives.len() as u32;
        }
    });

    let mut total_shadow_instances: u32 = 0;
    shadow_view.each(|_entity, (mesh, _world, vis, _bounds, _tag)| {
        if !ignore_visibility && !vis.visible {
            return;
        }
        if mesh.mesh_id < 0 {
            total_shadow_instances += 1;
        } else if let Some(m) = db.meshes.get(mesh.mesh_id as usize) {
            total_shadow_instances += m.primitives.len() as u32;
        }
    });

    if total_instances == 0 {
        return RenderBatchResult::empty_in(bump);
    }

    let mut result = RenderBatchResult {
        transforms: bump.alloc_slice_fill_copy(total_instances as usize, InstanceData::zeroed()),
        transform_count: 0,
        shadow_transforms: bump.alloc_slice_fill_copy(total_shadow_instances as usize, InstanceData::zeroed()),
        shadow_transform_count: 0,
        indirect_shadow: bump.alloc_slice_fill_copy(total_shadow_instances as usize, ZERO_COMMAND),
        shadow_mesh_indices: bump.alloc_slice_fill_copy(total_shadow_instances as usize, 0u32),
        shadow_bounds: bump.alloc_slice_fill_copy(total_shadow_instances as usize, Aabb::default()),
        shadow_count: 0,
        indirect_opaque: bump.alloc_slice_fill_copy(total_instances as usize, ZERO_COMMAND),
        opaque_mesh_indices: bump.alloc_slice_fill_copy(total_instances as usize, 0u32),
        opaque_bounds: bump.alloc_slice_fill_copy(total_instances as usize, Aabb::default()),
        opaque_count: 0,
        indirect_opaque_double_sided: bump.alloc_slice_fill_copy(total_instances as usize, ZERO_COMMAND),
        opaque_double_sided_mesh_indices: bump.alloc_slice_fill_copy(total_instances as usize, 0u32),
        opaque_double_sided_bounds: bump.alloc_slice_fill_copy(total_instances as usize, Aabb::default()),
        opaque_double_sided_count: 0,
        indirect_transmission: bump.alloc_slice_fill_copy(total_instances as usize, ZERO_COMMAND),
        transmission_mesh_indices: bump.alloc_slice_fill_copy(total_instances as usize, 0u32),
        transmission_bounds: bump.alloc_slice_fill_copy(total_instances as usize, Aabb::default()),
        transmission_count: 0,
        indirect_transmission_double_sided: bump.alloc_slice_fill_copy(total_instances as usize, ZERO_COMMAND),
        transmission_double_sided_mesh_indices: bump.alloc_slice_fill_copy(total_instances as usize, 0u32),
        transmission_double_sided_bounds: bump.alloc_slice_fill_copy(total_instances as usize, Aabb::default()),
        transmission_double_sided_count: 0,
        indirect_transparent: bump.alloc_slice_fill_copy(total_instances as usize, ZERO_COMMAND),
        transparent_mesh_indices: bump.alloc_slice_fill_copy(total_instances as usize, 0u32),
        transparent_bounds: bump.alloc_slice_fill_copy(total_instances as usize, Aabb::default()),
        transparent_count: 0,
        volumetric_material: false,
    };

    scratch.clear();
    scratch.reserve(total_instances as usize);

    let system_mesh_count = crate::scene::components::SystemMeshType::COUNT;

    view.each(|entity, (mesh, world, vis, bounds)| {
        if !ignore_visibility && !vis.visible {
            return;
        }
        if result.transform_count >= total_instances {
            return;
        }

        let m = world.matrix;
        let world_it = m.inverse().transpose();
        let is_system_mesh = mesh.mesh_id < 0;

        if is_system_mesh {
            let Some(kind) = system_mesh_type_from_mesh_id(mesh.mesh_id) else { return };
            let Some(prim) = system_meshes.primitive(kind) else { return };

            let mut mat_index = if mesh.material_override >= 0 { mesh.material_override as u32 } else { 0 };
            if mat_index as usize >= db.materials.len() {
                mat_index = 0;
            }
            let sorting = classify(db, mat_index, &mut result.volumetric_material);

            let first_instance = result.transform_count;
            result.transforms[first_instance as usize] = InstanceData {
                world: m,
                world_it,
                vertex_buffer_address: system_vertex_buffer_address,
                material_index: mat_index,
                mesh_index: kind.ordinal() as u32,
                _pad: [0; 2],
            };
            result.transform_count += 1;

            let mut mesh_or_depth = kind.ordinal() as u32;
            if sorting == SortingType::Transparent {
                let dist2 = camera_pos.distance_squared(m.w_axis.truncate());
                mesh_or_depth = !float_to_ordered_int(dist2);
            }

            scratch.push(RenderItem {
                sort_key: build_sort_key(sorting, mat_index, mesh_or_depth),
                cmd: IndirectCommand {
                    index_count: prim.index_count,
                    instance_count: 1,
                    first_index: prim.first_index,
                    vertex_offset: prim.vertex_offset,
                    first_instance,
                },
                bounds: Aabb { min: bounds.min, max: bounds.max },
                mesh_index: kind.ordinal() as u32,
            });
        } else {
            let mesh_id = mesh.mesh_id as usize;
            let Some(asset_mesh) = db.meshes.get(mesh_id) else { return };

            for prim in &asset_mesh.primitives {
                if result.transform_count >= total_instances {
                    return;
                }

                let mat_index =
                    if (prim.material_index as usize) < db.materials.len() { prim.material_index } else { 0 };
                let sorting = classify(db, mat_index, &mut result.volumetric_material);

                let first_instance = result.transform_count;
                result.transforms[first_instance as usize] = InstanceData {
                    world: m,
                    world_it,
                    vertex_buffer_address,
                    material_index: mat_index,
                    mesh_index: mesh_id as u32 + system_mesh_count,
                    _pad: [0; 2],
                };
                result.transform_count += 1;

                let mut mesh_or_depth = mesh_id as u32 + system_mesh_count;
                if sorting == SortingType::Transparent {
                    let dist2 = camera_pos.distance_squared(m.w_axis.truncate());
                    mesh_or_depth = !float_to_ordered_int(dist2);
                }

                scratch.push(RenderItem {
                    sort_key: build_sort_key(sorting, mat_index, mesh_or_depth),
                    cmd: IndirectCommand {
                        index_count: prim.index_count,
                        instance_count: 1,
                        first_index: prim.first_index,
                        vertex_offset: prim.vertex_offset,
                        first_instance,
                    },
                    bounds: Aabb { min: bounds.min, max: bounds.max },
                    mesh_index: mesh_id as u32 + system_mesh_count,
                });
            }
        }
        let _ = entity;
    });

    scratch.sort_by_key(|item| item.sort_key);

    for item in scratch.iter() {
        let (cmds, count, mesh_indices, out_bounds) = match layer_of(item.sort_key) {
            SortingType::Opaque => {
                (&mut result.indirect_opaque, &mut result.opaque_count, &mut result.opaque_mesh_indices, &mut result.opaque_bounds)
            }
            SortingType::OpaqueDoubleSided => (
                &mut result.indirect_opaque_double_sided,
                &mut result.opaque_double_sided_count,
                &mut result.opaque_double_sided_mesh_indices,
                &mut result.opaque_double_sided_bounds,
            ),
            SortingType::Transmission => (
                &mut result.indirect_transmission,
                &mut result.transmission_count,
                &mut result.transmission_mesh_indices,
                &mut result.transmission_bounds,
            ),
            SortingType::TransmissionDoubleSided => (
                &mut result.indirect_transmission_double_sided,
                &mut result.transmission_double_sided_count,
                &mut result.transmission_double_sided_mesh_indices,
                &mut result.transmission_double_sided_bounds,
            ),
            SortingType::Transparent => (
                &mut result.indirect_transparent,
                &mut result.transparent_count,
                &mut result.transparent_mesh_indices,
                &mut result.transparent_bounds,
            ),
        };

        if *count >= total_instances {
            continue;
        }
        let idx = *count as usize;
        cmds[idx] = item.cmd;
        mesh_indices[idx] = item.mesh_index;
        out_bounds[idx] = item.bounds;
        *count += 1;
    }

    shadow_view.each(|_entity, (mesh, world, vis, bounds, _tag)| {
        if !ignore_visibility && !vis.visible {
            return;
        }
        if result.shadow_transform_count >= total_shadow_instances {
            return;
        }

        let m = world.matrix;
        let world_it = m.inverse().transpose();

        let mut push_instance = |vb_address: u64, mat_index: u32, mesh_index: u32, prim: &Primitive, bounds: Aabb| {
            if result.shadow_transform_count >= total_shadow_instances {
                return;
            }
            let first_instance = result.shadow_transform_count;
            result.shadow_transforms[first_instance as usize] = InstanceData {
                world: m,
                world_it,
                vertex_buffer_address: vb_address,
                material_index: mat_index,
                mesh_index,
                _pad: [0; 2],
            };
            result.shadow_transform_count += 1;

            let idx = result.shadow_count as usize;
            result.indirect_shadow[idx] = IndirectCommand {
                index_count: prim.index_count,
                instance_count: 1,
                first_index: prim.first_index,
                vertex_offset: prim.vertex_offset,
                first_instance,
            };
            result.shadow_mesh_indices[idx] = mesh_index;
            result.shadow_bounds[idx] = bounds;
            result.shadow_count += 1;
        };

        if mesh.mesh_id < 0 {
            let Some(kind) = system_mesh_type_from_mesh_id(mesh.mesh_id) else { return };
            let Some(prim) = system_meshes.primitive(kind) else { return };
            let mat_index = if mesh.material_override >= 0 { mesh.material_override as u32 } else { 0 };
            push_instance(
                system_vertex_buffer_address,
                mat_index,
                kind.ordinal() as u32,
                &prim,
                Aabb { min: bounds.min, max: bounds.max },
            );
        } else {
            let mesh_id = mesh.mesh_id as usize;
            let Some(asset_mesh) = db.meshes.get(mesh_id) else { return };
            let mesh_index = mesh_id as u32 + crate::scene::components::SystemMeshType::COUNT;
            for prim in &asset_mesh.primitives {
                let mat_index =
                    if (prim.material_index as usize) < db.materials.len() { prim.material_index } else { 0 };
                push_instance(vertex_buffer_address, mat_index, mesh_index, prim, Aabb { min: bounds.min, max: bounds.max });
            }
        }
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::material::{AlphaMode, MaterialData};
    use crate::assets::mesh::{Mesh, Primitive};
    use crate::scene::components::{LocalTransform, Relationship, SystemMeshType};
    use glam::Mat4;

    fn spawn_mesh_entity(
        registry: &mut Registry,
        mesh_id: i32,
        visible: bool,
        world: Mat4,
    ) -> crate::ecs::Entity {
        let e = registry.create();
        registry.emplace(e, LocalTransform { matrix: world });
        registry.emplace(e, WorldTransform { matrix: world });
        registry.emplace(e, Visibility { visible });
        registry.emplace(e, WorldBounds { min: Vec3::splat(-0.5), max: Vec3::splat(0.5) });
        registry.emplace(e, Relationship::new());
        registry.emplace(e, MeshRenderer::new(mesh_id));
        e
    }

    fn db_with_two_opaque_meshes() -> AssetDatabase {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.meshes.push(Mesh {
            name: "a".into(),
            primitives: vec![Primitive { first_index: 0, index_count: 3, vertex_offset: 0, material_index: 0 }],
        });
        db.mesh_bounds.push(Aabb::default());
        db.meshes.push(Mesh {
            name: "b".into(),
            primitives: vec![Primitive { first_index: 3, index_count: 3, vertex_offset: 0, material_index: 0 }],
        });
        db.mesh_bounds.push(Aabb::default());
        db
    }

    #[test]
    fn invisible_entities_are_skipped_unless_ignore_visibility() {
        let db = db_with_two_opaque_meshes();
        let mut registry = Registry::new();
        spawn_mesh_entity(&mut registry, 0, false, Mat4::IDENTITY);

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);
        assert_eq!(result.opaque_count, 0);

        let result2 =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, true);
        assert_eq!(result2.opaque_count, 1);
    }

    #[test]
    fn opaque_and_transparent_entities_land_in_different_buckets() {
        let mut db = db_with_two_opaque_meshes();
        let mut blend_mat = MaterialData::default();
        blend_mat.alpha_mode = AlphaMode::Blend as u32;
        db.materials.push(blend_mat);
        db.meshes[1].primitives[0].material_index = 1;

        let mut registry = Registry::new();
        spawn_mesh_entity(&mut registry, 0, true, Mat4::IDENTITY);
        spawn_mesh_entity(&mut registry, 1, true, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);

        assert_eq!(result.opaque_count, 1);
        assert_eq!(result.transparent_count, 1);
        assert_eq!(result.transform_count, 2);
    }

    #[test]
    fn transparent_instances_sort_back_to_front() {
        let mut db = AssetDatabase::new();
        let mut blend = MaterialData::default();
        blend.alpha_mode = AlphaMode::Blend as u32;
        db.materials.push(blend);
        for i in 0..2u32 {
            db.meshes.push(Mesh {
                name: format!("m{i}"),
                primitives: vec![Primitive { first_index: 0, index_count: 3, vertex_offset: 0, material_index: 0 }],
            });
            db.mesh_bounds.push(Aabb::default());
        }

        let mut registry = Registry::new();
        // near: distance 2 from origin camera; far: distance 50.
        spawn_mesh_entity(&mut registry, 0, true, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        spawn_mesh_entity(&mut registry, 1, true, Mat4::from_translation(Vec3::new(50.0, 0.0, 0.0)));

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);

        assert_eq!(result.transparent_count, 2);
        // Farther entity (mesh_index 1, system-mesh-count offset) must be emitted first.
        assert_eq!(result.transparent_mesh_indices[0], SystemMeshType::COUNT + 1);
        assert_eq!(result.transparent_mesh_indices[1], SystemMeshType::COUNT);
    }

    #[test]
    fn no_visible_mesh_renderers_yields_empty_result_without_panicking() {
        let db = AssetDatabase::new();
        let registry = Registry::new();
        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);
        assert_eq!(result.transform_count, 0);
        assert_eq!(result.transforms.len(), 0);
    }

    #[test]
    fn volumetric_material_flag_is_set_without_changing_bucket() {
        let mut db = AssetDatabase::new();
        let mut mat = MaterialData::default();
        mat.ior = 1.8;
        db.materials.push(mat);
        db.meshes.push(Mesh {
            name: "m".into(),
            primitives: vec![Primitive { first_index: 0, index_count: 3, vertex_offset: 0, material_index: 0 }],
        });
        db.mesh_bounds.push(Aabb::default());

        let mut registry = Registry::new();
        spawn_mesh_entity(&mut registry, 0, true, Mat4::IDENTITY);

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);

        assert!(result.volumetric_material);
        assert_eq!(result.opaque_count, 1);
    }

    #[test]
    fn only_cast_shadow_tagged_entities_enter_the_shadow_bucket() {
        let db = db_with_two_opaque_meshes();
        let mut registry = Registry::new();
        let caster = spawn_mesh_entity(&mut registry, 0, true, Mat4::IDENTITY);
        spawn_mesh_entity(&mut registry, 1, true, Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        registry.emplace(caster, crate::scene::components::CastShadowTag);

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);

        assert_eq!(result.opaque_count, 2, "both entities still draw in the main pass");
        assert_eq!(result.shadow_count, 1, "only the tagged entity casts a shadow");
        assert_eq!(result.shadow_mesh_indices[0], SystemMeshType::COUNT);
    }

    #[test]
    fn invisible_shadow_caster_is_skipped_unless_ignore_visibility() {
        let db = db_with_two_opaque_meshes();
        let mut registry = Registry::new();
        let caster = spawn_mesh_entity(&mut registry, 0, false, Mat4::IDENTITY);
        registry.emplace(caster, crate::scene::components::CastShadowTag);

        let bump = Bump::new();
        let mut scratch = Vec::new();
        let result =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, false);
        assert_eq!(result.shadow_count, 0);

        let result2 =
            build_batches(&bump, &mut scratch, &registry, &db, &SystemMeshes::new(), Vec3::ZERO, 1, 2, true);
        assert_eq!(result2.shadow_count, 1);
    }
}
