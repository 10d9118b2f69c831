//! Components attached to scene-graph nodes.
//!
//! Grounded in `original_source/engine/include/pnkr/renderer/scene/Components.hpp`:
//! hierarchy/transform are split into small hot components so the transform
//! system only touches cache-friendly data every frame, while renderer-facing
//! attributes (mesh, light, camera…) live in their own sparse-set pools.

use glam::Mat4;

use crate::ecs::{Entity, NULL_ENTITY};

/// Hierarchy links: parent/first-child/last-child/siblings, plus a cached
/// depth level. Spec §3 C2.
///
/// All link fields default to [`NULL_ENTITY`], not `0` — `0` is a valid
/// entity id, so a derived `#[derive(Default)]` would silently alias an
/// "absent" link to whichever entity happens to hold id zero.
#[derive(Debug, Clone, Copy)]
pub struct Relationship {
    pub parent: Entity,
    pub first_child: Entity,
    pub last_child: Entity,
    pub prev_sibling: Entity,
    pub next_sibling: Entity,
    pub level: u16,
}

impl Default for Relationship {
    fn default() -> Self {
        Self::new()
    }
}

impl Relationship {
    pub fn new() -> Self {
        Self {
            parent: NULL_ENTITY,
            first_child: NULL_ENTITY,
            last_child: NULL_ENTITY,
            prev_sibling: NULL_ENTITY,
            next_sibling: NULL_ENTITY,
            level: 0,
        }
    }
}

/// Local (parent-relative) transform matrix.
#[derive(Debug, Clone, Copy)]
pub struct LocalTransform {
    pub matrix: Mat4,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self { matrix: Mat4::IDENTITY }
    }
}

/// Cached world-space transform matrix, kept in sync by
/// [`crate::scene::SceneGraph::update_transforms`].
#[derive(Debug, Clone, Copy)]
pub struct WorldTransform {
    pub matrix: Mat4,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self { matrix: Mat4::IDENTITY }
    }
}

/// Object-space AABB transformed into world space; consumed by the render
/// batcher for draw bounds and referenced by spec §8's batcher invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldBounds {
    pub min: glam::Vec3,
    pub max: glam::Vec3,
}

/// Cheap queryable visibility flag. Complements [`VisibleTag`]: the batcher's
/// `ignoreVisibility` flag and spec §8 treat visibility as a value, so it is
/// exposed as a small component instead of relying on tag presence alone
/// (see `SPEC_FULL.md`'s REDESIGN note).
#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    pub visible: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self { visible: true }
    }
}

/// Empty marker components used purely for cheap set-membership checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformDirtyTag;
/// Set whenever an entity's `WorldTransform` changes; consumed by
/// [`crate::scene::SceneGraph::recompute_world_bounds`], which recomputes
/// `WorldBounds` from the mesh's object-space AABB and clears the tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsDirtyTag;
/// Mirrors `Visibility.visible` as a set-membership marker, kept in sync by
/// [`crate::scene::SceneGraph::set_visible`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleTag;
/// Marks an entity as a shadow caster; the render batcher collects this set
/// separately to record the shadow pass ahead of the opaque layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CastShadowTag;

/// References a mesh in the asset database's `meshes[]` array by index.
/// Negative indices address a built-in "system mesh" (plane/cube/sphere/…).
///
/// `0` is a valid index into `meshes[]`/`materials[]`, so "absent" is `-1`,
/// not the derived-`Default` zero.
#[derive(Debug, Clone, Copy)]
pub struct MeshRenderer {
    pub mesh_id: i32,
    pub material_override: i32,
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self { mesh_id: -1, material_override: -1 }
    }
}

impl MeshRenderer {
    pub fn new(mesh_id: i32) -> Self {
        Self { mesh_id, material_override: -1 }
    }
}

/// One of the built-in primitive shapes, addressed by a negative mesh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMeshType {
    Plane,
    Cube,
    Sphere,
    Capsule,
    Torus,
}

impl SystemMeshType {
    pub const COUNT: u32 = 5;

    pub fn ordinal(self) -> i32 {
        match self {
            SystemMeshType::Plane => 0,
            SystemMeshType::Cube => 1,
            SystemMeshType::Sphere => 2,
            SystemMeshType::Capsule => 3,
            SystemMeshType::Torus => 4,
        }
    }

    pub fn from_ordinal(v: i32) -> Option<Self> {
        match v {
            0 => Some(SystemMeshType::Plane),
            1 => Some(SystemMeshType::Cube),
            2 => Some(SystemMeshType::Sphere),
            3 => Some(SystemMeshType::Capsule),
            4 => Some(SystemMeshType::Torus),
            _ => None,
        }
    }
}

/// Camera attribute; indexes into the asset database's `cameras[]`.
#[derive(Debug, Clone, Copy)]
pub struct CameraComponent {
    pub camera_id: i32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self { camera_id: -1 }
    }
}

/// Skin attribute; indexes into the asset database's `skins[]`.
#[derive(Debug, Clone, Copy)]
pub struct SkinComponent {
    pub skin_id: i32,
}

impl Default for SkinComponent {
    fn default() -> Self {
        Self { skin_id: -1 }
    }
}

/// Editor/tooling label, grounded in `Components.hpp`'s `struct Name`.
#[derive(Debug, Clone, Default)]
pub struct Name {
    pub text: String,
}
