//! Plain data produced by an external scene-asset producer (glTF parser or
//! equivalent). No parser lives in this crate — these are the types an
//! uploader consumes to populate [`crate::assets::AssetDatabase`] and the
//! scene graph (spec §6.2).

use glam::{Mat4, Vec3};

use crate::assets::material::MaterialData;
use crate::assets::vertex::Vertex;

/// Load urgency, ordered `Thumbnail < Low < Medium < High < Immediate`
/// (spec §4.7). `Ord`/`PartialOrd` derive in declaration order, so a plain
/// numeric comparison on the discriminant matches the priority queue's
/// ordering requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPriority {
    Thumbnail,
    Low,
    Medium,
    High,
    Immediate,
}

impl Default for LoadPriority {
    fn default() -> Self {
        LoadPriority::Medium
    }
}

/// One texture to stream in, grounded in `ImportedData.hpp`'s
/// `ImportedTexture` (`[SUPPLEMENT]`: carries `is_ktx`/`priority`, which the
/// distilled spec's §6.2 sketch omits but the uploader and C7 request
/// construction need directly).
#[derive(Debug, Clone)]
pub struct ImportedTexture {
    pub source_path: String,
    pub is_srgb: bool,
    pub is_ktx: bool,
    pub priority: LoadPriority,
}

/// One mesh primitive as produced by the importer, pre-flattening.
#[derive(Debug, Clone, Default)]
pub struct ImportedPrimitive {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_index: u32,
    pub min: Vec3,
    pub max: Vec3,
}

/// A mesh as produced by the importer: a name plus its primitives.
#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub primitives: Vec<ImportedPrimitive>,
}

/// One scene-hierarchy node as produced by the importer.
#[derive(Debug, Clone)]
pub struct ImportedNode {
    pub name: String,
    pub local_transform: Mat4,
    pub parent_index: i32,
    pub children: Vec<i32>,
    pub mesh_index: i32,
    pub light_index: i32,
    pub camera_index: i32,
    pub skin_index: i32,
}

impl Default for ImportedNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            local_transform: Mat4::IDENTITY,
            parent_index: -1,
            children: Vec::new(),
            mesh_index: -1,
            light_index: -1,
            camera_index: -1,
            skin_index: -1,
        }
    }
}

/// The full payload handed to the uploader after an external parse, spec
/// §6.2. `animations`/`skins`/`lights`/`cameras` are consumed opaquely —
/// this crate stores them but does not interpret them.
#[derive(Debug, Clone, Default)]
pub struct ImportedModel {
    pub textures: Vec<ImportedTexture>,
    pub materials: Vec<MaterialData>,
    pub meshes: Vec<ImportedMesh>,
    pub nodes: Vec<ImportedNode>,
    pub root_nodes: Vec<i32>,
}
