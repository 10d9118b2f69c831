//! Asset database (C3): unified CPU/GPU geometry storage, material and mesh
//! metadata, imported-model staging structs, and the on-disk cache format.

pub mod cache;
pub mod database;
pub mod imported_model;
pub mod material;
pub mod mesh;
pub mod uploader;
pub mod vertex;

pub use database::{Animation, AssetDatabase, Camera, Skin};
pub use imported_model::{
    ImportedMesh, ImportedModel, ImportedNode, ImportedPrimitive, ImportedTexture, LoadPriority,
};
pub use material::{AlphaMode, MaterialData, SamplerAddressMode, TextureSlot};
pub use mesh::{Aabb, Mesh, Primitive};
pub use uploader::{upload_model, UploadResult};
pub use vertex::Vertex;
