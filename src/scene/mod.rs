//! Scene graph (C2): hierarchy, transforms, and the components that drive
//! them. Built directly on top of [`crate::ecs`].

pub mod components;
pub mod graph;

pub use components::{
    BoundsDirtyTag, CameraComponent, CastShadowTag, LocalTransform, MeshRenderer, Name,
    Relationship, SkinComponent, SystemMeshType, TransformDirtyTag, VisibleTag, Visibility,
    WorldBounds, WorldTransform,
};
pub use graph::SceneGraph;
