//! Converts an [`ImportedModel`] into C3 asset-database arrays plus C2 scene
//! entities (spec §6.2).
//!
//! Grounded in `original_source/engine/src/renderer/io/ModelUploader.cpp`'s
//! two-pass shape: first flatten meshes/materials/textures into the database,
//! then walk `nodes[]` creating one entity per node and recreating the
//! hierarchy with `setParent`.

use crate::assets::database::{AssetDatabase, PrimitiveData};
use crate::assets::imported_model::{ImportedModel, ImportedNode};
use crate::ecs::{Entity, NULL_ENTITY};
use crate::scene::components::{
    BoundsDirtyTag, CameraComponent, MeshRenderer, Name, SkinComponent, Visibility, VisibleTag,
    WorldBounds,
};
use crate::scene::graph::SceneGraph;

/// Maps an imported node index to the entity created for it, for remapping
/// skin/animation node references after upload (spec §6.2).
pub struct UploadResult {
    pub entity_map: Vec<Entity>,
    pub first_mesh_index: u32,
}

/// Appends `model`'s meshes/materials/textures to `db`, creates one entity per
/// imported node under `graph`, and recreates the parent/child hierarchy.
///
/// Material indices in the model are offset by the database's pre-existing
/// material count so multiple models can share one database. Mesh indices on
/// `MeshRenderer` components are likewise offset by the pre-existing mesh
/// count.
pub fn upload_model(db: &mut AssetDatabase, graph: &mut SceneGraph, model: &ImportedModel) -> UploadResult {
    let material_base = db.materials.len() as u32;
    db.materials.extend_from_slice(&model.materials);

    for tex in &model.textures {
        db.texture_files.push(tex.source_path.clone());
        db.texture_is_srgb.push(tex.is_srgb);
    }

    // One db mesh per imported mesh, holding all of its primitives, so
    // `node.mesh_index` keeps a 1:1 correspondence with `db.meshes`.
    let mesh_base = db.meshes.len() as u32;
    for mesh in &model.meshes {
        let primitives: Vec<PrimitiveData<'_>> = mesh
            .primitives
            .iter()
            .map(|prim| PrimitiveData {
                vertices: &prim.vertices,
                indices: &prim.indices,
                material_index: material_base + prim.material_index,
            })
            .collect();
        db.append_mesh_data(&primitives, mesh.name.clone());
    }

    let entity_map = create_entities(graph, &model.nodes);
    link_hierarchy(graph, &model.nodes, &entity_map);
    attach_components(graph, &model.nodes, &entity_map, mesh_base);

    UploadResult { entity_map, first_mesh_index: mesh_base }
}

fn create_entities(graph: &mut SceneGraph, nodes: &[ImportedNode]) -> Vec<Entity> {
    nodes.iter().map(|_| graph.create_node(NULL_ENTITY)).collect()
}

fn link_hierarchy(graph: &mut SceneGraph, nodes: &[ImportedNode], entity_map: &[Entity]) {
    for (i, node) in nodes.iter().enumerate() {
        if node.parent_index < 0 {
            continue;
        }
        let parent_entity = entity_map[node.parent_index as usize];
        graph.set_parent(entity_map[i], parent_entity);
    }
}

fn attach_components(graph: &mut SceneGraph, nodes: &[ImportedNode], entity_map: &[Entity], mesh_base: u32) {
    for (i, node) in nodes.iter().enumerate() {
        let e = entity_map[i];
        let registry = graph.registry_mut();

        if !node.name.is_empty() {
            registry.emplace(e, Name { text: node.name.clone() });
        }
        if let Some(local) = registry.get_mut::<crate::scene::components::LocalTransform>(e) {
            local.matrix = node.local_transform;
        }
        if node.mesh_index >= 0 {
            registry.emplace(e, MeshRenderer::new(mesh_base as i32 + node.mesh_index));
            registry.emplace(e, WorldBounds::default());
            registry.emplace(e, Visibility::default());
            registry.emplace(e, VisibleTag);
            registry.emplace(e, BoundsDirtyTag);
        }
        if node.camera_index >= 0 {
            registry.emplace(e, CameraComponent { camera_id: node.camera_index });
        }
        if node.skin_index >= 0 {
            registry.emplace(e, SkinComponent { skin_id: node.skin_index });
        }
    }
}

/// Remaps a skin's joint node indices (relative to the imported model) to the
/// entity ids created for them by a prior [`upload_model`] call (spec §6.2
/// "referenced skins/animations have their node indices remapped to entity
/// ids").
pub fn remap_skin_joints(joint_node_indices: &[i32], entity_map: &[Entity]) -> Vec<Entity> {
    joint_node_indices
        .iter()
        .map(|&idx| if idx >= 0 { entity_map[idx as usize] } else { NULL_ENTITY })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::imported_model::{ImportedMesh, ImportedPrimitive};
    use crate::assets::material::MaterialData;
    use crate::assets::vertex::Vertex;
    use crate::scene::components::Relationship;
    use glam::Mat4;

    fn node(name: &str, parent: i32, mesh_index: i32) -> ImportedNode {
        ImportedNode { name: name.to_string(), local_transform: Mat4::IDENTITY, parent_index: parent, mesh_index, ..Default::default() }
    }

    fn sample_model() -> ImportedModel {
        ImportedModel {
            textures: vec![],
            materials: vec![MaterialData::default()],
            meshes: vec![ImportedMesh {
                name: "cube".to_string(),
                primitives: vec![ImportedPrimitive {
                    vertices: vec![Vertex::default(), Vertex::default(), Vertex::default()],
                    indices: vec![0, 1, 2],
                    material_index: 0,
                    ..Default::default()
                }],
            }],
            nodes: vec![node("root", -1, -1), node("child", 0, 0)],
            root_nodes: vec![0],
        }
    }

    #[test]
    fn upload_creates_one_entity_per_node_and_recreates_hierarchy() {
        let mut db = AssetDatabase::new();
        let mut graph = SceneGraph::new();
        let model = sample_model();

        let result = upload_model(&mut db, &mut graph, &model);
        assert_eq!(result.entity_map.len(), 2);

        let root = result.entity_map[0];
        let child = result.entity_map[1];
        let rel = graph.registry().get::<Relationship>(child).unwrap();
        assert_eq!(rel.parent, root);
    }

    #[test]
    fn upload_offsets_mesh_and_material_indices_by_existing_database_contents() {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(&[Vertex::default()], &[0], 0, "preexisting");

        let mut graph = SceneGraph::new();
        let model = sample_model();
        let result = upload_model(&mut db, &mut graph, &model);

        assert_eq!(result.first_mesh_index, 1);
        let child = result.entity_map[1];
        let renderer = graph.registry().get::<MeshRenderer>(child).unwrap();
        assert_eq!(renderer.mesh_id, 1);
        assert_eq!(db.meshes[1].primitives[0].material_index, 1);
    }

    #[test]
    fn multi_primitive_mesh_stays_one_db_mesh_and_node_maps_to_it() {
        let mut db = AssetDatabase::new();
        let mut graph = SceneGraph::new();
        let model = ImportedModel {
            textures: vec![],
            materials: vec![MaterialData::default(), MaterialData::default()],
            meshes: vec![ImportedMesh {
                name: "multi".to_string(),
                primitives: vec![
                    ImportedPrimitive {
                        vertices: vec![Vertex::default(), Vertex::default(), Vertex::default()],
                        indices: vec![0, 1, 2],
                        material_index: 0,
                        ..Default::default()
                    },
                    ImportedPrimitive {
                        vertices: vec![Vertex::default(), Vertex::default(), Vertex::default()],
                        indices: vec![0, 1, 2],
                        material_index: 1,
                        ..Default::default()
                    },
                ],
            }],
            nodes: vec![node("root", -1, 0)],
            root_nodes: vec![0],
        };

        let result = upload_model(&mut db, &mut graph, &model);

        assert_eq!(db.meshes.len(), 1, "both primitives must land in the same db mesh");
        assert_eq!(db.meshes[0].primitives.len(), 2);
        assert_eq!(db.meshes[0].primitives[0].material_index, 0);
        assert_eq!(db.meshes[0].primitives[1].material_index, 1);

        let node_entity = result.entity_map[0];
        let renderer = graph.registry().get::<MeshRenderer>(node_entity).unwrap();
        assert_eq!(renderer.mesh_id, 0, "node's mesh_index must reference the single combined mesh");
    }

    #[test]
    fn mesh_bearing_node_gets_bounds_and_visibility_components() {
        let mut db = AssetDatabase::new();
        let mut graph = SceneGraph::new();
        let model = sample_model();

        let result = upload_model(&mut db, &mut graph, &model);

        let root = result.entity_map[0];
        let child = result.entity_map[1];
        assert!(!graph.registry().has::<WorldBounds>(root), "meshless node gets no bounds");
        assert!(graph.registry().has::<WorldBounds>(child));
        assert!(graph.registry().has::<Visibility>(child));
        assert!(graph.registry().has::<VisibleTag>(child));
        assert!(graph.registry().has::<BoundsDirtyTag>(child));
        assert!(graph.registry().get::<Visibility>(child).unwrap().visible);
    }

    #[test]
    fn remap_skin_joints_translates_node_indices_to_entities() {
        let mut db = AssetDatabase::new();
        let mut graph = SceneGraph::new();
        let model = sample_model();
        let result = upload_model(&mut db, &mut graph, &model);

        let joints = remap_skin_joints(&[1, -1, 0], &result.entity_map);
        assert_eq!(joints[0], result.entity_map[1]);
        assert_eq!(joints[1], NULL_ENTITY);
        assert_eq!(joints[2], result.entity_map[0]);
    }
}
