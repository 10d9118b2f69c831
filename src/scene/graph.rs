//! Scene graph: hierarchy storage plus dirty-propagation transform
//! evaluation (C2).
//!
//! Grounded in `original_source/engine/src/renderer/scene/SceneGraph.cpp`.
//! Hierarchy links live in the [`Relationship`] component; a topologically
//! ordered `topo` list (pre-order DFS, children visited in insertion order)
//! drives incremental world-matrix updates.

use crate::assets::database::AssetDatabase;
use crate::assets::mesh::Aabb;
use crate::ecs::{Entity, Registry, NULL_ENTITY};
use crate::scene::components::{
    BoundsDirtyTag, LocalTransform, MeshRenderer, Relationship, TransformDirtyTag, VisibleTag,
    Visibility, WorldBounds, WorldTransform,
};

/// Owns a [`Registry`] plus the hierarchy bookkeeping described in spec §3/§4.2.
pub struct SceneGraph {
    registry: Registry,
    topo: Vec<Entity>,
    roots: Vec<Entity>,
    hierarchy_dirty: bool,
    root: Entity,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            topo: Vec::new(),
            roots: Vec::new(),
            hierarchy_dirty: false,
            root: NULL_ENTITY,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn topo_order(&self) -> &[Entity] {
        &self.topo
    }

    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    pub fn hierarchy_dirty(&self) -> bool {
        self.hierarchy_dirty
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    /// Creates a fresh node, emplacing `LocalTransform`/`WorldTransform`/
    /// `Relationship` and linking it under `parent` (or as a new root when
    /// `parent == NULL_ENTITY`).
    pub fn create_node(&mut self, parent: Entity) -> Entity {
        let e = self.registry.create();
        if self.root == NULL_ENTITY {
            self.root = e;
        }

        self.registry.emplace(e, LocalTransform::default());
        self.registry.emplace(e, WorldTransform::default());

        let mut rel = Relationship::new();
        if parent != NULL_ENTITY {
            rel.parent = parent;
            let parent_level = self.registry.get::<Relationship>(parent).map_or(0, |r| r.level);
            rel.level = parent_level + 1;

            let parent_last_child =
                self.registry.get::<Relationship>(parent).map_or(NULL_ENTITY, |r| r.last_child);

            if parent_last_child == NULL_ENTITY {
                if let Some(prel) = self.registry.get_mut::<Relationship>(parent) {
                    prel.first_child = e;
                    prel.last_child = e;
                }
            } else {
                if let Some(lc_rel) = self.registry.get_mut::<Relationship>(parent_last_child) {
                    lc_rel.next_sibling = e;
                }
                rel.prev_sibling = parent_last_child;
                if let Some(prel) = self.registry.get_mut::<Relationship>(parent) {
                    prel.last_child = e;
                }
            }
        } else {
            self.roots.push(e);
            rel.level = 0;
        }

        self.registry.emplace(e, rel);
        self.hierarchy_dirty = true;
        e
    }

    /// Recursively destroys `e` and its descendants, unlinking from its
    /// parent/siblings/roots along the way. No-op if `e` has no
    /// `Relationship` (never created, or already destroyed).
    pub fn destroy_node(&mut self, e: Entity) {
        let Some(rel) = self.registry.get::<Relationship>(e).copied() else {
            return;
        };

        let mut child = rel.first_child;
        while child != NULL_ENTITY {
            let next = self.registry.get::<Relationship>(child).map_or(NULL_ENTITY, |r| r.next_sibling);
            self.destroy_node(child);
            child = next;
        }

        if rel.parent != NULL_ENTITY {
            if let Some(prel) = self.registry.get_mut::<Relationship>(rel.parent) {
                if prel.first_child == e {
                    prel.first_child = rel.next_sibling;
                }
                if prel.last_child == e {
                    prel.last_child = rel.prev_sibling;
                }
            }
        } else {
            self.roots.retain(|&x| x != e);
        }

        if rel.prev_sibling != NULL_ENTITY {
            if let Some(r) = self.registry.get_mut::<Relationship>(rel.prev_sibling) {
                r.next_sibling = rel.next_sibling;
            }
        }
        if rel.next_sibling != NULL_ENTITY {
            if let Some(r) = self.registry.get_mut::<Relationship>(rel.next_sibling) {
                r.prev_sibling = rel.prev_sibling;
            }
        }

        if self.root == e {
            self.root = NULL_ENTITY;
        }

        self.registry.destroy(e);
        self.hierarchy_dirty = true;
    }

    /// Reparents `e` under `parent`. Ignored (no mutation) if `parent` is a
    /// descendant of `e` or equals `e` — the cycle-protection ancestor walk
    /// from spec §4.2/§9.
    pub fn set_parent(&mut self, e: Entity, parent: Entity) {
        if e == parent {
            return;
        }
        if parent != NULL_ENTITY && self.registry.has::<Relationship>(parent) {
            let mut current = parent;
            while current != NULL_ENTITY {
                if current == e {
                    return;
                }
                current = self.registry.get::<Relationship>(current).map_or(NULL_ENTITY, |r| r.parent);
            }
        }

        if !self.registry.has::<Relationship>(e) {
            self.registry.emplace(e, Relationship::new());
        }
        let mut rel = *self.registry.get::<Relationship>(e).unwrap();

        // Unlink from old parent / roots.
        if rel.parent != NULL_ENTITY {
            if let Some(old_parent_rel) = self.registry.get_mut::<Relationship>(rel.parent) {
                if old_parent_rel.first_child == e {
                    old_parent_rel.first_child = rel.next_sibling;
                }
                if old_parent_rel.last_child == e {
                    old_parent_rel.last_child = rel.prev_sibling;
                }
            }
            if rel.prev_sibling != NULL_ENTITY {
                if let Some(r) = self.registry.get_mut::<Relationship>(rel.prev_sibling) {
                    r.next_sibling = rel.next_sibling;
                }
            }
            if rel.next_sibling != NULL_ENTITY {
                if let Some(r) = self.registry.get_mut::<Relationship>(rel.next_sibling) {
                    r.prev_sibling = rel.prev_sibling;
                }
            }
        } else {
            self.roots.retain(|&x| x != e);
        }

        rel.parent = parent;
        if parent != NULL_ENTITY {
            if !self.registry.has::<Relationship>(parent) {
                self.registry.emplace(parent, Relationship::new());
            }
            let parent_level = self.registry.get::<Relationship>(parent).unwrap().level;
            let parent_last_child = self.registry.get::<Relationship>(parent).unwrap().last_child;

            rel.level = parent_level + 1;
            rel.next_sibling = NULL_ENTITY;
            rel.prev_sibling = parent_last_child;

            if parent_last_child == NULL_ENTITY {
                let prel = self.registry.get_mut::<Relationship>(parent).unwrap();
                prel.first_child = e;
                prel.last_child = e;
            } else {
                if let Some(r) = self.registry.get_mut::<Relationship>(parent_last_child) {
                    r.next_sibling = e;
                }
                self.registry.get_mut::<Relationship>(parent).unwrap().last_child = e;
            }
        } else {
            rel.level = 0;
            rel.next_sibling = NULL_ENTITY;
            rel.prev_sibling = NULL_ENTITY;
            self.roots.push(e);
        }

        *self.registry.get_mut::<Relationship>(e).unwrap() = rel;
        self.hierarchy_dirty = true;

        // Mark e and its whole subtree transform- and bounds-dirty.
        let mut stack = vec![e];
        while let Some(current) = stack.pop() {
            if !self.registry.has::<TransformDirtyTag>(current) {
                self.registry.emplace(current, TransformDirtyTag);
            }
            if !self.registry.has::<BoundsDirtyTag>(current) {
                self.registry.emplace(current, BoundsDirtyTag);
            }
            let Some(rel) = self.registry.get::<Relationship>(current).copied() else {
                continue;
            };
            let mut child = rel.first_child;
            while child != NULL_ENTITY {
                stack.push(child);
                child = self.registry.get::<Relationship>(child).map_or(NULL_ENTITY, |r| r.next_sibling);
            }
        }
    }

    /// Inserts `TransformDirtyTag` and `BoundsDirtyTag` on `e` if not already
    /// present: a transform change invalidates both the cached world matrix
    /// and the cached world-space bounds derived from it.
    pub fn mark_as_changed(&mut self, e: Entity) {
        if !self.registry.has::<TransformDirtyTag>(e) {
            self.registry.emplace(e, TransformDirtyTag);
        }
        if !self.registry.has::<BoundsDirtyTag>(e) {
            self.registry.emplace(e, BoundsDirtyTag);
        }
    }

    /// Sets `e`'s `Visibility.visible` flag, emplacing the component if
    /// absent, and mirrors it onto the `VisibleTag` set-membership marker so
    /// callers that only need "is anything visible at all" can query the tag
    /// pool instead of every `Visibility` value (spec §3).
    pub fn set_visible(&mut self, e: Entity, visible: bool) {
        if let Some(vis) = self.registry.get_mut::<Visibility>(e) {
            vis.visible = visible;
        } else {
            self.registry.emplace(e, Visibility { visible });
        }

        if visible {
            if !self.registry.has::<VisibleTag>(e) {
                self.registry.emplace(e, VisibleTag);
            }
        } else {
            self.registry.remove::<VisibleTag>(e);
        }
    }

    /// Recomputes `WorldBounds` for every entity whose `BoundsDirtyTag` is
    /// set, transforming the referenced mesh's object-space AABB
    /// (`db.mesh_bounds[mesh_id]`) by the entity's current `WorldTransform`.
    /// Mirrors `update_transforms`'s dirty-then-bulk-clear shape. System
    /// meshes (negative `mesh_id`) have no per-mesh AABB in the database and
    /// are skipped; callers that need their bounds set `WorldBounds`
    /// directly.
    pub fn recompute_world_bounds(&mut self, db: &AssetDatabase) {
        if self.registry.pool_for::<BoundsDirtyTag>().is_empty() {
            return;
        }
        let dirty: Vec<Entity> = self.registry.pool_for::<BoundsDirtyTag>().entities().to_vec();

        for e in dirty {
            let Some(mesh) = self.registry.get::<MeshRenderer>(e) else { continue };
            if mesh.mesh_id < 0 {
                continue;
            }
            let Some(local_aabb) = db.mesh_bounds.get(mesh.mesh_id as usize).copied() else { continue };
            let world = self.registry.get::<WorldTransform>(e).map_or(glam::Mat4::IDENTITY, |t| t.matrix);

            let corners = [
                glam::Vec3::new(local_aabb.min.x, local_aabb.min.y, local_aabb.min.z),
                glam::Vec3::new(local_aabb.max.x, local_aabb.min.y, local_aabb.min.z),
                glam::Vec3::new(local_aabb.min.x, local_aabb.max.y, local_aabb.min.z),
                glam::Vec3::new(local_aabb.max.x, local_aabb.max.y, local_aabb.min.z),
                glam::Vec3::new(local_aabb.min.x, local_aabb.min.y, local_aabb.max.z),
                glam::Vec3::new(local_aabb.max.x, local_aabb.min.y, local_aabb.max.z),
                glam::Vec3::new(local_aabb.min.x, local_aabb.max.y, local_aabb.max.z),
                glam::Vec3::new(local_aabb.max.x, local_aabb.max.y, local_aabb.max.z),
            ];
            let world_aabb = Aabb::from_points(corners.into_iter().map(|c| world.transform_point3(c)));

            if let Some(wb) = self.registry.get_mut::<WorldBounds>(e) {
                wb.min = world_aabb.min;
                wb.max = world_aabb.max;
            }
        }

        self.registry.pool_for_mut::<BoundsDirtyTag>().clear();
    }

    /// Forces a topo-order rebuild.
    pub fn on_hierarchy_changed(&mut self) {
        self.hierarchy_dirty = true;
        self.update_topo_order();
    }

    fn update_topo_order(&mut self) {
        self.topo.clear();
        let mut stack: Vec<Entity> = self.roots.iter().rev().copied().collect();

        while let Some(e) = stack.pop() {
            self.topo.push(e);
            let Some(rel) = self.registry.get::<Relationship>(e).copied() else {
                continue;
            };
            let mut children = Vec::new();
            let mut child = rel.first_child;
            while child != NULL_ENTITY {
                children.push(child);
                child = self.registry.get::<Relationship>(child).map_or(NULL_ENTITY, |r| r.next_sibling);
            }
            for c in children.into_iter().rev() {
                stack.push(c);
            }
        }
        self.hierarchy_dirty = false;
    }

    fn recalculate_full(&mut self) {
        if self.hierarchy_dirty {
            self.update_topo_order();
        }
        for e in self.topo.clone() {
            let rel = self.registry.get::<Relationship>(e).copied().unwrap_or_default();
            let local = self.registry.get::<LocalTransform>(e).map_or(glam::Mat4::IDENTITY, |t| t.matrix);
            let world = if rel.parent != NULL_ENTITY {
                let parent_world =
                    self.registry.get::<WorldTransform>(rel.parent).map_or(glam::Mat4::IDENTITY, |t| t.matrix);
                parent_world * local
            } else {
                local
            };
            if let Some(wt) = self.registry.get_mut::<WorldTransform>(e) {
                wt.matrix = world;
            }
            self.registry.remove::<TransformDirtyTag>(e);
        }
    }

    /// Recomputes world transforms (spec §4.2). Performs a full topo-order
    /// recompute if the hierarchy changed since the last call, otherwise an
    /// incremental pass that only touches entities whose own
    /// `TransformDirtyTag` is set, or whose parent's is (propagating the tag
    /// down as it walks). Clears the dirty-tag pool in bulk when done.
    pub fn update_transforms(&mut self) {
        if self.hierarchy_dirty {
            self.recalculate_full();
            return;
        }

        if self.registry.pool_for::<TransformDirtyTag>().is_empty() {
            return;
        }

        for e in self.topo.clone() {
            let rel = self.registry.get::<Relationship>(e).copied().unwrap_or_default();
            let mut is_dirty = self.registry.has::<TransformDirtyTag>(e);

            if !is_dirty && rel.parent != NULL_ENTITY && self.registry.has::<TransformDirtyTag>(rel.parent) {
                self.registry.emplace(e, TransformDirtyTag);
                is_dirty = true;
            }

            if is_dirty {
                let local = self.registry.get::<LocalTransform>(e).map_or(glam::Mat4::IDENTITY, |t| t.matrix);
                let world = if rel.parent != NULL_ENTITY {
                    let parent_world =
                        self.registry.get::<WorldTransform>(rel.parent).map_or(glam::Mat4::IDENTITY, |t| t.matrix);
                    parent_world * local
                } else {
                    local
                };
                if let Some(wt) = self.registry.get_mut::<WorldTransform>(e) {
                    wt.matrix = world;
                }
            }
        }

        self.registry.pool_for_mut::<TransformDirtyTag>().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::vertex::Vertex;
    use glam::Vec3;

    #[test]
    fn create_node_links_parent_child() {
        let mut g = SceneGraph::new();
        let parent = g.create_node(NULL_ENTITY);
        let child = g.create_node(parent);
        let rel = g.registry().get::<Relationship>(child).unwrap();
        assert_eq!(rel.parent, parent);
        assert_eq!(rel.level, 1);
        let prel = g.registry().get::<Relationship>(parent).unwrap();
        assert_eq!(prel.first_child, child);
        assert_eq!(prel.last_child, child);
    }

    #[test]
    fn destroy_node_unlinks_and_recurses() {
        let mut g = SceneGraph::new();
        let parent = g.create_node(NULL_ENTITY);
        let child = g.create_node(parent);
        let grandchild = g.create_node(child);
        g.destroy_node(parent);
        assert!(!g.registry().has::<Relationship>(parent));
        assert!(!g.registry().has::<Relationship>(child));
        assert!(!g.registry().has::<Relationship>(grandchild));
        assert!(g.roots().is_empty());
    }

    #[test]
    fn destroy_entity_with_no_components_is_noop() {
        let mut g = SceneGraph::new();
        g.destroy_node(999);
    }

    #[test]
    fn set_parent_rejects_cycle() {
        let mut g = SceneGraph::new();
        let a = g.create_node(NULL_ENTITY);
        let b = g.create_node(a);
        g.set_parent(a, b); // would create a cycle; must be ignored
        let rel_a = g.registry().get::<Relationship>(a).unwrap();
        assert_eq!(rel_a.parent, NULL_ENTITY);
    }

    #[test]
    fn set_parent_same_twice_is_idempotent() {
        let mut g = SceneGraph::new();
        let p = g.create_node(NULL_ENTITY);
        let c = g.create_node(NULL_ENTITY);
        g.set_parent(c, p);
        g.set_parent(c, p);
        let prel = g.registry().get::<Relationship>(p).unwrap();
        // children list (firstChild..lastChild via siblings) still has exactly one entry
        assert_eq!(prel.first_child, c);
        assert_eq!(prel.last_child, c);
        let crel = g.registry().get::<Relationship>(c).unwrap();
        assert_eq!(crel.next_sibling, NULL_ENTITY);
        assert_eq!(crel.prev_sibling, NULL_ENTITY);
    }

    #[test]
    fn topo_order_lists_each_entity_once_parent_before_child() {
        let mut g = SceneGraph::new();
        let a = g.create_node(NULL_ENTITY);
        let b = g.create_node(a);
        let c = g.create_node(b);
        g.on_hierarchy_changed();
        let topo = g.topo_order().to_vec();
        assert_eq!(topo.len(), 3);
        let pos = |e: Entity| topo.iter().position(|&x| x == e).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn dirty_propagation_chain() {
        let mut g = SceneGraph::new();
        let a = g.create_node(NULL_ENTITY);
        let b = g.create_node(a);
        let c = g.create_node(b);
        g.update_transforms(); // consume initial full-hierarchy-dirty pass

        g.registry_mut().get_mut::<LocalTransform>(a).unwrap().matrix =
            glam::Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        g.mark_as_changed(a);
        g.update_transforms();

        for e in [a, b, c] {
            let world = g.registry().get::<WorldTransform>(e).unwrap().matrix;
            assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 0.0, 0.0));
        }
        assert!(g.registry().pool_for::<TransformDirtyTag>().is_empty());
    }

    #[test]
    fn set_visible_toggles_visibility_and_tag() {
        let mut g = SceneGraph::new();
        let e = g.create_node(NULL_ENTITY);

        g.set_visible(e, false);
        assert!(!g.registry().get::<Visibility>(e).unwrap().visible);
        assert!(!g.registry().has::<VisibleTag>(e));

        g.set_visible(e, true);
        assert!(g.registry().get::<Visibility>(e).unwrap().visible);
        assert!(g.registry().has::<VisibleTag>(e));
    }

    #[test]
    fn recompute_world_bounds_transforms_mesh_aabb_and_clears_tag() {
        let mut db = AssetDatabase::new();
        let mesh_id = db.append_primitive_mesh_data(
            &[
                Vertex { position: Vec3::new(-1.0, -1.0, -1.0), ..Vertex::default() },
                Vertex { position: Vec3::new(1.0, 1.0, 1.0), ..Vertex::default() },
            ],
            &[0, 1],
            0,
            "unit_cube",
        );

        let mut g = SceneGraph::new();
        let e = g.create_node(NULL_ENTITY);
        g.registry_mut().emplace(e, MeshRenderer::new(mesh_id as i32));
        g.registry_mut().emplace(e, WorldBounds::default());
        g.registry_mut().get_mut::<LocalTransform>(e).unwrap().matrix =
            glam::Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        g.update_transforms();
        g.mark_as_changed(e);

        g.recompute_world_bounds(&db);

        let wb = g.registry().get::<WorldBounds>(e).unwrap();
        assert_eq!(wb.min, Vec3::new(4.0, -1.0, -1.0));
        assert_eq!(wb.max, Vec3::new(6.0, 1.0, 1.0));
        assert!(g.registry().pool_for::<BoundsDirtyTag>().is_empty());
    }

    #[test]
    fn recompute_world_bounds_skips_system_meshes() {
        let db = AssetDatabase::new();
        let mut g = SceneGraph::new();
        let e = g.create_node(NULL_ENTITY);
        g.registry_mut().emplace(e, MeshRenderer::new(-1));
        g.registry_mut().emplace(e, WorldBounds::default());
        g.mark_as_changed(e);

        g.recompute_world_bounds(&db); // must not panic on negative mesh_id
        assert!(g.registry().pool_for::<BoundsDirtyTag>().is_empty());
    }
}
