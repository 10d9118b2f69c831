//! The [`Registry`]: owns one [`SparseSet`] per component type, plus entity
//! allocation/recycling.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

use super::sparse_set::{ErasedPool, SparseSet};
use super::view::View;
use super::{Entity, NULL_ENTITY};
use crate::errors::{EngineError, Result};

/// Owns every component pool and the entity id allocator.
///
/// Component pools are keyed by `TypeId` rather than the C++ original's
/// process-wide atomic type-id counter (see `SPEC_FULL.md`'s "Open question"
/// resolution): this keeps two independently constructed registries free of
/// any shared global state while still giving O(1) pool lookup per type.
#[derive(Default)]
pub struct Registry {
    pools: FxHashMap<TypeId, Box<dyn ErasedPool>>,
    free_entities: Vec<Entity>,
    entity_counter: Entity,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity, recycling from the free list (LIFO) when
    /// possible.
    pub fn create(&mut self) -> Entity {
        if let Some(e) = self.free_entities.pop() {
            return e;
        }
        let e = self.entity_counter;
        self.entity_counter += 1;
        e
    }

    /// Removes every component of `e` from every pool and recycles its id.
    /// No-op if `e` was never created by this registry (best-effort: removes
    /// whatever components happen to be present).
    pub fn destroy(&mut self, e: Entity) {
        if e == NULL_ENTITY {
            return;
        }
        for pool in self.pools.values_mut() {
            pool.remove_erased(e);
        }
        self.free_entities.push(e);
    }

    fn pool<T: 'static>(&self) -> Option<&SparseSet<T>> {
        self.pools
            .get(&TypeId::of::<T>())
            .map(|p| p.as_any().downcast_ref::<SparseSet<T>>().expect("pool type mismatch"))
    }

    fn pool_mut<T: 'static>(&mut self) -> &mut SparseSet<T> {
        self.pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()))
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .expect("pool type mismatch")
    }

    pub fn emplace<T: 'static>(&mut self, e: Entity, value: T) -> &mut T {
        self.pool_mut::<T>().emplace(e, value)
    }

    pub fn remove<T: 'static>(&mut self, e: Entity) {
        if let Some(pool) = self.pools.get_mut(&TypeId::of::<T>()) {
            pool.remove_erased(e);
        }
    }

    pub fn has<T: 'static>(&self, e: Entity) -> bool {
        self.pool::<T>().is_some_and(|p| p.has(e))
    }

    pub fn get<T: 'static>(&self, e: Entity) -> Option<&T> {
        self.pool::<T>()?.get(e)
    }

    pub fn get_mut<T: 'static>(&mut self, e: Entity) -> Option<&mut T> {
        self.pool_mut::<T>().get_mut(e)
    }

    /// As [`Registry::get`] but fails with [`EngineError::MissingComponent`]
    /// instead of returning `None` (spec §4.1 `get<T>`).
    pub fn get_or_err<T: 'static>(&self, e: Entity) -> Result<&T> {
        self.get::<T>(e).ok_or(EngineError::MissingComponent {
            entity: e,
            component: std::any::type_name::<T>(),
        })
    }

    /// Returns the component pool for `T`, creating an empty one on first
    /// access (mirrors the C++ `getPool<T>()` pattern used by the scene
    /// graph to bulk-clear `TransformDirtyTag`).
    pub fn pool_for<T: 'static>(&mut self) -> &SparseSet<T> {
        self.pool_mut::<T>()
    }

    pub fn pool_for_mut<T: 'static>(&mut self) -> &mut SparseSet<T> {
        self.pool_mut::<T>()
    }

    pub fn view<T1: 'static>(&self) -> View<'_, (T1,)> {
        View::new(self)
    }

    pub fn view2<T1: 'static, T2: 'static>(&self) -> View<'_, (T1, T2)> {
        View::new(self)
    }

    pub fn view3<T1: 'static, T2: 'static, T3: 'static>(&self) -> View<'_, (T1, T2, T3)> {
        View::new(self)
    }

    pub fn view4<T1: 'static, T2: 'static, T3: 'static, T4: 'static>(&self) -> View<'_, (T1, T2, T3, T4)> {
        View::new(self)
    }

    pub fn view5<T1: 'static, T2: 'static, T3: 'static, T4: 'static, T5: 'static>(
        &self,
    ) -> View<'_, (T1, T2, T3, T4, T5)> {
        View::new(self)
    }

    /// Clears every pool and resets the id counter/free list.
    pub fn clear(&mut self) {
        for pool in self.pools.values_mut() {
            pool.clear();
        }
        self.free_entities.clear();
        self.entity_counter = 0;
    }

    pub(crate) fn pool_dyn<T: 'static>(&self) -> Option<&dyn ErasedPool> {
        self.pools.get(&TypeId::of::<T>()).map(|p| p.as_ref())
    }

    pub(crate) fn get_any<T: 'static>(&self, e: Entity) -> Option<&dyn Any> {
        self.pool::<T>()?.get(e).map(|v| v as &dyn Any)
    }
}
