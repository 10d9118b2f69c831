//! Multi-component views: iterate the smallest matching pool, filtering by
//! membership in every other pool (spec §4.1 `view<T1,…,Tk>()`).

use super::registry::Registry;
use super::Entity;

/// A lazy view over entities that have every component type in `Tup`.
///
/// Iteration walks the physical `packed` array of whichever queried pool is
/// currently smallest, filtering out entities missing from the others. This
/// is fast but **not stable** across insert/remove, per spec §3.
pub struct View<'a, Tup> {
    registry: &'a Registry,
    _marker: std::marker::PhantomData<Tup>,
}

impl<'a, Tup: ViewTuple<'a>> View<'a, Tup> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, Tup::Refs)> + 'a {
        let registry = self.registry;
        let smallest = Tup::smallest_entities(registry);
        smallest.into_iter().filter_map(move |e| Tup::fetch(registry, e).map(|refs| (e, refs)))
    }

    pub fn each(&self, mut f: impl FnMut(Entity, Tup::Refs)) {
        for (e, refs) in self.iter() {
            f(e, refs);
        }
    }
}

/// Implemented for tuples of component types usable in a [`View`].
pub trait ViewTuple<'a> {
    type Refs;

    fn smallest_entities(registry: &'a Registry) -> Vec<Entity>;
    fn fetch(registry: &'a Registry, e: Entity) -> Option<Self::Refs>;
}

macro_rules! impl_view_tuple {
    ($($t:ident),+) => {
        impl<'a, $($t: 'static),+> ViewTuple<'a> for ($($t,)+) {
            type Refs = ($(&'a $t,)+);

            fn smallest_entities(registry: &'a Registry) -> Vec<Entity> {
                let mut candidates: Vec<&[Entity]> = Vec::new();
                $(
                    if let Some(pool) = registry.pool_dyn::<$t>() {
                        candidates.push(pool.entities());
                    } else {
                        return Vec::new();
                    }
                )+
                candidates.into_iter().min_by_key(|c| c.len()).map(|c| c.to_vec()).unwrap_or_default()
            }

            fn fetch(registry: &'a Registry, e: Entity) -> Option<Self::Refs> {
                Some(($(registry.get::<$t>(e)?,)+))
            }
        }
    };
}

impl_view_tuple!(T1);
impl_view_tuple!(T1, T2);
impl_view_tuple!(T1, T2, T3);
impl_view_tuple!(T1, T2, T3, T4);
impl_view_tuple!(T1, T2, T3, T4, T5);

#[cfg(test)]
mod tests {
    use super::super::Registry;

    #[derive(Debug, PartialEq, Clone, Copy)]
    struct A(u32);
    #[derive(Debug, PartialEq, Clone, Copy)]
    struct B(u32);

    #[test]
    fn view_filters_to_intersection() {
        let mut reg = Registry::new();
        let a = reg.create();
        let b = reg.create();
        let c = reg.create();
        reg.emplace(a, A(1));
        reg.emplace(b, A(2));
        reg.emplace(c, A(3));
        reg.emplace(b, B(20));

        let mut seen = Vec::new();
        reg.view2::<A, B>().each(|e, (av, bv)| seen.push((e, av.0, bv.0)));
        assert_eq!(seen, vec![(b, 2, 20)]);
    }

    #[test]
    fn view_empty_when_one_pool_empty() {
        let mut reg = Registry::new();
        let a = reg.create();
        reg.emplace(a, A(1));
        let seen: Vec<_> = reg.view2::<A, B>().iter().collect();
        assert!(seen.is_empty());
    }

    #[test]
    fn view_iterates_smallest_pool_physical_order() {
        let mut reg = Registry::new();
        for i in 0..5u32 {
            let e = reg.create();
            reg.emplace(e, A(i));
            if i % 2 == 0 {
                reg.emplace(e, B(i * 100));
            }
        }
        let count = reg.view2::<A, B>().iter().count();
        assert_eq!(count, 3);
    }
}
