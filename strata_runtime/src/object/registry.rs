//! Shape creation, transition memoization and obsoletion.
//!
//! The registry owns one root shape per flavor and derives every other shape
//! through memoized transitions. Transition tables are per-shape `RwLock`s:
//! readers take the read lock; a creator re-checks under the write lock, so a
//! losing racer adopts the winner's shape instead of publishing a duplicate.
//!
//! # Generalization
//!
//! When a value does not fit a typed location the property must move to a
//! wider kind. With `obsolete_on_generalize` (the default) the shape that
//! introduced the property is obsoleted together with its whole subtree, and
//! the introducing edge gets a successor with the wider kind. Every object
//! whose shape is in that subtree migrates the next time it is touched by
//! replaying its property list from its initial shape, following successors.
//! All such objects therefore converge on a single new subtree instead of
//! splitting the population between an `Int` and a `Double` layout.

use super::location::{Location, LocationKind};
use super::shape::{Property, PropertyFlags, PropertyTable, Shape, ShapeFlags, ShapeFlavor, ShapeId, Transition};
use super::ObjectRef;
use crate::key::PropertyKey;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use strata_core::config::RuntimeConfig;
use tracing::{debug, trace};

/// Global counter for shape IDs, so IDs are unique across registries.
static NEXT_SHAPE_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> ShapeId {
    ShapeId(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
}

// =============================================================================
// Shape Registry
// =============================================================================

/// Registry for shape management.
///
/// Thread-safe; shared by every object of a realm.
pub struct ShapeRegistry {
    roots: [Arc<Shape>; ShapeFlavor::COUNT],
    obsolete_on_generalize: bool,
    /// Serializes generalization so two threads cannot obsolete the same
    /// subtree with different successors.
    generalize_lock: Mutex<()>,
    created: AtomicU64,
    obsoleted: AtomicU64,
    dictionaries: AtomicU64,
    memo_hits: AtomicU64,
}

impl ShapeRegistry {
    /// Create a registry honoring the shape-related configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        let roots = ShapeFlavor::ALL.map(|flavor| Arc::new(Shape::root(next_id(), flavor)));
        Self {
            roots,
            obsolete_on_generalize: config.obsolete_on_generalize,
            generalize_lock: Mutex::new(()),
            created: AtomicU64::new(ShapeFlavor::COUNT as u64),
            obsoleted: AtomicU64::new(0),
            dictionaries: AtomicU64::new(0),
            memo_hits: AtomicU64::new(0),
        }
    }

    /// The empty root shape of a flavor (no prototype).
    #[inline]
    pub fn root(&self, flavor: ShapeFlavor) -> Arc<Shape> {
        Arc::clone(&self.roots[flavor as usize])
    }

    /// The empty shape of a flavor with the given prototype.
    pub fn initial(&self, flavor: ShapeFlavor, prototype: Option<&ObjectRef>) -> Arc<Shape> {
        let root = self.root(flavor);
        match prototype {
            Some(proto) => self.set_prototype(&root, Some(proto)),
            None => root,
        }
    }

    /// The empty dictionary-mode shape of a flavor with the given prototype.
    pub fn initial_dictionary(
        &self,
        flavor: ShapeFlavor,
        prototype: Option<&ObjectRef>,
    ) -> Arc<Shape> {
        self.to_dictionary(&self.initial(flavor, prototype))
    }

    // -------------------------------------------------------------------------
    // Memoized transitions
    // -------------------------------------------------------------------------

    /// Follow or create the edge `transition` from `from`.
    ///
    /// `build` computes the new shape's layout from a child skeleton; it runs
    /// at most once per edge. An edge whose target was obsoleted resolves to
    /// the target's newest successor.
    fn transition_with(
        &self,
        from: &Arc<Shape>,
        transition: Transition,
        build: impl FnOnce(&mut Shape),
    ) -> Arc<Shape> {
        if let Some(existing) = from.transitions.read().get(&transition) {
            if let Some(target) = live_target(existing) {
                self.memo_hits.fetch_add(1, Ordering::Relaxed);
                return target;
            }
        }

        let mut table = from.transitions.write();
        if let Entry::Occupied(entry) = table.entry(transition.clone()) {
            if let Some(target) = live_target(entry.get()) {
                self.memo_hits.fetch_add(1, Ordering::Relaxed);
                return target;
            }
        }

        let mut shape = Shape::child(next_id(), from, transition.clone());
        build(&mut shape);
        let shape = Arc::new(shape);

        // Checks relying on `from` being a leaf must fail before any object
        // can observe the new shape.
        from.leaf.invalidate();
        table.insert(transition, Arc::clone(&shape));
        self.created.fetch_add(1, Ordering::Relaxed);
        trace!(from = from.id.0, to = shape.id.0, edge = ?shape.transition, "shape created");
        shape
    }

    /// Append a property.
    pub fn add_property(
        &self,
        from: &Arc<Shape>,
        key: PropertyKey,
        flags: PropertyFlags,
        kind: LocationKind,
    ) -> Arc<Shape> {
        debug_assert!(!key.is_index(), "indexed keys live in the element store");
        debug_assert!(!from.is_dictionary(), "dictionary objects do not add to shapes");
        let kind = if flags.is_data() { kind } else { LocationKind::Object };
        let transition = Transition::AddProperty {
            key: key.clone(),
            flags,
            kind,
        };
        self.transition_with(from, transition, |shape| {
            let location = allocate(shape, kind);
            shape.table = Arc::new(from.table.with_appended(Property::new(key, location, flags)));
        })
    }

    /// Remove a property. Other locations are unchanged; the removed slot
    /// is simply no longer referenced.
    pub fn remove_property(&self, from: &Arc<Shape>, key: &PropertyKey) -> Arc<Shape> {
        if from.lookup(key).is_none() {
            return Arc::clone(from);
        }
        let transition = Transition::RemoveProperty { key: key.clone() };
        self.transition_with(from, transition, |shape| {
            shape.table = Arc::new(from.table.without(key));
        })
    }

    /// Change a property's attributes without moving it.
    ///
    /// Data/accessor changes are not reconfigurations; callers remove and
    /// re-add the property instead.
    pub fn reconfigure(
        &self,
        from: &Arc<Shape>,
        key: &PropertyKey,
        flags: PropertyFlags,
    ) -> Arc<Shape> {
        let Some(existing) = from.lookup(key) else {
            return Arc::clone(from);
        };
        if existing.flags() == flags {
            return Arc::clone(from);
        }
        debug_assert_eq!(existing.is_data(), flags.is_data());
        let replacement = existing.reconfigured(flags);
        let transition = Transition::Reconfigure {
            key: key.clone(),
            flags,
        };
        self.transition_with(from, transition, |shape| {
            shape.table = Arc::new(from.table.with_replaced(key, replacement));
        })
    }

    /// Change the prototype.
    pub fn set_prototype(&self, from: &Arc<Shape>, proto: Option<&ObjectRef>) -> Arc<Shape> {
        let current = from.prototype.as_ref().map(|p| p.id());
        let target = proto.map(|p| p.id());
        if current == target {
            return Arc::clone(from);
        }
        let transition = Transition::SetPrototype {
            proto: target.map(|id| id.raw()),
        };
        self.transition_with(from, transition, |shape| {
            shape.prototype = proto.cloned();
        })
    }

    /// Forbid further property additions.
    pub fn prevent_extensions(&self, from: &Arc<Shape>) -> Arc<Shape> {
        if !from.is_extensible() {
            return Arc::clone(from);
        }
        self.transition_with(from, Transition::PreventExtensions, |shape| {
            shape.flags |= ShapeFlags::NOT_EXTENSIBLE;
        })
    }

    /// Switch to dictionary mode. The resulting shape carries no properties;
    /// the object keeps them in its own map.
    pub fn to_dictionary(&self, from: &Arc<Shape>) -> Arc<Shape> {
        if from.is_dictionary() {
            return Arc::clone(from);
        }
        self.transition_with(from, Transition::ToDictionary, |shape| {
            shape.flags |= ShapeFlags::DICTIONARY;
            shape.table = Arc::new(PropertyTable::default());
            shape.primitive_slots = 0;
            shape.object_slots = 0;
            self.dictionaries.fetch_add(1, Ordering::Relaxed);
        })
    }

    // -------------------------------------------------------------------------
    // Generalization / migration
    // -------------------------------------------------------------------------

    /// Widen the location of `key` to `kind`.
    ///
    /// Returns the shape the object must move to. The returned shape is
    /// always valid; `from` may have been obsoleted as a side effect.
    pub fn generalize(&self, from: &Arc<Shape>, key: &PropertyKey, kind: LocationKind) -> Arc<Shape> {
        let current = self.migrate(from);
        let Some(property) = current.lookup(key) else {
            return current;
        };
        let old_kind = property.location().kind();
        if old_kind.accepts_kind(kind) || current.is_dictionary() {
            return current;
        }
        let target_kind = old_kind.join(kind);

        if !self.obsolete_on_generalize {
            return self.generalize_in_place(&current, key, target_kind);
        }

        {
            let _guard = self.generalize_lock.lock();
            // Another thread may have obsoleted the subtree while we waited.
            if current.is_valid() {
                let introducing = current.ancestors().find(|s| {
                    matches!(&s.transition, Some(Transition::AddProperty { key: k, .. }) if k == key)
                });
                let Some(introducing) = introducing else {
                    return self.generalize_in_place(&current, key, target_kind);
                };
                let Some(Transition::AddProperty { flags, .. }) = introducing.transition.clone() else {
                    return self.generalize_in_place(&current, key, target_kind);
                };
                let Some(parent) = introducing.parent.clone() else {
                    return self.generalize_in_place(&current, key, target_kind);
                };
                let widened = self.add_property(&parent, key.clone(), flags, target_kind);
                self.obsolete_subtree(introducing, Some(widened));
            }
        }
        self.migrate(&current)
    }

    /// Non-obsoleting generalization through a memoized `Generalize` edge.
    /// The property gets a fresh slot in the wider area; the old slot is dead.
    fn generalize_in_place(
        &self,
        from: &Arc<Shape>,
        key: &PropertyKey,
        kind: LocationKind,
    ) -> Arc<Shape> {
        let Some(existing) = from.lookup(key).cloned() else {
            return Arc::clone(from);
        };
        let transition = Transition::Generalize {
            key: key.clone(),
            kind,
        };
        self.transition_with(from, transition, |shape| {
            let location = allocate(shape, kind);
            let replacement = Property::new(key.clone(), location, existing.flags());
            shape.table = Arc::new(from.table.with_replaced(key, replacement));
        })
    }

    /// Mark `shape` and every shape derived from it obsolete.
    fn obsolete_subtree(&self, shape: &Shape, successor: Option<Arc<Shape>>) {
        if let Some(successor) = successor {
            let _ = shape.successor.set(successor);
        }
        if !shape.valid.invalidate() {
            return;
        }
        shape.leaf.invalidate();
        self.obsoleted.fetch_add(1, Ordering::Relaxed);
        debug!(shape = shape.id.0, "shape obsoleted");

        let children: Vec<Arc<Shape>> = shape.transitions.read().values().cloned().collect();
        for child in children {
            self.obsolete_subtree(&child, None);
        }
    }

    /// The valid shape an object carrying `shape` must move to.
    ///
    /// Valid shapes map to themselves. Obsolete shapes are rebuilt by
    /// replaying their property list from the flavor/prototype initial
    /// shape; memoized edges lead through successors to the widened layout.
    pub fn migrate(&self, shape: &Arc<Shape>) -> Arc<Shape> {
        if shape.is_valid() {
            return Arc::clone(shape);
        }
        if let Some(successor) = shape.latest_successor() {
            return successor;
        }
        let mut current = self.initial(shape.flavor, shape.prototype.as_ref());
        for property in shape.properties() {
            let kind = property.location().kind();
            current = self.add_property(&current, property.key().clone(), property.flags(), kind);
            if let Some(replayed) = current.lookup(property.key()) {
                let replayed_kind = replayed.location().kind();
                if !replayed_kind.accepts_kind(kind) {
                    current = self.generalize(&current, property.key(), kind);
                }
            }
        }
        if !shape.is_extensible() {
            current = self.prevent_extensions(&current);
        }
        trace!(from = shape.id.0, to = current.id.0, "shape migrated");
        current
    }

    /// Get registry statistics.
    pub fn stats(&self) -> ShapeStats {
        ShapeStats {
            total_shapes: self.created.load(Ordering::Relaxed),
            obsolete_shapes: self.obsoleted.load(Ordering::Relaxed),
            dictionary_shapes: self.dictionaries.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
        }
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

/// Resolve a memoized edge target: itself if valid, otherwise its newest
/// successor. `None` means the edge must be rebuilt.
fn live_target(target: &Arc<Shape>) -> Option<Arc<Shape>> {
    if target.is_valid() {
        Some(Arc::clone(target))
    } else {
        target.latest_successor()
    }
}

/// Reserve the next slot of the right area in a shape under construction.
fn allocate(shape: &mut Shape, kind: LocationKind) -> Location {
    let counter = if kind.is_primitive() {
        &mut shape.primitive_slots
    } else {
        &mut shape.object_slots
    };
    let location = Location::new(kind, *counter);
    *counter += 1;
    location
}

/// Statistics about shape registry usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeStats {
    /// Total number of shapes created (including roots).
    pub total_shapes: u64,
    /// Shapes obsoleted by generalization.
    pub obsolete_shapes: u64,
    /// Dictionary-mode shapes created.
    pub dictionary_shapes: u64,
    /// Transition lookups answered by an existing edge.
    pub memo_hits: u64,
}

impl LocationKind {
    /// Check if every value `other` accepts is also accepted by `self`.
    pub fn accepts_kind(self, other: LocationKind) -> bool {
        self == other
            || self == LocationKind::Object
            || (other == LocationKind::Int
                && matches!(self, LocationKind::Double | LocationKind::Long))
    }

    /// The narrowest kind accepting everything either kind accepts.
    pub fn join(self, other: LocationKind) -> LocationKind {
        if self.accepts_kind(other) {
            self
        } else if other.accepts_kind(self) {
            other
        } else {
            LocationKind::Object
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    fn registry() -> ShapeRegistry {
        ShapeRegistry::default()
    }

    fn registry_without_obsoletion() -> ShapeRegistry {
        ShapeRegistry::new(&RuntimeConfig {
            obsolete_on_generalize: false,
            ..RuntimeConfig::default()
        })
    }

    // -------------------------------------------------------------------------
    // Transition Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_transition_caching() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let a = reg.add_property(&root, key("x"), PropertyFlags::default(), LocationKind::Int);
        let b = reg.add_property(&root, key("x"), PropertyFlags::default(), LocationKind::Int);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.stats().memo_hits, 1);
    }

    #[test]
    fn test_transition_keyed_by_kind_and_flags() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let int = reg.add_property(&root, key("x"), PropertyFlags::default(), LocationKind::Int);
        let obj = reg.add_property(&root, key("x"), PropertyFlags::default(), LocationKind::Object);
        let ro = reg.add_property(&root, key("x"), PropertyFlags::read_only(), LocationKind::Int);
        assert!(!Arc::ptr_eq(&int, &obj));
        assert!(!Arc::ptr_eq(&int, &ro));
        assert_eq!(root.transition_count(), 3);
    }

    #[test]
    fn test_mutation_order_gives_distinct_shapes() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let f = PropertyFlags::default();
        let xy = reg.add_property(&root, key("x"), f, LocationKind::Object);
        let xy = reg.add_property(&xy, key("y"), f, LocationKind::Object);
        let yx = reg.add_property(&root, key("y"), f, LocationKind::Object);
        let yx = reg.add_property(&yx, key("x"), f, LocationKind::Object);
        assert!(!Arc::ptr_eq(&xy, &yx));
        assert_eq!(xy.property_count(), yx.property_count());
    }

    #[test]
    fn test_slot_allocation_by_area() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let f = PropertyFlags::default();
        let s = reg.add_property(&root, key("a"), f, LocationKind::Int);
        let s = reg.add_property(&s, key("b"), f, LocationKind::Object);
        let s = reg.add_property(&s, key("c"), f, LocationKind::Double);
        assert_eq!(s.primitive_slots(), 2);
        assert_eq!(s.object_slots(), 1);
        assert_eq!(s.lookup(&key("c")).unwrap().location().index(), 1);
        assert_eq!(s.lookup(&key("b")).unwrap().location().index(), 0);
    }

    #[test]
    fn test_accessor_always_object_kind() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let s = reg.add_property(&root, key("g"), PropertyFlags::accessor(), LocationKind::Int);
        assert_eq!(s.lookup(&key("g")).unwrap().location().kind(), LocationKind::Object);
    }

    #[test]
    fn test_leaf_invalidated_on_first_edge() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let s = reg.add_property(&root, key("x"), PropertyFlags::default(), LocationKind::Int);
        assert!(s.is_leaf());
        let _ = reg.add_property(&s, key("y"), PropertyFlags::default(), LocationKind::Int);
        assert!(!s.is_leaf());
        assert!(!root.is_leaf());
    }

    // -------------------------------------------------------------------------
    // Remove / Reconfigure Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_remove_keeps_other_locations() {
        let reg = registry();
        let f = PropertyFlags::default();
        let s = reg.add_property(&reg.root(ShapeFlavor::Ordinary), key("a"), f, LocationKind::Object);
        let s = reg.add_property(&s, key("b"), f, LocationKind::Object);
        let s = reg.add_property(&s, key("c"), f, LocationKind::Object);
        let removed = reg.remove_property(&s, &key("b"));
        assert!(removed.lookup(&key("b")).is_none());
        assert_eq!(removed.lookup(&key("c")).unwrap().location(), s.lookup(&key("c")).unwrap().location());
        assert_eq!(removed.object_slots(), 3);
    }

    #[test]
    fn test_remove_then_readd_is_not_identity() {
        let reg = registry();
        let f = PropertyFlags::default();
        let base = reg.root(ShapeFlavor::Ordinary);
        let with_p = reg.add_property(&base, key("p"), f, LocationKind::Int);
        let without = reg.remove_property(&with_p, &key("p"));
        let readded = reg.add_property(&without, key("p"), f, LocationKind::Object);
        assert!(!Arc::ptr_eq(&with_p, &readded));
        assert!(!Arc::ptr_eq(&base, &without));
    }

    #[test]
    fn test_reconfigure_in_place() {
        let reg = registry();
        let s = reg.add_property(
            &reg.root(ShapeFlavor::Ordinary),
            key("k"),
            PropertyFlags::default(),
            LocationKind::Int,
        );
        let frozen = reg.reconfigure(&s, &key("k"), PropertyFlags::default().frozen());
        let before = s.lookup(&key("k")).unwrap();
        let after = frozen.lookup(&key("k")).unwrap();
        assert_eq!(before.location().index(), after.location().index());
        assert!(after.location().is_final());
        assert!(Arc::ptr_eq(&reg.reconfigure(&frozen, &key("k"), after.flags()), &frozen));
    }

    // -------------------------------------------------------------------------
    // Prototype / Extensibility / Dictionary Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_prevent_extensions_idempotent() {
        let reg = registry();
        let root = reg.root(ShapeFlavor::Ordinary);
        let sealed = reg.prevent_extensions(&root);
        assert!(!sealed.is_extensible());
        assert!(Arc::ptr_eq(&reg.prevent_extensions(&sealed), &sealed));
    }

    #[test]
    fn test_dictionary_shape() {
        let reg = registry();
        let f = PropertyFlags::default();
        let s = reg.add_property(&reg.root(ShapeFlavor::Ordinary), key("a"), f, LocationKind::Int);
        let dict = reg.to_dictionary(&s);
        assert!(dict.is_dictionary());
        assert_eq!(dict.property_count(), 0);
        assert_eq!(reg.stats().dictionary_shapes, 1);
        let ne = reg.prevent_extensions(&dict);
        assert!(ne.is_dictionary());
        assert!(!ne.is_extensible());
    }

    // -------------------------------------------------------------------------
    // Generalization Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_generalize_obsoletes_subtree() {
        let reg = registry();
        let f = PropertyFlags::default();
        let root = reg.root(ShapeFlavor::Ordinary);
        let sx = reg.add_property(&root, key("x"), f, LocationKind::Int);
        let sxy = reg.add_property(&sx, key("y"), f, LocationKind::Object);

        let widened = reg.generalize(&sxy, &key("x"), LocationKind::Double);
        assert!(!sx.is_valid());
        assert!(!sxy.is_valid());
        assert!(widened.is_valid());
        assert_eq!(widened.lookup(&key("x")).unwrap().location().kind(), LocationKind::Double);
        assert_eq!(widened.lookup(&key("y")).unwrap().location().kind(), LocationKind::Object);

        // Another object still on the old layout converges on the same shape.
        assert!(Arc::ptr_eq(&reg.migrate(&sxy), &widened));
        // A fresh object taking the Int edge lands on the widened layout.
        let fresh = reg.add_property(&root, key("x"), f, LocationKind::Int);
        assert_eq!(fresh.lookup(&key("x")).unwrap().location().kind(), LocationKind::Double);
        assert_eq!(reg.stats().obsolete_shapes, 2);
    }

    #[test]
    fn test_generalize_in_place_keeps_old_shape_valid() {
        let reg = registry_without_obsoletion();
        let f = PropertyFlags::default();
        let s = reg.add_property(&reg.root(ShapeFlavor::Ordinary), key("x"), f, LocationKind::Int);
        let g = reg.generalize(&s, &key("x"), LocationKind::Object);
        assert!(s.is_valid());
        assert_eq!(g.lookup(&key("x")).unwrap().location().kind(), LocationKind::Object);
        assert!(Arc::ptr_eq(&reg.generalize(&s, &key("x"), LocationKind::Object), &g));
    }

    #[test]
    fn test_generalize_noop_when_kind_fits() {
        let reg = registry();
        let f = PropertyFlags::default();
        let s = reg.add_property(&reg.root(ShapeFlavor::Ordinary), key("x"), f, LocationKind::Double);
        assert!(Arc::ptr_eq(&reg.generalize(&s, &key("x"), LocationKind::Int), &s));
        assert!(s.is_valid());
    }

    #[test]
    fn test_kind_join() {
        assert_eq!(LocationKind::Int.join(LocationKind::Double), LocationKind::Double);
        assert_eq!(LocationKind::Long.join(LocationKind::Int), LocationKind::Long);
        assert_eq!(LocationKind::Double.join(LocationKind::Long), LocationKind::Object);
        assert_eq!(LocationKind::Boolean.join(LocationKind::Int), LocationKind::Object);
    }

    // -------------------------------------------------------------------------
    // Thread Safety Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_concurrent_transitions_converge() {
        use std::thread;

        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    let root = reg.root(ShapeFlavor::Ordinary);
                    let s = reg.add_property(&root, key("a"), PropertyFlags::default(), LocationKind::Int);
                    reg.add_property(&s, key("b"), PropertyFlags::default(), LocationKind::Int)
                })
            })
            .collect();
        let shapes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &shapes[1..] {
            assert!(Arc::ptr_eq(s, &shapes[0]));
        }
    }
}
