//! Resolution of a named property into a receiver check and a holder.
//!
//! Resolution walks the receiver's prototype chain once, migrating obsolete
//! shapes on the way, and records every prototype it passes as a
//! [`ChainLink`]. The resulting check pins the receiver's layout and the
//! layout of each link, so the entry stays correct as long as the check
//! accepts.
//!
//! Chains that cannot be pinned (dictionary-mode prototypes, proxies and
//! foreign objects past the receiver, virtual `length` on a prototype, chains
//! deeper than `max_prototype_depth`) resolve to [`Resolution::Slow`]: the
//! receiver is still classified, but the access runs the generic lookup.

use crate::receiver::{ChainLink, ChainLinks, ClassGuard, ReceiverCheck};
use std::sync::Arc;
use strata_runtime::key::names;
use strata_runtime::object::{ObjectKind, ObjectRef, Property, Shape};
use strata_runtime::{PropertyKey, Realm, Value};

/// Where a named property lives for one class of receivers.
pub(crate) enum Resolution {
    /// On the receiver itself.
    Own {
        check: ReceiverCheck,
        shape: Arc<Shape>,
        property: Property,
        /// The receiver is one specific object.
        pinned: bool,
    },
    /// On a prototype.
    Inherited {
        check: ReceiverCheck,
        holder: ObjectRef,
        shape: Arc<Shape>,
        property: Property,
    },
    /// Nowhere on the chain.
    Absent { check: ReceiverCheck },
    /// The receiver is classified but the lookup must stay generic.
    Slow { check: ReceiverCheck },
    /// No useful check exists for this receiver.
    Unguarded,
}

impl Resolution {
    /// Whether a value read from this resolution cannot be replaced without
    /// breaking the check.
    pub(crate) fn holder_is_fixed(&self) -> bool {
        match self {
            Resolution::Own { pinned, .. } => *pinned,
            Resolution::Inherited { .. } => true,
            _ => false,
        }
    }
}

/// Resolve `key` for `receiver`.
///
/// Proxy and foreign receivers are classified by the caller; here they are
/// [`Resolution::Unguarded`].
pub(crate) fn resolve(realm: &Realm, receiver: &Value, key: &PropertyKey) -> Resolution {
    if key.is_index() {
        return Resolution::Unguarded;
    }
    match receiver {
        Value::Undefined | Value::Null => Resolution::Unguarded,
        Value::Object(object) => resolve_object(realm, object, key),
        primitive => {
            let Some(guard) = ClassGuard::of_primitive(primitive) else {
                return Resolution::Unguarded;
            };
            let base = ReceiverCheck::Class(guard);
            if guard == ClassGuard::String && key == names::length() {
                return Resolution::Slow { check: base };
            }
            let start = realm.prototype_for_primitive(primitive).cloned();
            walk(realm, base, start, key)
        }
    }
}

fn resolve_object(realm: &Realm, object: &ObjectRef, key: &PropertyKey) -> Resolution {
    if matches!(object.kind(), ObjectKind::Proxy(_) | ObjectKind::Foreign(_)) {
        return Resolution::Unguarded;
    }
    let shape = object.ensure_current_shape(realm);
    let pinned = matches!(object.kind(), ObjectKind::Global);
    let base = ReceiverCheck::for_object(object, Arc::clone(&shape), pinned);
    if shape.is_dictionary() || (key == names::length() && shape.flavor().has_virtual_length()) {
        return Resolution::Slow { check: base };
    }
    if let Some(property) = shape.lookup(key).cloned() {
        return Resolution::Own {
            check: base,
            shape,
            property,
            pinned,
        };
    }
    walk(realm, base, shape.prototype().cloned(), key)
}

fn walk(realm: &Realm, base: ReceiverCheck, start: Option<ObjectRef>, key: &PropertyKey) -> Resolution {
    let config = realm.config();
    let mut links = ChainLinks::new();
    let mut current = start;
    while let Some(proto) = current {
        if links.len() >= config.max_prototype_depth
            || matches!(proto.kind(), ObjectKind::Proxy(_) | ObjectKind::Foreign(_))
        {
            return Resolution::Slow { check: base };
        }
        let shape = proto.ensure_current_shape(realm);
        if shape.is_dictionary() || (key == names::length() && shape.flavor().has_virtual_length()) {
            return Resolution::Slow { check: base };
        }
        links.push(ChainLink::new(Arc::clone(&proto), Arc::clone(&shape)));
        if let Some(property) = shape.lookup(key).cloned() {
            let check = ReceiverCheck::with_links(
                base,
                links,
                Some(Arc::clone(&proto)),
                config.prototype_assumptions,
            );
            return Resolution::Inherited {
                check,
                holder: proto,
                shape,
                property,
            };
        }
        current = shape.prototype().cloned();
    }
    Resolution::Absent {
        check: ReceiverCheck::with_links(base, links, None, config.prototype_assumptions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::CheckOutcome;
    use strata_core::RuntimeConfig;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    #[test]
    fn test_resolve_own() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap();
        let resolution = resolve(&realm, &Value::Object(obj), &key("x"));
        assert!(matches!(resolution, Resolution::Own { pinned: false, .. }));
    }

    #[test]
    fn test_resolve_inherited() {
        let realm = Realm::new();
        let proto = realm.new_object();
        proto.set_own_value(&key("m"), Value::Int(1), &realm).unwrap();
        let obj = realm.new_object_with_proto(Some(&proto));
        let recv = Value::Object(obj);
        match resolve(&realm, &recv, &key("m")) {
            Resolution::Inherited { check, holder, .. } => {
                assert_eq!(holder.id(), proto.id());
                assert_eq!(check.depth(), 1);
                assert!(matches!(check.accept(&recv), CheckOutcome::Accept(Some(_))));
            }
            _ => panic!("expected inherited"),
        }
    }

    #[test]
    fn test_resolve_absent_links_whole_chain() {
        let realm = Realm::new();
        let obj = realm.new_object();
        match resolve(&realm, &Value::Object(obj), &key("missing")) {
            // object -> Object.prototype
            Resolution::Absent { check } => assert_eq!(check.depth(), 1),
            _ => panic!("expected absent"),
        }
    }

    #[test]
    fn test_resolve_dictionary_prototype_is_slow() {
        let realm = Realm::new();
        let proto = realm.new_dictionary_object(Some(realm.object_prototype()));
        let obj = realm.new_object_with_proto(Some(&proto));
        let resolution = resolve(&realm, &Value::Object(obj), &key("m"));
        assert!(matches!(resolution, Resolution::Slow { .. }));
    }

    #[test]
    fn test_resolve_depth_limit() {
        let config = RuntimeConfig {
            max_prototype_depth: 2,
            ..Default::default()
        };
        let realm = Realm::with_config(config).unwrap();
        let a = realm.new_object();
        let b = realm.new_object_with_proto(Some(&a));
        let c = realm.new_object_with_proto(Some(&b));
        let resolution = resolve(&realm, &Value::Object(c), &key("m"));
        assert!(matches!(resolution, Resolution::Slow { .. }));
    }

    #[test]
    fn test_resolve_primitive_through_intrinsics() {
        let realm = Realm::new();
        realm
            .intrinsics()
            .number_prototype
            .set_own_value(&key("twice"), Value::Int(2), &realm)
            .unwrap();
        let resolution = resolve(&realm, &Value::Int(5), &key("twice"));
        assert!(matches!(resolution, Resolution::Inherited { .. }));
        assert!(resolution.holder_is_fixed());
    }

    #[test]
    fn test_resolve_global_is_pinned() {
        let realm = Realm::new();
        let global = realm.global().clone();
        global.set_own_value(&key("g"), Value::Int(1), &realm).unwrap();
        let resolution = resolve(&realm, &Value::Object(global), &key("g"));
        assert!(matches!(resolution, Resolution::Own { pinned: true, .. }));
    }

    #[test]
    fn test_resolve_index_key_unguarded() {
        let realm = Realm::new();
        let resolution = resolve(&realm, &Value::Object(realm.new_object()), &PropertyKey::Index(0));
        assert!(matches!(resolution, Resolution::Unguarded));
    }
}
