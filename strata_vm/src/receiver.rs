//! Receiver checks.
//!
//! A [`ReceiverCheck`] decides in O(1) (or O(depth) for explicit chain
//! walks) whether a cache entry applies to a receiver, and hands back the
//! object the entry operates on. A check distinguishes "does not match"
//! ([`CheckOutcome::Reject`]) from "can never match again"
//! ([`CheckOutcome::Invalidated`]); the latter evicts the entry.

use smallvec::SmallVec;
use std::any::TypeId;
use std::sync::{Arc, Weak};
use strata_core::assumption::AssumptionToken;
use strata_runtime::interop::host_class_of;
use strata_runtime::object::{JsObject, ObjectId, ObjectKind, ObjectRef, Shape};
use strata_runtime::Value;

// =============================================================================
// Class Guards
// =============================================================================

/// Receiver classes that are identified without a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassGuard {
    String,
    Number,
    Boolean,
    Symbol,
    /// A host object of one concrete Rust type.
    Host(TypeId),
    Proxy,
    Foreign,
}

impl ClassGuard {
    /// Classify a primitive receiver. Nullish values and objects have no
    /// primitive class.
    pub fn of_primitive(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(ClassGuard::String),
            Value::Int(_) | Value::Long(_) | Value::Double(_) => Some(ClassGuard::Number),
            Value::Boolean(_) => Some(ClassGuard::Boolean),
            Value::Symbol(_) => Some(ClassGuard::Symbol),
            Value::Undefined | Value::Null | Value::Object(_) => None,
        }
    }

    /// Classify an object whose behavior is not described by its shape.
    pub fn of_object(object: &JsObject) -> Option<Self> {
        match object.kind() {
            ObjectKind::Proxy(_) => Some(ClassGuard::Proxy),
            ObjectKind::Foreign(_) => Some(ClassGuard::Foreign),
            ObjectKind::Host(host) => Some(ClassGuard::Host(host_class_of(host.as_ref()))),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (ClassGuard::String, Value::String(_)) => true,
            (ClassGuard::Number, Value::Int(_) | Value::Long(_) | Value::Double(_)) => true,
            (ClassGuard::Boolean, Value::Boolean(_)) => true,
            (ClassGuard::Symbol, Value::Symbol(_)) => true,
            (guard, Value::Object(o)) => ClassGuard::of_object(o) == Some(guard),
            _ => false,
        }
    }
}

// =============================================================================
// Prototype Links
// =============================================================================

/// One prototype on a checked chain: the object, the shape it had when the
/// entry was installed, and a token on that shape's leaf assumption.
#[derive(Debug, Clone)]
pub struct ChainLink {
    object: ObjectRef,
    shape: Arc<Shape>,
    leaf: AssumptionToken,
}

impl ChainLink {
    /// Record `object` at its current shape.
    pub fn new(object: ObjectRef, shape: Arc<Shape>) -> Self {
        let leaf = AssumptionToken::capture(shape.leaf_assumption());
        Self {
            object,
            shape,
            leaf,
        }
    }

    /// The prototype object.
    #[inline]
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// The recorded shape.
    #[inline]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Whether the recorded shape can still have no outgoing transitions.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.shape.is_leaf()
    }

    fn assumption_holds(&self) -> bool {
        self.shape.is_valid() && self.leaf.holds()
    }

    fn walk_holds(&self) -> bool {
        self.shape.is_valid() && self.object.has_shape(&self.shape)
    }
}

/// Prototype links of one entry. Most chains are short.
pub type ChainLinks = SmallVec<[ChainLink; 4]>;

// =============================================================================
// Receiver Check
// =============================================================================

/// Result of applying a check to a receiver.
#[derive(Debug)]
pub enum CheckOutcome<'a> {
    /// The entry applies. Carries the object holding the property: the
    /// receiver, a prototype, or `None` for primitive receivers and absent
    /// properties.
    Accept(Option<&'a ObjectRef>),
    /// The entry does not apply to this receiver.
    Reject,
    /// The entry can never apply again and must be evicted.
    Invalidated,
}

/// Guard of a cache entry.
#[derive(Debug, Clone)]
pub enum ReceiverCheck {
    /// Receiver class, for receivers without a meaningful shape.
    Class(ClassGuard),
    /// Object receiver with this exact shape.
    Shape(Arc<Shape>),
    /// `base` plus prototype links trusted through their leaf assumptions.
    Assumption {
        base: Box<ReceiverCheck>,
        links: ChainLinks,
        holder: Option<ObjectRef>,
    },
    /// `base` plus prototype links whose shapes are compared on every check.
    PrototypeChain {
        base: Box<ReceiverCheck>,
        links: ChainLinks,
        holder: Option<ObjectRef>,
    },
    /// One specific object at one shape.
    Constant {
        id: ObjectId,
        object: Weak<JsObject>,
        shape: Arc<Shape>,
    },
}

impl ReceiverCheck {
    /// A shape check, or a constant check if `object` is pinned.
    pub fn for_object(object: &ObjectRef, shape: Arc<Shape>, constant: bool) -> Self {
        if constant {
            ReceiverCheck::Constant {
                id: object.id(),
                object: Arc::downgrade(object),
                shape,
            }
        } else {
            ReceiverCheck::Shape(shape)
        }
    }

    /// Extend `base` over prototype links.
    ///
    /// Leaf assumptions are used when enabled and every link is currently a
    /// leaf; otherwise each link's shape is compared explicitly.
    pub fn with_links(
        base: ReceiverCheck,
        links: ChainLinks,
        holder: Option<ObjectRef>,
        use_assumptions: bool,
    ) -> Self {
        if links.is_empty() && holder.is_none() {
            return base;
        }
        let base = Box::new(base);
        if use_assumptions && links.iter().all(ChainLink::is_leaf) {
            ReceiverCheck::Assumption {
                base,
                links,
                holder,
            }
        } else {
            ReceiverCheck::PrototypeChain {
                base,
                links,
                holder,
            }
        }
    }

    /// Apply the check.
    pub fn accept<'a>(&'a self, receiver: &'a Value) -> CheckOutcome<'a> {
        match self {
            ReceiverCheck::Class(guard) => {
                if guard.matches(receiver) {
                    CheckOutcome::Accept(receiver.as_object())
                } else {
                    CheckOutcome::Reject
                }
            }
            ReceiverCheck::Shape(shape) => {
                if !shape.is_valid() {
                    return CheckOutcome::Invalidated;
                }
                match receiver {
                    Value::Object(o) if o.has_shape(shape) => CheckOutcome::Accept(Some(o)),
                    _ => CheckOutcome::Reject,
                }
            }
            ReceiverCheck::Assumption {
                base,
                links,
                holder,
            } => Self::accept_chain(base, receiver, holder, || {
                links.iter().all(ChainLink::assumption_holds)
            }),
            ReceiverCheck::PrototypeChain {
                base,
                links,
                holder,
            } => Self::accept_chain(base, receiver, holder, || {
                links.iter().all(ChainLink::walk_holds)
            }),
            ReceiverCheck::Constant { id, object, shape } => {
                if !shape.is_valid() || object.strong_count() == 0 {
                    return CheckOutcome::Invalidated;
                }
                match receiver {
                    Value::Object(o) if o.id() == *id && o.has_shape(shape) => {
                        CheckOutcome::Accept(Some(o))
                    }
                    _ => CheckOutcome::Reject,
                }
            }
        }
    }

    fn accept_chain<'a>(
        base: &'a ReceiverCheck,
        receiver: &'a Value,
        holder: &'a Option<ObjectRef>,
        links_hold: impl FnOnce() -> bool,
    ) -> CheckOutcome<'a> {
        match base.accept(receiver) {
            CheckOutcome::Accept(_) => {
                // The receiver's shape fixes which objects are on the chain,
                // so a changed link never matches again.
                if links_hold() {
                    CheckOutcome::Accept(holder.as_ref())
                } else {
                    CheckOutcome::Invalidated
                }
            }
            other => other,
        }
    }

    /// Whether the check can no longer accept any receiver. Evaluated
    /// without a receiver.
    pub fn is_stale(&self) -> bool {
        match self {
            ReceiverCheck::Class(_) => false,
            ReceiverCheck::Shape(shape) => !shape.is_valid(),
            ReceiverCheck::Assumption { base, links, .. } => {
                base.is_stale() || !links.iter().all(ChainLink::assumption_holds)
            }
            ReceiverCheck::PrototypeChain { base, links, .. } => {
                base.is_stale() || !links.iter().all(ChainLink::walk_holds)
            }
            ReceiverCheck::Constant { object, shape, .. } => {
                !shape.is_valid() || object.strong_count() == 0
            }
        }
    }

    /// The receiver shape this check pins, if any.
    pub fn receiver_shape(&self) -> Option<&Arc<Shape>> {
        match self {
            ReceiverCheck::Shape(shape) | ReceiverCheck::Constant { shape, .. } => Some(shape),
            ReceiverCheck::Assumption { base, .. } | ReceiverCheck::PrototypeChain { base, .. } => {
                base.receiver_shape()
            }
            ReceiverCheck::Class(_) => None,
        }
    }

    /// Number of prototype links checked.
    pub fn depth(&self) -> usize {
        match self {
            ReceiverCheck::Assumption { links, .. } | ReceiverCheck::PrototypeChain { links, .. } => {
                links.len()
            }
            _ => 0,
        }
    }
}
