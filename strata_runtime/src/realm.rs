//! Realms.
//!
//! A realm bundles everything property access needs that is not per-object:
//! the configuration, the shape registry, the intrinsic prototypes, the
//! global object, realm-wide assumptions and the external collaborators
//! (coercion, iteration, host member resolution).

use crate::array::{ElementStore, TypedArrayView, TypedKind};
use crate::coercion::{ArrayLikeIteration, StandardCoercion};
use crate::error::RuntimeResult;
use crate::interop::{
    Callable, Coercion, ForeignObject, HostMemberResolver, HostObject, IterationProtocol,
    NativeFunction, ProxyHandler,
};
use crate::object::{JsObject, ObjectKind, ObjectRef, ShapeFlavor, ShapeRegistry};
use crate::value::{JsString, Value};
use std::sync::Arc;
use strata_core::assumption::Assumption;
use strata_core::config::{ConfigError, RuntimeConfig};
use tracing::debug;

// =============================================================================
// Intrinsics
// =============================================================================

/// Built-in prototype objects.
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub symbol_prototype: ObjectRef,
    pub typed_array_prototype: ObjectRef,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Realm`].
#[derive(Default)]
pub struct RealmBuilder {
    config: RuntimeConfig,
    coercion: Option<Arc<dyn Coercion>>,
    iteration: Option<Arc<dyn IterationProtocol>>,
    host_resolver: Option<Arc<dyn HostMemberResolver>>,
}

impl RealmBuilder {
    /// Use this configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard coercions.
    pub fn coercion(mut self, coercion: Arc<dyn Coercion>) -> Self {
        self.coercion = Some(coercion);
        self
    }

    /// Replace the standard iteration protocol.
    pub fn iteration(mut self, iteration: Arc<dyn IterationProtocol>) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Install a host member resolver.
    pub fn host_resolver(mut self, resolver: Arc<dyn HostMemberResolver>) -> Self {
        self.host_resolver = Some(resolver);
        self
    }

    /// Validate the configuration and build the realm.
    pub fn build(self) -> Result<Realm, ConfigError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Realm {
        let shapes = ShapeRegistry::new(&self.config);
        let no_prototype_elements = Assumption::shared("no-prototype-elements");

        let object_prototype = JsObject::create(
            ObjectKind::Ordinary,
            shapes.initial(ShapeFlavor::Ordinary, None),
            ElementStore::default(),
        );
        let derived = |kind: ObjectKind| {
            let shape = shapes.initial(kind.flavor(), Some(&object_prototype));
            JsObject::create(kind, shape, ElementStore::default())
        };
        let intrinsics = Intrinsics {
            function_prototype: derived(ObjectKind::Ordinary),
            array_prototype: derived(ObjectKind::Array),
            string_prototype: derived(ObjectKind::Ordinary),
            number_prototype: derived(ObjectKind::Ordinary),
            boolean_prototype: derived(ObjectKind::Ordinary),
            symbol_prototype: derived(ObjectKind::Ordinary),
            typed_array_prototype: derived(ObjectKind::Ordinary),
            object_prototype: Arc::clone(&object_prototype),
        };
        let global = derived(ObjectKind::Global);

        let realm = Realm {
            config: self.config,
            shapes,
            intrinsics,
            global,
            no_prototype_elements,
            coercion: self.coercion.unwrap_or_else(|| Arc::new(StandardCoercion)),
            iteration: self.iteration.unwrap_or_else(|| Arc::new(ArrayLikeIteration)),
            host_resolver: self.host_resolver,
        };
        for proto in realm.intrinsic_prototypes() {
            proto.mark_as_prototype(&realm);
        }
        debug!(shapes = realm.shapes.stats().total_shapes, "realm created");
        realm
    }
}

// =============================================================================
// Realm
// =============================================================================

/// Execution context for property access.
pub struct Realm {
    config: RuntimeConfig,
    shapes: ShapeRegistry,
    intrinsics: Intrinsics,
    global: ObjectRef,
    no_prototype_elements: Arc<Assumption>,
    coercion: Arc<dyn Coercion>,
    iteration: Arc<dyn IterationProtocol>,
    host_resolver: Option<Arc<dyn HostMemberResolver>>,
}

impl Realm {
    /// Create a realm with the default configuration.
    pub fn new() -> Self {
        RealmBuilder::default().assemble()
    }

    /// Start building a realm.
    pub fn builder() -> RealmBuilder {
        RealmBuilder::default()
    }

    /// Create a realm with `config`.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    #[inline]
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    #[inline]
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    #[inline]
    pub fn object_prototype(&self) -> &ObjectRef {
        &self.intrinsics.object_prototype
    }

    #[inline]
    pub fn array_prototype(&self) -> &ObjectRef {
        &self.intrinsics.array_prototype
    }

    /// Valid while no object used as a prototype has elements.
    #[inline]
    pub fn no_prototype_elements(&self) -> &Arc<Assumption> {
        &self.no_prototype_elements
    }

    #[inline]
    pub fn coercion(&self) -> &dyn Coercion {
        self.coercion.as_ref()
    }

    #[inline]
    pub fn iteration(&self) -> &dyn IterationProtocol {
        self.iteration.as_ref()
    }

    #[inline]
    pub fn host_resolver(&self) -> Option<&dyn HostMemberResolver> {
        self.host_resolver.as_deref()
    }

    /// The prototype primitive values delegate to. `None` for nullish
    /// values and objects.
    pub fn prototype_for_primitive(&self, value: &Value) -> Option<&ObjectRef> {
        let i = &self.intrinsics;
        match value {
            Value::Boolean(_) => Some(&i.boolean_prototype),
            Value::Int(_) | Value::Long(_) | Value::Double(_) => Some(&i.number_prototype),
            Value::String(_) => Some(&i.string_prototype),
            Value::Symbol(_) => Some(&i.symbol_prototype),
            Value::Undefined | Value::Null | Value::Object(_) => None,
        }
    }

    fn intrinsic_prototypes(&self) -> [&ObjectRef; 8] {
        let i = &self.intrinsics;
        [
            &i.object_prototype,
            &i.function_prototype,
            &i.array_prototype,
            &i.string_prototype,
            &i.number_prototype,
            &i.boolean_prototype,
            &i.symbol_prototype,
            &i.typed_array_prototype,
        ]
    }

    // -------------------------------------------------------------------------
    // Object creation
    // -------------------------------------------------------------------------

    fn create(&self, kind: ObjectKind, proto: Option<&ObjectRef>, elements: ElementStore) -> ObjectRef {
        let shape = self.shapes.initial(kind.flavor(), proto);
        let object = JsObject::create(kind, shape, elements);
        if let Some(proto) = proto {
            proto.mark_as_prototype(self);
        }
        object
    }

    /// A plain object inheriting from `Object.prototype`.
    pub fn new_object(&self) -> ObjectRef {
        self.create(ObjectKind::Ordinary, Some(&self.intrinsics.object_prototype), ElementStore::default())
    }

    /// A plain object with an explicit prototype.
    pub fn new_object_with_proto(&self, proto: Option<&ObjectRef>) -> ObjectRef {
        self.create(ObjectKind::Ordinary, proto, ElementStore::default())
    }

    /// A plain object that starts in dictionary mode.
    pub fn new_dictionary_object(&self, proto: Option<&ObjectRef>) -> ObjectRef {
        let shape = self.shapes.initial_dictionary(ShapeFlavor::Ordinary, proto);
        let object = JsObject::create(ObjectKind::Ordinary, shape, ElementStore::default());
        if let Some(proto) = proto {
            proto.mark_as_prototype(self);
        }
        object
    }

    /// An array holding `values` in the narrowest writable representation.
    pub fn new_array(&self, values: Vec<Value>) -> ObjectRef {
        self.new_array_from_store(ElementStore::packed(values))
    }

    /// An array over an existing element store.
    pub fn new_array_from_store(&self, elements: ElementStore) -> ObjectRef {
        self.create(ObjectKind::Array, Some(&self.intrinsics.array_prototype), elements)
    }

    /// A function object. Constructors get a lazily created `prototype`.
    pub fn new_function(&self, callable: Arc<dyn Callable>, constructor: bool) -> ObjectRef {
        let function = self.create(
            ObjectKind::function(callable, constructor),
            Some(&self.intrinsics.function_prototype),
            ElementStore::default(),
        );
        if constructor {
            function.init_lazy_prototype(self);
        }
        function
    }

    /// A function object backed by a Rust closure.
    pub fn new_native_function<F>(&self, constructor: bool, f: F) -> ObjectRef
    where
        F: Fn(&Realm, &Value, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.new_function(Arc::new(NativeFunction(f)), constructor)
    }

    /// A typed array over a fresh zeroed buffer.
    pub fn new_typed_array(&self, kind: TypedKind, length: u32) -> ObjectRef {
        self.new_typed_array_view(TypedArrayView::with_length(kind, length))
    }

    /// A typed array over an existing view.
    pub fn new_typed_array_view(&self, view: TypedArrayView) -> ObjectRef {
        self.create(
            ObjectKind::TypedArray,
            Some(&self.intrinsics.typed_array_prototype),
            ElementStore::typed(view),
        )
    }

    /// A proxy. Proxies have no prototype of their own.
    pub fn new_proxy(&self, target: ObjectRef, handler: Arc<dyn ProxyHandler>) -> ObjectRef {
        self.create(ObjectKind::proxy(target, handler), None, ElementStore::default())
    }

    /// A wrapper around a foreign object.
    pub fn new_foreign(&self, foreign: Arc<dyn ForeignObject>) -> ObjectRef {
        self.create(ObjectKind::Foreign(foreign), None, ElementStore::default())
    }

    /// A wrapper around a host object.
    pub fn new_host(&self, host: Arc<dyn HostObject>) -> ObjectRef {
        self.create(ObjectKind::Host(host), Some(&self.intrinsics.object_prototype), ElementStore::default())
    }

    /// A `String` wrapper object whose elements are the code units.
    pub fn new_string_wrapper(&self, text: &JsString) -> ObjectRef {
        let units: Vec<Value> = (0..text.len())
            .filter_map(|i| text.code_unit_at(i))
            .map(Value::String)
            .collect();
        self.create(
            ObjectKind::Ordinary,
            Some(&self.intrinsics.string_prototype),
            ElementStore::constant(&units),
        )
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}
