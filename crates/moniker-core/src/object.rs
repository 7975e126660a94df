//! Resolvable objects and their capabilities.
//!
//! Every object a moniker resolves to implements [`Unknown`]: it declares
//! the closed set of interfaces it answers for and hands out typed views
//! for the capabilities the resolver drives (streams, item containers,
//! factories, stream persistence). Objects that cross a broker boundary
//! are only known by the interface ids they report, so narrowing is keyed
//! by [`InterfaceId`] while the views stay typed.
//!
//! [`ObjectRef`] is the owned reference. Dropping it releases the object;
//! [`ObjectRef::narrow`] consumes it, so an intermediate reference is
//! released exactly once on every path.

use std::fmt;
use std::sync::Arc;

use crate::error::{MonikerError, MonikerResult};
use crate::interface::InterfaceId;
use crate::stream::SharedStream;

/// Base capability of every resolvable object.
pub trait Unknown: Send + Sync {
    /// Interfaces this object answers for directly.
    fn interfaces(&self) -> Vec<InterfaceId>;

    /// Whether the object answers dynamic capability queries.
    fn supports_query(&self) -> bool {
        true
    }

    /// Hand out an aggregated object for an interface not listed in
    /// [`interfaces`](Self::interfaces).
    fn query_interface(&self, _interface: &InterfaceId) -> Option<ObjectRef> {
        None
    }

    fn stream(&self) -> Option<SharedStream> {
        None
    }

    fn item_container(&self) -> Option<&dyn ItemContainer> {
        None
    }

    fn generic_factory(&self) -> Option<&dyn GenericFactory> {
        None
    }

    fn persist_stream(&self) -> Option<&dyn PersistStream> {
        None
    }
}

/// Named child lookup.
pub trait ItemContainer: Send + Sync {
    /// Look up the child called `name`, creating it when `create_if_missing`
    /// is set and the container supports it.
    fn get_object_by_name(
        &self,
        name: &str,
        create_if_missing: bool,
    ) -> MonikerResult<Option<ObjectRef>>;
}

/// Object creation by interface.
pub trait GenericFactory: Send + Sync {
    fn create_object(&self, interface: &InterfaceId) -> MonikerResult<Option<ObjectRef>>;
}

/// Loads object state from a stream.
pub trait PersistStream: Send + Sync {
    fn load(&self, stream: SharedStream, content_type: &str) -> MonikerResult<()>;
}

/// Owned reference to a resolved object.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<dyn Unknown>,
}

impl ObjectRef {
    pub fn new(object: impl Unknown + 'static) -> Self {
        Self {
            inner: Arc::new(object),
        }
    }

    pub fn from_arc(object: Arc<dyn Unknown>) -> Self {
        Self { inner: object }
    }

    /// Whether the object answers for `interface` directly.
    pub fn is_a(&self, interface: &InterfaceId) -> bool {
        interface.as_str() == InterfaceId::UNKNOWN
            || self.inner.interfaces().iter().any(|i| i == interface)
    }

    /// Obtain a reference answering for `interface`, if the object has one.
    pub fn query_interface(&self, interface: &InterfaceId) -> Option<ObjectRef> {
        if self.is_a(interface) {
            return Some(self.clone());
        }
        if self.inner.supports_query() {
            return self.inner.query_interface(interface);
        }
        None
    }

    /// Consume this reference and return one answering for `interface`.
    pub fn narrow(self, interface: &InterfaceId) -> MonikerResult<ObjectRef> {
        self.query_interface(interface)
            .ok_or_else(|| MonikerError::interface_not_found(interface))
    }

    pub fn interfaces(&self) -> Vec<InterfaceId> {
        self.inner.interfaces()
    }

    pub fn supports_query(&self) -> bool {
        self.inner.supports_query()
    }

    pub fn stream(&self) -> Option<SharedStream> {
        self.inner.stream()
    }

    pub fn item_container(&self) -> Option<&dyn ItemContainer> {
        self.inner.item_container()
    }

    pub fn generic_factory(&self) -> Option<&dyn GenericFactory> {
        self.inner.generic_factory()
    }

    pub fn persist_stream(&self) -> Option<&dyn PersistStream> {
        self.inner.persist_stream()
    }

    /// Whether two references denote the same object.
    pub fn same_object(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live references to the object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("interfaces", &self.inner.interfaces())
            .finish()
    }
}

/// Shared tail of every resolve path: a missing object is an activation
/// failure, a present one is narrowed to the requested interface.
pub fn qi_return(object: Option<ObjectRef>, interface: &InterfaceId) -> MonikerResult<ObjectRef> {
    match object {
        Some(object) => object.narrow(interface),
        None => Err(MonikerError::general("failed to activate object")),
    }
}

/// Object exposing a single stream.
///
/// This is what a `cache:` moniker hands back, and the usual way to publish
/// a stream through an object broker.
#[derive(Debug, Clone)]
pub struct StreamObject {
    stream: SharedStream,
}

impl StreamObject {
    pub fn new(stream: SharedStream) -> Self {
        Self { stream }
    }

    pub fn into_ref(self) -> ObjectRef {
        ObjectRef::new(self)
    }
}

impl Unknown for StreamObject {
    fn interfaces(&self) -> Vec<InterfaceId> {
        vec![InterfaceId::unknown(), InterfaceId::stream()]
    }

    fn stream(&self) -> Option<SharedStream> {
        Some(self.stream.clone())
    }
}
