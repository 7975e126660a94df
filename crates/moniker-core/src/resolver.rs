//! Moniker resolution.
//!
//! Resolving a moniker first resolves its parent for the capability the
//! node's own transform needs, then applies the transform:
//! - `!item` → parent `ItemContainer`, child lookup by name
//! - `IOR:` → broker lookup of the stringified reference
//! - `OAFIID:` → activation by implementation id (no parent)
//! - `new:` → parent `GenericFactory`, object creation
//! - `query:(..)` → activation by requirement query (no parent)
//! - `cache:` → parent `Stream`, wrapped in a [`StreamCache`]
//!
//! `Ok(None)` means the moniker does not apply to the request; an error from
//! any step aborts the whole resolve.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activation::{Activation, ActivationFlags};
use crate::broker::ObjectBroker;
use crate::cache::StreamCache;
use crate::config::{CacheConfig, ResolveOptions};
use crate::error::{MonikerError, MonikerResult};
use crate::extender::StreamExtender;
use crate::interface::InterfaceId;
use crate::moniker::{Moniker, MonikerChain, MonikerKind};
use crate::object::{qi_return, ObjectRef, StreamObject};
use crate::stream::SharedStream;

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Geometry of caches built for `cache:` monikers.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Fall back to the stream extender when a resolve yields nothing.
    #[serde(default = "default_extenders")]
    pub extenders: bool,
}

fn default_extenders() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            extenders: default_extenders(),
        }
    }
}

impl ResolverConfig {
    /// Create config from environment variables.
    ///
    /// Reads the cache variables of [`CacheConfig::from_env`] plus
    /// `MONIKER_EXTENDERS` (`0`, `false`, `no` or `off` disable extenders).
    pub fn from_env() -> Self {
        let extenders = std::env::var("MONIKER_EXTENDERS")
            .map(|v| {
                !matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "0" | "false" | "no" | "off"
                )
            })
            .unwrap_or_else(|_| default_extenders());

        Self {
            cache: CacheConfig::from_env(),
            extenders,
        }
    }

    /// Set cache geometry.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Disable the extender fallback.
    pub fn no_extenders(mut self) -> Self {
        self.extenders = false;
        self
    }
}

/// Resolves monikers against an object broker and an activation service.
pub struct MonikerResolver {
    broker: Arc<dyn ObjectBroker>,
    activation: Arc<dyn Activation>,
    extender: StreamExtender,
    config: ResolverConfig,
}

impl MonikerResolver {
    /// Create a resolver with default configuration.
    pub fn new(broker: Arc<dyn ObjectBroker>, activation: Arc<dyn Activation>) -> Self {
        Self::with_config(broker, activation, ResolverConfig::default())
    }

    /// Create a resolver with custom configuration.
    pub fn with_config(
        broker: Arc<dyn ObjectBroker>,
        activation: Arc<dyn Activation>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            broker,
            activation,
            extender: StreamExtender::new(),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub(crate) fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    /// Resolve `moniker` to an object answering for `interface`.
    pub fn resolve(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        debug!(
            kind = %moniker.kind(),
            name = moniker.name(),
            %interface,
            "resolving moniker"
        );

        match moniker.kind() {
            MonikerKind::Item => self.resolve_item(moniker, options, interface),
            MonikerKind::Ior => self.resolve_ior(moniker, interface),
            MonikerKind::Oaf => self.resolve_oaf(moniker, options, interface),
            MonikerKind::Cache => self.resolve_cache(moniker, options, interface),
            MonikerKind::New => self.resolve_new(moniker, options, interface),
            MonikerKind::Query => self.resolve_query(moniker, options, interface),
        }
    }

    /// Resolve, falling back to the stream extender when the moniker itself
    /// yields nothing for a non-stream request.
    pub fn resolve_with_extenders(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        if let Some(object) = self.resolve(moniker, options, interface)? {
            return Ok(Some(object));
        }

        if !self.config.extenders || interface.is_stream() {
            return Ok(None);
        }

        debug!(%interface, "trying stream extender");
        self.extender.resolve(self, moniker, options, interface)
    }

    /// Parse `name` and resolve it with default options.
    ///
    /// Unlike [`resolve`](Self::resolve), a chain that yields nothing is an
    /// error here.
    pub fn get_object(
        &self,
        name: &str,
        interface: impl Into<InterfaceId>,
    ) -> MonikerResult<ObjectRef> {
        let interface = interface.into();
        let chain = MonikerChain::parse(name)?;
        self.resolve_with_extenders(chain.leaf(), &ResolveOptions::default(), &interface)?
            .ok_or_else(|| MonikerError::interface_not_found(&interface))
    }

    /// Resolve the parent of `moniker` for `interface`.
    ///
    /// A node without a parent cannot produce the capability.
    fn resolve_parent(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        match moniker.parent()? {
            Some(parent) => self.resolve(&parent, options, interface),
            None => Err(MonikerError::interface_not_found(interface)),
        }
    }

    fn resolve_item(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        let container_id = InterfaceId::item_container();
        let Some(parent) = self.resolve_parent(moniker, options, &container_id)? else {
            return Ok(None);
        };
        let container = parent
            .item_container()
            .ok_or_else(|| MonikerError::interface_not_found(&container_id))?;

        let child = container.get_object_by_name(moniker.name(), true)?;
        qi_return(child, interface).map(Some)
    }

    fn resolve_ior(
        &self,
        moniker: &Moniker,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        if moniker.has_parent() {
            warn!(name = moniker.name(), "ignoring parent of IOR moniker");
        }

        let object = self
            .broker
            .string_to_object(moniker.name())?
            .ok_or_else(|| MonikerError::general("object reference denotes no object"))?;

        if object.is_a(interface) {
            return Ok(Some(object));
        }
        if object.supports_query() {
            return object.narrow(interface).map(Some);
        }
        Err(MonikerError::interface_not_found(interface))
    }

    fn resolve_oaf(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        reject_parent(moniker)?;

        let object = self
            .activation
            .activate_from_id(moniker.name(), ActivationFlags::empty(), options)
            .map_err(|e| match e {
                MonikerError::General { .. } => e,
                other => MonikerError::General {
                    message: format!("failed to activate {}: {other}", moniker.name()),
                },
            })?;

        qi_return(object, interface).map(Some)
    }

    fn resolve_new(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        let factory_id = InterfaceId::generic_factory();
        let Some(parent) = self.resolve_parent(moniker, options, &factory_id)? else {
            return Ok(None);
        };
        let factory = parent
            .generic_factory()
            .ok_or_else(|| MonikerError::interface_not_found(&factory_id))?;

        let object = factory.create_object(interface)?;
        qi_return(object, interface).map(Some)
    }

    fn resolve_query(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        reject_parent(moniker)?;

        let query = format!("{} AND repo_ids.has('{interface}')", moniker.name());
        let object = self
            .activation
            .activate(&query, &[], ActivationFlags::empty(), options)?;

        qi_return(object, interface).map(Some)
    }

    fn resolve_cache(
        &self,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        if !interface.is_stream() {
            return Ok(None);
        }

        let Some(parent) = self.resolve_parent(moniker, options, interface)? else {
            return Ok(None);
        };
        let stream = parent
            .stream()
            .ok_or_else(|| MonikerError::interface_not_found(interface))?;

        let cache = StreamCache::new(stream, &self.config.cache)?;
        debug!(
            page_size = cache.page_size(),
            lines = cache.line_count(),
            "wrapped parent stream in cache"
        );
        Ok(Some(StreamObject::new(SharedStream::new(cache)).into_ref()))
    }
}

impl std::fmt::Debug for MonikerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonikerResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Root-only kinds fail rather than ignore a parent.
fn reject_parent(moniker: &Moniker) -> MonikerResult<()> {
    if moniker.has_parent() && !moniker.kind().accepts_parent() {
        return Err(MonikerError::UnexpectedParent {
            kind: moniker.kind(),
        });
    }
    Ok(())
}
