//! Object references in string form.
//!
//! An `IOR:` moniker names an object by a serialized reference. Turning
//! that string back into a live object is the broker's job; the resolver
//! only sees the [`ObjectBroker`] trait.
//!
//! [`LocalBroker`] is an in-process broker: it keeps a table of published
//! objects keyed by UUID and renders references as `IOR:` followed by the
//! hex-encoded key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MonikerError, MonikerResult};
use crate::object::ObjectRef;

/// Prefix of a stringified object reference.
pub const IOR_PREFIX: &str = "IOR:";

/// Turns stringified references into objects.
pub trait ObjectBroker: Send + Sync {
    /// Resolve `reference` (without the `IOR:` prefix).
    ///
    /// `Ok(None)` means the reference is well formed but denotes no live
    /// object.
    fn string_to_object(&self, reference: &str) -> MonikerResult<Option<ObjectRef>>;
}

/// In-process object table.
#[derive(Debug, Clone, Default)]
pub struct LocalBroker {
    objects: Arc<RwLock<HashMap<Uuid, ObjectRef>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `object` and return its full reference string (`IOR:...`).
    pub fn register(&self, object: ObjectRef) -> String {
        let key = Uuid::new_v4();
        self.objects.write().insert(key, object);
        debug!(%key, "published object");
        format!("{IOR_PREFIX}{}", hex::encode(key.as_bytes()))
    }

    /// Withdraw a published object. Returns whether it was published.
    pub fn revoke(&self, reference: &str) -> MonikerResult<bool> {
        let key = parse_key(reference)?;
        Ok(self.objects.write().remove(&key).is_some())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectBroker for LocalBroker {
    fn string_to_object(&self, reference: &str) -> MonikerResult<Option<ObjectRef>> {
        let key = parse_key(reference)?;
        Ok(self.objects.read().get(&key).cloned())
    }
}

/// Parse a reference, with or without its `IOR:` prefix, into a table key.
fn parse_key(reference: &str) -> MonikerResult<Uuid> {
    let encoded = reference.strip_prefix(IOR_PREFIX).unwrap_or(reference);

    let bytes = hex::decode(encoded).map_err(|e| MonikerError::General {
        message: format!("malformed object reference {reference:?}: {e}"),
    })?;

    Uuid::from_slice(&bytes).map_err(|e| MonikerError::General {
        message: format!("malformed object reference {reference:?}: {e}"),
    })
}
