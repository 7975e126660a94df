//! Stream extender.
//!
//! When a moniker yields a stream but the caller wants some other
//! interface, the extender activates a component that handles the stream's
//! content type, implements the wanted interface and can load itself from a
//! stream, then feeds it the stream.

use tracing::debug;

use crate::activation::ActivationFlags;
use crate::config::ResolveOptions;
use crate::error::{MonikerError, MonikerResult};
use crate::interface::InterfaceId;
use crate::moniker::Moniker;
use crate::object::{qi_return, ObjectRef};
use crate::resolver::MonikerResolver;
use crate::stream::{InfoMask, Stream};

/// Resolves non-stream requests through a stream and a persistable handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamExtender;

impl StreamExtender {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `moniker` for `interface` via its stream.
    ///
    /// Yields `None` when the moniker produces no stream.
    pub fn resolve(
        &self,
        resolver: &MonikerResolver,
        moniker: &Moniker,
        options: &ResolveOptions,
        interface: &InterfaceId,
    ) -> MonikerResult<Option<ObjectRef>> {
        let stream_id = InterfaceId::stream();
        let Some(source) = resolver.resolve(moniker, options, &stream_id)? else {
            return Ok(None);
        };
        let mut stream = source
            .stream()
            .ok_or_else(|| MonikerError::interface_not_found(&stream_id))?;

        let info = stream.get_info(InfoMask::CONTENT_TYPE)?;
        let content_type = info
            .content_type
            .filter(|ct| !ct.is_empty())
            .ok_or_else(|| MonikerError::general("stream has no content type"))?;

        let requirements = format!(
            "supported_mime_types.has('{content_type}') AND repo_ids.has('{interface}') \
             AND repo_ids.has('{}')",
            InterfaceId::PERSIST_STREAM
        );
        debug!(%content_type, %interface, "activating stream handler");

        let handler = resolver
            .activation()
            .activate(&requirements, &[], ActivationFlags::empty(), options)?
            .ok_or_else(|| MonikerError::interface_not_found(interface))?;

        if let Some(persist) = handler.persist_stream() {
            persist.load(stream, &content_type)?;
        }

        qi_return(Some(handler), interface).map(Some)
    }
}
