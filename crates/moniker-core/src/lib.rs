//! Chained moniker resolution with a transparent stream cache.
//!
//! A moniker is a composite name such as `IOR:0a1b...#cache:` that resolves
//! to a live object. This crate provides:
//!
//! - Name parsing and rendering (`!item`, `IOR:`, `OAFIID:`, `new:`,
//!   `query:(..)`, `cache:`)
//! - A resolver that walks the chain root first against pluggable object
//!   broker and activation collaborators
//! - A stream extender that turns a stream into any persistable component
//!   handling its content type
//! - A direct-mapped write-back cache over any [`Stream`]
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use moniker_core::{
//!     InterfaceId, LocalActivation, LocalBroker, MemoryStream, MonikerResolver, SharedStream,
//!     Stream, StreamObject,
//! };
//!
//! # fn example() -> moniker_core::MonikerResult<()> {
//! let backing = MemoryStream::from_bytes(b"hello".to_vec());
//! let broker = LocalBroker::new();
//! let ior = broker.register(StreamObject::new(SharedStream::new(backing)).into_ref());
//!
//! let resolver = MonikerResolver::new(Arc::new(broker), Arc::new(LocalActivation::new()));
//! let object = resolver.get_object(&format!("{ior}#cache:"), InterfaceId::stream())?;
//!
//! let mut stream = object.stream().expect("cache: yields a stream");
//! assert_eq!(stream.read(5)?, b"hello");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `MONIKER_CACHE_PAGE_SIZE` | Bytes per cache line (default: 8192) |
//! | `MONIKER_CACHE_LINES` | Number of cache lines (default: 16) |
//! | `MONIKER_EXTENDERS` | Enable the stream extender fallback (default: on) |

pub mod activation;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod extender;
pub mod file;
pub mod interface;
pub mod memory;
pub mod moniker;
pub mod name;
pub mod object;
pub mod resolver;
pub mod stream;

// Re-export main types
pub use activation::{Activation, ActivationFlags, LocalActivation, ServerInfo};
pub use broker::{LocalBroker, ObjectBroker, IOR_PREFIX};
pub use cache::{CacheStats, FlushTarget, LineState, StreamCache};
pub use config::{CacheConfig, ResolveOptions};
pub use error::{MonikerError, MonikerResult};
pub use extender::StreamExtender;
pub use file::FileStream;
pub use interface::InterfaceId;
pub use memory::{IoCounters, MemoryStream};
pub use moniker::{Moniker, MonikerChain, MonikerKind};
pub use name::{escape, unescape};
pub use object::{
    qi_return, GenericFactory, ItemContainer, ObjectRef, PersistStream, StreamObject, Unknown,
};
pub use resolver::{MonikerResolver, ResolverConfig};
pub use stream::{InfoMask, SeekWhence, SharedStream, StorageKind, Stream, StreamInfo};
