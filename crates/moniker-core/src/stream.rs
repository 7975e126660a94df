//! Stream capability contract.
//!
//! A [`Stream`] is a seekable byte stream with transactional
//! commit/revert. It is the capability the `cache:` moniker consumes and
//! produces, and the one [`StreamCache`](crate::StreamCache) wraps.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::MonikerResult;

/// Origin for [`Stream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekWhence {
    Start,
    Current,
    End,
}

bitflags! {
    /// Fields requested from or applied by `get_info`/`set_info`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InfoMask: u32 {
        const NAME = 1 << 0;
        const TYPE = 1 << 1;
        const CONTENT_TYPE = 1 << 2;
        const SIZE = 1 << 3;
    }
}

/// Kind of storage entry a stream represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Regular,
    Directory,
}

/// Stream metadata.
///
/// Only the fields selected by the request mask are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Entry name.
    #[serde(default)]
    pub name: String,

    /// Entry kind.
    #[serde(default)]
    pub kind: StorageKind,

    /// MIME content type, if known.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Seekable byte stream with commit/revert.
pub trait Stream: Send {
    /// Read up to `count` bytes from the current position.
    ///
    /// Returns fewer bytes only at end of stream. A negative `count` is an
    /// I/O error.
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>>;

    /// Write `data` at the current position.
    fn write(&mut self, data: &[u8]) -> MonikerResult<()>;

    /// Move the cursor and return the new absolute offset.
    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64>;

    /// Set the stream length, discarding or zero-filling as needed.
    fn truncate(&mut self, size: u64) -> MonikerResult<()>;

    /// Make prior writes durable.
    fn commit(&mut self) -> MonikerResult<()>;

    /// Abandon writes since the last commit.
    fn revert(&mut self) -> MonikerResult<()>;

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo>;

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()>;
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        (**self).read(count)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        (**self).write(data)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        (**self).seek(offset, whence)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        (**self).truncate(size)
    }

    fn commit(&mut self) -> MonikerResult<()> {
        (**self).commit()
    }

    fn revert(&mut self) -> MonikerResult<()> {
        (**self).revert()
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        (**self).get_info(mask)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        (**self).set_info(info, mask)
    }
}

/// Cloneable handle to a stream shared through the object layer.
///
/// Every clone refers to the same stream; each call holds the lock for the
/// duration of that one operation.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<dyn Stream>>,
}

impl SharedStream {
    pub fn new(stream: impl Stream + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    /// Number of live handles to this stream.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two handles refer to the same stream.
    pub fn same_stream(&self, other: &SharedStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Seek to `offset` and read up to `count` bytes.
    pub fn read_at(&self, offset: u64, count: i64) -> MonikerResult<Vec<u8>> {
        let mut stream = self.inner.lock();
        stream.seek(offset_to_i64(offset)?, SeekWhence::Start)?;
        stream.read(count)
    }

    /// Seek to `offset` and write `data`.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> MonikerResult<()> {
        let mut stream = self.inner.lock();
        stream.seek(offset_to_i64(offset)?, SeekWhence::Start)?;
        stream.write(data)
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStream")
            .field("handles", &self.handle_count())
            .finish()
    }
}

impl Stream for SharedStream {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        self.inner.lock().read(count)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        self.inner.lock().write(data)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        self.inner.lock().seek(offset, whence)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        self.inner.lock().truncate(size)
    }

    fn commit(&mut self) -> MonikerResult<()> {
        self.inner.lock().commit()
    }

    fn revert(&mut self) -> MonikerResult<()> {
        self.inner.lock().revert()
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        self.inner.lock().get_info(mask)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        self.inner.lock().set_info(info, mask)
    }
}

/// Resolve a seek request against a cursor and an end offset.
///
/// Shared by the reference streams; a target before the start is an error.
pub(crate) fn seek_target(
    position: u64,
    end: u64,
    offset: i64,
    whence: SeekWhence,
) -> MonikerResult<u64> {
    let base = match whence {
        SeekWhence::Start => 0,
        SeekWhence::Current => offset_to_i64(position)?,
        SeekWhence::End => offset_to_i64(end)?,
    };

    let target = base.checked_add(offset).ok_or_else(|| {
        crate::error::MonikerError::io(format!("seek offset overflow: {base} + {offset}"))
    })?;

    u64::try_from(target).map_err(|_| {
        crate::error::MonikerError::io(format!("seek before start of stream: {target}"))
    })
}

pub(crate) fn offset_to_i64(offset: u64) -> MonikerResult<i64> {
    i64::try_from(offset)
        .map_err(|_| crate::error::MonikerError::io(format!("offset out of range: {offset}")))
}

/// Validate a read count and convert it to a length.
pub(crate) fn read_len(count: i64) -> MonikerResult<usize> {
    if count < 0 {
        return Err(crate::error::MonikerError::io(format!(
            "negative read count: {count}"
        )));
    }
    usize::try_from(count)
        .map_err(|_| crate::error::MonikerError::io(format!("read count too large: {count}")))
}
