//! Transactional in-memory stream.
//!
//! Writes land in a working copy; `commit` snapshots it and `revert`
//! restores the last snapshot. Clones share one store, so a test (or a
//! second consumer) can observe what a wrapper such as a stream cache
//! actually pushed down.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MonikerError, MonikerResult};
use crate::stream::{
    read_len, seek_target, InfoMask, SeekWhence, StorageKind, Stream, StreamInfo,
};

/// Count of operations that reached the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub reads: u64,
    pub writes: u64,
    pub seeks: u64,
    pub truncates: u64,
    pub commits: u64,
    pub reverts: u64,
}

/// In-memory stream with commit/revert.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// Content visible to reads and writes.
    working: Vec<u8>,

    /// Content as of the last commit.
    committed: Vec<u8>,

    /// Cursor shared by all handles.
    position: u64,

    name: String,
    content_type: Option<String>,
    counters: IoCounters,
}

impl MemoryStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream whose committed content is `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let inner = MemoryInner {
            committed: bytes.clone(),
            working: bytes,
            ..MemoryInner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Set the entry name reported by `get_info`.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.inner.lock().name = name.into();
        self
    }

    /// Set the content type reported by `get_info`.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.inner.lock().content_type = Some(content_type.into());
        self
    }

    /// Current working content, including uncommitted writes.
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().working.clone()
    }

    /// Content as of the last commit.
    pub fn committed(&self) -> Vec<u8> {
        self.inner.lock().committed.clone()
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().working.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().working.is_empty()
    }

    /// Operations performed so far.
    pub fn counters(&self) -> IoCounters {
        self.inner.lock().counters
    }

    /// Whether two handles share one store.
    pub fn same_store(&self, other: &MemoryStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn to_index(offset: u64) -> MonikerResult<usize> {
    usize::try_from(offset).map_err(|_| MonikerError::io(format!("offset out of range: {offset}")))
}

impl Stream for MemoryStream {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        let len = read_len(count)?;
        let mut inner = self.inner.lock();
        inner.counters.reads += 1;

        let start = to_index(inner.position)?.min(inner.working.len());
        let end = start.saturating_add(len).min(inner.working.len());
        let data = inner.working[start..end].to_vec();
        inner.position += data.len() as u64;
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        let mut inner = self.inner.lock();
        inner.counters.writes += 1;

        let start = to_index(inner.position)?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| MonikerError::io("write past addressable range"))?;
        if inner.working.len() < end {
            inner.working.resize(end, 0);
        }
        inner.working[start..end].copy_from_slice(data);
        inner.position = end as u64;
        Ok(())
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        let mut inner = self.inner.lock();
        inner.counters.seeks += 1;

        let end = inner.working.len() as u64;
        let target = seek_target(inner.position, end, offset, whence)?;
        inner.position = target;
        Ok(target)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        let mut inner = self.inner.lock();
        inner.counters.truncates += 1;

        let size = to_index(size)?;
        inner.working.resize(size, 0);
        Ok(())
    }

    fn commit(&mut self) -> MonikerResult<()> {
        let mut inner = self.inner.lock();
        inner.counters.commits += 1;
        inner.committed = inner.working.clone();
        Ok(())
    }

    fn revert(&mut self) -> MonikerResult<()> {
        let mut inner = self.inner.lock();
        inner.counters.reverts += 1;
        inner.working = inner.committed.clone();
        Ok(())
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        let inner = self.inner.lock();
        let mut info = StreamInfo::default();
        if mask.contains(InfoMask::NAME) {
            info.name = inner.name.clone();
        }
        if mask.contains(InfoMask::TYPE) {
            info.kind = StorageKind::Regular;
        }
        if mask.contains(InfoMask::CONTENT_TYPE) {
            info.content_type = inner.content_type.clone();
        }
        if mask.contains(InfoMask::SIZE) {
            info.size = inner.working.len() as u64;
        }
        Ok(info)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        if mask.intersects(InfoMask::TYPE | InfoMask::SIZE) {
            return Err(MonikerError::NotSupported {
                operation: "set_info(type|size) on memory stream".to_string(),
            });
        }

        let mut inner = self.inner.lock();
        if mask.contains(InfoMask::NAME) {
            inner.name = info.name.clone();
        }
        if mask.contains(InfoMask::CONTENT_TYPE) {
            inner.content_type = info.content_type.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_seek() {
        let mut stream = MemoryStream::new();
        stream.write(b"hello").unwrap();
        assert_eq!(stream.seek(0, SeekWhence::Start).unwrap(), 0);
        assert_eq!(stream.read(3).unwrap(), b"hel");
        assert_eq!(stream.read(100).unwrap(), b"lo");
        assert!(stream.read(10).unwrap().is_empty());
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut stream = MemoryStream::from_bytes(b"ab".to_vec());
        stream.seek(4, SeekWhence::Start).unwrap();
        stream.write(b"z").unwrap();
        assert_eq!(stream.contents(), b"ab\0\0z");
    }

    #[test]
    fn test_commit_and_revert() {
        let mut stream = MemoryStream::from_bytes(b"base".to_vec());
        stream.write(b"XY").unwrap();
        assert_eq!(stream.contents(), b"XYse");
        assert_eq!(stream.committed(), b"base");

        stream.revert().unwrap();
        assert_eq!(stream.contents(), b"base");

        stream.seek(0, SeekWhence::Start).unwrap();
        stream.write(b"CA").unwrap();
        stream.commit().unwrap();
        stream.revert().unwrap();
        assert_eq!(stream.contents(), b"CAse");
    }

    #[test]
    fn test_clones_share_store() {
        let stream = MemoryStream::from_bytes(vec![1, 2, 3]);
        let mut other = stream.clone();
        other.truncate(1).unwrap();
        assert_eq!(stream.contents(), vec![1]);
        assert!(stream.same_store(&other));
        assert_eq!(stream.counters().truncates, 1);
    }

    #[test]
    fn test_negative_read_is_io_error() {
        let mut stream = MemoryStream::from_bytes(vec![1, 2, 3]);
        assert!(matches!(stream.read(-1), Err(MonikerError::Io { .. })));
        assert_eq!(stream.counters().reads, 0);
    }

    #[test]
    fn test_info() {
        let mut stream = MemoryStream::from_bytes(b"abc".to_vec())
            .with_name("doc")
            .with_content_type("text/plain");
        let info = stream.get_info(InfoMask::all()).unwrap();
        assert_eq!(info.name, "doc");
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
        assert_eq!(info.size, 3);

        let info = stream.get_info(InfoMask::SIZE).unwrap();
        assert_eq!(info.content_type, None);

        let update = StreamInfo {
            content_type: Some("text/html".to_string()),
            ..StreamInfo::default()
        };
        stream.set_info(&update, InfoMask::CONTENT_TYPE).unwrap();
        let info = stream.get_info(InfoMask::CONTENT_TYPE).unwrap();
        assert_eq!(info.content_type.as_deref(), Some("text/html"));

        assert!(matches!(
            stream.set_info(&update, InfoMask::SIZE),
            Err(MonikerError::NotSupported { .. })
        ));
    }
}
