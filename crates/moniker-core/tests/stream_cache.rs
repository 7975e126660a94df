//! Integration tests for StreamCache.
//!
//! Small geometry (16-byte pages, 4 lines) so eviction and boundary cases
//! are reached with short buffers. The property test drives a cache and a
//! plain MemoryStream with the same operations and compares what they read.

use moniker_core::{
    CacheConfig, FileStream, FlushTarget, InfoMask, LineState, MemoryStream, MonikerError,
    MonikerResult, SeekWhence, SharedStream, Stream, StreamCache, StreamInfo,
};
use proptest::prelude::*;

const PAGE: usize = 16;
const LINES: usize = 4;

fn small_config() -> CacheConfig {
    CacheConfig::default().with_page_size(PAGE).with_lines(LINES)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn test_distinct_lines_never_evict() {
    let data = pattern(PAGE * LINES);
    let backing = MemoryStream::from_bytes(data.clone());
    let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();

    // Touch every page in a scattered order, twice.
    for _ in 0..2 {
        for tag in [2u64, 0, 3, 1] {
            cache.seek((tag * PAGE as u64) as i64 + 3, SeekWhence::Start).unwrap();
            let got = cache.read(5).unwrap();
            let start = tag as usize * PAGE + 3;
            assert_eq!(got, &data[start..start + 5]);
        }
    }

    let stats = cache.stats();
    assert_eq!(stats.loads, LINES as u64);
    assert_eq!(stats.evictions, 0);
    assert_eq!(backing.counters().reads, LINES as u64);
}

#[test]
fn test_aliasing_pages_evict_each_other() {
    let data = pattern(PAGE * LINES * 2);
    let backing = MemoryStream::from_bytes(data.clone());
    let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();

    // Tags 1 and 5 share line 1.
    cache.seek(PAGE as i64, SeekWhence::Start).unwrap();
    cache.write(b"dirty").unwrap();
    assert_eq!(cache.line_state(1), Some(LineState::Dirty));

    let far = (PAGE * (LINES + 1)) as i64;
    cache.seek(far, SeekWhence::Start).unwrap();
    assert_eq!(cache.read(4).unwrap(), &data[far as usize..far as usize + 4]);
    assert_eq!(cache.line_state(1), Some(LineState::Clean));

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.flushes, 1);
    assert_eq!(&backing.contents()[PAGE..PAGE + 5], b"dirty");
    // Written back, not committed.
    assert_eq!(&backing.committed()[PAGE..PAGE + 5], &data[PAGE..PAGE + 5]);
}

#[test]
fn test_unaligned_roundtrip_across_lines() {
    let backing = MemoryStream::new();
    let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();
    let payload = pattern(40);

    cache.seek(10, SeekWhence::Start).unwrap();
    cache.write(&payload).unwrap();
    assert_eq!(cache.logical_size(), 50);

    cache.seek(10, SeekWhence::Start).unwrap();
    assert_eq!(cache.read(40).unwrap(), payload);
    assert!(backing.is_empty());

    cache.commit().unwrap();
    let mut expected = vec![0u8; 10];
    expected.extend_from_slice(&payload);
    assert_eq!(backing.committed(), expected);
    assert_eq!(cache.dirty_lines(), 0);
}

#[test]
fn test_commit_is_visible_to_a_fresh_cache() {
    let backing = MemoryStream::from_bytes(pattern(64));
    {
        let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();
        cache.seek(30, SeekWhence::Start).unwrap();
        cache.write(b"persisted").unwrap();
        cache.commit().unwrap();
    }

    let mut fresh = StreamCache::new(backing.clone(), &small_config()).unwrap();
    fresh.seek(30, SeekWhence::Start).unwrap();
    assert_eq!(fresh.read(9).unwrap(), b"persisted");
}

#[test]
fn test_uncommitted_writes_are_lost_on_drop() {
    let data = pattern(32);
    let backing = MemoryStream::from_bytes(data.clone());
    {
        let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();
        cache.write(b"gone").unwrap();
    }
    assert_eq!(backing.contents(), data);
}

#[test]
fn test_truncate_then_grow() {
    let data = pattern(64);
    let backing = MemoryStream::from_bytes(data.clone());
    let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();

    cache.seek(0, SeekWhence::Start).unwrap();
    assert_eq!(cache.read(64).unwrap(), data);

    cache.truncate(20).unwrap();
    assert_eq!(cache.logical_size(), 20);
    assert_eq!(cache.line_state(2), Some(LineState::Invalid));
    assert_eq!(cache.line_state(3), Some(LineState::Invalid));

    cache.seek(0, SeekWhence::End).unwrap();
    cache.write(b"tail").unwrap();
    cache.seek(0, SeekWhence::Start).unwrap();

    let mut expected = data[..20].to_vec();
    expected.extend_from_slice(b"tail");
    assert_eq!(cache.read(100).unwrap(), expected);

    cache.commit().unwrap();
    assert_eq!(backing.committed(), expected);
}

#[test]
fn test_revert_restores_committed_content() {
    let data = pattern(48);
    let backing = MemoryStream::from_bytes(data.clone());
    let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();

    cache.write(&[0xff; 20]).unwrap();
    cache.flush(FlushTarget::All).unwrap();
    assert_ne!(backing.contents(), data);

    cache.revert().unwrap();
    assert_eq!(cache.dirty_lines(), 0);
    assert_eq!(backing.contents(), data);

    cache.seek(0, SeekWhence::Start).unwrap();
    assert_eq!(cache.read(48).unwrap(), data);
}

#[test]
fn test_eof_and_negative_reads() {
    let backing = MemoryStream::from_bytes(pattern(20));
    let mut cache = StreamCache::new(backing, &small_config()).unwrap();

    cache.seek(18, SeekWhence::Start).unwrap();
    assert_eq!(cache.read(10).unwrap().len(), 2);
    assert!(cache.read(10).unwrap().is_empty());

    cache.seek(100, SeekWhence::Start).unwrap();
    assert!(cache.read(10).unwrap().is_empty());

    let before = cache.stats();
    assert!(matches!(cache.read(-1), Err(MonikerError::Io { .. })));
    assert_eq!(cache.stats(), before);
}

#[test]
fn test_shared_handle_over_cache() {
    let backing = MemoryStream::from_bytes(pattern(32));
    let cache = StreamCache::new(backing.clone(), &small_config()).unwrap();
    let shared = SharedStream::new(cache);

    shared.write_at(4, b"xy").unwrap();
    assert_eq!(shared.read_at(4, 2).unwrap(), b"xy");

    let mut handle = shared.clone();
    handle.commit().unwrap();
    assert_eq!(&backing.committed()[4..6], b"xy");
}

#[test]
fn test_file_backed_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cached.bin");
    std::fs::write(&path, pattern(50)).unwrap();

    let file = FileStream::open(&path).unwrap();
    let mut cache = StreamCache::new(file, &small_config()).unwrap();

    cache.seek(45, SeekWhence::Start).unwrap();
    cache.write(b"0123456789").unwrap();
    cache.seek(0, SeekWhence::End).unwrap();
    assert_eq!(cache.position(), 55);
    cache.commit().unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk.len(), 55);
    assert_eq!(&on_disk[45..], b"0123456789");
    assert_eq!(&on_disk[..45], &pattern(50)[..45]);
}

#[test]
fn test_invalid_geometry_rejected() {
    let config = CacheConfig::default().with_page_size(24);
    let result = StreamCache::new(MemoryStream::new(), &config);
    assert!(matches!(result, Err(MonikerError::Config { .. })));
}

/// Backing stream that cannot seek past its end, like a pipe-backed or
/// append-only store.
struct Clamping(MemoryStream);

impl Stream for Clamping {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        self.0.read(count)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        self.0.write(data)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        let at = self.0.seek(offset, whence)?;
        let end = self.0.len();
        if at > end {
            return self.0.seek(end as i64, SeekWhence::Start);
        }
        Ok(at)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        self.0.truncate(size)
    }

    fn commit(&mut self) -> MonikerResult<()> {
        self.0.commit()
    }

    fn revert(&mut self) -> MonikerResult<()> {
        self.0.revert()
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        self.0.get_info(mask)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        self.0.set_info(info, mask)
    }
}

#[test]
fn test_flush_past_clamped_end_fails_and_stays_dirty() {
    let original = pattern(10);
    let backing = MemoryStream::from_bytes(original.clone());
    let mut cache = StreamCache::new(Clamping(backing.clone()), &small_config()).unwrap();

    let payload = vec![0xab; 80];
    cache.seek(10, SeekWhence::Start).unwrap();
    cache.write(&payload).unwrap();

    // Line 0 now holds page 4 (offset 64), past the backing's end, and
    // lines are flushed in index order.
    let result = cache.commit();
    assert!(matches!(result, Err(MonikerError::Io { .. })));
    assert_eq!(backing.committed(), original);
    assert_eq!(cache.line_state(0), Some(LineState::Dirty));

    // The lower pages went out on the first attempt, so the retry reaches
    // every offset.
    cache.commit().unwrap();
    let mut expected = original;
    expected.extend_from_slice(&payload);
    assert_eq!(backing.committed(), expected);
    assert_eq!(cache.dirty_lines(), 0);
}

#[derive(Debug, Clone)]
enum Op {
    Write { pos: u64, data: Vec<u8> },
    Read { pos: u64, len: i64 },
    Truncate(u64),
    Flush,
    Commit,
    Revert,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..160, prop::collection::vec(any::<u8>(), 1..40))
            .prop_map(|(pos, data)| Op::Write { pos, data }),
        4 => (0u64..160, 0i64..60).prop_map(|(pos, len)| Op::Read { pos, len }),
        1 => (0u64..160).prop_map(Op::Truncate),
        1 => Just(Op::Flush),
        1 => Just(Op::Commit),
        1 => Just(Op::Revert),
    ]
}

proptest! {
    #[test]
    fn test_cache_matches_uncached_stream(
        initial in prop::collection::vec(any::<u8>(), 0..100),
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let mut model = MemoryStream::from_bytes(initial.clone());
        let backing = MemoryStream::from_bytes(initial);
        let mut cache = StreamCache::new(backing.clone(), &small_config()).unwrap();

        for op in &ops {
            match op {
                Op::Write { pos, data } => {
                    model.seek(*pos as i64, SeekWhence::Start).unwrap();
                    model.write(data).unwrap();
                    cache.seek(*pos as i64, SeekWhence::Start).unwrap();
                    cache.write(data).unwrap();
                }
                Op::Read { pos, len } => {
                    model.seek(*pos as i64, SeekWhence::Start).unwrap();
                    cache.seek(*pos as i64, SeekWhence::Start).unwrap();
                    prop_assert_eq!(cache.read(*len).unwrap(), model.read(*len).unwrap());
                }
                Op::Truncate(size) => {
                    model.truncate(*size).unwrap();
                    cache.truncate(*size).unwrap();
                }
                Op::Flush => cache.flush(FlushTarget::All).unwrap(),
                Op::Commit => {
                    model.commit().unwrap();
                    cache.commit().unwrap();
                }
                Op::Revert => {
                    model.revert().unwrap();
                    cache.revert().unwrap();
                }
            }
        }

        cache.seek(0, SeekWhence::Start).unwrap();
        prop_assert_eq!(cache.read(10_000).unwrap(), model.contents());

        cache.commit().unwrap();
        prop_assert_eq!(backing.committed(), model.contents());
    }
}
