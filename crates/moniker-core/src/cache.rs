//! Direct-mapped write-back cache over a [`Stream`].
//!
//! The cache holds `lines` fixed-size pages. A stream offset maps to
//! exactly one line:
//!
//! ```text
//! tag    = pos >> log2(page_size)
//! index  = tag & (lines - 1)
//! offset = pos & (page_size - 1)
//! ```
//!
//! Reads and writes fault whole pages in from the underlying stream. Writes
//! only touch the line; they reach the underlying stream when the line is
//! evicted, on `flush`, or on `commit`. Dropping the cache does not flush.
//!
//! # Line states
//!
//! ```text
//! Invalid --load--> Clean --write--> Dirty --flush--> Clean
//!    ^                                  |
//!    +------ truncate / revert ---------+
//! ```
//!
//! A dirty line only becomes invalid through `revert` or because the bytes
//! it holds were cut off by `truncate`.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::error::{MonikerError, MonikerResult};
use crate::stream::{offset_to_i64, read_len, InfoMask, SeekWhence, Stream, StreamInfo};

mod geometry;
mod line;

use geometry::Geometry;
use line::CacheLine;
pub use line::LineState;

/// Counters describing how the cache served requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Copies served from a line that already held the right page.
    pub hits: u64,

    /// Line lookups that had to fault a page in.
    pub misses: u64,

    /// Pages read from the underlying stream.
    pub loads: u64,

    /// Loads that replaced a valid line holding another page.
    pub evictions: u64,

    /// Dirty lines written back.
    pub flushes: u64,
}

/// Which lines [`StreamCache::flush`] writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    Line(usize),
    All,
}

/// Write-back page cache presenting full [`Stream`] semantics.
pub struct StreamCache<S: Stream> {
    /// Wrapped stream, released when the cache is dropped.
    underlying: S,

    geometry: Geometry,
    lines: Vec<CacheLine>,

    /// Logical cursor.
    position: u64,

    /// Highest offset known to hold data.
    logical_size: u64,

    stats: CacheStats,
}

impl<S: Stream> StreamCache<S> {
    /// Wrap `underlying` with the given geometry.
    pub fn new(underlying: S, config: &CacheConfig) -> MonikerResult<Self> {
        let geometry = Geometry::new(config)?;
        let lines = (0..geometry.lines())
            .map(|_| CacheLine::new(geometry.page_size()))
            .collect();

        debug!(
            page_size = geometry.page_size(),
            lines = geometry.lines(),
            "created stream cache"
        );

        Ok(Self {
            underlying,
            geometry,
            lines,
            position: 0,
            logical_size: 0,
            stats: CacheStats::default(),
        })
    }

    /// Current logical cursor.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Highest offset known to hold data.
    pub fn logical_size(&self) -> u64 {
        self.logical_size
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn page_size(&self) -> usize {
        self.geometry.page_size()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// State of line `index`, or `None` if out of range.
    pub fn line_state(&self, index: usize) -> Option<LineState> {
        self.lines.get(index).map(CacheLine::state)
    }

    /// Number of lines holding unflushed writes.
    pub fn dirty_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.valid && l.dirty).count()
    }

    /// Write back dirty lines.
    ///
    /// `All` attempts every line even after a failure and returns the first
    /// error. A line that fails to flush stays dirty.
    pub fn flush(&mut self, target: FlushTarget) -> MonikerResult<()> {
        match target {
            FlushTarget::Line(index) => {
                if index >= self.lines.len() {
                    return Err(MonikerError::io(format!(
                        "cache line {index} out of range ({} lines)",
                        self.lines.len()
                    )));
                }
                self.flush_line(index)
            }
            FlushTarget::All => {
                let mut first_error = None;
                for index in 0..self.lines.len() {
                    if let Err(e) = self.flush_line(index) {
                        warn!(index, error = %e, "cache line flush failed");
                        first_error.get_or_insert(e);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
        }
    }

    fn flush_line(&mut self, index: usize) -> MonikerResult<()> {
        let (tag, valid, dirty) = {
            let line = &self.lines[index];
            (line.tag, line.valid, line.dirty)
        };
        if !(valid && dirty) {
            return Ok(());
        }

        // Only the part of the page below the logical end is written, so the
        // last page never grows the underlying stream.
        let pos = self.geometry.tag_to_pos(tag);
        let len = usize::try_from(self.logical_size.saturating_sub(pos))
            .unwrap_or(usize::MAX)
            .min(self.geometry.page_size());

        if len > 0 {
            let at = self.underlying.seek(offset_to_i64(pos)?, SeekWhence::Start)?;
            if at != pos {
                return Err(MonikerError::io(format!(
                    "flush of page {tag} landed at offset {at}, expected {pos}"
                )));
            }
            self.underlying.write(&self.lines[index].buffer[..len])?;
        }

        trace!(tag, index, bytes = len, "cache line flushed");
        self.lines[index].dirty = false;
        self.stats.flushes += 1;
        Ok(())
    }

    /// Fault page `tag` into its line, writing back a dirty victim first.
    fn load(&mut self, tag: u64) -> MonikerResult<()> {
        let index = self.geometry.line_index_of_tag(tag);
        self.flush_line(index)?;

        let evicting = self.lines[index].valid && self.lines[index].tag != tag;
        let pos = self.geometry.tag_to_pos(tag);

        let at = self.underlying.seek(offset_to_i64(pos)?, SeekWhence::Start)?;
        // A stream that clamps seeks to its end has nothing at `pos`.
        let data = if at == pos {
            self.underlying.read(self.geometry.page_size() as i64)?
        } else {
            Vec::new()
        };

        trace!(tag, index, bytes = data.len(), evicting, "cache line loaded");

        self.lines[index].fill(tag, &data);
        if !data.is_empty() {
            self.logical_size = self.logical_size.max(pos + data.len() as u64);
        }
        self.stats.loads += 1;
        if evicting {
            self.stats.evictions += 1;
        }
        Ok(())
    }

    fn invalidate_all(&mut self) {
        for line in &mut self.lines {
            line.invalidate();
        }
    }
}

impl<S: Stream> Stream for StreamCache<S> {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        let count = read_len(count)?;
        let mut out = Vec::with_capacity(count.min(self.geometry.page_size()));

        while out.len() < count {
            let tag = self.geometry.tag(self.position);
            let index = self.geometry.line_index_of_tag(tag);
            let offset = self.geometry.offset_in_page(self.position);

            if self.lines[index].holds(tag) {
                let available = usize::try_from(self.logical_size.saturating_sub(self.position))
                    .unwrap_or(usize::MAX);
                let n = (self.geometry.page_size() - offset)
                    .min(count - out.len())
                    .min(available);
                if n == 0 {
                    break;
                }

                out.extend_from_slice(&self.lines[index].buffer[offset..offset + n]);
                self.position += n as u64;
                self.stats.hits += 1;
            } else {
                self.stats.misses += 1;
                self.load(tag)?;
                if self.position >= self.logical_size {
                    break;
                }
            }
        }

        Ok(out)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        let mut written = 0;

        while written < data.len() {
            let tag = self.geometry.tag(self.position);
            let index = self.geometry.line_index_of_tag(tag);
            let offset = self.geometry.offset_in_page(self.position);

            if self.lines[index].holds(tag) {
                let n = (self.geometry.page_size() - offset).min(data.len() - written);
                let line = &mut self.lines[index];
                line.buffer[offset..offset + n].copy_from_slice(&data[written..written + n]);
                line.dirty = true;

                written += n;
                self.position += n as u64;
                self.logical_size = self.logical_size.max(self.position);
                self.stats.hits += 1;
            } else {
                // Write-allocate: fault the page in so bytes sharing it survive.
                self.stats.misses += 1;
                self.load(tag)?;
            }
        }

        Ok(())
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        // Loads move the underlying cursor, so relative seeks are rebased
        // onto the logical cursor and sent as absolute ones.
        let target = match whence {
            SeekWhence::Start => offset,
            SeekWhence::Current => offset_to_i64(self.position)?
                .checked_add(offset)
                .ok_or_else(|| MonikerError::io("seek offset overflow"))?,
            SeekWhence::End => {
                let end = self
                    .underlying
                    .seek(0, SeekWhence::End)?
                    .max(self.logical_size);
                offset_to_i64(end)?
                    .checked_add(offset)
                    .ok_or_else(|| MonikerError::io("seek offset overflow"))?
            }
        };

        let position = self.underlying.seek(target, SeekWhence::Start)?;
        self.position = position;
        Ok(position)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        let cut = self.geometry.tag(size);
        let boundary = self.geometry.line_index_of_tag(cut);

        // The page holding `size` keeps its bytes below `size`.
        if self.lines[boundary].holds(cut) && self.geometry.offset_in_page(size) > 0 {
            self.flush_line(boundary)?;
        }

        for line in &mut self.lines {
            if line.valid && line.tag >= cut {
                line.invalidate();
            }
        }

        debug!(size, "truncating cached stream");
        self.logical_size = size;
        self.underlying.truncate(size)
    }

    fn commit(&mut self) -> MonikerResult<()> {
        self.flush(FlushTarget::All)?;
        self.underlying.commit()
    }

    fn revert(&mut self) -> MonikerResult<()> {
        debug!(dirty_lines = self.dirty_lines(), "reverting cached stream");
        self.invalidate_all();
        self.logical_size = 0;
        self.underlying.revert()
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        self.underlying.get_info(mask)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        self.underlying.set_info(info, mask)
    }
}

impl<S: Stream> fmt::Debug for StreamCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCache")
            .field("page_size", &self.geometry.page_size())
            .field("lines", &self.lines.len())
            .field("position", &self.position)
            .field("logical_size", &self.logical_size)
            .field("dirty_lines", &self.dirty_lines())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<S: Stream> Drop for StreamCache<S> {
    fn drop(&mut self) {
        let dirty = self.dirty_lines();
        if dirty > 0 {
            warn!(dirty_lines = dirty, "stream cache released with unflushed writes");
        }
    }
}
