//! Page/line arithmetic for the direct-mapped cache.

use crate::config::CacheConfig;
use crate::error::MonikerResult;

/// Shift/mask form of a validated [`CacheConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    page_shift: u32,
    page_size: usize,
    line_mask: u64,
    lines: usize,
}

impl Geometry {
    pub(crate) fn new(config: &CacheConfig) -> MonikerResult<Self> {
        config.validate()?;
        Ok(Self {
            page_shift: config.page_size.trailing_zeros(),
            page_size: config.page_size,
            line_mask: (config.lines - 1) as u64,
            lines: config.lines,
        })
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }

    pub(crate) fn tag(&self, pos: u64) -> u64 {
        pos >> self.page_shift
    }

    pub(crate) fn tag_to_pos(&self, tag: u64) -> u64 {
        tag << self.page_shift
    }

    pub(crate) fn line_index_of_tag(&self, tag: u64) -> usize {
        (tag & self.line_mask) as usize
    }

    pub(crate) fn offset_in_page(&self, pos: u64) -> usize {
        (pos & (self.page_size as u64 - 1)) as usize
    }
}
