//! Cache line storage and state.

use serde::Serialize;

/// Observable state of one cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    /// Holds no data.
    Invalid,
    /// Matches the underlying stream.
    Clean,
    /// Written since it was loaded or last flushed.
    Dirty,
}

#[derive(Debug)]
pub(crate) struct CacheLine {
    pub(crate) buffer: Box<[u8]>,
    pub(crate) tag: u64,
    pub(crate) valid: bool,
    pub(crate) dirty: bool,
}

impl CacheLine {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            buffer: vec![0; page_size].into_boxed_slice(),
            tag: 0,
            valid: false,
            dirty: false,
        }
    }

    /// Whether the line currently holds data for `tag`.
    pub(crate) fn holds(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }

    pub(crate) fn state(&self) -> LineState {
        match (self.valid, self.dirty) {
            (false, _) => LineState::Invalid,
            (true, false) => LineState::Clean,
            (true, true) => LineState::Dirty,
        }
    }

    /// Fill from freshly read bytes, zeroing the rest of the page.
    pub(crate) fn fill(&mut self, tag: u64, data: &[u8]) {
        let n = data.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&data[..n]);
        self.buffer[n..].fill(0);
        self.tag = tag;
        self.valid = true;
        self.dirty = false;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_zeroes_tail() {
        let mut line = CacheLine::new(8);
        line.buffer.fill(0xff);
        line.fill(2, b"abc");
        assert_eq!(&line.buffer[..], b"abc\0\0\0\0\0");
        assert!(line.holds(2));
        assert!(!line.holds(3));
        assert_eq!(line.state(), LineState::Clean);
    }

    #[test]
    fn test_state_transitions() {
        let mut line = CacheLine::new(4);
        assert_eq!(line.state(), LineState::Invalid);
        line.fill(0, b"");
        line.dirty = true;
        assert_eq!(line.state(), LineState::Dirty);
        line.invalidate();
        assert_eq!(line.state(), LineState::Invalid);
    }
}
