//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::error::{MonikerError, MonikerResult};

/// Stream cache geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Bytes per cache line. Must be a power of two.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Number of cache lines. Must be a power of two.
    #[serde(default = "default_lines")]
    pub lines: usize,
}

fn default_page_size() -> usize {
    8192
}

fn default_lines() -> usize {
    16
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            lines: default_lines(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `MONIKER_CACHE_PAGE_SIZE` | Bytes per cache line (default: 8192) |
    /// | `MONIKER_CACHE_LINES` | Number of cache lines (default: 16) |
    ///
    /// Unparseable values fall back to the defaults; geometry is checked by
    /// [`validate`](Self::validate) when a cache is built.
    pub fn from_env() -> Self {
        Self {
            page_size: std::env::var("MONIKER_CACHE_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_page_size),
            lines: std::env::var("MONIKER_CACHE_LINES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_lines),
        }
    }

    /// Set bytes per line.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set number of lines.
    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = lines;
        self
    }

    /// Total bytes held when every line is valid.
    pub fn capacity(&self) -> usize {
        self.page_size.saturating_mul(self.lines)
    }

    /// Check that both dimensions are non-zero powers of two.
    pub fn validate(&self) -> MonikerResult<()> {
        if !self.page_size.is_power_of_two() {
            return Err(MonikerError::Config {
                message: format!("page size must be a power of two, got {}", self.page_size),
            });
        }
        if !self.lines.is_power_of_two() {
            return Err(MonikerError::Config {
                message: format!("line count must be a power of two, got {}", self.lines),
            });
        }
        Ok(())
    }
}

/// Options forwarded unchanged through a resolution chain.
///
/// Nothing in this crate interprets them; they exist for activation
/// collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Opaque flag bits.
    #[serde(default)]
    pub flags: u32,

    /// Timeout hint in milliseconds. `None` means wait indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ResolveOptions {
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
