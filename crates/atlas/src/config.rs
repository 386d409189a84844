//! Store configuration.

use std::path::{Path, PathBuf};

/// Default byte budget for a single shard file (soft limit).
pub const DEFAULT_SHARD_BUDGET_BYTES: u64 = 50_000;

/// Index root holding records keyed by their name hierarchy.
pub const BY_NAME: &str = "by-name";

/// Index root holding records keyed by sky position cell.
pub const BY_POSITION: &str = "by-position";

/// Index root holding records keyed by observation date.
pub const BY_DATE: &str = "by-date";

/// Index root holding records keyed by observed field name.
pub const BY_FIELD: &str = "by-field";

/// Configuration for a file-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory under which every index root lives.
    pub root: PathBuf,

    /// Soft size limit for shard files written by single-record adds.
    ///
    /// A shard is appended to while its on-disk size is below this value.
    /// Batch writes ignore it. Default: 50,000 bytes.
    pub shard_budget_bytes: u64,

    /// Keeps holders in a write-back cache until an explicit flush.
    ///
    /// Default: disabled.
    pub write_back_cache: bool,
}

impl StoreConfig {
    /// Creates a configuration rooted at `root` with default settings.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            shard_budget_bytes: DEFAULT_SHARD_BUDGET_BYTES,
            write_back_cache: false,
        }
    }

    /// Sets a custom shard byte budget.
    pub fn with_shard_budget(mut self, bytes: u64) -> Self {
        self.shard_budget_bytes = bytes;
        self
    }

    /// Enables or disables the write-back holder cache.
    pub fn with_write_back_cache(mut self, enabled: bool) -> Self {
        self.write_back_cache = enabled;
        self
    }
}
