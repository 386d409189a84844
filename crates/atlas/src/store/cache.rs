//! Write-back cache for shard holders.
//!
//! While enabled, [`FileStore`](crate::store::FileStore)s sharing the cache
//! read holders through it and park rewritten holders in it instead of
//! writing them to disk. Repeated operations against the same shard then cost
//! one read and one final write. [`HolderCache::flush`] writes every pending
//! holder; [`HolderCache::disable`] flushes before dropping the entries.
//!
//! The cache is shared between stores as an `Rc<RefCell<_>>`: stores and
//! cursors are used from one thread only.

use crate::error::Result;
use crate::folder::Folder;
use crate::store::Holder;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, warn};

/// A holder cache shared by the stores of one coordinator.
pub type SharedHolderCache<H> = Rc<RefCell<HolderCache<H>>>;

#[derive(Debug)]
struct CachedHolder<H> {
    folder: Folder,
    name: String,
    holder: H,
    dirty: bool,
}

/// Holders keyed by shard file path, with a dirty flag per entry.
#[derive(Debug)]
pub struct HolderCache<H> {
    entries: HashMap<PathBuf, CachedHolder<H>>,
    enabled: bool,
}

impl<H: Holder> Default for HolderCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Holder> HolderCache<H> {
    /// Creates an enabled, empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            enabled: true,
        }
    }

    /// Creates an enabled, empty cache ready to share between stores.
    pub fn shared() -> SharedHolderCache<H> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Returns true if stores should route holders through this cache.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns caching back on after [`HolderCache::disable`].
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Number of cached holders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of holders not yet written to disk.
    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.dirty).count()
    }

    /// Returns a copy of the cached holder for shard `name` in `folder`.
    pub fn get(&self, folder: &Folder, name: &str) -> Option<H> {
        self.entries
            .get(&folder.path().join(name))
            .map(|entry| entry.holder.clone())
    }

    /// Caches a holder just read from disk.
    pub fn insert_clean(&mut self, folder: &Folder, name: &str, holder: H) {
        self.insert(folder, name, holder, false);
    }

    /// Caches a modified holder; it is written on the next flush.
    pub fn put(&mut self, folder: &Folder, name: &str, holder: H) {
        self.insert(folder, name, holder, true);
    }

    /// Encoded size of the cached shard, if cached.
    pub fn cached_size(&self, folder: &Folder, name: &str) -> Option<u64> {
        self.entries
            .get(&folder.path().join(name))
            .map(|entry| entry.holder.to_bytes().len() as u64)
    }

    /// Names of shards of `folder` currently cached.
    pub fn cached_names(&self, folder: &Folder) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| entry.folder.path() == folder.path())
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Writes every dirty holder to disk, returning how many were written.
    pub fn flush(&mut self) -> Result<usize> {
        if !self.enabled {
            warn!("flush requested on a disabled holder cache");
            return Ok(0);
        }

        let mut dirty: Vec<&mut CachedHolder<H>> =
            self.entries.values_mut().filter(|entry| entry.dirty).collect();
        dirty.sort_by(|a, b| {
            a.folder
                .path()
                .cmp(b.folder.path())
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut written = 0;
        for entry in dirty {
            entry.folder.write_file(&entry.name, &entry.holder.to_bytes())?;
            entry.dirty = false;
            written += 1;
        }

        debug!(written, "flushed holder cache");
        Ok(written)
    }

    /// Flushes all pending holders, then empties and disables the cache.
    pub fn disable(&mut self) -> Result<usize> {
        let written = self.flush()?;
        self.entries.clear();
        self.enabled = false;
        Ok(written)
    }

    /// Drops every entry without writing anything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, folder: &Folder, name: &str, holder: H, dirty: bool) {
        let path = folder.path().join(name);
        let dirty = dirty || self.entries.get(&path).is_some_and(|entry| entry.dirty);
        self.entries.insert(
            path,
            CachedHolder {
                folder: folder.clone(),
                name: name.to_string(),
                holder,
                dirty,
            },
        );
    }
}
