//! Multi-index coordination.
//!
//! A [`MultiIndex`] mirrors every record into several file stores, one per
//! index root, each folder chosen by that index's key function. The
//! canonical index is keyed by record ID alone, so a record can always be
//! found (and fully recovered) from its ID; secondary indices are keyed by
//! record content such as sky position or observation date.
//!
//! Writes are a sequence of independent single-index operations. When one
//! fails after others succeeded the caller gets
//! [`AtlasError::PartialIndexFailure`] and the earlier writes stay in place.
//! Key functions are pure and `add` replaces any copy under the same ID, so
//! repeating a failed `add` is safe. `delete` removes the canonical copy last,
//! so a failed delete can be repeated until it succeeds.
//!
//! - [`keys`]: bucket functions
//! - [`star`]: star catalog (by name and position)
//! - [`image`]: image catalog (by name, date, position and field)

pub mod image;
pub mod keys;
pub mod star;

pub use image::{ImageCatalog, ImageRecord};
pub use star::{StarCatalog, StarRecord};

use crate::config::{StoreConfig, BY_POSITION};
use crate::error::{AtlasError, Result};
use crate::folder::{FolderKey, FolderTree};
use crate::query::SpatialCursor;
use crate::sky::{Coordinate, DivisionMap};
use crate::store::{Cursor, FileStore, HolderCache, Record, RecordStore, SharedHolderCache};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, error};

/// A secondary index: a root folder name and the key function placing a
/// record inside it.
pub struct IndexSpec<R> {
    /// Root folder name of the index.
    pub name: &'static str,
    /// Folder key of a record within the index.
    pub key: fn(&R) -> FolderKey,
}

impl<R> IndexSpec<R> {
    /// Creates an index spec.
    pub fn new(name: &'static str, key: fn(&R) -> FolderKey) -> Self {
        Self { name, key }
    }
}

impl<R> Clone for IndexSpec<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for IndexSpec<R> {}

impl<R> fmt::Debug for IndexSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSpec").field("name", &self.name).finish()
    }
}

/// Mirrors records of one kind into a canonical index and any number of
/// secondary indices under a shared root.
///
/// # Examples
///
/// ```rust,ignore
/// use alopex_atlas::config::{StoreConfig, BY_NAME, BY_POSITION};
/// use alopex_atlas::index::{keys, IndexSpec, MultiIndex};
///
/// let index = MultiIndex::<Star>::new(StoreConfig::new("/data/atlas"), BY_NAME, keys::name_key)
///     .with_index(IndexSpec::new(BY_POSITION, |s: &Star| keys::position_key(&s.position)));
/// index.add(&star)?;
/// ```
pub struct MultiIndex<R: Record> {
    root: FolderTree,
    config: StoreConfig,
    canonical: &'static str,
    id_key: fn(&str) -> FolderKey,
    secondary: Vec<IndexSpec<R>>,
    cache: Option<SharedHolderCache<R::Holder>>,
}

impl<R: Record> fmt::Debug for MultiIndex<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiIndex")
            .field("root", &self.root)
            .field("canonical", &self.canonical)
            .field("secondary", &self.secondary)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl<R: Record> MultiIndex<R> {
    /// Creates a coordinator whose canonical index `canonical` places each
    /// record by `id_key(record.id())`.
    pub fn new(config: StoreConfig, canonical: &'static str, id_key: fn(&str) -> FolderKey) -> Self {
        let cache = config.write_back_cache.then(HolderCache::shared);
        Self {
            root: FolderTree::new(&config.root),
            config,
            canonical,
            id_key,
            secondary: Vec::new(),
            cache,
        }
    }

    /// Adds a secondary index.
    pub fn with_index(mut self, spec: IndexSpec<R>) -> Self {
        self.secondary.push(spec);
        self
    }

    /// The configuration this coordinator was built from.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Names of all indices, canonical first.
    pub fn index_names(&self) -> Vec<&'static str> {
        std::iter::once(self.canonical)
            .chain(self.secondary.iter().map(|spec| spec.name))
            .collect()
    }

    /// Root folder tree of the index `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndex` if no index has that name.
    pub fn tree(&self, name: &str) -> Result<FolderTree> {
        if self.index_names().iter().any(|index| *index == name) {
            Ok(self.root.subtree(name))
        } else {
            Err(AtlasError::UnknownIndex(name.to_string()))
        }
    }

    /// Folder key of `record` in the index `name`.
    pub fn key_of(&self, name: &str, record: &R) -> Result<FolderKey> {
        if name == self.canonical {
            return Ok((self.id_key)(record.id()));
        }
        self.secondary
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| (spec.key)(record))
            .ok_or_else(|| AtlasError::UnknownIndex(name.to_string()))
    }

    /// Writes `record` into every index, canonical first, replacing any copy
    /// already stored there under the same ID.
    ///
    /// # Errors
    ///
    /// A failure on the first index is returned as is. A failure on a later
    /// index is returned as `PartialIndexFailure`; earlier indices keep the
    /// record.
    pub fn add(&self, record: &R) -> Result<()> {
        let mut applied = Vec::new();
        for name in self.index_names() {
            let result = self
                .key_of(name, record)
                .and_then(|key| self.create_store(name, &key))
                .and_then(|mut store| store.set(record.clone()));
            if let Err(err) = result {
                return Err(self.partial_failure("add", record.id(), name, applied, err));
            }
            applied.push(name);
        }
        Ok(())
    }

    /// Writes `records` into every index, one batch shard per destination
    /// folder and index. Copies already stored under the same IDs are
    /// removed from the destination folder first.
    pub fn add_many(&self, records: &[R]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut applied = Vec::new();
        for name in self.index_names() {
            let mut groups: BTreeMap<FolderKey, Vec<R>> = BTreeMap::new();
            for record in records {
                groups
                    .entry(self.key_of(name, record)?)
                    .or_default()
                    .push(record.clone());
            }

            debug!(index = name, folders = groups.len(), records = records.len(), "adding batch");
            for (key, group) in groups {
                let first_id = group[0].id().to_string();
                let ids: HashSet<String> = group.iter().map(|r| r.id().to_string()).collect();
                let result = self.create_store(name, &key).and_then(|mut store| {
                    store.delete_many(&ids)?;
                    store.add_batch(group)
                });
                if let Err(err) = result {
                    return Err(self.partial_failure("add_many", &first_id, name, applied, err));
                }
            }
            applied.push(name);
        }
        Ok(())
    }

    /// Looks up a record by ID through the canonical index.
    pub fn get(&self, id: &str) -> Result<Option<R>> {
        match self.open_store(self.canonical, &(self.id_key)(id))? {
            Some(store) => store.get(id),
            None => Ok(None),
        }
    }

    /// Removes the record with `id` from every index, returning it.
    ///
    /// The canonical copy gives the folder to clean in each secondary index
    /// and is removed last, so a failed delete can be retried.
    pub fn delete(&self, id: &str) -> Result<Option<R>> {
        let Some(record) = self.get(id)? else {
            return Ok(None);
        };
        let ids = HashSet::from([id.to_string()]);

        let mut applied = Vec::new();
        for spec in &self.secondary {
            if let Err(err) = self.delete_in(spec.name, &(spec.key)(&record), &ids) {
                return Err(self.partial_failure("delete", id, spec.name, applied, err));
            }
            applied.push(spec.name);
        }
        if let Err(err) = self.delete_in(self.canonical, &(self.id_key)(id), &ids) {
            return Err(self.partial_failure("delete", id, self.canonical, applied, err));
        }
        Ok(Some(record))
    }

    /// Removes every record whose ID is in `ids` from every index, returning
    /// the removed records.
    ///
    /// Secondary indices are cleaned before the canonical one, as in
    /// [`MultiIndex::delete`].
    pub fn delete_many(&self, ids: &HashSet<String>) -> Result<Vec<R>> {
        let mut by_folder: BTreeMap<FolderKey, HashSet<String>> = BTreeMap::new();
        for id in ids {
            by_folder
                .entry((self.id_key)(id))
                .or_default()
                .insert(id.clone());
        }

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for (key, group) in &by_folder {
            let Some(store) = self.open_store(self.canonical, key)? else {
                continue;
            };
            for record in store.cursor()?.collect_all()? {
                if group.contains(record.id()) && seen.insert(record.id().to_string()) {
                    found.push(record);
                }
            }
        }

        let mut applied = Vec::new();
        for spec in &self.secondary {
            let mut groups: BTreeMap<FolderKey, HashSet<String>> = BTreeMap::new();
            for record in &found {
                groups
                    .entry((spec.key)(record))
                    .or_default()
                    .insert(record.id().to_string());
            }
            for (key, group) in groups {
                if let Err(err) = self.delete_in(spec.name, &key, &group) {
                    let record_id = group.iter().min().cloned().unwrap_or_default();
                    return Err(self.partial_failure("delete_many", &record_id, spec.name, applied, err));
                }
            }
            applied.push(spec.name);
        }

        for (key, group) in &by_folder {
            if let Err(err) = self.delete_in(self.canonical, key, group) {
                let record_id = group.iter().min().cloned().unwrap_or_default();
                return Err(self.partial_failure("delete_many", &record_id, self.canonical, applied, err));
            }
        }
        Ok(found)
    }

    /// Every record stored at or below `prefix` in the index `name`.
    ///
    /// Folders are visited depth-first in name order.
    pub fn get_elements(&self, name: &str, prefix: &[&str]) -> Result<Vec<R>> {
        let tree = self.tree(name)?;
        let Some(top) = tree.find_hierarchical_folder(&FolderKey::from_parts(prefix)) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for folder in top.folders_with_files()? {
            let store = self.attach_cache(FileStore::<R>::new(folder, self.config.shard_budget_bytes));
            records.extend(store.cursor()?.collect_all()?);
        }
        Ok(records)
    }

    /// Cursor over the records of every position cell overlapping the circle
    /// of `radius` degrees around `center`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndex` if there is no `by-position` index.
    pub fn cursor_within(&self, center: &Coordinate, radius: f64) -> Result<SpatialCursor<R>> {
        let mut map = DivisionMap::new();
        map.fill(center, radius);
        self.cursor_over(map)
    }

    /// Cursor over the records of the cells flagged in `map`.
    pub fn cursor_over(&self, map: DivisionMap) -> Result<SpatialCursor<R>> {
        let tree = self.tree(BY_POSITION)?;
        let cursor = SpatialCursor::new(tree, map, self.config.shard_budget_bytes);
        Ok(match &self.cache {
            Some(cache) => cursor.with_cache(cache.clone()),
            None => cursor,
        })
    }

    /// Writes every holder pending in the write-back cache, returning how
    /// many shards were written.
    pub fn flush(&self) -> Result<usize> {
        match &self.cache {
            Some(cache) => cache.borrow_mut().flush(),
            None => Ok(0),
        }
    }

    /// Turns the write-back cache on or off. Turning it off flushes first.
    pub fn set_write_back_cache(&mut self, enabled: bool) -> Result<()> {
        match (&self.cache, enabled) {
            (Some(cache), true) => cache.borrow_mut().enable(),
            (Some(cache), false) => {
                cache.borrow_mut().disable()?;
            }
            (None, true) => self.cache = Some(HolderCache::shared()),
            (None, false) => {}
        }
        self.config.write_back_cache = enabled;
        Ok(())
    }

    /// Deletes every index root from disk. Pending cached writes are dropped.
    pub fn discard(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().clear();
        }
        debug!(root = %self.root.root().display(), "discarding store");
        self.root.discard()
    }

    fn create_store(&self, name: &str, key: &FolderKey) -> Result<FileStore<R>> {
        let store = FileStore::create(&self.tree(name)?, key, self.config.shard_budget_bytes)?;
        Ok(self.attach_cache(store))
    }

    fn open_store(&self, name: &str, key: &FolderKey) -> Result<Option<FileStore<R>>> {
        let store = FileStore::open(&self.tree(name)?, key, self.config.shard_budget_bytes);
        Ok(store.map(|store| self.attach_cache(store)))
    }

    /// Removes `ids` from the folder `key` of the index `name`, if it exists.
    fn delete_in(&self, name: &str, key: &FolderKey, ids: &HashSet<String>) -> Result<Vec<R>> {
        match self.open_store(name, key)? {
            Some(mut store) => store.delete_many(ids),
            None => Ok(Vec::new()),
        }
    }

    fn attach_cache(&self, store: FileStore<R>) -> FileStore<R> {
        match &self.cache {
            Some(cache) => store.with_cache(cache.clone()),
            None => store,
        }
    }

    fn partial_failure(
        &self,
        operation: &'static str,
        record_id: &str,
        failed_index: &'static str,
        applied: Vec<&'static str>,
        source: AtlasError,
    ) -> AtlasError {
        if applied.is_empty() {
            return source;
        }
        error!(
            operation,
            record_id,
            failed_index,
            applied = ?applied,
            error = %source,
            "multi-index operation failed part-way"
        );
        AtlasError::PartialIndexFailure {
            operation,
            record_id: record_id.to_string(),
            failed_index,
            applied,
            source: Box::new(source),
        }
    }
}
