//! File-backed record store: one folder, many size-budgeted shard files.
//!
//! Single-record adds append to the first shard whose on-disk size is still
//! below the byte budget (checked from file sizes, without parsing), or open
//! a new shard. Batch adds always write one new shard regardless of size, so
//! a batch stays together in one file. Every mutation rewrites the whole
//! shard it touches.
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_atlas::folder::{FolderKey, FolderTree};
//! use alopex_atlas::store::{Cursor, FileStore, RecordStore};
//!
//! let tree = FolderTree::new("/data/atlas").subtree("by-name");
//! let mut store = FileStore::<Star>::create(&tree, &FolderKey::from_parts(&["HD", "1"]), 50_000)?;
//! store.add(star)?;
//! let found = store.get("HD 12345")?;
//! ```

use crate::error::Result;
use crate::folder::{Folder, FolderKey, FolderTree};
use crate::store::cache::SharedHolderCache;
use crate::store::shard::{parse_shard_name, shard_name};
use crate::store::{Cursor, Holder, Record, RecordStore};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::debug;

/// Record store over the shard files of one folder.
#[derive(Debug)]
pub struct FileStore<R: Record> {
    folder: Folder,
    shard_budget: u64,
    cache: Option<SharedHolderCache<R::Holder>>,
}

impl<R: Record> FileStore<R> {
    /// Creates a store over an existing folder.
    pub fn new(folder: Folder, shard_budget: u64) -> Self {
        Self {
            folder,
            shard_budget,
            cache: None,
        }
    }

    /// Creates the folder addressed by `key` (if needed) and opens a store on it.
    pub fn create(tree: &FolderTree, key: &FolderKey, shard_budget: u64) -> Result<Self> {
        let folder = tree.create_hierarchical_folder(key)?;
        Ok(Self::new(folder, shard_budget))
    }

    /// Opens a store on the folder addressed by `key`, or `None` if the
    /// folder does not exist.
    pub fn open(tree: &FolderTree, key: &FolderKey, shard_budget: u64) -> Option<Self> {
        tree.find_hierarchical_folder(key)
            .map(|folder| Self::new(folder, shard_budget))
    }

    /// Routes holder reads and writes through `cache` while it is enabled.
    pub fn with_cache(mut self, cache: SharedHolderCache<R::Holder>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The folder this store manages.
    pub fn folder(&self) -> &Folder {
        &self.folder
    }

    /// Shard byte budget for single-record adds.
    pub fn shard_budget(&self) -> u64 {
        self.shard_budget
    }

    /// Names of the shards in this folder, in sequence order.
    ///
    /// Includes shards that so far exist only in the write-back cache.
    pub fn shard_names(&self) -> Result<Vec<String>> {
        let mut numbers: BTreeSet<u64> = self
            .folder
            .list_files()?
            .iter()
            .filter_map(|name| parse_shard_name(name))
            .collect();

        if let Some(cache) = self.active_cache() {
            numbers.extend(
                cache
                    .borrow()
                    .cached_names(&self.folder)
                    .iter()
                    .filter_map(|name| parse_shard_name(name)),
            );
        }

        Ok(numbers.into_iter().map(shard_name).collect())
    }

    /// Current serialized size of shard `name`.
    pub fn shard_size(&self, name: &str) -> Result<u64> {
        if let Some(cache) = self.active_cache() {
            if let Some(size) = cache.borrow().cached_size(&self.folder, name) {
                return Ok(size);
            }
        }
        Ok(self.folder.file_size(name)?.unwrap_or(0))
    }

    /// Loads the holder stored in shard `name`.
    pub fn load_shard(&self, name: &str) -> Result<R::Holder> {
        load_holder::<R>(&self.folder, name, self.active_cache())
    }

    fn active_cache(&self) -> Option<&SharedHolderCache<R::Holder>> {
        self.cache
            .as_ref()
            .filter(|cache| cache.borrow().is_enabled())
    }

    fn store_shard(&self, name: &str, holder: R::Holder) -> Result<()> {
        if let Some(cache) = self.active_cache() {
            cache.borrow_mut().put(&self.folder, name, holder);
            return Ok(());
        }

        let bytes = holder.to_bytes();
        debug!(
            folder = %self.folder.path().display(),
            shard = name,
            records = holder.len(),
            bytes = bytes.len(),
            "rewriting shard"
        );
        self.folder.write_file(name, &bytes)
    }

    fn next_shard_name(names: &[String]) -> String {
        let last = names
            .iter()
            .filter_map(|name| parse_shard_name(name))
            .max()
            .unwrap_or(0);
        shard_name(last + 1)
    }
}

impl<R: Record> RecordStore<R> for FileStore<R> {
    type Cursor = FileCursor<R>;

    fn cursor(&self) -> Result<FileCursor<R>> {
        Ok(FileCursor::new(
            self.folder.clone(),
            self.shard_names()?,
            self.active_cache().cloned(),
        ))
    }

    fn add(&mut self, record: R) -> Result<()> {
        let names = self.shard_names()?;
        for name in &names {
            if self.shard_size(name)? < self.shard_budget {
                let mut holder = self.load_shard(name)?;
                holder.push(record);
                return self.store_shard(name, holder);
            }
        }

        let name = Self::next_shard_name(&names);
        debug!(folder = %self.folder.path().display(), shard = %name, "creating shard");
        let mut holder = R::empty_holder();
        holder.push(record);
        self.store_shard(&name, holder)
    }

    fn add_batch(&mut self, records: Vec<R>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let name = Self::next_shard_name(&self.shard_names()?);
        debug!(
            folder = %self.folder.path().display(),
            shard = %name,
            records = records.len(),
            "writing batch shard"
        );
        let mut holder = R::empty_holder();
        *holder.records_mut() = records;
        self.store_shard(&name, holder)
    }

    fn delete(&mut self, id: &str) -> Result<Option<R>> {
        for name in self.shard_names()? {
            let mut holder = self.load_shard(&name)?;
            if let Some(position) = holder.records().iter().position(|r| r.id() == id) {
                let removed = holder.records_mut().remove(position);
                if holder.is_empty() {
                    debug!(folder = %self.folder.path().display(), shard = %name, "shard now empty");
                }
                self.store_shard(&name, holder)?;
                return Ok(Some(removed));
            }
        }
        Ok(None)
    }

    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<Vec<R>> {
        let mut removed_all = Vec::new();
        if ids.is_empty() {
            return Ok(removed_all);
        }

        let mut remaining = ids.clone();
        for name in self.shard_names()? {
            let mut holder = self.load_shard(&name)?;
            let removed = holder.remove_ids(&remaining);
            if !removed.is_empty() {
                for record in &removed {
                    remaining.remove(record.id());
                }
                self.store_shard(&name, holder)?;
                removed_all.extend(removed);
            }
            if remaining.is_empty() {
                break;
            }
        }

        Ok(removed_all)
    }
}

fn load_holder<R: Record>(
    folder: &Folder,
    name: &str,
    cache: Option<&SharedHolderCache<R::Holder>>,
) -> Result<R::Holder> {
    // a cursor may outlive the cache being switched off
    let Some(cache) = cache.filter(|cache| cache.borrow().is_enabled()) else {
        return R::Holder::from_bytes(&folder.read_file(name)?);
    };

    if let Some(holder) = cache.borrow().get(folder, name) {
        return Ok(holder);
    }
    let holder = R::Holder::from_bytes(&folder.read_file(name)?)?;
    cache.borrow_mut().insert_clean(folder, name, holder.clone());
    Ok(holder)
}

/// Cursor over the records of a [`FileStore`].
///
/// The shard list is captured when the cursor is created; shards are then
/// loaded one at a time as the previous one is exhausted.
#[derive(Debug)]
pub struct FileCursor<R: Record> {
    folder: Folder,
    shards: Vec<String>,
    next_shard: usize,
    pending: VecDeque<R>,
    cache: Option<SharedHolderCache<R::Holder>>,
}

impl<R: Record> FileCursor<R> {
    fn new(folder: Folder, shards: Vec<String>, cache: Option<SharedHolderCache<R::Holder>>) -> Self {
        Self {
            folder,
            shards,
            next_shard: 0,
            pending: VecDeque::new(),
            cache,
        }
    }

    /// Number of shards captured at creation.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl<R: Record> Cursor for FileCursor<R> {
    type Item = R;

    fn first(&mut self) -> Result<Option<R>> {
        self.next_shard = 0;
        self.pending.clear();
        self.next()
    }

    fn next(&mut self) -> Result<Option<R>> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            let Some(name) = self.shards.get(self.next_shard) else {
                return Ok(None);
            };
            let holder = load_holder::<R>(&self.folder, name, self.cache.as_ref())?;
            self.next_shard += 1;
            self.pending = holder.into_records().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AtlasError;
    use crate::store::testing::Note;
    use crate::store::{HolderCache, RecordBatch};
    use tempfile::TempDir;

    fn store_in(temp_dir: &TempDir, budget: u64) -> FileStore<Note> {
        let tree = FolderTree::new(temp_dir.path());
        FileStore::create(&tree, &FolderKey::from_parts(&["a", "b"]), budget).unwrap()
    }

    fn ids(records: &[Note]) -> BTreeSet<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_add_get_and_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        for i in 0..10 {
            store.add(Note::new(&format!("n{i}"))).unwrap();
        }

        assert_eq!(store.shard_names().unwrap(), vec!["1"]);
        assert_eq!(store.get("n7").unwrap(), Some(Note::new("n7")));
        assert_eq!(store.get("missing").unwrap(), None);

        let all = store.cursor().unwrap().collect_all().unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].id, "n0");
        assert_eq!(all[9].id, "n9");
    }

    #[test]
    fn test_empty_store_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir, 50_000);
        let mut cursor = store.cursor().unwrap();
        assert_eq!(cursor.first().unwrap(), None);
        assert_eq!(cursor.next().unwrap(), None);
    }

    #[test]
    fn test_add_respects_shard_budget() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 1_000);
        for i in 0..40 {
            store.add(Note::sized(&format!("n{i:02}"), 100)).unwrap();
        }

        let names = store.shard_names().unwrap();
        assert!(names.len() > 1);
        let mut encoded = Vec::new();
        Note::sized("n00", 100).encode(&mut encoded);
        let record_size = encoded.len() as u64;
        for name in &names {
            let size = store.shard_size(name).unwrap();
            assert!(size < 1_000 + record_size + 8, "shard {name} is {size} bytes");
        }
        assert_eq!(store.cursor().unwrap().collect_all().unwrap().len(), 40);
    }

    #[test]
    fn test_add_batch_bypasses_budget() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 1_000);
        let batch: Vec<Note> = (0..50).map(|i| Note::sized(&format!("b{i}"), 200)).collect();
        store.add_batch(batch).unwrap();

        assert_eq!(store.shard_names().unwrap(), vec!["1"]);
        assert!(store.shard_size("1").unwrap() > 10_000);

        // the full batch shard is skipped by the next single add
        store.add(Note::new("single")).unwrap();
        assert_eq!(store.shard_names().unwrap(), vec!["1", "2"]);

        store.add_batch(Vec::new()).unwrap();
        assert_eq!(store.shard_names().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        store.add(Note::new("a")).unwrap();
        store.add(Note::new("b")).unwrap();

        assert_eq!(store.delete("a").unwrap(), Some(Note::new("a")));
        assert_eq!(store.delete("a").unwrap(), None);
        assert_eq!(store.delete("zzz").unwrap(), None);
        assert_eq!(ids(&store.cursor().unwrap().collect_all().unwrap()), ids(&[Note::new("b")]));
    }

    #[test]
    fn test_delete_many_rewrites_only_touched_shards() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        store.add_batch(vec![Note::new("a1"), Note::new("a2")]).unwrap();
        store.add_batch(vec![Note::new("b1"), Note::new("b2")]).unwrap();
        store.add_batch(vec![Note::new("c1")]).unwrap();

        let untouched = std::fs::metadata(store.folder().path().join("2"))
            .unwrap()
            .modified()
            .unwrap();

        let wanted: HashSet<String> = ["a2", "c1", "nope"].iter().map(|s| s.to_string()).collect();
        let removed = store.delete_many(&wanted).unwrap();
        assert_eq!(ids(&removed), ids(&[Note::new("a2"), Note::new("c1")]));

        let after = std::fs::metadata(store.folder().path().join("2"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(untouched, after);

        let left = ids(&store.cursor().unwrap().collect_all().unwrap());
        assert_eq!(left, ids(&[Note::new("a1"), Note::new("b1"), Note::new("b2")]));
        assert!(store.delete_many(&HashSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_set_replaces_previous() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        assert_eq!(store.set(Note::new("a")).unwrap(), None);

        let updated = Note {
            id: "a".to_string(),
            text: "updated".to_string(),
        };
        assert_eq!(store.set(updated.clone()).unwrap(), Some(Note::new("a")));
        assert_eq!(store.get("a").unwrap(), Some(updated));
        assert_eq!(store.cursor().unwrap().collect_all().unwrap().len(), 1);
    }

    #[test]
    fn test_cursor_snapshot_of_shard_list() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        store.add_batch(vec![Note::new("a")]).unwrap();
        let mut cursor = store.cursor().unwrap();
        store.add_batch(vec![Note::new("b")]).unwrap();

        assert_eq!(cursor.shard_count(), 1);
        assert_eq!(cursor.collect_all().unwrap(), vec![Note::new("a")]);
    }

    #[test]
    fn test_corrupt_shard_surfaces_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        store.add(Note::new("a")).unwrap();
        store.folder().write_file("1", b"garbage that is not a shard").unwrap();

        assert!(matches!(
            store.get("a"),
            Err(AtlasError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_foreign_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir, 50_000);
        store.folder().write_file("README", b"hello").unwrap();
        store.add(Note::new("a")).unwrap();
        assert_eq!(store.shard_names().unwrap(), vec!["1"]);
    }

    #[test]
    fn test_write_back_cache_defers_writes_until_flush() {
        let temp_dir = TempDir::new().unwrap();
        let cache = HolderCache::<RecordBatch<Note>>::shared();
        let mut store = store_in(&temp_dir, 50_000).with_cache(cache.clone());

        store.add(Note::new("a")).unwrap();
        store.add(Note::new("b")).unwrap();
        assert!(!store.folder().path().join("1").exists());
        assert_eq!(store.shard_names().unwrap(), vec!["1"]);
        assert_eq!(store.get("b").unwrap(), Some(Note::new("b")));
        assert_eq!(cache.borrow().dirty_count(), 1);

        assert_eq!(cache.borrow_mut().flush().unwrap(), 1);
        assert!(store.folder().path().join("1").exists());
        assert_eq!(cache.borrow().dirty_count(), 0);

        let plain = FileStore::<Note>::new(store.folder().clone(), 50_000);
        assert_eq!(plain.cursor().unwrap().collect_all().unwrap().len(), 2);
    }

    #[test]
    fn test_disable_flushes_pending_holders() {
        let temp_dir = TempDir::new().unwrap();
        let cache = HolderCache::<RecordBatch<Note>>::shared();
        let mut store = store_in(&temp_dir, 50_000).with_cache(cache.clone());
        store.add_batch(vec![Note::new("a"), Note::new("b")]).unwrap();
        store.delete("a").unwrap();

        assert_eq!(cache.borrow_mut().disable().unwrap(), 1);
        assert!(cache.borrow().is_empty());
        assert!(!cache.borrow().is_enabled());

        // writes now go straight to disk
        store.add(Note::new("c")).unwrap();
        let plain = FileStore::<Note>::new(store.folder().clone(), 50_000);
        let left = ids(&plain.cursor().unwrap().collect_all().unwrap());
        assert_eq!(left, ids(&[Note::new("b"), Note::new("c")]));
    }

    #[test]
    fn test_cursor_bypasses_disabled_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache = HolderCache::<RecordBatch<Note>>::shared();
        let mut store = store_in(&temp_dir, 50_000).with_cache(cache.clone());
        store.add(Note::new("a")).unwrap();

        let mut cursor = store.cursor().unwrap();
        cache.borrow_mut().disable().unwrap();
        assert_eq!(cursor.collect_all().unwrap(), vec![Note::new("a")]);
        assert!(cache.borrow().is_empty());

        // written straight to disk, then the cache comes back
        store.add(Note::new("b")).unwrap();
        cache.borrow_mut().enable();
        store.add(Note::new("c")).unwrap();
        cache.borrow_mut().flush().unwrap();

        let plain = FileStore::<Note>::new(store.folder().clone(), 50_000);
        let all = ids(&plain.cursor().unwrap().collect_all().unwrap());
        assert_eq!(all, ids(&[Note::new("a"), Note::new("b"), Note::new("c")]));
    }

    #[test]
    fn test_open_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let tree = FolderTree::new(temp_dir.path());
        assert!(FileStore::<Note>::open(&tree, &FolderKey::from_parts(&["x"]), 50_000).is_none());
    }
}
