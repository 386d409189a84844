//! In-memory record store over a single holder.

use crate::error::Result;
use crate::store::{Cursor, Holder, Record, RecordStore};
use std::collections::HashSet;

/// Record store backed by one in-memory holder.
///
/// Useful for building a batch before handing it to a file store, and as
/// the reference behavior of [`RecordStore`] in tests.
#[derive(Debug, Clone)]
pub struct MemoryStore<R: Record> {
    holder: R::Holder,
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryStore<R> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            holder: R::empty_holder(),
        }
    }

    /// Wraps an existing holder.
    pub fn from_holder(holder: R::Holder) -> Self {
        Self { holder }
    }

    /// The holder backing this store.
    pub fn holder(&self) -> &R::Holder {
        &self.holder
    }

    /// Consumes the store, returning its holder.
    pub fn into_holder(self) -> R::Holder {
        self.holder
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.holder.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.holder.is_empty()
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    type Cursor = MemoryCursor<R>;

    fn cursor(&self) -> Result<MemoryCursor<R>> {
        Ok(MemoryCursor {
            records: self.holder.records().to_vec(),
            position: 0,
        })
    }

    fn add(&mut self, record: R) -> Result<()> {
        self.holder.push(record);
        Ok(())
    }

    fn add_batch(&mut self, records: Vec<R>) -> Result<()> {
        self.holder.records_mut().extend(records);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<Option<R>> {
        let records = self.holder.records_mut();
        Ok(records
            .iter()
            .position(|r| r.id() == id)
            .map(|position| records.remove(position)))
    }

    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<Vec<R>> {
        Ok(self.holder.remove_ids(ids))
    }
}

/// Cursor over a snapshot of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryCursor<R> {
    records: Vec<R>,
    position: usize,
}

impl<R: Clone> Cursor for MemoryCursor<R> {
    type Item = R;

    fn first(&mut self) -> Result<Option<R>> {
        self.position = 0;
        self.next()
    }

    fn next(&mut self) -> Result<Option<R>> {
        let item = self.records.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::Note;

    #[test]
    fn test_crud() {
        let mut store = MemoryStore::<Note>::new();
        store.add(Note::new("a")).unwrap();
        store
            .add_batch(vec![Note::new("b"), Note::new("c")])
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("b").unwrap(), Some(Note::new("b")));

        assert_eq!(store.delete("b").unwrap(), Some(Note::new("b")));
        assert_eq!(store.delete("b").unwrap(), None);

        let ids: HashSet<String> = ["a".to_string(), "x".to_string()].into_iter().collect();
        assert_eq!(store.delete_many(&ids).unwrap(), vec![Note::new("a")]);
        assert_eq!(store.holder().records(), [Note::new("c")]);
    }

    #[test]
    fn test_cursor_restarts() {
        let mut store = MemoryStore::<Note>::new();
        store.add(Note::new("a")).unwrap();
        store.add(Note::new("b")).unwrap();

        let mut cursor = store.cursor().unwrap();
        assert_eq!(cursor.first().unwrap(), Some(Note::new("a")));
        assert_eq!(cursor.next().unwrap(), Some(Note::new("b")));
        assert_eq!(cursor.next().unwrap(), None);
        assert_eq!(cursor.next().unwrap(), None);
        assert_eq!(cursor.first().unwrap(), Some(Note::new("a")));
    }

    #[test]
    fn test_cursor_is_a_snapshot() {
        let mut store = MemoryStore::<Note>::new();
        store.add(Note::new("a")).unwrap();
        let mut cursor = store.cursor().unwrap();
        store.add(Note::new("b")).unwrap();
        assert_eq!(cursor.collect_all().unwrap(), vec![Note::new("a")]);
    }

    #[test]
    fn test_set_on_missing_inserts() {
        let mut store = MemoryStore::<Note>::new();
        assert_eq!(store.set(Note::new("a")).unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
