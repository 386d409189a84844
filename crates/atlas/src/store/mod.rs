//! Record stores: per-folder CRUD over homogeneous records.
//!
//! # Components
//!
//! - [`Record`] / [`Holder`]: capability traits for stored values and the
//!   batches they are persisted in
//! - [`RecordStore`]: the store contract, implemented by [`FileStore`]
//!   (sharded files under one folder) and [`MemoryStore`] (one in-memory holder)
//! - [`Cursor`]: restartable single-pass iteration over a store's records
//! - [`HolderCache`]: optional write-back cache in front of file stores
//!
//! Lookups by ID scan the folder. Folders stay small because records are
//! bucketed by name, position or date before they reach a store.

pub mod cache;
pub mod codec;
pub mod file;
pub mod memory;
pub mod shard;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{HolderCache, SharedHolderCache};
pub use file::{FileCursor, FileStore};
pub use memory::{MemoryCursor, MemoryStore};
pub use shard::RecordBatch;

use crate::error::Result;
use std::collections::HashSet;
use std::fmt;

/// A stored value with a stable string identity.
pub trait Record: Clone + fmt::Debug + Sized {
    /// Kind tag written into every shard holding this record type.
    const KIND: &'static str;

    /// The batch type records of this kind are persisted in.
    type Holder: Holder<Record = Self>;

    /// Stable identity of this record.
    fn id(&self) -> &str;

    /// Appends the encoded form of this record to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes one record from `bytes`.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Creates an empty holder for this kind of record.
    fn empty_holder() -> Self::Holder {
        Self::Holder::default()
    }
}

/// An ordered batch of same-kind records; the unit of storage.
pub trait Holder: Default + Clone + fmt::Debug {
    /// Record type held.
    type Record: Record;

    /// Records in insertion order.
    fn records(&self) -> &[Self::Record];

    /// Mutable access to the records.
    fn records_mut(&mut self) -> &mut Vec<Self::Record>;

    /// Consumes the holder, returning its records.
    fn into_records(self) -> Vec<Self::Record>;

    /// Serializes the holder into its self-describing byte form.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserializes a holder written by [`Holder::to_bytes`].
    fn from_bytes(bytes: &[u8]) -> Result<Self>;

    /// Number of records held.
    fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns true if the holder has no records.
    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Appends a record.
    fn push(&mut self, record: Self::Record) {
        self.records_mut().push(record);
    }

    /// Removes every record whose ID is in `ids`, returning them in order.
    fn remove_ids(&mut self, ids: &HashSet<String>) -> Vec<Self::Record> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(self.records_mut())
            .into_iter()
            .partition(|record| ids.contains(record.id()));
        *self.records_mut() = kept;
        removed
    }
}

/// Restartable, single-pass iteration.
///
/// `first` rewinds and returns the first item; `next` returns the following
/// one. Both return `Ok(None)` once the sequence is exhausted.
pub trait Cursor {
    /// Item yielded.
    type Item;

    /// Rewinds and returns the first item.
    fn first(&mut self) -> Result<Option<Self::Item>>;

    /// Returns the next item.
    fn next(&mut self) -> Result<Option<Self::Item>>;

    /// Rewinds and collects every item.
    fn collect_all(&mut self) -> Result<Vec<Self::Item>> {
        let mut items = Vec::new();
        let mut item = self.first()?;
        while let Some(value) = item {
            items.push(value);
            item = self.next()?;
        }
        Ok(items)
    }
}

/// CRUD over the records of one folder (or one in-memory holder).
///
/// An ID that is not present is a normal outcome (`None`), never an error.
pub trait RecordStore<R: Record> {
    /// Cursor type returned by [`RecordStore::cursor`].
    type Cursor: Cursor<Item = R>;

    /// Returns a fresh cursor over the current contents.
    fn cursor(&self) -> Result<Self::Cursor>;

    /// Appends one record.
    fn add(&mut self, record: R) -> Result<()>;

    /// Writes all `records` together as one new holder.
    fn add_batch(&mut self, records: Vec<R>) -> Result<()>;

    /// Removes the record with `id`, returning it.
    fn delete(&mut self, id: &str) -> Result<Option<R>>;

    /// Removes every record whose ID is in `ids`, returning the removed records.
    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<Vec<R>>;

    /// Finds the record with `id` by scanning the store.
    fn get(&self, id: &str) -> Result<Option<R>> {
        let mut cursor = self.cursor()?;
        let mut record = cursor.first()?;
        while let Some(candidate) = record {
            if candidate.id() == id {
                return Ok(Some(candidate));
            }
            record = cursor.next()?;
        }
        Ok(None)
    }

    /// Replaces the record with the same ID (or inserts it), returning the
    /// previous record.
    fn set(&mut self, record: R) -> Result<Option<R>> {
        let previous = self.delete(record.id())?;
        self.add(record)?;
        Ok(previous)
    }
}
