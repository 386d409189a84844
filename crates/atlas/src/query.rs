//! Spatial query cursor: records of every flagged cell, as one sequence.
//!
//! A [`SpatialCursor`] walks a [`DivisionMapCursor`] over the cells of a
//! position index and opens a [`FileStore`] on each cell folder in turn.
//! Cells without a folder hold no records and are skipped.
//!
//! The cursor yields every record stored in a flagged cell. Records in a cell
//! that only partly overlaps the query circle may lie outside it; callers that
//! need an exact circle filter by [`Coordinate::separation`](crate::sky::Coordinate::separation).
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_atlas::query::SpatialCursor;
//! use alopex_atlas::sky::{Coordinate, DivisionMap};
//! use alopex_atlas::store::Cursor;
//!
//! let mut map = DivisionMap::new();
//! map.fill(&Coordinate::from_hours(10.0, 20.0)?, 2.0);
//!
//! let mut cursor = SpatialCursor::<Star>::new(tree.subtree("by-position"), map, 50_000);
//! let mut star = cursor.first()?;
//! while let Some(s) = star {
//!     star = cursor.next()?;
//! }
//! ```

use crate::error::Result;
use crate::folder::FolderTree;
use crate::sky::{DivisionMap, DivisionMapCursor};
use crate::store::{Cursor, FileCursor, FileStore, Record, RecordStore, SharedHolderCache};
use tracing::trace;

/// Cursor over the records stored in the flagged cells of a [`DivisionMap`].
#[derive(Debug)]
pub struct SpatialCursor<R: Record> {
    tree: FolderTree,
    cells: DivisionMapCursor,
    current: Option<FileCursor<R>>,
    shard_budget: u64,
    cache: Option<SharedHolderCache<R::Holder>>,
    started: bool,
}

impl<R: Record> SpatialCursor<R> {
    /// Creates a cursor over the cells of `map` below the position index
    /// rooted at `tree`.
    pub fn new(tree: FolderTree, map: DivisionMap, shard_budget: u64) -> Self {
        Self {
            tree,
            cells: map.into_cursor(),
            current: None,
            shard_budget,
            cache: None,
            started: false,
        }
    }

    /// Reads shards through `cache` while it is enabled.
    pub fn with_cache(mut self, cache: SharedHolderCache<R::Holder>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The map being traversed.
    pub fn map(&self) -> &DivisionMap {
        self.cells.map()
    }

    /// Opens a record cursor on the next cell that has a folder.
    fn open_next_cell(&mut self, rewind: bool) -> Result<Option<FileCursor<R>>> {
        let mut key = if rewind {
            self.cells.first()
        } else {
            self.cells.next()
        };

        while let Some(folder_key) = key {
            match FileStore::<R>::open(&self.tree, &folder_key, self.shard_budget) {
                Some(store) => {
                    let store = match &self.cache {
                        Some(cache) => store.with_cache(cache.clone()),
                        None => store,
                    };
                    return Ok(Some(store.cursor()?));
                }
                None => {
                    trace!(cell = %folder_key, "no folder for cell, skipping");
                    key = self.cells.next();
                }
            }
        }
        Ok(None)
    }

    fn advance(&mut self, rewind: bool) -> Result<Option<R>> {
        let mut rewind = rewind;
        loop {
            if let Some(records) = self.current.as_mut() {
                if let Some(record) = records.next()? {
                    return Ok(Some(record));
                }
            }
            match self.open_next_cell(rewind)? {
                Some(records) => self.current = Some(records),
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
            rewind = false;
        }
    }
}

impl<R: Record> Cursor for SpatialCursor<R> {
    type Item = R;

    fn first(&mut self) -> Result<Option<R>> {
        self.current = None;
        self.started = true;
        self.advance(true)
    }

    fn next(&mut self) -> Result<Option<R>> {
        if !self.started {
            return self.first();
        }
        if self.current.is_none() && self.cells.current_index().is_none() {
            return Ok(None);
        }
        self.advance(false)
    }
}
