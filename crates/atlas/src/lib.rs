//! Atlas - Alopex sky-partitioned record store
//!
//! This crate provides an embedded store for astronomical records: a fixed
//! grid over the celestial sphere, flat-file record stores sharded under a
//! byte budget, lazy cursors composing the two, and catalogs that mirror the
//! same record under several independently keyed indices.
//!
//! # Components
//!
//! - [`sky::DivisionMap`]: which of the 25,920 sky cells a query touches
//! - [`store::FileStore`] / [`store::MemoryStore`]: per-folder record CRUD
//! - [`query::SpatialCursor`]: records of every flagged cell as one sequence
//! - [`index::MultiIndex`]: one record, many index roots
//! - [`StarCatalog`] / [`ImageCatalog`]: ready-made catalogs
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_atlas::{Coordinate, StarCatalog, StarRecord, StoreConfig};
//!
//! let catalog = StarCatalog::new(StoreConfig::new("/data/atlas"));
//! catalog.add(&StarRecord::new(
//!     "HD 12345",
//!     Coordinate::parse("10:00:00 +20:00:00")?,
//!     7.1,
//!     "HD",
//! ))?;
//!
//! // Exact cone search, nearest first
//! for star in catalog.stars_within(&Coordinate::from_hours(10.0, 20.0)?, 2.0)? {
//!     println!("{} {}", star.name, star.position);
//! }
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod folder;
pub mod index;
pub mod query;
pub mod sky;
pub mod store;

pub use config::StoreConfig;
pub use error::{AtlasError, Result};
pub use folder::{Folder, FolderKey, FolderTree};
pub use index::{ImageCatalog, ImageRecord, IndexSpec, MultiIndex, StarCatalog, StarRecord};
pub use query::SpatialCursor;
pub use sky::{Coordinate, DivisionMap, DivisionMapCursor};
pub use store::{Cursor, FileStore, Holder, MemoryStore, Record, RecordBatch, RecordStore};
