//! Error and Result types for Atlas store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for Atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// The error type for Atlas store operations.
///
/// A record or folder that does not exist is not an error: lookups return
/// `Option`/empty collections instead.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Invalid magic bytes in a shard file header.
    #[error("Invalid magic bytes: expected ASHD, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported shard file format version.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Shard checksum does not match the stored value.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Stored CRC32 checksum.
        expected: u32,
        /// Computed CRC32 checksum.
        actual: u32,
    },

    /// Shard holds records of a different kind than the store expects.
    #[error("Record kind mismatch: expected {expected}, found {actual}")]
    KindMismatch {
        /// Kind tag the store was opened for.
        expected: &'static str,
        /// Kind tag found in the shard.
        actual: String,
    },

    /// A record payload could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// A hierarchical folder that must exist was not found.
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// Coordinate components are out of range or unparsable.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// The named index is not registered with the coordinator.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// A multi-index operation failed after some indices were already updated.
    ///
    /// Indices listed in `applied` keep their new state; nothing is rolled back.
    /// Re-running the same operation for the same record is safe.
    #[error(
        "{operation} of {record_id} failed on index {failed_index} \
         (already applied: {applied:?}): {source}"
    )]
    PartialIndexFailure {
        /// Coordinator operation (`add`, `delete`, ...).
        operation: &'static str,
        /// ID of the record being written.
        record_id: String,
        /// Index whose store operation failed.
        failed_index: &'static str,
        /// Indices that completed before the failure.
        applied: Vec<&'static str>,
        /// Underlying store error.
        #[source]
        source: Box<AtlasError>,
    },
}
