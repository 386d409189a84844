//! Shard file format and the standard record holder.
//!
//! A shard file holds exactly one [`RecordBatch`]. Shards in a folder are
//! named `1`, `2`, `3`, ... and are always rewritten whole.
//!
//! ## File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Magic: "ASHD" (4 bytes)                     │
//! │  Version: u16 (2 bytes) = 1                  │
//! │  Kind length: u16 (2 bytes)                  │
//! │  Kind tag: UTF-8 (N bytes)                   │
//! │  Record count: u32 (4 bytes)                 │
//! ├─────────────────────────────────────────────┤
//! │  Records (repeated)                          │
//! │  - Payload length: u32 (4 bytes)             │
//! │  - Payload (M bytes)                         │
//! ├─────────────────────────────────────────────┤
//! │  CRC32 of all preceding bytes (4 bytes)      │
//! └─────────────────────────────────────────────┘
//! ```

use crate::error::{AtlasError, Result};
use crate::store::codec::{put_u32, ByteReader};
use crate::store::{Holder, Record};

/// Magic bytes at the start of every shard file: "ASHD".
pub const SHARD_MAGIC: [u8; 4] = *b"ASHD";

/// Current shard file format version.
pub const SHARD_VERSION: u16 = 1;

/// Smallest possible shard: magic, version, kind length, count and CRC.
const MIN_SHARD_SIZE: usize = 4 + 2 + 2 + 4 + 4;

/// Ordered batch of records of one kind, persisted as one shard file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch<R> {
    records: Vec<R>,
}

impl<R> Default for RecordBatch<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R> RecordBatch<R> {
    /// Creates a batch holding `records`.
    pub fn from_records(records: Vec<R>) -> Self {
        Self { records }
    }
}

impl<R: Record<Holder = RecordBatch<R>>> Holder for RecordBatch<R> {
    type Record = R;

    fn records(&self) -> &[R] {
        &self.records
    }

    fn records_mut(&mut self) -> &mut Vec<R> {
        &mut self.records
    }

    fn into_records(self) -> Vec<R> {
        self.records
    }

    fn to_bytes(&self) -> Vec<u8> {
        let kind = R::KIND.as_bytes();
        let mut out = Vec::with_capacity(MIN_SHARD_SIZE + kind.len() + self.records.len() * 64);

        out.extend_from_slice(&SHARD_MAGIC);
        out.extend_from_slice(&SHARD_VERSION.to_le_bytes());
        out.extend_from_slice(&(kind.len() as u16).to_le_bytes());
        out.extend_from_slice(kind);
        put_u32(&mut out, self.records.len() as u32);

        for record in &self.records {
            let len_at = out.len();
            put_u32(&mut out, 0);
            record.encode(&mut out);
            let payload_len = (out.len() - len_at - 4) as u32;
            out[len_at..len_at + 4].copy_from_slice(&payload_len.to_le_bytes());
        }

        let crc = crc32fast::hash(&out);
        put_u32(&mut out, crc);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_SHARD_SIZE {
            return Err(AtlasError::DecodeError(format!(
                "shard too short: {} bytes",
                bytes.len()
            )));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        if magic != SHARD_MAGIC {
            return Err(AtlasError::InvalidMagic(magic));
        }

        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(crc_bytes);
        let expected = u32::from_le_bytes(stored);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(AtlasError::ChecksumMismatch { expected, actual });
        }

        let mut reader = ByteReader::new(&body[4..]);
        let version = reader.get_u16()?;
        if version != SHARD_VERSION {
            return Err(AtlasError::UnsupportedVersion(version));
        }

        let kind_len = reader.get_u16()? as usize;
        let kind = reader.take(kind_len)?;
        if kind != R::KIND.as_bytes() {
            return Err(AtlasError::KindMismatch {
                expected: R::KIND,
                actual: String::from_utf8_lossy(kind).into_owned(),
            });
        }

        let count = reader.get_u32()? as usize;
        let mut records = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            let payload = reader.get_bytes()?;
            records.push(R::decode(payload)?);
        }
        reader.finish()?;

        Ok(Self { records })
    }
}

/// Name of the shard file with sequence number `number`.
pub fn shard_name(number: u64) -> String {
    number.to_string()
}

/// Parses a shard file name; only positive integers without leading zeros
/// name shards.
pub fn parse_shard_name(name: &str) -> Option<u64> {
    if name.is_empty() || name.starts_with('0') || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::Note;

    #[derive(Debug, Clone)]
    struct Other;

    impl Record for Other {
        const KIND: &'static str = "other";
        type Holder = RecordBatch<Other>;

        fn id(&self) -> &str {
            "other"
        }

        fn encode(&self, _out: &mut Vec<u8>) {}

        fn decode(_bytes: &[u8]) -> Result<Self> {
            Ok(Other)
        }
    }

    fn note(id: &str) -> Note {
        Note::new(id)
    }

    #[test]
    fn test_batch_bytes_read_back() {
        let batch = RecordBatch::from_records(vec![note("a"), note("b"), note("c")]);
        let bytes = batch.to_bytes();
        assert_eq!(&bytes[..4], b"ASHD");
        let decoded = RecordBatch::<Note>::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_empty_batch_is_valid_shard() {
        let bytes = Note::empty_holder().to_bytes();
        let decoded = RecordBatch::<Note>::from_bytes(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_corrupted_shard_fails_checksum() {
        let mut bytes = RecordBatch::from_records(vec![note("a")]).to_bytes();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        assert!(matches!(
            RecordBatch::<Note>::from_bytes(&bytes),
            Err(AtlasError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = RecordBatch::from_records(vec![note("a")]).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            RecordBatch::<Note>::from_bytes(&bytes),
            Err(AtlasError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let bytes = RecordBatch::from_records(vec![Other]).to_bytes();
        match RecordBatch::<Note>::from_bytes(&bytes) {
            Err(AtlasError::KindMismatch { expected, actual }) => {
                assert_eq!(expected, "note");
                assert_eq!(actual, "other");
            }
            other => panic!("expected KindMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_ids() {
        let mut batch = RecordBatch::from_records(vec![note("a"), note("b"), note("c")]);
        let ids = ["a".to_string(), "c".to_string()].into_iter().collect();
        let removed = batch.remove_ids(&ids);
        assert_eq!(removed, vec![note("a"), note("c")]);
        assert_eq!(batch.records(), [note("b")]);
    }

    #[test]
    fn test_shard_names() {
        assert_eq!(shard_name(12), "12");
        assert_eq!(parse_shard_name("12"), Some(12));
        assert_eq!(parse_shard_name("0"), None);
        assert_eq!(parse_shard_name("012"), None);
        assert_eq!(parse_shard_name("3.tmp"), None);
        assert_eq!(parse_shard_name(""), None);
    }
}
