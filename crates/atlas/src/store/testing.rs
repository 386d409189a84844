//! Record type shared by the store unit tests.

use crate::error::Result;
use crate::store::codec::{put_str, ByteReader};
use crate::store::{Record, RecordBatch};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Note {
    pub id: String,
    pub text: String,
}

impl Note {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            text: format!("text of {id}"),
        }
    }

    /// A note whose text is `len` bytes long.
    pub fn sized(id: &str, len: usize) -> Self {
        Self {
            id: id.to_string(),
            text: "x".repeat(len),
        }
    }
}

impl Record for Note {
    const KIND: &'static str = "note";
    type Holder = RecordBatch<Note>;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode(&self, out: &mut Vec<u8>) {
        put_str(out, &self.id);
        put_str(out, &self.text);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let note = Note {
            id: reader.get_str()?,
            text: reader.get_str()?,
        };
        reader.finish()?;
        Ok(note)
    }
}
