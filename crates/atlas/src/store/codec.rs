//! Little-endian field encoding for record payloads.
//!
//! Writers append to a `Vec<u8>`; [`ByteReader`] reads the same fields back
//! and reports truncated or malformed input as `DecodeError`.

use crate::error::{AtlasError, Result};

/// Appends a `u32`.
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends an `i64`.
pub fn put_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends an `f64`.
pub fn put_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a length-prefixed UTF-8 string.
pub fn put_str(out: &mut Vec<u8>, value: &str) {
    put_bytes(out, value.as_bytes());
}

/// Appends length-prefixed raw bytes.
pub fn put_bytes(out: &mut Vec<u8>, value: &[u8]) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value);
}

/// Appends an optional string as a presence byte plus the string.
pub fn put_opt_str(out: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) => {
            out.push(1);
            put_str(out, value);
        }
        None => out.push(0),
    }
}

/// Sequential reader over an encoded payload.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes exactly `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(AtlasError::DecodeError(format!(
                "truncated input: need {len} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads a `u16`.
    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Reads a `u32`.
    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Reads an `i64`.
    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Reads an `f64`.
    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Reads length-prefixed raw bytes.
    pub fn get_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_str(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| AtlasError::DecodeError(format!("invalid UTF-8: {err}")))
    }

    /// Reads an optional string written by [`put_opt_str`].
    pub fn get_opt_str(&mut self) -> Result<Option<String>> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => self.get_str().map(Some),
            flag => Err(AtlasError::DecodeError(format!(
                "invalid presence flag {flag}"
            ))),
        }
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(AtlasError::DecodeError(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_read_back_in_order() {
        let mut buf = Vec::new();
        put_str(&mut buf, "HD 12345");
        put_f64(&mut buf, -1.25);
        put_i64(&mut buf, 1_700_000_000);
        put_opt_str(&mut buf, None);
        put_opt_str(&mut buf, Some("M31"));

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.get_str().unwrap(), "HD 12345");
        assert_eq!(reader.get_f64().unwrap(), -1.25);
        assert_eq!(reader.get_i64().unwrap(), 1_700_000_000);
        assert_eq!(reader.get_opt_str().unwrap(), None);
        assert_eq!(reader.get_opt_str().unwrap().as_deref(), Some("M31"));
        reader.finish().unwrap();
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let mut buf = Vec::new();
        put_str(&mut buf, "Vega");
        buf.truncate(buf.len() - 1);
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(reader.get_str(), Err(AtlasError::DecodeError(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let buf = [0u8; 3];
        let mut reader = ByteReader::new(&buf);
        reader.get_u8().unwrap();
        assert!(reader.finish().is_err());
    }
}
