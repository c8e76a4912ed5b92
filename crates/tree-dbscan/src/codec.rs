//! Little-endian helpers shared by the wire payload codecs.

use crate::{Result, TdbscanError};

/// Reads fixed-width values from a byte slice, advancing an offset.
pub(crate) struct ByteReader<'a> {
    /// The bytes being read.
    bytes: &'a [u8],
    /// The position of the next unread byte.
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `bytes`.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Reads the next `N` bytes.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.offset + N;
        let slice = self.bytes.get(self.offset..end).ok_or_else(|| {
            TdbscanError::Codec(format!(
                "Payload truncated: needed {N} bytes at offset {} of {}",
                self.offset,
                self.bytes.len()
            ))
        })?;
        self.offset = end;
        slice
            .try_into()
            .map_err(|e| TdbscanError::Codec(format!("Could not convert slice into array: {e:?}")))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(TdbscanError::Codec(format!("Invalid boolean byte {b}"))),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Reads a non-negative `i32` length.
    pub fn read_len(&mut self, what: &str) -> Result<usize> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| TdbscanError::Codec(format!("Negative {what}: {len}")))
    }

    /// Reads a non-negative `i64` count.
    pub fn read_count(&mut self, what: &str) -> Result<u64> {
        let count = self.read_i64()?;
        u64::try_from(count).map_err(|_| TdbscanError::Codec(format!("Negative {what}: {count}")))
    }

    /// Reads `n` `f64`s.
    pub fn read_f64s(&mut self, n: usize) -> Result<Vec<f64>> {
        self.check_remaining(n, 8)?;
        (0..n).map(|_| self.read_f64()).collect()
    }

    /// Reads a string prefixed with its `u32` length.
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let end = self.offset + len;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| TdbscanError::Codec(format!("String of length {len} is truncated")))?;
        self.offset = end;
        String::from_utf8(slice.to_vec()).map_err(|e| TdbscanError::Codec(e.to_string()))
    }

    /// Fails early if fewer than `n * width` bytes remain, so that a corrupt
    /// length cannot trigger a huge allocation.
    pub fn check_remaining(&self, n: usize, width: usize) -> Result<()> {
        let needed = n.checked_mul(width).ok_or_else(|| TdbscanError::Codec("Length overflow".to_string()))?;
        if needed > self.remaining() {
            Err(TdbscanError::Codec(format!(
                "Payload declares {n} values of {width} bytes but only {} bytes remain",
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    /// The number of unread bytes.
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Fails if any bytes are left unread.
    pub fn finish(self) -> Result<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(TdbscanError::Codec(format!("{} trailing bytes in payload", self.remaining())))
        }
    }
}

pub(crate) fn put_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

pub(crate) fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_f64s(buf: &mut Vec<u8>, values: &[f64]) {
    buf.extend(values.iter().flat_map(|v| v.to_le_bytes()));
}

/// Writes a string prefixed with its `u32` length.
pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u32::try_from(s.len()).map_err(|_| TdbscanError::Codec("String too long".to_string()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{put_bool, put_f64s, put_i32, put_str, ByteReader};

    #[test]
    fn reads_what_was_written() -> Result<(), String> {
        let mut buf = Vec::new();
        put_i32(&mut buf, -7);
        put_bool(&mut buf, true);
        put_str(&mut buf, "hull").map_err(|e| e.to_string())?;
        put_f64s(&mut buf, &[1.5, -2.0]);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_i32().map_err(|e| e.to_string())?, -7);
        assert!(reader.read_bool().map_err(|e| e.to_string())?);
        assert_eq!(reader.read_str().map_err(|e| e.to_string())?, "hull");
        assert_eq!(reader.read_f64s(2).map_err(|e| e.to_string())?, vec![1.5, -2.0]);
        reader.finish().map_err(|e| e.to_string())
    }

    #[test]
    fn truncation_is_an_error() {
        let mut buf = Vec::new();
        put_i32(&mut buf, 3);
        let mut reader = ByteReader::new(&buf[..2]);
        assert!(reader.read_i32().is_err());

        let reader = ByteReader::new(&buf);
        assert!(reader.check_remaining(usize::MAX, 8).is_err());
        assert!(ByteReader::new(&buf).finish().is_err());
    }

    #[test]
    fn negative_lengths_are_rejected() {
        let mut buf = Vec::new();
        put_i32(&mut buf, -1);
        assert!(ByteReader::new(&buf).read_len("point count").is_err());
    }
}
