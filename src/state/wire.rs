//! Little-endian wire primitives
//!
//! Integers are little-endian, variable-length fields carry a u32 length
//! prefix. The reader bounds every length against the remaining buffer and
//! the configured limit before allocating.

use crate::error::{OfflineError, OfflineResult};

#[derive(Debug, Default)]
pub(crate) struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.put_u64(value.to_bits());
    }

    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Append `block` preceded by its length
    pub fn put_block(&mut self, block: WireWriter) {
        self.put_bytes(&block.buf);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    max_len: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8], max_len: usize) -> Self {
        Self { data, pos: 0, max_len }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, what: &str) -> OfflineResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(OfflineError::corrupt(format!(
                "truncated {}: need {} bytes, {} left",
                what,
                len,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn get_u8(&mut self, what: &str) -> OfflineResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn get_u32(&mut self, what: &str) -> OfflineResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn get_u64(&mut self, what: &str) -> OfflineResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn get_f64(&mut self, what: &str) -> OfflineResult<f64> {
        Ok(f64::from_bits(self.get_u64(what)?))
    }

    pub fn get_array32(&mut self, what: &str) -> OfflineResult<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32, what)?);
        Ok(out)
    }

    pub fn get_fixed(&mut self, len: usize, what: &str) -> OfflineResult<&'a [u8]> {
        self.take(len, what)
    }

    /// Length-prefixed bytes, bounded by the reader's limit
    pub fn get_bytes(&mut self, what: &str) -> OfflineResult<Vec<u8>> {
        let len = self.get_u32(what)? as usize;
        if len > self.max_len {
            return Err(OfflineError::corrupt(format!(
                "{} length {} exceeds limit of {}",
                what, len, self.max_len
            )));
        }
        Ok(self.take(len, what)?.to_vec())
    }

    pub fn get_str(&mut self, what: &str) -> OfflineResult<String> {
        let bytes = self.get_bytes(what)?;
        String::from_utf8(bytes).map_err(|_| OfflineError::corrupt(format!("{} is not UTF-8", what)))
    }

    /// Length-prefixed sub-block as its own reader
    pub fn get_block(&mut self, what: &str) -> OfflineResult<WireReader<'a>> {
        let len = self.get_u32(what)? as usize;
        let data = self.take(len, what)?;
        Ok(WireReader::new(data, self.max_len))
    }

    /// Element count, rejected when it cannot fit in the remaining bytes
    pub fn get_count(&mut self, what: &str, min_element_size: usize, limit: usize) -> OfflineResult<usize> {
        let count = self.get_u32(what)? as usize;
        if count > limit {
            return Err(OfflineError::corrupt(format!("{} count {} exceeds limit of {}", what, count, limit)));
        }
        if count.saturating_mul(min_element_size) > self.remaining() {
            return Err(OfflineError::corrupt(format!("truncated {}: {} entries declared", what, count)));
        }
        Ok(count)
    }

    pub fn finish(&self, what: &str) -> OfflineResult<()> {
        if !self.is_empty() {
            return Err(OfflineError::corrupt(format!(
                "{} trailing bytes after {}",
                self.remaining(),
                what
            )));
        }
        Ok(())
    }
}
