//! Unsigned LEB128 variable-length integers
//!
//! Seven payload bits per byte, least-significant group first, high bit set
//! on every byte except the last.

use crate::core::{CovError, Result};

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Append the encoding of `value` to `out`
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Encoding of `value` as a fresh buffer
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_len(value));
    encode_varint(value, &mut out);
    out
}

/// Number of bytes `value` encodes to
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Decode one varint at `offset`, returning the value and the bytes consumed
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut pos = offset;
    loop {
        let byte = *buf
            .get(pos)
            .ok_or_else(|| CovError::truncated("varint", pos))?;
        let payload = u64::from(byte & 0x7F);
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(CovError::corrupt("varint", format!("value overflows 64 bits at offset {}", offset)));
        }
        value |= payload << shift;
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((value, pos - offset));
        }
        shift += 7;
    }
}

/// Zigzag-encode a signed value
pub fn encode_signed(value: i64, out: &mut Vec<u8>) {
    encode_varint(((value << 1) ^ (value >> 63)) as u64, out);
}

/// Decode a zigzag-encoded signed value
pub fn decode_signed(buf: &[u8], offset: usize) -> Result<(i64, usize)> {
    let (raw, used) = decode_varint(buf, offset)?;
    Ok((((raw >> 1) as i64) ^ -((raw & 1) as i64), used))
}

/// Encode a sequence of values back to back
pub fn encode_varints(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        encode_varint(*value, &mut out);
    }
    out
}

/// Decode `count` consecutive varints starting at `offset`
///
/// Returns the values and the offset just past the last one.
pub fn decode_varints(buf: &[u8], count: usize, offset: usize) -> Result<(Vec<u64>, usize)> {
    let mut values = Vec::with_capacity(count.min(buf.len()));
    let mut pos = offset;
    for _ in 0..count {
        let (value, used) = decode_varint(buf, pos)?;
        values.push(value);
        pos += used;
    }
    Ok((values, pos))
}

/// Sequential reader over an encoded buffer
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, pos: 0, context }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| CovError::truncated(self.context, self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| CovError::truncated(self.context, self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn varint(&mut self) -> Result<u64> {
        let (value, used) = decode_varint(self.buf, self.pos).map_err(|e| self.retag(e))?;
        self.pos += used;
        Ok(value)
    }

    pub fn signed(&mut self) -> Result<i64> {
        let (value, used) = decode_signed(self.buf, self.pos).map_err(|e| self.retag(e))?;
        self.pos += used;
        Ok(value)
    }

    /// Varint that must fit a `u32`
    pub fn varint_u32(&mut self) -> Result<u32> {
        let at = self.pos;
        let value = self.varint()?;
        u32::try_from(value).map_err(|_| {
            CovError::corrupt(self.context, format!("value {} at offset {} exceeds 32 bits", value, at))
        })
    }

    /// Varint used as a length or index
    pub fn varint_usize(&mut self) -> Result<usize> {
        let at = self.pos;
        let value = self.varint()?;
        usize::try_from(value).map_err(|_| {
            CovError::corrupt(self.context, format!("length {} at offset {} is too large", value, at))
        })
    }

    fn retag(&self, error: CovError) -> CovError {
        match error {
            CovError::TruncatedData { offset, .. } => CovError::truncated(self.context, offset),
            CovError::CorruptContainer { message, .. } => CovError::corrupt(self.context, message),
            other => other,
        }
    }
}
