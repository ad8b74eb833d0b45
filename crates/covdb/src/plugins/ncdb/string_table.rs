//! Deduplicated string pool
//!
//! Layout: `[count varint]` then, per string, `[byte length varint][utf-8 bytes]`.

use std::collections::HashMap;

use super::varint::{encode_varint, ByteReader};
use crate::core::{CovError, Result};

/// Append-only pool mapping strings to stable indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, adding it if it is new
    pub fn add(&mut self, s: &str) -> u32 {
        if let Some(index) = self.index.get(s) {
            return *index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), index);
        index
    }

    /// Like [`StringTable::add`], storing `None` as the empty string
    pub fn add_opt(&mut self, s: Option<&str>) -> u32 {
        self.add(s.unwrap_or(""))
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Like [`StringTable::get`], failing on a bad reference
    pub fn resolve(&self, index: u64) -> Result<&str> {
        u32::try_from(index)
            .ok()
            .and_then(|i| self.get(i))
            .ok_or_else(|| {
                CovError::corrupt(
                    "string table",
                    format!("string index {} out of range (0..{})", index, self.strings.len()),
                )
            })
    }

    pub fn lookup(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Append the serialized table to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        encode_varint(self.strings.len() as u64, out);
        for s in &self.strings {
            encode_varint(s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// Read a table from the front of `reader`
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.varint_usize()?;
        let mut table = Self::new();
        for _ in 0..count {
            let len = reader.varint_usize()?;
            let at = reader.position();
            let bytes = reader.bytes(len)?;
            let s = std::str::from_utf8(bytes).map_err(|e| {
                CovError::corrupt("string table", format!("invalid utf-8 at offset {}: {}", at, e))
            })?;
            let index = table.strings.len() as u32;
            table.strings.push(s.to_string());
            table.index.entry(s.to_string()).or_insert(index);
        }
        Ok(table)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut ByteReader::new(bytes, "string table"))
    }
}
