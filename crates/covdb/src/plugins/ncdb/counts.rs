//! Hit-count array codec
//!
//! Layout: `[mode u8][count varint][data]`. Mode 0 stores little-endian
//! `u32` values, mode 1 a varint stream. The smaller encoding wins; varint is
//! mandatory when any value exceeds `u32::MAX`.

use super::varint::{encode_varint, varint_len, ByteReader};
use crate::core::{CovError, Result};

/// Encoding chosen for a count array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    Uint32 = 0,
    Varint = 1,
}

impl CountMode {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CountMode::Uint32),
            1 => Some(CountMode::Varint),
            _ => None,
        }
    }
}

/// Pick the more compact mode for `counts`
pub fn choose_mode(counts: &[u64]) -> CountMode {
    if counts.iter().any(|c| *c > u64::from(u32::MAX)) {
        return CountMode::Varint;
    }
    let varint_size: usize = counts.iter().map(|c| varint_len(*c)).sum();
    if varint_size < counts.len() * 4 {
        CountMode::Varint
    } else {
        CountMode::Uint32
    }
}

pub fn encode_counts(counts: &[u64]) -> Vec<u8> {
    let mode = choose_mode(counts);
    let mut out = Vec::with_capacity(counts.len() + 6);
    out.push(mode as u8);
    encode_varint(counts.len() as u64, &mut out);
    match mode {
        CountMode::Uint32 => {
            for count in counts {
                // choose_mode only picks Uint32 when every value fits
                let value = u32::try_from(*count).unwrap_or(u32::MAX);
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        CountMode::Varint => {
            for count in counts {
                encode_varint(*count, &mut out);
            }
        }
    }
    out
}

pub fn decode_counts(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut reader = ByteReader::new(bytes, "counts.bin");
    let mode_byte = reader.byte()?;
    let mode = CountMode::from_byte(mode_byte).ok_or_else(|| {
        CovError::corrupt("counts.bin", format!("unknown count mode {}", mode_byte))
    })?;
    let count = reader.varint_usize()?;
    let mut counts = Vec::with_capacity(count.min(bytes.len()));
    match mode {
        CountMode::Uint32 => {
            for _ in 0..count {
                let raw = reader.bytes(4)?;
                counts.push(u64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])));
            }
        }
        CountMode::Varint => {
            for _ in 0..count {
                counts.push(reader.varint()?);
            }
        }
    }
    if !reader.is_at_end() {
        return Err(CovError::corrupt(
            "counts.bin",
            format!("{} trailing bytes", bytes.len() - reader.position()),
        ));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_counts_use_varint() {
        let counts = vec![0, 0, 1, 0, 3, 0, 0, 0];
        assert_eq!(choose_mode(&counts), CountMode::Varint);
        let bytes = encode_counts(&counts);
        assert_eq!(bytes[0], CountMode::Varint as u8);
        assert_eq!(decode_counts(&bytes).unwrap(), counts);
    }

    #[test]
    fn test_large_counts_use_fixed_width() {
        let counts = vec![0xF000_0000u64; 16];
        assert_eq!(choose_mode(&counts), CountMode::Uint32);
        let bytes = encode_counts(&counts);
        assert_eq!(bytes.len(), 1 + 1 + 16 * 4);
        assert_eq!(decode_counts(&bytes).unwrap(), counts);
    }

    #[test]
    fn test_wide_counts_force_varint() {
        let counts = vec![u64::from(u32::MAX) + 1, 7];
        assert_eq!(choose_mode(&counts), CountMode::Varint);
        assert_eq!(decode_counts(&encode_counts(&counts)).unwrap(), counts);
    }

    #[test]
    fn test_empty() {
        assert_eq!(decode_counts(&encode_counts(&[])).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn test_truncated_and_corrupt() {
        let bytes = encode_counts(&[0xF000_0000; 4]);
        assert!(matches!(
            decode_counts(&bytes[..bytes.len() - 1]),
            Err(CovError::TruncatedData { .. })
        ));
        assert!(matches!(decode_counts(&[9, 0]), Err(CovError::CorruptContainer { .. })));
        assert!(matches!(decode_counts(&[1, 1, 5, 5]), Err(CovError::CorruptContainer { .. })));
        assert!(matches!(decode_counts(&[]), Err(CovError::TruncatedData { .. })));
    }
}
