//! Byte packing for persisted arrays.
//!
//! Integers pack either as raw little-endian `u32`s or, when compression is
//! requested, as a varint count followed by zigzag-varint deltas. Doubles
//! always pack as raw little-endian bits. Both integer encodings carry their
//! element count so decoding needs no out-of-band length.

use crate::errors::{ForestError, Result};

fn push_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], position: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes
            .get(*position)
            .ok_or_else(|| ForestError::CacheState("truncated varint in packed state".into()))?;
        *position += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(ForestError::CacheState("varint overflow in packed state".into()));
        }
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Pack `values` into bytes; `compressed` selects delta+zigzag varints.
pub fn pack_u32s(values: &[u32], compressed: bool) -> Vec<u8> {
    if !compressed {
        let mut out = Vec::with_capacity(values.len() * 4);
        for &v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        return out;
    }
    let mut out = Vec::new();
    push_varint(&mut out, values.len() as u64);
    let mut previous = 0i64;
    for &v in values {
        let current = i64::from(v);
        push_varint(&mut out, zigzag(current - previous));
        previous = current;
    }
    out
}

/// Inverse of [`pack_u32s`].
pub fn unpack_u32s(bytes: &[u8], compressed: bool) -> Result<Vec<u32>> {
    if !compressed {
        if bytes.len() % 4 != 0 {
            return Err(ForestError::CacheState(
                "raw u32 payload is not a multiple of 4 bytes".into(),
            ));
        }
        return Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect());
    }
    let mut position = 0usize;
    let count = read_varint(bytes, &mut position)? as usize;
    let mut out = Vec::with_capacity(count);
    let mut previous = 0i64;
    for _ in 0..count {
        let delta = unzigzag(read_varint(bytes, &mut position)?);
        let current = previous + delta;
        let value = u32::try_from(current)
            .map_err(|_| ForestError::CacheState("packed value out of u32 range".into()))?;
        out.push(value);
        previous = current;
    }
    if position != bytes.len() {
        return Err(ForestError::CacheState(
            "trailing bytes after packed u32 payload".into(),
        ));
    }
    Ok(out)
}

/// Pack doubles as raw little-endian bits.
pub fn pack_f64s(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for &v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Inverse of [`pack_f64s`].
pub fn unpack_f64s(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(ForestError::CacheState(
            "raw f64 payload is not a multiple of 8 bytes".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_round_trip_raw_and_compressed() {
        let values = vec![0, 1, 7, 7, 1000, u32::MAX, 3];
        for compressed in [false, true] {
            let packed = pack_u32s(&values, compressed);
            assert_eq!(unpack_u32s(&packed, compressed).unwrap(), values);
        }
    }

    #[test]
    fn test_compression_helps_on_monotone_runs() {
        let values: Vec<u32> = (0..1000u32).map(|i| i * 2).collect();
        let raw = pack_u32s(&values, false);
        let compressed = pack_u32s(&values, true);
        assert!(compressed.len() < raw.len() / 2);
    }

    #[test]
    fn test_f64_round_trip_preserves_bits() {
        let values = vec![0.0, -0.0, 1.5, f64::MIN_POSITIVE, -123.456e300];
        let packed = pack_f64s(&values);
        let unpacked = unpack_f64s(&packed).unwrap();
        for (a, b) in values.iter().zip(unpacked.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_truncated_payloads_error() {
        let packed = pack_u32s(&[1, 2, 3], true);
        assert!(unpack_u32s(&packed[..packed.len() - 1], true).is_err());
        assert!(unpack_f64s(&[0u8; 7]).is_err());
    }
}
