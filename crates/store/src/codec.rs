//! Binary vector encoding: little-endian IEEE-754 f32, length implicit from
//! the byte length.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("vector blob length {len} is not a multiple of 4")]
pub struct CorruptVector {
    pub len: usize,
}

/// Encode a vector as little-endian f32 bytes. Zero-length vectors encode to
/// zero bytes.
#[must_use]
pub fn encode_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vec));
    for &value in vec {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a vector.
pub fn decode_vector(blob: &[u8]) -> Result<Vec<f32>, CorruptVector> {
    if blob.len() % 4 != 0 {
        return Err(CorruptVector { len: blob.len() });
    }
    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}
