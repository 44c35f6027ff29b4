//! Canonical serialization for deterministic hashing.
//!
//! This module provides functions to serialize data in a canonical,
//! deterministic format suitable for hashing and commitment construction.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data
//! - Stable coordinate format: quantized coordinates serialize as integers
//!   scaled by a fixed precision, never as floats

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

use crate::LEAF_COORD_PRECISION;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// This function produces deterministic output for the same input,
/// suitable for hash computation and replay verification.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Compute the SHA-256 digest of a byte slice.
pub fn sha256_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Compute the SHA-256 digest and return as 64-char lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256_digest(bytes))
}

/// Quantize a coordinate to the fixed leaf precision.
///
/// The result is an integer count of 10^-7 degree units. Quantized
/// coordinates are what the leaf encoding serializes, so two builds that
/// disagree only below the seventh decimal place commit to the same leaf.
pub fn quantize_coord(value: f64) -> i64 {
    let scale = 10_f64.powi(LEAF_COORD_PRECISION as i32);
    (value * scale).round() as i64
}

/// Inverse of [`quantize_coord`], for rendering quantized coordinates.
pub fn dequantize_coord(value: i64) -> f64 {
    let scale = 10_f64.powi(LEAF_COORD_PRECISION as i32);
    value as f64 / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let s = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let h1 = canonical_hash(&s);
        let h2 = canonical_hash(&s);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_sha256_hex_shape() {
        let h = sha256_hex(b"boundary");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_quantize_roundtrip_at_precision() {
        // A coordinate already at 7 decimals survives quantization exactly.
        let lon = -89.4012345;
        let q = quantize_coord(lon);
        assert_eq!(q, -894012345);
        assert!((dequantize_coord(q) - lon).abs() < 1e-12);
    }

    #[test]
    fn test_quantize_collapses_sub_precision_noise() {
        let a = quantize_coord(43.07393000001);
        let b = quantize_coord(43.07393000002);
        assert_eq!(a, b);
    }
}
