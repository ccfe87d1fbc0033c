//! Content hashing for best-effort deduplication
//!
//! Unlike `std::collections::hash_map::DefaultHasher`, which is randomly
//! keyed per process, FNV-1a produces the same output for the same input
//! across runs and platforms, so dedup decisions are reproducible. The hash
//! is cheap and non-cryptographic by design: a collision merely drops one
//! extra record, and dedup is best-effort rather than integrity-critical.

use crate::model::RawLogMessage;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over a byte slice.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Order-sensitive content hash of a record's serialized form.
pub fn content_hash(msg: &RawLogMessage) -> u32 {
    fnv1a_32(msg.serialized().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deterministic() {
        assert_eq!(fnv1a_32(b"hello"), fnv1a_32(b"hello"));
        assert_ne!(fnv1a_32(b"hello"), fnv1a_32(b"hellp"));
        // Order-sensitive.
        assert_ne!(fnv1a_32(b"ab"), fnv1a_32(b"ba"));
    }

    #[test]
    fn test_content_hash_tracks_record_content() {
        let a = RawLogMessage::from_value(json!({"time": 1, "x": "y"}));
        let b = RawLogMessage::from_value(json!({"time": 1, "x": "y"}));
        let c = RawLogMessage::from_value(json!({"time": 2, "x": "y"}));
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
    }
}
