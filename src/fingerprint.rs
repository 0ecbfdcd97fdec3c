//! Content fingerprints.
//!
//! A record's primary key is the SHA-256 of its UTF-8 text, hex encoded.
//! Identical text always yields the same key, which is what makes a rerun
//! over the same corpus collapse into duplicates instead of new records.

use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// SHA-256 of `text`, lowercase hex.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// True if `id` has the shape of a fingerprint (64 lowercase hex chars).
pub fn is_fingerprint(id: &str) -> bool {
    id.len() == FINGERPRINT_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_vectors() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deterministic_and_well_formed() {
        for text in ["a", "Discurso inaugural", "ñandú", "多语言", "line\nbreak"] {
            let first = fingerprint(text);
            assert_eq!(first, fingerprint(text));
            assert!(is_fingerprint(&first), "bad fingerprint {first}");
        }
    }

    #[test]
    fn distinct_texts_distinct_ids() {
        let mut seen = HashSet::new();
        for i in 0..5_000u32 {
            let text = format!("documento {} {}", i, i.wrapping_mul(2_654_435_761));
            assert!(seen.insert(fingerprint(&text)), "collision at {i}");
        }
    }

    #[test]
    fn shape_check() {
        assert!(!is_fingerprint("ABC"));
        assert!(!is_fingerprint(&"A".repeat(64)));
        assert!(is_fingerprint(&"0f".repeat(32)));
    }
}
