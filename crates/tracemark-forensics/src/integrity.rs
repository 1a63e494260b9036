// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content fingerprinting — SHA-256 over raw document bytes.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a lowercase hex string.
///
/// This is the one fingerprint used across the workspace: it keys the
/// watermark event ledger, is bound into signed payloads as the
/// pre-watermark document hash, and drives hash-based resolution when an
/// artifact carries no extractable payload.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // Verified against coreutils sha256sum.
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_bytes(b"tracemark"),
            "023a823c8b981cf43116fb459026e40dfd09730aa5e813f5f6f1d319f1af502f"
        );
    }

    #[test]
    fn single_byte_change_changes_the_digest() {
        let a = hash_bytes(b"forensic watermark");
        let b = hash_bytes(b"forensic watermarl");
        assert_ne!(a, b);
        assert_eq!(a, "3c80868d74214f8d55cb1ed39a1151c3ba0dbdfa94443b25bb55d63495443c13");
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = hash_bytes(b"case check");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
