// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints.

use sha2::{Digest, Sha256};

/// Hex characters kept from a key fingerprint (64 bits).
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short public identifier for secret key bytes.
///
/// Embedded in sealed payloads so a mismatched key is detected without
/// revealing anything usable about the key itself.
pub fn fingerprint(secret: &[u8]) -> String {
    let mut digest = hash_bytes(secret);
    digest.truncate(FINGERPRINT_HEX_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn fingerprint_is_hash_prefix() {
        let fp = fingerprint(b"");
        assert_eq!(fp.len(), FINGERPRINT_HEX_LEN);
        assert!(EMPTY_SHA256.starts_with(&fp));
    }

    #[test]
    fn fingerprints_differ_for_different_secrets() {
        assert_ne!(fingerprint(&[1u8; 32]), fingerprint(&[2u8; 32]));
    }
}
