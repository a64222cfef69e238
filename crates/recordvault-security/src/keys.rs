// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-principal key derivation: HKDF-SHA256 over the case-folded principal
// identifier, salted with a fixed service-wide salt.
//
// Key material is never persisted.  It is recomputed on every use, so the
// same `(principal, salt)` pair always yields the same key.

use std::fmt;

use recordvault_core::Principal;
use recordvault_core::error::{RecordVaultError, Result};
use ring::hkdf;
use tracing::instrument;

use crate::integrity::fingerprint;

/// Length of derived key material in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// HKDF `info` label binding derived keys to payload sealing.
const KEY_INFO: &[u8] = b"recordvault.payload-key.v1";

/// Output length marker for `ring::hkdf`.
struct KeyLen(usize);

impl hkdf::KeyType for KeyLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// Symmetric key bytes for one principal plus their public fingerprint.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    bytes: [u8; KEY_LEN],
    key_id: String,
}

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Non-secret fingerprint identifying this key.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Deterministic, one-way derivation of per-principal keys.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    salt: String,
}

impl KeyDerivation {
    pub fn new(service_salt: impl Into<String>) -> Self {
        Self {
            salt: service_salt.into(),
        }
    }

    /// Derive the key for `principal`.
    ///
    /// Fails only with `InvalidArgument` for a blank principal.
    #[instrument(skip_all, fields(%principal))]
    pub fn derive_key(&self, principal: &Principal) -> Result<KeyMaterial> {
        if principal.is_blank() {
            return Err(RecordVaultError::invalid("principal must not be empty"));
        }

        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, self.salt.as_bytes());
        let prk = salt.extract(principal.normalized().as_bytes());
        let info = [KEY_INFO];

        let okm = prk
            .expand(&info, KeyLen(KEY_LEN))
            .map_err(|e| RecordVaultError::Encryption(format!("key expansion failed: {e}")))?;

        let mut bytes = [0u8; KEY_LEN];
        okm.fill(&mut bytes)
            .map_err(|e| RecordVaultError::Encryption(format!("key expansion failed: {e}")))?;

        Ok(KeyMaterial {
            key_id: fingerprint(&bytes),
            bytes,
        })
    }
}
