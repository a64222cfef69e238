// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encryption gateway: ChaCha20-Poly1305 sealing under per-principal keys.
//
// Envelope (ASCII, dot separated):
//
//   rv1.<key_id>.<sealed_at_ms>.<nonce_hex>.<ciphertext_and_tag_hex>
//
// `key_id` is the fingerprint of the derived key and `sealed_at_ms` the
// freshness marker (Unix milliseconds).  The first three fields are bound to
// the ciphertext as associated data, so editing any part of the envelope
// makes `open` fail.  Wrong-key and corrupted-payload failures are both
// reported as `DecryptionFailed`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recordvault_core::error::{RecordVaultError, Result};
use recordvault_core::{EventInput, Principal, RiskLevel};
use ring::aead::{Aad, CHACHA20_POLY1305, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument, warn};

use crate::audit::{AuditLog, actions};
use crate::clock::Clock;
use crate::keys::{KeyDerivation, KeyMaterial};

/// Envelope format tag.
const ENVELOPE_VERSION: &str = "rv1";

/// A parsed sealed payload.
struct Envelope<'a> {
    key_id: &'a str,
    sealed_at_ms: i64,
    nonce: [u8; NONCE_LEN],
    sealed: Vec<u8>,
}

impl<'a> Envelope<'a> {
    fn parse(text: &'a str) -> Result<Self> {
        let parts: Vec<&'a str> = text.trim().split('.').collect();
        let [version, key_id, sealed_at, nonce_hex, sealed_hex] = parts[..] else {
            return Err(malformed("expected five envelope fields"));
        };

        if version != ENVELOPE_VERSION {
            return Err(malformed("unsupported envelope version"));
        }

        let sealed_at_ms = sealed_at
            .parse::<i64>()
            .map_err(|_| malformed("bad timestamp"))?;

        let nonce: [u8; NONCE_LEN] = hex::decode(nonce_hex)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| malformed("bad nonce"))?;

        let sealed = hex::decode(sealed_hex).map_err(|_| malformed("bad ciphertext encoding"))?;

        Ok(Self {
            key_id,
            sealed_at_ms,
            nonce,
            sealed,
        })
    }
}

fn envelope_header(key_id: &str, sealed_at_ms: i64) -> String {
    format!("{ENVELOPE_VERSION}.{key_id}.{sealed_at_ms}")
}

fn malformed(reason: &str) -> RecordVaultError {
    RecordVaultError::DecryptionFailed(format!("malformed payload: {reason}"))
}

fn aead_key(key: &KeyMaterial) -> Result<LessSafeKey> {
    UnboundKey::new(&CHACHA20_POLY1305, key.as_bytes())
        .map(LessSafeKey::new)
        .map_err(|e| RecordVaultError::Encryption(format!("key setup failed: {e}")))
}

/// Seals and opens opaque string payloads for a principal, auditing every
/// call before returning.
pub struct EncryptionGateway {
    keys: KeyDerivation,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
}

impl EncryptionGateway {
    pub fn new(keys: KeyDerivation, audit: Arc<AuditLog>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, audit, clock }
    }

    /// Encrypt `plaintext` under `principal`'s key.
    ///
    /// Failures are audited at high risk and returned.
    #[instrument(skip_all, fields(%principal, plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &str, principal: &Principal) -> Result<String> {
        match self.seal(plaintext.as_bytes(), principal) {
            Ok(envelope) => {
                self.audit.record(
                    EventInput::new(actions::DATA_ENCRYPTED, principal.clone(), RiskLevel::Low)
                        .with_details(format!("sealed {} bytes", plaintext.len())),
                );
                debug!(envelope_len = envelope.len(), "encryption complete");
                Ok(envelope)
            }
            Err(e) => {
                self.audit.record(
                    EventInput::new(actions::ENCRYPTION_FAILED, principal.clone(), RiskLevel::High)
                        .with_success(false)
                        .with_details(e.to_string()),
                );
                warn!(error = %e, "encryption failed");
                Err(e)
            }
        }
    }

    /// Decrypt an envelope produced by [`EncryptionGateway::encrypt`].
    ///
    /// Key mismatch, tampering and malformed input all fail with
    /// `DecryptionFailed` and are audited at high risk.
    #[instrument(skip_all, fields(%principal, ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &str, principal: &Principal) -> Result<String> {
        match self.open(ciphertext, principal) {
            Ok(plaintext) => {
                self.audit.record(
                    EventInput::new(actions::DATA_DECRYPTED, principal.clone(), RiskLevel::Low)
                        .with_details(format!("opened {} bytes", plaintext.len())),
                );
                debug!("decryption complete");
                Ok(plaintext)
            }
            Err(e) => {
                self.audit.record(
                    EventInput::new(actions::DECRYPTION_FAILED, principal.clone(), RiskLevel::High)
                        .with_success(false)
                        .with_details(e.to_string()),
                );
                warn!(error = %e, "decryption failed");
                Err(e)
            }
        }
    }

    /// The freshness marker of a sealed payload, without decrypting it.
    pub fn sealed_at(ciphertext: &str) -> Result<DateTime<Utc>> {
        let envelope = Envelope::parse(ciphertext)?;
        DateTime::from_timestamp_millis(envelope.sealed_at_ms)
            .ok_or_else(|| malformed("timestamp out of range"))
    }

    fn seal(&self, plaintext: &[u8], principal: &Principal) -> Result<String> {
        let key = self.keys.derive_key(principal)?;
        let sealing_key = aead_key(&key)?;

        let mut nonce = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|e| RecordVaultError::Encryption(format!("nonce generation failed: {e}")))?;

        let header = envelope_header(key.key_id(), self.clock.now().timestamp_millis());
        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(header.as_bytes()),
                &mut in_out,
            )
            .map_err(|e| RecordVaultError::Encryption(format!("sealing failed: {e}")))?;

        Ok(format!("{header}.{}.{}", hex::encode(nonce), hex::encode(in_out)))
    }

    fn open(&self, ciphertext: &str, principal: &Principal) -> Result<String> {
        let key = self.keys.derive_key(principal)?;
        let mut envelope = Envelope::parse(ciphertext)?;

        if envelope.key_id != key.key_id() {
            return Err(RecordVaultError::DecryptionFailed(
                "payload was sealed for a different key".into(),
            ));
        }

        let header = envelope_header(envelope.key_id, envelope.sealed_at_ms);
        let opening_key = aead_key(&key)?;
        let plaintext = opening_key
            .open_in_place(
                Nonce::assume_unique_for_key(envelope.nonce),
                Aad::from(header.as_bytes()),
                &mut envelope.sealed,
            )
            .map_err(|_| {
                RecordVaultError::DecryptionFailed("authentication tag mismatch".into())
            })?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| RecordVaultError::DecryptionFailed("plaintext is not valid UTF-8".into()))
    }
}
