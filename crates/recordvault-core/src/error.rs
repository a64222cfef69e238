// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Record Vault.

use thiserror::Error;

/// Top-level error type for all Record Vault security operations.
///
/// Expected negative outcomes (a `check` that returns `false`, a low score)
/// are ordinary results and never surface as one of these variants.
#[derive(Debug, Error)]
pub enum RecordVaultError {
    // -- Caller errors --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Deliberately does not say whether the permission exists.
    #[error("permission not found or not owned by caller")]
    NotFoundOrUnauthorized,

    // -- Cryptographic errors --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    // -- Storage / persistence --
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecordVaultError {
    /// Shorthand for building an `InvalidArgument` from anything printable.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RecordVaultError>;
