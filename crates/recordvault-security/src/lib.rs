// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! recordvault-security: Security-policy core for personal records.
//!
//! This crate grants, checks and revokes time-bounded access between a
//! resource owner and other principals, records every security-relevant
//! action in an append-only audit trail, seals payloads under per-principal
//! keys, and derives an advisory security score from the trail.
//!
//! Callers construct a [`SecurityService`] explicitly and pass it around;
//! there is no process-wide instance.

pub mod access;
pub mod audit;
pub mod clock;
pub mod encryption;
pub mod integrity;
pub mod keys;
pub mod permissions;
pub mod scorer;
pub mod service;
pub mod storage;

// PUBLIC API: Re-export the facade and its collaborators
pub use access::AccessControl;
pub use audit::{AuditFilter, AuditLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use encryption::EncryptionGateway;
pub use integrity::hash_bytes;
pub use keys::{KeyDerivation, KeyMaterial};
pub use permissions::PermissionStore;
pub use scorer::{ScoreReport, SecurityScorer};
pub use service::SecurityService;
pub use storage::{KvStore, MemoryKvStore, SqliteKvStore};
