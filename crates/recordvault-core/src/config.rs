// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security core configuration.

use serde::{Deserialize, Serialize};

/// Service-wide salt mixed into every derived key.
///
/// Changing it makes every previously sealed payload undecryptable.
pub const DEFAULT_SERVICE_SALT: &str = "recordvault.security.v1";

/// Persistent security settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Grant lifetime used when the caller does not pass one.
    pub default_ttl_hours: f64,
    /// Page size for audit queries that do not pass a limit.
    pub default_query_limit: usize,
    /// Keep at most this many audit events (oldest dropped first).
    /// `None` keeps everything; `Some(0)` is ignored with a warning.
    pub audit_retention: Option<usize>,
    /// Salt for per-principal key derivation.
    pub service_salt: String,
    /// Client details stamped on every audit event.
    pub client: ClientContext,
    /// Weights for the advisory security score.
    pub scoring: ScoringPolicy,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_ttl_hours: 24.0,
            default_query_limit: 50,
            audit_retention: None,
            service_salt: DEFAULT_SERVICE_SALT.to_owned(),
            client: ClientContext::default(),
            scoring: ScoringPolicy::default(),
        }
    }
}

/// Where security calls originate from.
///
/// The core has no transport of its own, so the embedding application
/// describes itself here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_owned(),
            user_agent: concat!("recordvault/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// Constants of the security score heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Number of most-recent audit events considered.
    pub event_window: usize,
    /// Deducted per failed event.
    pub failure_penalty: i64,
    /// Deducted per high-risk event (stacks with `failure_penalty`).
    pub high_risk_penalty: i64,
    /// Effective permissions allowed before sprawl penalties start.
    pub permission_allowance: usize,
    /// Deducted per effective permission above the allowance.
    pub sprawl_penalty: i64,
    /// Activity within this many days earns the recency bonus.
    pub recency_days: i64,
    /// Flat bonus for recent activity.
    pub recency_bonus: i64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            event_window: 100,
            failure_penalty: 2,
            high_risk_penalty: 5,
            permission_allowance: 10,
            sprawl_penalty: 3,
            recency_days: 7,
            recency_bonus: 5,
        }
    }
}
