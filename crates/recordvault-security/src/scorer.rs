// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security scorer: advisory 0..=100 posture score.
//
// This is a risk heuristic for display, not a security guarantee:
//
//   100
//   - failure_penalty   per failed event       (recent window)
//   - high_risk_penalty per high-risk event    (stacks with the above)
//   - sprawl_penalty    per effective permission above the allowance
//   + recency_bonus     once, if any event in the window is recent
//   clamped to 0..=100

use chrono::{DateTime, Duration, Utc};
use recordvault_core::error::Result;
use recordvault_core::{AuditEvent, Principal, RiskLevel, ScoringPolicy};
use serde::Serialize;

use crate::access::AccessControl;
use crate::audit::AuditLog;

const MAX_SCORE: i64 = 100;

/// A score together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub score: u8,
    pub events_considered: usize,
    pub failed_events: usize,
    pub high_risk_events: usize,
    pub effective_permissions: usize,
    pub sprawl_penalty: i64,
    pub recency_bonus: i64,
}

/// Computes [`ScoreReport`]s under a [`ScoringPolicy`].
#[derive(Debug, Clone, Default)]
pub struct SecurityScorer {
    policy: ScoringPolicy,
}

impl SecurityScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score `principal` from the audit trail and its effective permissions.
    pub fn report(
        &self,
        audit: &AuditLog,
        access: &AccessControl,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<ScoreReport> {
        let window = self.policy.event_window.max(1);
        let events = audit.query(Some(principal), window)?;
        let effective = access.list_for_principal(principal).len();
        Ok(self.evaluate(&events, effective, now))
    }

    /// Pure scoring over already-fetched inputs.  Order-independent.
    pub fn evaluate(
        &self,
        events: &[AuditEvent],
        effective_permissions: usize,
        now: DateTime<Utc>,
    ) -> ScoreReport {
        let policy = &self.policy;

        let failed_events = events.iter().filter(|e| !e.success).count();
        let high_risk_events = events
            .iter()
            .filter(|e| e.risk_level == RiskLevel::High)
            .count();

        let excess = effective_permissions.saturating_sub(policy.permission_allowance);
        let sprawl_penalty = policy.sprawl_penalty.saturating_mul(to_i64(excess));

        let recent_cutoff = Duration::try_days(policy.recency_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let recency_bonus = if events.iter().any(|e| e.timestamp >= recent_cutoff) {
            policy.recency_bonus
        } else {
            0
        };

        let raw = MAX_SCORE
            .saturating_sub(policy.failure_penalty.saturating_mul(to_i64(failed_events)))
            .saturating_sub(policy.high_risk_penalty.saturating_mul(to_i64(high_risk_events)))
            .saturating_sub(sprawl_penalty)
            .saturating_add(recency_bonus);

        ScoreReport {
            score: raw.clamp(0, MAX_SCORE) as u8,
            events_considered: events.len(),
            failed_events,
            high_risk_events,
            effective_permissions,
            sprawl_penalty,
            recency_bonus,
        }
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
