// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only log of every security-relevant operation.
//
// Events live in memory and the whole log is re-serialized to the
// `security_audit_logs` collection after every append.  A failed write is
// logged and swallowed; the event stays in memory for the next write.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use recordvault_core::error::{RecordVaultError, Result};
use recordvault_core::{AuditEvent, ClientContext, EventId, EventInput, Principal, RiskLevel};
use tracing::{debug, instrument, warn};

use crate::clock::Clock;
use crate::storage::{AUDIT_LOG_KEY, KvStore, load_collection, save_collection};

/// Action tags written by the security core.
pub mod actions {
    pub const ACCESS_GRANTED: &str = "Access Granted";
    pub const ACCESS_REVOKED: &str = "Access Revoked";
    pub const ACCESS_REVOKE_DENIED: &str = "Access Revoke Denied";
    pub const ACCESS_CHECK: &str = "Access Check";
    pub const DATA_ENCRYPTED: &str = "Data Encrypted";
    pub const ENCRYPTION_FAILED: &str = "Encryption Failed";
    pub const DATA_DECRYPTED: &str = "Data Decrypted";
    pub const DECRYPTION_FAILED: &str = "Decryption Failed";
}

/// Narrowing criteria for [`AuditLog::query_filtered`].
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Case-insensitive principal match.
    pub principal: Option<Principal>,
    /// Exact resource id match.
    pub resource_id: Option<String>,
    /// Only events at or above this risk level.
    pub min_risk: Option<RiskLevel>,
    /// Only events with `success == false`.
    pub failures_only: bool,
    /// Only events at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_principal(principal: impl Into<Principal>) -> Self {
        Self {
            principal: Some(principal.into()),
            ..Self::default()
        }
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(principal) = &self.principal {
            if &event.principal != principal {
                return false;
            }
        }
        if let Some(resource_id) = &self.resource_id {
            if event.resource_id.as_deref() != Some(resource_id.as_str()) {
                return false;
            }
        }
        if let Some(min_risk) = self.min_risk {
            if event.risk_level < min_risk {
                return false;
            }
        }
        if self.failures_only && event.success {
            return false;
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Append-only, in-memory audit log persisted through a [`KvStore`].
pub struct AuditLog {
    events: RwLock<Vec<AuditEvent>>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    client: ClientContext,
    retention: Option<usize>,
}

impl AuditLog {
    /// Create an empty log.  Call [`AuditLog::load`] to rehydrate.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, client: ClientContext) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            store,
            clock,
            client,
            retention: None,
        }
    }

    /// Keep at most `max_events`, dropping the oldest first.
    ///
    /// A cap of zero would discard every event, so it is ignored with a
    /// warning and the log stays unbounded.
    pub fn with_retention(mut self, max_events: Option<usize>) -> Self {
        if max_events == Some(0) {
            warn!("audit_retention of 0 has no effect; audit log is unbounded");
        }
        self.retention = max_events.filter(|&n| n > 0);
        self
    }

    /// The effective retention cap, `None` when unbounded.
    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<AuditEvent>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<AuditEvent>> {
        self.events.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory log with the persisted collection.
    ///
    /// Absent or malformed data loads as an empty log.
    pub fn load(&self) {
        let stored: Vec<AuditEvent> = load_collection(self.store.as_ref(), AUDIT_LOG_KEY);
        debug!(count = stored.len(), "audit log loaded");
        let mut events = self.write();
        *events = stored;
        self.apply_retention(&mut events);
    }

    /// Record a new audit event and return the stored copy.
    ///
    /// Never fails.  If persistence fails the event is still kept in memory.
    #[instrument(skip(self, input), fields(action = %input.action, principal = %input.principal, success = input.success))]
    pub fn record(&self, input: EventInput) -> AuditEvent {
        let event = AuditEvent {
            id: EventId::new(),
            timestamp: self.clock.now(),
            action: input.action,
            principal: input.principal,
            resource_id: input.resource_id,
            ip_address: self.client.ip_address.clone(),
            user_agent: self.client.user_agent.clone(),
            success: input.success,
            risk_level: input.risk_level,
            details: input.details,
        };

        let mut events = self.write();
        events.push(event.clone());
        self.apply_retention(&mut events);

        if let Err(e) = save_collection(self.store.as_ref(), AUDIT_LOG_KEY, events.as_slice()) {
            warn!(error = %e, "failed to persist audit log; event kept in memory only");
        }

        debug!(id = %event.id, "audit event recorded");
        event
    }

    fn apply_retention(&self, events: &mut Vec<AuditEvent>) {
        if let Some(max) = self.retention {
            if events.len() > max {
                let excess = events.len() - max;
                events.drain(..excess);
            }
        }
    }

    /// Most recent events, newest first, optionally for a single principal.
    ///
    /// `limit` must be positive.
    pub fn query(&self, principal: Option<&Principal>, limit: usize) -> Result<Vec<AuditEvent>> {
        let filter = AuditFilter {
            principal: principal.cloned(),
            ..AuditFilter::default()
        };
        self.query_filtered(&filter, limit)
    }

    /// Events matching `filter`, sorted by timestamp descending and truncated
    /// to `limit`.  Events sharing a timestamp keep newest-inserted first.
    pub fn query_filtered(&self, filter: &AuditFilter, limit: usize) -> Result<Vec<AuditEvent>> {
        if limit == 0 {
            return Err(RecordVaultError::invalid("limit must be a positive integer"));
        }

        let mut matched: Vec<AuditEvent> = self
            .read()
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    /// Total number of events held.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Write the full log to the store, reporting failure to the caller.
    pub fn persist(&self) -> Result<()> {
        let events = self.read();
        save_collection(self.store.as_ref(), AUDIT_LOG_KEY, events.as_slice())
    }
}
