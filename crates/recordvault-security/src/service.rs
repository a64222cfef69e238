// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security service facade: owns the audit log, access control, encryption
// gateway and scorer, and is the only surface the presentation layer calls.
//
// The service is constructed explicitly and handed to callers; cloning it is
// cheap (every component is `Arc`-shared) and all clones see the same state.
// Lifecycle: construct -> `load_stored_data` -> operations -> `shutdown`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use recordvault_core::error::Result;
use recordvault_core::{
    AccessRight, AuditEvent, EventInput, Permission, PermissionId, Principal, ResourceType,
    SecurityConfig,
};
use tracing::{info, instrument, warn};

use crate::access::AccessControl;
use crate::audit::{AuditFilter, AuditLog};
use crate::clock::{Clock, SystemClock};
use crate::encryption::EncryptionGateway;
use crate::keys::KeyDerivation;
use crate::permissions::PermissionStore;
use crate::scorer::{ScoreReport, SecurityScorer};
use crate::storage::{KvStore, MemoryKvStore, SqliteKvStore};

/// File name of the SQLite store inside the data directory.
pub const SECURITY_DB_FILE: &str = "security.db";

/// Entry point for every security operation.
#[derive(Clone)]
pub struct SecurityService {
    audit: Arc<AuditLog>,
    access: Arc<AccessControl>,
    gateway: Arc<EncryptionGateway>,
    scorer: SecurityScorer,
    clock: Arc<dyn Clock>,
    config: Arc<SecurityConfig>,
}

impl SecurityService {
    /// Build a service over `store` using wall-clock time.
    ///
    /// Collections start empty; call [`SecurityService::load_stored_data`]
    /// to rehydrate them.
    pub fn new(store: Arc<dyn KvStore>, config: SecurityConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Build a service with an injected clock.
    pub fn with_clock(store: Arc<dyn KvStore>, config: SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        let audit = Arc::new(
            AuditLog::new(store.clone(), clock.clone(), config.client.clone())
                .with_retention(config.audit_retention),
        );
        let access = AccessControl::new(
            PermissionStore::new(store),
            audit.clone(),
            clock.clone(),
            config.default_ttl_hours,
        );
        let gateway = EncryptionGateway::new(
            KeyDerivation::new(config.service_salt.clone()),
            audit.clone(),
            clock.clone(),
        );

        Self {
            audit,
            access: Arc::new(access),
            gateway: Arc::new(gateway),
            scorer: SecurityScorer::new(config.scoring.clone()),
            clock,
            config: Arc::new(config),
        }
    }

    /// Open the SQLite-backed store in `data_dir` and load its contents.
    #[instrument(skip_all, fields(path = %data_dir.as_ref().display()))]
    pub fn open(data_dir: impl AsRef<Path>, config: SecurityConfig) -> Result<Self> {
        let store = SqliteKvStore::open(data_dir.as_ref().join(SECURITY_DB_FILE))?;
        let service = Self::new(Arc::new(store), config);
        service.load_stored_data();
        info!("security service opened");
        Ok(service)
    }

    /// A service that persists nothing beyond the process.
    pub fn in_memory(config: SecurityConfig) -> Self {
        Self::new(Arc::new(MemoryKvStore::new()), config)
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Rehydrate both collections from the store.
    ///
    /// Idempotent.  Absent or malformed data loads as empty collections.
    pub fn load_stored_data(&self) {
        self.audit.load();
        self.access.store().load();
        info!(
            audit_events = self.audit.count(),
            permissions = self.access.store().count(),
            "security data loaded"
        );
    }

    /// Write both collections to the store.
    ///
    /// Both writes are attempted; the first failure is returned.
    pub fn persist(&self) -> Result<()> {
        let audit = self.audit.persist();
        let permissions = self.access.store().persist();
        if let Err(e) = &audit {
            warn!(error = %e, "failed to flush audit log");
        }
        if let Err(e) = &permissions {
            warn!(error = %e, "failed to flush permissions");
        }
        audit.and(permissions)
    }

    /// Flush and release this handle.
    pub fn shutdown(self) -> Result<()> {
        self.persist()?;
        info!("security service shut down");
        Ok(())
    }

    // -- Access control ------------------------------------------------------

    /// Grant `rights` on `resource_id` to `grantee` for `ttl_hours`
    /// (configured default when `None`).
    pub fn grant(
        &self,
        granter: &Principal,
        grantee: &Principal,
        resource_id: &str,
        resource_type: ResourceType,
        rights: BTreeSet<AccessRight>,
        ttl_hours: Option<f64>,
    ) -> Result<PermissionId> {
        self.access
            .grant(granter, grantee, resource_id, resource_type, rights, ttl_hours)
    }

    pub fn revoke(&self, granter: &Principal, id: PermissionId) -> Result<()> {
        self.access.revoke(granter, id)
    }

    pub fn check(&self, principal: &Principal, resource_id: &str, right: AccessRight) -> bool {
        self.access.check(principal, resource_id, right)
    }

    pub fn list_for_principal(&self, principal: &Principal) -> Vec<Permission> {
        self.access.list_for_principal(principal)
    }

    pub fn list_granted_by(&self, granter: &Principal) -> Vec<Permission> {
        self.access.list_granted_by(granter)
    }

    pub fn list_granted_to(&self, grantee: &Principal) -> Vec<Permission> {
        self.access.list_granted_to(grantee)
    }

    pub fn permission(&self, id: PermissionId) -> Option<Permission> {
        self.access.get(id)
    }

    // -- Encryption ----------------------------------------------------------

    pub fn encrypt(&self, plaintext: &str, principal: &Principal) -> Result<String> {
        self.gateway.encrypt(plaintext, principal)
    }

    pub fn decrypt(&self, ciphertext: &str, principal: &Principal) -> Result<String> {
        self.gateway.decrypt(ciphertext, principal)
    }

    // -- Audit trail ---------------------------------------------------------

    /// Newest-first audit events, `limit` defaulting to the configured page
    /// size.
    pub fn query(&self, principal: Option<&Principal>, limit: Option<usize>) -> Result<Vec<AuditEvent>> {
        self.audit
            .query(principal, limit.unwrap_or(self.config.default_query_limit))
    }

    pub fn query_filtered(&self, filter: &AuditFilter, limit: Option<usize>) -> Result<Vec<AuditEvent>> {
        self.audit
            .query_filtered(filter, limit.unwrap_or(self.config.default_query_limit))
    }

    /// Append an event on behalf of an external flow (e.g. record viewing).
    pub fn record(&self, event: EventInput) -> AuditEvent {
        self.audit.record(event)
    }

    pub fn audit_count(&self) -> usize {
        self.audit.count()
    }

    // -- Scoring -------------------------------------------------------------

    /// Advisory security score in `0..=100`.
    pub fn score(&self, principal: &Principal) -> Result<u8> {
        Ok(self.score_report(principal)?.score)
    }

    pub fn score_report(&self, principal: &Principal) -> Result<ScoreReport> {
        self.scorer
            .report(&self.audit, &self.access, principal, self.clock.now())
    }
}
