// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Access control: grant, check and revoke over the permission store.
//
// Per-permission state machine:
//
//   Active --(revoke)--------> Revoked   (terminal)
//   Active --(expires_at)----> Expired   (terminal, derived at read time)
//
// Every operation leaves an audit event.  An unauthorized `check` is an
// ordinary `false`, not an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use recordvault_core::error::{RecordVaultError, Result};
use recordvault_core::{
    AccessRight, EventInput, Permission, PermissionId, Principal, ResourceType, RiskLevel,
};
use tracing::{debug, info, instrument};

use crate::audit::{AuditLog, actions};
use crate::clock::Clock;
use crate::permissions::PermissionStore;

const NANOS_PER_HOUR: f64 = 3_600_000_000_000.0;

/// Grant/check/revoke front end for a [`PermissionStore`].
pub struct AccessControl {
    permissions: PermissionStore,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    default_ttl_hours: f64,
}

impl AccessControl {
    pub fn new(
        permissions: PermissionStore,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
        default_ttl_hours: f64,
    ) -> Self {
        Self {
            permissions,
            audit,
            clock,
            default_ttl_hours,
        }
    }

    /// The underlying store, for loading and persistence hooks.
    pub fn store(&self) -> &PermissionStore {
        &self.permissions
    }

    /// Grant `rights` on `resource_id` from `granter` to `grantee`.
    ///
    /// `ttl_hours` defaults to the configured lifetime.  Fails with
    /// `InvalidArgument` for an empty right set, a non-positive or
    /// non-finite ttl, or a blank principal/resource, and with
    /// `Persistence` if the grant cannot be stored.
    #[instrument(skip_all, fields(%granter, %grantee, %resource_id, ?ttl_hours))]
    pub fn grant(
        &self,
        granter: &Principal,
        grantee: &Principal,
        resource_id: &str,
        resource_type: ResourceType,
        rights: BTreeSet<AccessRight>,
        ttl_hours: Option<f64>,
    ) -> Result<PermissionId> {
        if granter.is_blank() || grantee.is_blank() {
            return Err(RecordVaultError::invalid("granter and grantee must not be empty"));
        }
        if resource_id.trim().is_empty() {
            return Err(RecordVaultError::invalid("resource id must not be empty"));
        }
        if rights.is_empty() {
            return Err(RecordVaultError::invalid("at least one permission is required"));
        }

        let ttl_hours = ttl_hours.unwrap_or(self.default_ttl_hours);
        let created_at = self.clock.now();
        let expires_at = expiry_after(created_at, ttl_hours)?;

        let permission = Permission {
            id: PermissionId::new(),
            granter: granter.clone(),
            grantee: grantee.clone(),
            resource_id: resource_id.to_owned(),
            resource_type,
            permissions: rights,
            created_at,
            expires_at,
            active: true,
        };
        let id = permission.id;
        let details = format!(
            "granted {} on {} {} to {} until {}",
            describe_rights(&permission.permissions),
            resource_type,
            resource_id,
            grantee,
            expires_at.to_rfc3339(),
        );

        self.permissions.insert(permission)?;

        self.audit.record(
            EventInput::new(actions::ACCESS_GRANTED, granter.clone(), RiskLevel::Medium)
                .with_resource(resource_id)
                .with_details(details),
        );

        info!(%id, "access granted");
        Ok(id)
    }

    /// Revoke permission `id`.  Only its original granter may do so, and
    /// only once.
    #[instrument(skip_all, fields(%granter, %id))]
    pub fn revoke(&self, granter: &Principal, id: PermissionId) -> Result<()> {
        match self.permissions.deactivate(id, granter) {
            Ok(revoked) => {
                self.audit.record(
                    EventInput::new(actions::ACCESS_REVOKED, granter.clone(), RiskLevel::Medium)
                        .with_resource(revoked.resource_id.clone())
                        .with_details(format!("revoked {id} held by {}", revoked.grantee)),
                );
                info!("access revoked");
                Ok(())
            }
            Err(RecordVaultError::NotFoundOrUnauthorized) => {
                self.audit.record(
                    EventInput::new(
                        actions::ACCESS_REVOKE_DENIED,
                        granter.clone(),
                        RiskLevel::Medium,
                    )
                    .with_success(false)
                    .with_details(format!("no revocable permission {id}")),
                );
                debug!("revocation refused");
                Err(RecordVaultError::NotFoundOrUnauthorized)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `principal` currently holds `right` on `resource_id`.
    #[instrument(skip_all, fields(%principal, %resource_id, %right))]
    pub fn check(&self, principal: &Principal, resource_id: &str, right: AccessRight) -> bool {
        let now = self.clock.now();
        let granted = self
            .permissions
            .any_effective(principal, resource_id, right, now);

        let risk = if granted {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        };
        self.audit.record(
            EventInput::new(actions::ACCESS_CHECK, principal.clone(), risk)
                .with_success(granted)
                .with_resource(resource_id)
                .with_details(format!("{right} {}", if granted { "granted" } else { "denied" })),
        );

        granted
    }

    /// Currently effective permissions where `principal` is granter or grantee.
    pub fn list_for_principal(&self, principal: &Principal) -> Vec<Permission> {
        self.permissions
            .effective_involving(principal, self.clock.now())
    }

    /// Currently effective permissions issued by `granter`.
    pub fn list_granted_by(&self, granter: &Principal) -> Vec<Permission> {
        self.permissions
            .effective_granted_by(granter, self.clock.now())
    }

    /// Currently effective permissions held by `grantee`.
    pub fn list_granted_to(&self, grantee: &Principal) -> Vec<Permission> {
        self.permissions
            .effective_granted_to(grantee, self.clock.now())
    }

    /// Look up any permission by id, whatever its state.
    pub fn get(&self, id: PermissionId) -> Option<Permission> {
        self.permissions.get(id)
    }
}

/// `created_at + ttl_hours`, rejecting lifetimes that are non-positive,
/// non-finite, or out of range.  Sub-millisecond lifetimes are kept at
/// nanosecond precision.
fn expiry_after(created_at: DateTime<Utc>, ttl_hours: f64) -> Result<DateTime<Utc>> {
    if !ttl_hours.is_finite() || ttl_hours <= 0.0 {
        return Err(RecordVaultError::invalid(format!(
            "ttl must be a positive number of hours, got {ttl_hours}"
        )));
    }

    let nanos = (ttl_hours * NANOS_PER_HOUR).round();
    if nanos >= i64::MAX as f64 {
        return Err(RecordVaultError::invalid(format!(
            "ttl of {ttl_hours} hours is out of range"
        )));
    }

    // expires_at must stay strictly after created_at.
    let nanos = nanos as i64;
    if nanos <= 0 {
        return Err(RecordVaultError::invalid(format!(
            "ttl of {ttl_hours} hours is too short to represent"
        )));
    }

    created_at
        .checked_add_signed(Duration::nanoseconds(nanos))
        .ok_or_else(|| RecordVaultError::invalid(format!("ttl of {ttl_hours} hours is out of range")))
}

fn describe_rights(rights: &BTreeSet<AccessRight>) -> String {
    rights
        .iter()
        .map(AccessRight::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryKvStore;
    use crate::storage::testing::FailingKvStore;
    use recordvault_core::ClientContext;

    struct Fixture {
        access: AccessControl,
        audit: Arc<AuditLog>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let kv = Arc::new(MemoryKvStore::new());
        let audit = Arc::new(AuditLog::new(kv.clone(), clock.clone(), ClientContext::default()));
        let access = AccessControl::new(PermissionStore::new(kv), audit.clone(), clock.clone(), 24.0);
        Fixture { access, audit, clock }
    }

    fn read_only() -> BTreeSet<AccessRight> {
        [AccessRight::Read].into_iter().collect()
    }

    fn p(id: &str) -> Principal {
        Principal::new(id)
    }

    #[test]
    fn grant_check_revoke_scenario() {
        let f = fixture();
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(1.0))
            .unwrap();

        assert!(f.access.check(&p("B"), "rec1", AccessRight::Read));

        f.access.revoke(&p("A"), id).unwrap();
        assert!(!f.access.check(&p("B"), "rec1", AccessRight::Read));
        assert!(!f.access.get(id).unwrap().active);
    }

    #[test]
    fn grant_expires_without_revoke() {
        let f = fixture();
        f.access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(2.0))
            .unwrap();

        f.clock.advance(Duration::minutes(119));
        assert!(f.access.check(&p("B"), "rec1", AccessRight::Read));

        f.clock.advance(Duration::minutes(1));
        assert!(!f.access.check(&p("B"), "rec1", AccessRight::Read));
        assert!(f.access.list_for_principal(&p("B")).is_empty());
    }

    #[test]
    fn default_ttl_is_applied() {
        let f = fixture();
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Profile, read_only(), None)
            .unwrap();
        let perm = f.access.get(id).unwrap();
        assert_eq!(perm.expires_at - perm.created_at, Duration::hours(24));
    }

    #[test]
    fn grant_rejects_bad_input() {
        let f = fixture();
        let cases = [
            (BTreeSet::new(), Some(1.0)),
            (read_only(), Some(0.0)),
            (read_only(), Some(-3.0)),
            (read_only(), Some(f64::NAN)),
            (read_only(), Some(f64::INFINITY)),
            (read_only(), Some(1e-20)),
            (read_only(), Some(1e300)),
        ];
        for (rights, ttl) in cases {
            let err = f
                .access
                .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, rights, ttl)
                .unwrap_err();
            assert!(matches!(err, RecordVaultError::InvalidArgument(_)), "ttl {ttl:?}");
        }

        let err = f
            .access
            .grant(&p(""), &p("B"), "rec1", ResourceType::Record, read_only(), None)
            .unwrap_err();
        assert!(matches!(err, RecordVaultError::InvalidArgument(_)));

        assert_eq!(f.audit.count(), 0, "rejected grants are not audited");
    }

    #[test]
    fn sub_millisecond_ttl_is_accepted_and_expires() {
        let f = fixture();
        // 1e-7 hours is 360 microseconds.
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(1e-7))
            .unwrap();

        let perm = f.access.get(id).unwrap();
        assert_eq!(perm.expires_at - perm.created_at, Duration::microseconds(360));
        assert!(f.access.check(&p("B"), "rec1", AccessRight::Read));

        f.clock.advance(Duration::milliseconds(1));
        assert!(!f.access.check(&p("B"), "rec1", AccessRight::Read));
    }

    #[test]
    fn revoke_by_non_granter_fails_and_keeps_permission() {
        let f = fixture();
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(1.0))
            .unwrap();

        let err = f.access.revoke(&p("B"), id).unwrap_err();
        assert!(matches!(err, RecordVaultError::NotFoundOrUnauthorized));
        assert!(f.access.get(id).unwrap().active);
        assert!(f.access.check(&p("B"), "rec1", AccessRight::Read));
    }

    #[test]
    fn second_revoke_fails() {
        let f = fixture();
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(1.0))
            .unwrap();

        f.access.revoke(&p("a"), id).unwrap();
        let err = f.access.revoke(&p("A"), id).unwrap_err();
        assert!(matches!(err, RecordVaultError::NotFoundOrUnauthorized));
    }

    #[test]
    fn operations_are_audited() {
        let f = fixture();
        let id = f
            .access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), Some(1.0))
            .unwrap();
        f.access.check(&p("B"), "rec1", AccessRight::Write);
        f.access.check(&p("B"), "rec1", AccessRight::Read);
        f.access.revoke(&p("A"), id).unwrap();

        let events = f.audit.query(None, 10).unwrap();
        assert_eq!(events.len(), 4);

        let granted = events.iter().find(|e| e.action == actions::ACCESS_GRANTED).unwrap();
        assert_eq!(granted.risk_level, RiskLevel::Medium);
        assert!(granted.success);
        assert_eq!(granted.resource_id.as_deref(), Some("rec1"));

        let checks: Vec<_> = events
            .iter()
            .filter(|e| e.action == actions::ACCESS_CHECK)
            .collect();
        assert_eq!(checks.len(), 2);
        assert!(checks.iter().any(|e| e.success && e.risk_level == RiskLevel::Low));
        assert!(checks.iter().any(|e| !e.success && e.risk_level == RiskLevel::Medium));

        let revoked = events.iter().find(|e| e.action == actions::ACCESS_REVOKED).unwrap();
        assert_eq!(revoked.risk_level, RiskLevel::Medium);
        assert!(revoked.success);
    }

    #[test]
    fn check_matches_grantee_case_insensitively_and_resource_exactly() {
        let f = fixture();
        f.access
            .grant(&p("A"), &p("0xBeef"), "Rec1", ResourceType::Record, read_only(), None)
            .unwrap();

        assert!(f.access.check(&p("0XBEEF"), "Rec1", AccessRight::Read));
        assert!(!f.access.check(&p("0xbeef"), "rec1", AccessRight::Read));
        assert!(!f.access.check(&p("0xbeef"), "Rec1", AccessRight::Delete));
        assert!(!f.access.check(&p("A"), "Rec1", AccessRight::Read));
    }

    #[test]
    fn list_for_principal_covers_both_sides() {
        let f = fixture();
        f.access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), None)
            .unwrap();
        f.access
            .grant(&p("C"), &p("A"), "rec2", ResourceType::Record, read_only(), None)
            .unwrap();
        let revoked = f
            .access
            .grant(&p("A"), &p("D"), "rec3", ResourceType::Record, read_only(), None)
            .unwrap();
        f.access.revoke(&p("A"), revoked).unwrap();

        assert_eq!(f.access.list_for_principal(&p("a")).len(), 2);
        assert_eq!(f.access.list_granted_by(&p("A")).len(), 1);
        assert_eq!(f.access.list_granted_to(&p("A")).len(), 1);
    }

    #[test]
    fn unpersistable_grant_fails() {
        let clock = Arc::new(ManualClock::starting_now());
        let audit = Arc::new(AuditLog::new(
            Arc::new(MemoryKvStore::new()),
            clock.clone(),
            ClientContext::default(),
        ));
        let access = AccessControl::new(
            PermissionStore::new(Arc::new(FailingKvStore)),
            audit.clone(),
            clock,
            24.0,
        );

        let err = access
            .grant(&p("A"), &p("B"), "rec1", ResourceType::Record, read_only(), None)
            .unwrap_err();
        assert!(matches!(err, RecordVaultError::Persistence(_)));
        assert!(!access.check(&p("B"), "rec1", AccessRight::Read));
    }
}
