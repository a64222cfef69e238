// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Permission store: grant records with a derived lifecycle.
//
// Records are never deleted; revocation only clears `active`.  Expiry is not
// stored: every read compares `expires_at` with the caller's `now`.
//
// A grant or revocation that cannot be persisted is rolled back in memory
// and reported.  Each mutation holds the write lock across the persist.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use recordvault_core::error::{RecordVaultError, Result};
use recordvault_core::{AccessRight, Permission, PermissionId, Principal};
use tracing::{debug, warn};

use crate::storage::{KvStore, PERMISSIONS_KEY, load_collection, save_collection};

/// In-memory permission collection persisted through a [`KvStore`].
pub struct PermissionStore {
    permissions: RwLock<Vec<Permission>>,
    store: Arc<dyn KvStore>,
}

impl PermissionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            permissions: RwLock::new(Vec::new()),
            store,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Permission>> {
        self.permissions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Permission>> {
        self.permissions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory collection with the persisted one.
    pub fn load(&self) {
        let stored: Vec<Permission> = load_collection(self.store.as_ref(), PERMISSIONS_KEY);
        debug!(count = stored.len(), "permissions loaded");
        *self.write() = stored;
    }

    /// Append a new grant and persist the collection.
    pub fn insert(&self, permission: Permission) -> Result<()> {
        let mut permissions = self.write();
        permissions.push(permission);

        if let Err(e) = save_collection(self.store.as_ref(), PERMISSIONS_KEY, permissions.as_slice()) {
            permissions.pop();
            warn!(error = %e, "failed to persist new permission; grant rolled back");
            return Err(e);
        }
        Ok(())
    }

    /// Deactivate the active permission `id` owned by `granter`.
    ///
    /// Missing, foreign and already-revoked permissions are all reported as
    /// `NotFoundOrUnauthorized`.  Returns the updated record.
    pub fn deactivate(&self, id: PermissionId, granter: &Principal) -> Result<Permission> {
        let mut permissions = self.write();
        let index = permissions
            .iter()
            .position(|p| p.id == id && &p.granter == granter && p.active)
            .ok_or(RecordVaultError::NotFoundOrUnauthorized)?;

        permissions[index].active = false;

        if let Err(e) = save_collection(self.store.as_ref(), PERMISSIONS_KEY, permissions.as_slice()) {
            permissions[index].active = true;
            warn!(error = %e, "failed to persist revocation; permission left active");
            return Err(e);
        }
        Ok(permissions[index].clone())
    }

    pub fn get(&self, id: PermissionId) -> Option<Permission> {
        self.read().iter().find(|p| p.id == id).cloned()
    }

    /// Whether any effective grant lets `grantee` perform `right` on
    /// `resource_id` at `now`.
    pub fn any_effective(
        &self,
        grantee: &Principal,
        resource_id: &str,
        right: AccessRight,
        now: DateTime<Utc>,
    ) -> bool {
        self.read().iter().any(|p| {
            &p.grantee == grantee
                && p.resource_id == resource_id
                && p.is_effective(now)
                && p.allows(right)
        })
    }

    /// Effective grants where `principal` is granter or grantee.
    pub fn effective_involving(&self, principal: &Principal, now: DateTime<Utc>) -> Vec<Permission> {
        self.effective_where(now, |p| p.involves(principal))
    }

    /// Effective grants issued by `granter`.
    pub fn effective_granted_by(&self, granter: &Principal, now: DateTime<Utc>) -> Vec<Permission> {
        self.effective_where(now, |p| &p.granter == granter)
    }

    /// Effective grants held by `grantee`.
    pub fn effective_granted_to(&self, grantee: &Principal, now: DateTime<Utc>) -> Vec<Permission> {
        self.effective_where(now, |p| &p.grantee == grantee)
    }

    fn effective_where(
        &self,
        now: DateTime<Utc>,
        predicate: impl Fn(&Permission) -> bool,
    ) -> Vec<Permission> {
        self.read()
            .iter()
            .filter(|p| p.is_effective(now) && predicate(p))
            .cloned()
            .collect()
    }

    /// Total number of records, including revoked and expired ones.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Write the full collection to the store.
    pub fn persist(&self) -> Result<()> {
        let permissions = self.read();
        save_collection(self.store.as_ref(), PERMISSIONS_KEY, permissions.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::storage::testing::FailingKvStore;
    use chrono::Duration;
    use recordvault_core::ResourceType;

    fn grant(granter: &str, grantee: &str, resource: &str, now: DateTime<Utc>) -> Permission {
        Permission {
            id: PermissionId::new(),
            granter: Principal::new(granter),
            grantee: Principal::new(grantee),
            resource_id: resource.into(),
            resource_type: ResourceType::Record,
            permissions: [AccessRight::Read, AccessRight::Share].into_iter().collect(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            active: true,
        }
    }

    #[test]
    fn insert_and_match() {
        let now = Utc::now();
        let store = PermissionStore::new(Arc::new(MemoryKvStore::new()));
        store.insert(grant("A", "B", "rec1", now)).unwrap();

        let b = Principal::new("b");
        assert!(store.any_effective(&b, "rec1", AccessRight::Read, now));
        assert!(store.any_effective(&b, "rec1", AccessRight::Share, now));
        assert!(!store.any_effective(&b, "rec1", AccessRight::Write, now));
        assert!(!store.any_effective(&b, "REC1", AccessRight::Read, now));
        assert!(!store.any_effective(&b, "rec1", AccessRight::Read, now + Duration::hours(1)));
    }

    #[test]
    fn deactivate_requires_original_granter() {
        let now = Utc::now();
        let store = PermissionStore::new(Arc::new(MemoryKvStore::new()));
        let perm = grant("A", "B", "rec1", now);
        let id = perm.id;
        store.insert(perm).unwrap();

        let err = store.deactivate(id, &Principal::new("B")).unwrap_err();
        assert!(matches!(err, RecordVaultError::NotFoundOrUnauthorized));
        assert!(store.get(id).unwrap().active);

        let revoked = store.deactivate(id, &Principal::new("a")).unwrap();
        assert!(!revoked.active);

        // Second revocation is refused.
        let err = store.deactivate(id, &Principal::new("A")).unwrap_err();
        assert!(matches!(err, RecordVaultError::NotFoundOrUnauthorized));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = PermissionStore::new(Arc::new(MemoryKvStore::new()));
        let err = store
            .deactivate(PermissionId::new(), &Principal::new("A"))
            .unwrap_err();
        assert!(matches!(err, RecordVaultError::NotFoundOrUnauthorized));
    }

    #[test]
    fn failed_persist_rolls_back_insert() {
        let store = PermissionStore::new(Arc::new(FailingKvStore));
        let err = store.insert(grant("A", "B", "rec1", Utc::now())).unwrap_err();
        assert!(matches!(err, RecordVaultError::Persistence(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn effective_listings() {
        let now = Utc::now();
        let store = PermissionStore::new(Arc::new(MemoryKvStore::new()));
        store.insert(grant("A", "B", "rec1", now)).unwrap();
        store.insert(grant("C", "A", "rec2", now)).unwrap();
        let mut stale = grant("A", "D", "rec3", now - Duration::hours(5));
        stale.expires_at = now - Duration::hours(4);
        store.insert(stale).unwrap();

        let a = Principal::new("a");
        assert_eq!(store.effective_involving(&a, now).len(), 2);
        assert_eq!(store.effective_granted_by(&a, now).len(), 1);
        assert_eq!(store.effective_granted_to(&a, now).len(), 1);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn load_restores_persisted_grants() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let now = Utc::now();
        let first = PermissionStore::new(kv.clone());
        let perm = grant("A", "B", "rec1", now);
        let id = perm.id;
        first.insert(perm).unwrap();
        first.deactivate(id, &Principal::new("A")).unwrap();

        let second = PermissionStore::new(kv);
        second.load();
        assert_eq!(second.count(), 1);
        assert!(!second.get(id).unwrap().active);
    }
}
