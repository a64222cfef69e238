// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Record Vault security core.
//
// Field names serialize in camelCase and enum tags in lowercase so that the
// persisted `security_audit_logs` and `access_permissions` collections keep
// the layout the presentation layer already reads.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecordVaultError;

/// Unique identifier for an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub Uuid);

impl PermissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PermissionId {
    type Err = RecordVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| RecordVaultError::invalid(format!("permission id `{s}`: {e}")))
    }
}

/// An actor identifier (typically a wallet or account address).
///
/// Principals are opaque strings supplied by the identity collaborator.
/// Equality is case-insensitive; the original spelling is kept for display
/// and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-folded form used for comparisons and key derivation.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// Case-insensitive comparison against a raw identifier.
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other || self.0.to_lowercase() == other.to_lowercase()
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Principal {}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Principal {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Coarse severity attached to an audit event.
///
/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = RecordVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(RecordVaultError::invalid(format!("unknown risk level `{other}`"))),
        }
    }
}

/// What kind of resource a grant covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A single personal record.
    Record,
    /// The owner's profile.
    Profile,
    /// Everything the owner holds.
    FullAccess,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Profile => "profile",
            Self::FullAccess => "full_access",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = RecordVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Self::Record),
            "profile" => Ok(Self::Profile),
            "full_access" | "full-access" => Ok(Self::FullAccess),
            other => Err(RecordVaultError::invalid(format!("unknown resource type `{other}`"))),
        }
    }
}

/// A single operation a grantee may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRight {
    Read,
    Write,
    Share,
    Delete,
}

impl AccessRight {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Share => "share",
            Self::Delete => "delete",
        }
    }

    /// Parse a comma-separated list such as `"read,share"`.
    pub fn parse_set(list: &str) -> Result<BTreeSet<Self>, RecordVaultError> {
        list.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessRight {
    type Err = RecordVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "share" => Ok(Self::Share),
            "delete" => Ok(Self::Delete),
            other => Err(RecordVaultError::invalid(format!("unknown access right `{other}`"))),
        }
    }
}

/// A recorded security event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub principal: Principal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The caller-supplied part of an audit event.
///
/// The audit log fills in the id, timestamp and client context.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub action: String,
    pub principal: Principal,
    pub resource_id: Option<String>,
    pub success: bool,
    pub risk_level: RiskLevel,
    pub details: Option<String>,
}

impl EventInput {
    /// A successful event with no resource or details attached.
    pub fn new(action: impl Into<String>, principal: impl Into<Principal>, risk_level: RiskLevel) -> Self {
        Self {
            action: action.into(),
            principal: principal.into(),
            resource_id: None,
            success: true,
            risk_level,
            details: None,
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Derived lifecycle state of a permission at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Active and not yet expired.
    Active,
    /// Explicitly revoked by its granter. Terminal.
    Revoked,
    /// Past `expires_at` without being revoked. Terminal.
    Expired,
}

/// A time-bounded grant from `granter` to `grantee` over one resource.
///
/// Never deleted: revocation only clears `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub granter: Principal,
    pub grantee: Principal,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub permissions: BTreeSet<AccessRight>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Permission {
    /// Lifecycle state evaluated at `now`. Revocation wins over expiry.
    pub fn status(&self, now: DateTime<Utc>) -> PermissionStatus {
        if !self.active {
            PermissionStatus::Revoked
        } else if self.expires_at <= now {
            PermissionStatus::Expired
        } else {
            PermissionStatus::Active
        }
    }

    /// `active && expires_at > now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == PermissionStatus::Active
    }

    pub fn allows(&self, right: AccessRight) -> bool {
        self.permissions.contains(&right)
    }

    /// Whether `principal` is either side of the grant.
    pub fn involves(&self, principal: &Principal) -> bool {
        &self.granter == principal || &self.grantee == principal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_permission(now: DateTime<Utc>) -> Permission {
        Permission {
            id: PermissionId::new(),
            granter: Principal::new("0xAbC"),
            grantee: Principal::new("0xDef"),
            resource_id: "rec1".into(),
            resource_type: ResourceType::Record,
            permissions: [AccessRight::Read].into_iter().collect(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            active: true,
        }
    }

    #[test]
    fn principal_equality_ignores_case() {
        assert_eq!(Principal::new("0xABCdef"), Principal::new("0xabcDEF"));
        assert_ne!(Principal::new("alice"), Principal::new("bob"));
        assert!(Principal::new("Alice").matches("ALICE"));
        assert!(Principal::new("  ").is_blank());
    }

    #[test]
    fn status_transitions() {
        let now = Utc::now();
        let mut perm = sample_permission(now);
        assert_eq!(perm.status(now), PermissionStatus::Active);
        assert!(perm.is_effective(now));

        // Expiry boundary is exclusive.
        assert_eq!(perm.status(perm.expires_at), PermissionStatus::Expired);

        perm.active = false;
        assert_eq!(perm.status(now), PermissionStatus::Revoked);
        assert_eq!(
            perm.status(now + Duration::days(2)),
            PermissionStatus::Revoked
        );
    }

    #[test]
    fn involves_either_side() {
        let perm = sample_permission(Utc::now());
        assert!(perm.involves(&Principal::new("0xabc")));
        assert!(perm.involves(&Principal::new("0XDEF")));
        assert!(!perm.involves(&Principal::new("0x123")));
    }

    #[test]
    fn persisted_layout_uses_camel_case_and_lowercase_tags() {
        let perm = sample_permission(Utc::now());
        let json = serde_json::to_value(&perm).unwrap();
        assert_eq!(json["resourceId"], "rec1");
        assert_eq!(json["resourceType"], "record");
        assert_eq!(json["permissions"][0], "read");
        assert!(json.get("expiresAt").is_some());
        assert_eq!(json["granter"], "0xAbC");

        let back: Permission = serde_json::from_value(json).unwrap();
        assert_eq!(back, perm);
    }

    #[test]
    fn full_access_tag() {
        let json = serde_json::to_string(&ResourceType::FullAccess).unwrap();
        assert_eq!(json, "\"full_access\"");
        assert_eq!("full-access".parse::<ResourceType>().unwrap(), ResourceType::FullAccess);
    }

    #[test]
    fn parse_access_right_sets() {
        let set = AccessRight::parse_set("read, Share").unwrap();
        assert!(set.contains(&AccessRight::Read));
        assert!(set.contains(&AccessRight::Share));
        assert_eq!(set.len(), 2);

        assert!(AccessRight::parse_set("").unwrap().is_empty());
        assert!(AccessRight::parse_set("read,fly").is_err());
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
    }
}
