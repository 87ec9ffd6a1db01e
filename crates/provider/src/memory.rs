//! In-memory directory of units, assignments, and memberships.
//!
//! Backs the CLI (loaded from a JSON document) and every engine test. Each
//! lookup bumps a per-collaborator counter so callers can assert exactly
//! which remote calls an evaluation would have issued.
//!
//! ```ignore
//! let directory = InMemoryDirectory::from_path("directory.json")?;
//! let ids = directory.assigned_units(&"order-1".into()).await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use warden_core::{
    LookupError, ResourceId, Unit, UnitAssignment, UnitId, UnitIdSet, UnitMembership, UserId,
};

use crate::{AssignmentLookup, MembershipLookup, UnitLookup};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed directory document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk shape of a directory. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DirectoryDocument {
    units: Vec<Unit>,
    assignments: Vec<UnitAssignment>,
    memberships: Vec<UnitMembership>,
}

/// Lookup counts per collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupCalls {
    pub assignments: usize,
    pub units: usize,
    pub memberships: usize,
}

impl LookupCalls {
    pub fn total(&self) -> usize {
        self.assignments + self.units + self.memberships
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    units: HashMap<UnitId, Unit>,
    assignments: Vec<UnitAssignment>,
    memberships: Vec<UnitMembership>,
    assignment_calls: AtomicUsize,
    unit_calls: AtomicUsize,
    membership_calls: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, DirectoryError> {
        let doc: DirectoryDocument = serde_json::from_str(json)?;
        let mut directory = Self::new();
        for unit in doc.units {
            directory = directory.with_unit(unit);
        }
        directory.assignments = doc.assignments;
        directory.memberships = doc.memberships;

        tracing::debug!(
            units = directory.units.len(),
            assignments = directory.assignments.len(),
            memberships = directory.memberships.len(),
            "loaded directory"
        );
        Ok(directory)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Adds or replaces a unit.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.units.insert(unit.id.clone(), unit);
        self
    }

    pub fn assign(
        mut self,
        resource_id: impl Into<ResourceId>,
        unit_id: impl Into<UnitId>,
    ) -> Self {
        self.assignments.push(UnitAssignment {
            resource_id: resource_id.into(),
            unit_id: unit_id.into(),
        });
        self
    }

    pub fn add_member(mut self, user_id: impl Into<UserId>, unit_id: impl Into<UnitId>) -> Self {
        self.memberships.push(UnitMembership {
            user_id: user_id.into(),
            unit_id: unit_id.into(),
        });
        self
    }

    pub fn calls(&self) -> LookupCalls {
        LookupCalls {
            assignments: self.assignment_calls.load(Ordering::Relaxed),
            units: self.unit_calls.load(Ordering::Relaxed),
            memberships: self.membership_calls.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl AssignmentLookup for InMemoryDirectory {
    async fn assigned_units(&self, resource_id: &ResourceId) -> Result<UnitIdSet, LookupError> {
        self.assignment_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .assignments
            .iter()
            .filter(|a| &a.resource_id == resource_id)
            .map(|a| a.unit_id.clone())
            .collect())
    }
}

#[async_trait]
impl UnitLookup for InMemoryDirectory {
    /// Soft-deleted units are treated as absent.
    async fn units(&self, unit_ids: &UnitIdSet) -> Result<Vec<Unit>, LookupError> {
        self.unit_calls.fetch_add(1, Ordering::Relaxed);
        Ok(unit_ids
            .iter()
            .filter_map(|id| self.units.get(id))
            .filter(|unit| !unit.is_deleted)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MembershipLookup for InMemoryDirectory {
    async fn memberships(
        &self,
        user_id: &UserId,
        unit_ids: &UnitIdSet,
    ) -> Result<UnitIdSet, LookupError> {
        self.membership_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .memberships
            .iter()
            .filter(|m| &m.user_id == user_id && unit_ids.contains(&m.unit_id))
            .map(|m| m.unit_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::OperationType;

    fn ids(raw: &[&str]) -> UnitIdSet {
        raw.iter().copied().map(UnitId::from).collect()
    }

    #[tokio::test]
    async fn resolves_assignments_per_resource() {
        let directory = InMemoryDirectory::new()
            .assign("r1", "u1")
            .assign("r1", "u2")
            .assign("r2", "u3");

        let assigned = directory.assigned_units(&"r1".into()).await.unwrap();
        assert_eq!(assigned, ids(&["u1", "u2"]));

        let none = directory.assigned_units(&"r9".into()).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(directory.calls().assignments, 2);
    }

    #[tokio::test]
    async fn unit_lookup_skips_unknown_and_deleted() {
        let mut retired = Unit::new("u2", "Retired");
        retired.is_deleted = true;
        let directory = InMemoryDirectory::new()
            .with_unit(Unit::new("u1", "Main"))
            .with_unit(retired);

        let units = directory.units(&ids(&["u1", "u2", "u3"])).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, UnitId::from("u1"));
    }

    #[tokio::test]
    async fn memberships_are_restricted_to_requested_units() {
        let directory = InMemoryDirectory::new()
            .add_member("alice", "u1")
            .add_member("alice", "u3")
            .add_member("bob", "u2");

        let alice = directory
            .memberships(&"alice".into(), &ids(&["u1", "u2"]))
            .await
            .unwrap();
        assert_eq!(alice, ids(&["u1"]));
        assert_eq!(directory.calls().memberships, 1);
    }

    #[tokio::test]
    async fn loads_json_document() {
        let directory = InMemoryDirectory::from_json_str(
            r#"{
                "units": [{"id": "u1", "name": "Main", "protectUpdate": true}],
                "assignments": [{"resourceId": "r1", "unitId": "u1"}],
                "memberships": [{"userId": "alice", "unitId": "u1"}]
            }"#,
        )
        .unwrap();

        let units = directory.units(&ids(&["u1"])).await.unwrap();
        assert!(OperationType::Update.is_protected(&units[0]));
        assert_eq!(
            directory.assigned_units(&"r1".into()).await.unwrap(),
            ids(&["u1"])
        );
        assert_eq!(directory.calls().total(), 2);
    }

    #[test]
    fn rejects_unknown_sections() {
        let err = InMemoryDirectory::from_json_str(r#"{"roles": []}"#).unwrap_err();
        assert!(matches!(err, DirectoryError::Parse(_)));
    }
}
