//! Lookup abstractions for the collaborators the engine consults, plus an
//! in-memory directory and a retrying decorator.

pub mod memory;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{LookupError, ResourceId, Unit, UnitIdSet, UserId};

pub use memory::{DirectoryError, InMemoryDirectory, LookupCalls};
pub use retry::{RetryPolicy, Retrying};

/// Resolves the units a resource is assigned to.
#[async_trait]
pub trait AssignmentLookup: Send + Sync {
    async fn assigned_units(&self, resource_id: &ResourceId) -> Result<UnitIdSet, LookupError>;
}

/// Fetches full unit objects. May return fewer units than requested when
/// some ids are unknown; callers decide what that means.
#[async_trait]
pub trait UnitLookup: Send + Sync {
    async fn units(&self, unit_ids: &UnitIdSet) -> Result<Vec<Unit>, LookupError>;
}

/// Returns the subset of `unit_ids` the user is a member of.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn memberships(
        &self,
        user_id: &UserId,
        unit_ids: &UnitIdSet,
    ) -> Result<UnitIdSet, LookupError>;
}

#[async_trait]
impl<T: AssignmentLookup + ?Sized> AssignmentLookup for Arc<T> {
    async fn assigned_units(&self, resource_id: &ResourceId) -> Result<UnitIdSet, LookupError> {
        (**self).assigned_units(resource_id).await
    }
}

#[async_trait]
impl<T: UnitLookup + ?Sized> UnitLookup for Arc<T> {
    async fn units(&self, unit_ids: &UnitIdSet) -> Result<Vec<Unit>, LookupError> {
        (**self).units(unit_ids).await
    }
}

#[async_trait]
impl<T: MembershipLookup + ?Sized> MembershipLookup for Arc<T> {
    async fn memberships(
        &self,
        user_id: &UserId,
        unit_ids: &UnitIdSet,
    ) -> Result<UnitIdSet, LookupError> {
        (**self).memberships(user_id, unit_ids).await
    }
}
