//! Protection evaluation pipeline.
//!
//! One evaluation is a single sequential chain of lookups:
//! assignments -> units -> completeness -> merge -> memberships.
//! Each stage is an `.await` on the previous stage's output and any
//! failure ends the chain through `?`, so the first error encountered is
//! the one the caller sees and no later lookup is issued.

use std::sync::Arc;

use warden_core::{
    ErrorCode, EvaluationRequest, IdentityContext, OperationType, ResourceId, UnitIdSet, UserId,
    WardenError, WardenResult,
};
use warden_provider::{AssignmentLookup, MembershipLookup, UnitLookup};

use crate::decision::{Decision, DecisionReason};
use crate::policy;

/// Decides whether an operation on a unit-governed resource is restricted
/// for the acting user.
///
/// Holds only its collaborators; cheap to share behind an `Arc` and safe
/// to call from concurrent requests.
///
/// ```ignore
/// let directory = Arc::new(InMemoryDirectory::from_path("directory.json")?);
/// let engine = ProtectionEngine::from_directory(directory);
/// let restricted = engine
///     .evaluate_by_resource(&"order-1".into(), OperationType::Update, &identity)
///     .await?;
/// ```
#[derive(Clone)]
pub struct ProtectionEngine {
    assignments: Arc<dyn AssignmentLookup>,
    units: Arc<dyn UnitLookup>,
    memberships: Arc<dyn MembershipLookup>,
}

impl ProtectionEngine {
    pub fn new(
        assignments: Arc<dyn AssignmentLookup>,
        units: Arc<dyn UnitLookup>,
        memberships: Arc<dyn MembershipLookup>,
    ) -> Self {
        Self {
            assignments,
            units,
            memberships,
        }
    }

    /// Uses one backend for all three lookups.
    pub fn from_directory<D>(directory: Arc<D>) -> Self
    where
        D: AssignmentLookup + UnitLookup + MembershipLookup + 'static,
    {
        Self::new(directory.clone(), directory.clone(), directory)
    }

    /// `true` when the operation on `resource_id` is restricted for the user.
    pub async fn evaluate_by_resource(
        &self,
        resource_id: &ResourceId,
        operation: OperationType,
        identity: &IdentityContext,
    ) -> WardenResult<bool> {
        self.decide_by_resource(resource_id, operation, identity)
            .await
            .map(|d| d.restricted)
    }

    /// `true` when the operation over `unit_ids` is restricted for the user.
    pub async fn evaluate_by_unit_ids(
        &self,
        unit_ids: &UnitIdSet,
        operation: OperationType,
        identity: &IdentityContext,
    ) -> WardenResult<bool> {
        self.decide_by_unit_ids(unit_ids, operation, identity)
            .await
            .map(|d| d.restricted)
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> WardenResult<bool> {
        self.decide(request).await.map(|d| d.restricted)
    }

    pub async fn decide(&self, request: &EvaluationRequest) -> WardenResult<Decision> {
        match request {
            EvaluationRequest::ByResource {
                resource_id,
                operation,
                identity,
            } => self.decide_by_resource(resource_id, *operation, identity).await,
            EvaluationRequest::ByUnitIds {
                unit_ids,
                operation,
                identity,
            } => self.decide_by_unit_ids(unit_ids, *operation, identity).await,
        }
    }

    pub async fn decide_by_resource(
        &self,
        resource_id: &ResourceId,
        operation: OperationType,
        identity: &IdentityContext,
    ) -> WardenResult<Decision> {
        let user_id = require_actor(identity)?;

        let unit_ids = self.assignments.assigned_units(resource_id).await?;
        tracing::debug!(%resource_id, units = unit_ids.len(), "resolved unit assignments");

        self.decide_for_units(user_id, unit_ids, operation).await
    }

    pub async fn decide_by_unit_ids(
        &self,
        unit_ids: &UnitIdSet,
        operation: OperationType,
        identity: &IdentityContext,
    ) -> WardenResult<Decision> {
        let user_id = require_actor(identity)?;
        self.decide_for_units(user_id, unit_ids.clone(), operation).await
    }

    /// `unit_ids` is moved through every stage so the merge and the
    /// membership lookup always see the same set.
    async fn decide_for_units(
        &self,
        user_id: &UserId,
        unit_ids: UnitIdSet,
        operation: OperationType,
    ) -> WardenResult<Decision> {
        if unit_ids.is_empty() {
            let decision = Decision::new(DecisionReason::NoUnits, operation, unit_ids);
            return Ok(finish(user_id, decision));
        }

        let units = self.units.units(&unit_ids).await?;
        policy::ensure_complete(&unit_ids, &units)?;

        if !policy::is_protected(&units, operation) {
            let decision = Decision::new(DecisionReason::Unprotected, operation, unit_ids);
            return Ok(finish(user_id, decision));
        }

        let member_of = self.memberships.memberships(user_id, &unit_ids).await?;
        tracing::debug!(%user_id, %operation, member_of = member_of.len(), "checked memberships");

        let reason = if member_of.is_empty() {
            DecisionReason::Restricted
        } else {
            DecisionReason::MembershipOverride
        };
        Ok(finish(user_id, Decision::new(reason, operation, unit_ids)))
    }
}

/// Evaluations cannot proceed without an actor. Checked before any lookup;
/// a blank id is as unresolvable as a missing one.
fn require_actor(identity: &IdentityContext) -> WardenResult<&UserId> {
    identity
        .user_id()
        .filter(|user_id| !user_id.as_str().trim().is_empty())
        .ok_or_else(|| {
            tracing::warn!("evaluation rejected: no user id in identity context");
            WardenError::Forbidden(ErrorCode::UnknownUser)
        })
}

fn finish(user_id: &UserId, decision: Decision) -> Decision {
    tracing::info!(
        %user_id,
        operation = %decision.operation,
        units = decision.unit_ids.len(),
        restricted = decision.restricted,
        reason = %decision.reason,
        "protection evaluated"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_core::{Collaborator, LookupError, Unit, UnitId};
    use warden_provider::InMemoryDirectory;

    fn ids(raw: &[&str]) -> UnitIdSet {
        raw.iter().copied().map(UnitId::from).collect()
    }

    fn alice() -> IdentityContext {
        IdentityContext::new("alice")
    }

    /// Collaborator that fails every call.
    struct Broken(LookupError);

    #[async_trait]
    impl AssignmentLookup for Broken {
        async fn assigned_units(&self, _: &ResourceId) -> Result<UnitIdSet, LookupError> {
            Err(self.0.clone())
        }
    }

    #[async_trait]
    impl UnitLookup for Broken {
        async fn units(&self, _: &UnitIdSet) -> Result<Vec<Unit>, LookupError> {
            Err(self.0.clone())
        }
    }

    #[async_trait]
    impl MembershipLookup for Broken {
        async fn memberships(&self, _: &UserId, _: &UnitIdSet) -> Result<UnitIdSet, LookupError> {
            Err(self.0.clone())
        }
    }

    fn protected_directory() -> Arc<InMemoryDirectory> {
        Arc::new(
            InMemoryDirectory::new()
                .with_unit(Unit::new("u1", "Main").protecting(OperationType::Update))
                .assign("r1", "u1"),
        )
    }

    #[tokio::test]
    async fn anonymous_identity_is_forbidden_before_any_lookup() {
        let directory = protected_directory();
        let engine = ProtectionEngine::from_directory(directory.clone());
        let anonymous = IdentityContext::anonymous();

        let by_resource = engine
            .evaluate_by_resource(&"r1".into(), OperationType::Update, &anonymous)
            .await;
        let by_units = engine
            .evaluate_by_unit_ids(&ids(&["u1"]), OperationType::Update, &anonymous)
            .await;

        let forbidden = WardenError::Forbidden(ErrorCode::UnknownUser);
        assert_eq!(by_resource, Err(forbidden.clone()));
        assert_eq!(by_units, Err(forbidden));
        assert_eq!(directory.calls().total(), 0);
    }

    #[tokio::test]
    async fn blank_user_id_is_forbidden_before_any_lookup() {
        let directory = protected_directory();
        let engine = ProtectionEngine::from_directory(directory.clone());
        let forbidden = WardenError::Forbidden(ErrorCode::UnknownUser);

        for blank in ["", "   "] {
            let identity = IdentityContext::new(blank);

            let by_resource = engine
                .evaluate_by_resource(&"r1".into(), OperationType::Update, &identity)
                .await;
            let by_units = engine
                .evaluate_by_unit_ids(&ids(&["u1"]), OperationType::Update, &identity)
                .await;

            assert_eq!(by_resource, Err(forbidden.clone()), "user id {blank:?}");
            assert_eq!(by_units, Err(forbidden.clone()), "user id {blank:?}");
        }
        assert_eq!(directory.calls().total(), 0);
    }

    #[tokio::test]
    async fn assignment_failure_propagates_and_stops_the_chain() {
        let directory = protected_directory();
        let failure = LookupError::Unavailable {
            service: Collaborator::Assignments,
            message: "timeout".into(),
        };
        let engine = ProtectionEngine::new(
            Arc::new(Broken(failure.clone())),
            directory.clone(),
            directory.clone(),
        );

        let result = engine
            .evaluate_by_resource(&"r1".into(), OperationType::Update, &alice())
            .await;
        assert_eq!(result, Err(WardenError::Lookup(failure)));
        assert_eq!(directory.calls().total(), 0);
    }

    #[tokio::test]
    async fn unit_failure_propagates_unchanged() {
        let directory = protected_directory();
        let failure = LookupError::Rejected {
            service: Collaborator::Units,
            status: 400,
            message: "bad query".into(),
        };
        let engine = ProtectionEngine::new(
            directory.clone(),
            Arc::new(Broken(failure.clone())),
            directory.clone(),
        );

        let result = engine
            .evaluate_by_resource(&"r1".into(), OperationType::Update, &alice())
            .await;
        assert_eq!(result, Err(WardenError::Lookup(failure)));
        assert_eq!(directory.calls().memberships, 0);
    }

    #[tokio::test]
    async fn membership_failure_reaches_the_caller() {
        let directory = protected_directory();
        let failure = LookupError::RateLimited {
            service: Collaborator::Memberships,
        };
        let engine = ProtectionEngine::new(
            directory.clone(),
            directory.clone(),
            Arc::new(Broken(failure.clone())),
        );

        let result = engine
            .evaluate_by_resource(&"r1".into(), OperationType::Update, &alice())
            .await;
        assert_eq!(result, Err(WardenError::Lookup(failure)));
    }

    #[tokio::test]
    async fn membership_lookup_skipped_when_unprotected() {
        let directory = protected_directory();
        let failure = LookupError::RateLimited {
            service: Collaborator::Memberships,
        };
        let engine = ProtectionEngine::new(
            directory.clone(),
            directory.clone(),
            Arc::new(Broken(failure)),
        );

        // u1 protects Update only; Delete never reaches the broken membership lookup.
        let restricted = engine
            .evaluate_by_resource(&"r1".into(), OperationType::Delete, &alice())
            .await
            .unwrap();
        assert!(!restricted);
    }

    #[tokio::test]
    async fn decide_reports_reason_and_units() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_unit(Unit::new("u1", "Main").protecting(OperationType::Create))
                .add_member("alice", "u1"),
        );
        let engine = ProtectionEngine::from_directory(directory);

        let request = EvaluationRequest::ByUnitIds {
            unit_ids: ids(&["u1"]),
            operation: OperationType::Create,
            identity: alice(),
        };
        let decision = engine.decide(&request).await.unwrap();
        assert_eq!(decision.reason, DecisionReason::MembershipOverride);
        assert!(!decision.restricted);
        assert_eq!(decision.unit_ids, ids(&["u1"]));

        let bob = EvaluationRequest::ByUnitIds {
            unit_ids: ids(&["u1"]),
            operation: OperationType::Create,
            identity: IdentityContext::new("bob"),
        };
        assert!(engine.evaluate(&bob).await.unwrap());
    }
}
