//! Reasoned evaluation outcome.

use serde::Serialize;
use std::fmt;
use warden_core::{OperationType, UnitIdSet};

/// Why an evaluation ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No unit governs the resource.
    NoUnits,
    /// At least one governing unit leaves the operation unprotected.
    Unprotected,
    /// Protected, but the user belongs to a governing unit.
    MembershipOverride,
    /// Protected and the user belongs to none of the governing units.
    Restricted,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoUnits => "no_units",
            Self::Unprotected => "unprotected",
            Self::MembershipOverride => "membership_override",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub restricted: bool,
    pub reason: DecisionReason,
    pub operation: OperationType,
    /// Units the decision was made over.
    pub unit_ids: UnitIdSet,
}

impl Decision {
    pub(crate) fn new(
        reason: DecisionReason,
        operation: OperationType,
        unit_ids: UnitIdSet,
    ) -> Self {
        Self {
            restricted: reason == DecisionReason::Restricted,
            reason,
            operation,
            unit_ids,
        }
    }
}
