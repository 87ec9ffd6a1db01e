//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod types;

pub use error::{Collaborator, ErrorCode, LookupError, WardenError, WardenResult};
pub use types::{
    EvaluationRequest, IdentityContext, OperationType, ResourceId, Unit, UnitAssignment, UnitId,
    UnitIdSet, UnitMembership, UserId, DEFAULT_USER_ID_HEADER,
};
