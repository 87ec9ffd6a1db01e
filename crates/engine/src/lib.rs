//! Protection evaluation engine: unit merge policy, completeness checks,
//! and the membership override.

pub mod decision;
pub mod engine;
pub mod policy;

pub use decision::{Decision, DecisionReason};
pub use engine::ProtectionEngine;
