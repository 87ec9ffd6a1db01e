//! Centralized error types for the Warden workspace.

use std::fmt;

use thiserror::Error;

/// External lookup service that produced a [`LookupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Assignments,
    Units,
    Memberships,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assignments => "assignment",
            Self::Units => "unit",
            Self::Memberships => "membership",
        })
    }
}

/// Failure raised by a lookup collaborator. The engine forwards these
/// untouched; interpretation belongs to whoever called it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LookupError {
    #[error("{service} lookup unavailable: {message}")]
    Unavailable {
        service: Collaborator,
        message: String,
    },

    #[error("{service} lookup rate limited")]
    RateLimited { service: Collaborator },

    /// The remote side answered with a definitive refusal (bad query,
    /// not found, permission error).
    #[error("{service} lookup rejected ({status}): {message}")]
    Rejected {
        service: Collaborator,
        status: u16,
        message: String,
    },
}

impl LookupError {
    pub fn service(&self) -> Collaborator {
        match self {
            Self::Unavailable { service, .. }
            | Self::RateLimited { service }
            | Self::Rejected { service, .. } => *service,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::RateLimited { .. })
    }

    /// Status a request layer should answer with when this error surfaces.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Unavailable { .. } => 503,
            Self::RateLimited { .. } => 429,
            Self::Rejected { status, .. } => *status,
        }
    }
}

/// Stable machine-readable codes for engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownUser,
    OrderUnitsNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownUser => "unknownUser",
            Self::OrderUnitsNotFound => "orderAcqUnitsNotFound",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownUser => "Unknown user",
            Self::OrderUnitsNotFound => "Acquisitions units assigned to order not found",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Top-level error enum. Variants map to the failure taxonomy of an
/// evaluation: missing actor, inconsistent unit data, collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WardenError {
    #[error("Forbidden: {0}")]
    Forbidden(ErrorCode),

    #[error("Validation error: {0}")]
    Validation(ErrorCode),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
}

impl WardenError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden(code) | Self::Validation(code) => code.code(),
            Self::Lookup(_) => "lookupFailed",
        }
    }

    /// HTTP status a request layer is expected to map this error to.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::Validation(_) => 422,
            Self::Lookup(e) => e.status_hint(),
        }
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
