//! Domain types for the Warden protection engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a protected record (e.g. a purchase order).
    ResourceId
);
string_id!(
    /// Identifier of an organizational unit.
    UnitId
);
string_id!(UserId);

/// Unit ids governing one evaluation. Ordered so logs and lookups are
/// deterministic; duplicates collapse on construction.
pub type UnitIdSet = BTreeSet<UnitId>;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Organizational unit with one protection flag per operation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub protect_create: bool,
    #[serde(default)]
    pub protect_read: bool,
    #[serde(default)]
    pub protect_update: bool,
    #[serde(default)]
    pub protect_delete: bool,
}

impl Unit {
    /// Unprotected unit; chain the `protecting` builder to set flags.
    pub fn new(id: impl Into<UnitId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_deleted: false,
            protect_create: false,
            protect_read: false,
            protect_update: false,
            protect_delete: false,
        }
    }

    pub fn protecting(mut self, operation: OperationType) -> Self {
        *self.flag_mut(operation) = true;
        self
    }

    fn flag_mut(&mut self, operation: OperationType) -> &mut bool {
        match operation {
            OperationType::Create => &mut self.protect_create,
            OperationType::Read => &mut self.protect_read,
            OperationType::Update => &mut self.protect_update,
            OperationType::Delete => &mut self.protect_delete,
        }
    }
}

/// Resource → unit relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAssignment {
    pub resource_id: ResourceId,
    pub unit_id: UnitId,
}

/// User → unit relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMembership {
    pub user_id: UserId,
    pub unit_id: UnitId,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Read,
    Update,
    Delete,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// Whether `unit` requires protection for this operation.
    #[inline]
    pub fn is_protected(self, unit: &Unit) -> bool {
        match self {
            Self::Create => unit.protect_create,
            Self::Read => unit.protect_read,
            Self::Update => unit.protect_update,
            Self::Delete => unit.protect_delete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown operation type: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Header carrying the acting user's id on inbound requests.
pub const DEFAULT_USER_ID_HEADER: &str = "x-okapi-user-id";

/// Acting user of an evaluation. An empty context is not an anonymous
/// user: evaluations reject it outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityContext {
    user_id: Option<UserId>,
}

impl IdentityContext {
    /// A blank id cannot identify anyone and yields an anonymous context.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        let user_id = user_id.into();
        Self {
            user_id: (!user_id.as_str().trim().is_empty()).then_some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Extracts the user id from request headers. Header names compare
    /// case-insensitively; a blank value counts as absent.
    pub fn from_headers<'a, I>(headers: I, header_name: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let user_id = headers
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header_name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(UserId::from);
        Self { user_id }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The two ways a caller can ask for an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationRequest {
    ByResource {
        resource_id: ResourceId,
        operation: OperationType,
        identity: IdentityContext,
    },
    ByUnitIds {
        unit_ids: UnitIdSet,
        operation: OperationType,
        identity: IdentityContext,
    },
}

impl EvaluationRequest {
    pub fn operation(&self) -> OperationType {
        match self {
            Self::ByResource { operation, .. } | Self::ByUnitIds { operation, .. } => *operation,
        }
    }

    pub fn identity(&self) -> &IdentityContext {
        match self {
            Self::ByResource { identity, .. } | Self::ByUnitIds { identity, .. } => identity,
        }
    }
}
