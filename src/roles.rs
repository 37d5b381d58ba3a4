use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of permission tiers a user can hold. Stored and transported
/// as the lowercase strings `admin`, `author` and `reader`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Author,
    #[default]
    Reader,
}

/// ROLE_HIERARCHY
///
/// Maps every role to the roles whose permissions it subsumes. Total over the
/// enumeration and reflexive: each entry lists the role itself.
static ROLE_HIERARCHY: [(Role, &[Role]); 3] = [
    (Role::Admin, &[Role::Admin, Role::Author, Role::Reader]),
    (Role::Author, &[Role::Author, Role::Reader]),
    (Role::Reader, &[Role::Reader]),
];

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Author, Role::Reader];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Author => "author",
            Role::Reader => "reader",
        }
    }

    /// The roles this role holds the permissions of, itself included.
    pub fn subsumes(self) -> &'static [Role] {
        ROLE_HIERARCHY
            .iter()
            .find(|(role, _)| *role == self)
            .map(|(_, granted)| *granted)
            .unwrap_or(&[])
    }

    pub fn permits(self, required: Role) -> bool {
        self.subsumes().contains(&required)
    }
}

/// permits
///
/// Answers whether a role claim, as carried in a token or a database row,
/// grants the permissions of `required`. Strings outside the enumeration
/// never grant anything.
pub fn permits(held_role: &str, required: Role) -> bool {
    held_role
        .parse::<Role>()
        .map(|held| held.permits(required))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            "reader" => Ok(Role::Reader),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
