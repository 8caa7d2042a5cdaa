//! Authorities and realm roles.
//!
//! An [`Authority`] is the permission string that endpoint rules check.
//! Identity-provider tokens carry realm [`Role`]s, and each role grants a
//! fixed set of authorities. Tokens may also list authority strings directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AUTHORITY
// ============================================================================

/// Permission checked against a caller's granted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Authority {
    #[serde(rename = "AUTHORIZATION_USER_DEFAULT")]
    UserDefault,
    #[serde(rename = "AUTHORIZATION_CONSULTANT_DEFAULT")]
    ConsultantDefault,
    #[serde(rename = "AUTHORIZATION_TECHNICAL_DEFAULT")]
    TechnicalDefault,
    #[serde(rename = "AUTHORIZATION_USE_FEEDBACK")]
    UseFeedback,
}

impl Authority {
    pub const ALL: [Authority; 4] = [
        Authority::UserDefault,
        Authority::ConsultantDefault,
        Authority::TechnicalDefault,
        Authority::UseFeedback,
    ];

    /// Wire representation of the authority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::UserDefault => "AUTHORIZATION_USER_DEFAULT",
            Authority::ConsultantDefault => "AUTHORIZATION_CONSULTANT_DEFAULT",
            Authority::TechnicalDefault => "AUTHORIZATION_TECHNICAL_DEFAULT",
            Authority::UseFeedback => "AUTHORIZATION_USE_FEEDBACK",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Authority {
    type Err = UnknownAuthority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Authority::ALL
            .into_iter()
            .find(|authority| authority.as_str() == s)
            .ok_or_else(|| UnknownAuthority(s.to_string()))
    }
}

/// Returned when a string does not name a known authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown authority: {0}")]
pub struct UnknownAuthority(pub String);

// ============================================================================
// ROLE
// ============================================================================

/// Realm role as issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Consultant,
    U25Consultant,
    U25MainConsultant,
    Technical,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::User,
        Role::Consultant,
        Role::U25Consultant,
        Role::U25MainConsultant,
        Role::Technical,
    ];

    /// Realm role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Consultant => "consultant",
            Role::U25Consultant => "u25-consultant",
            Role::U25MainConsultant => "u25-main-consultant",
            Role::Technical => "technical",
        }
    }

    /// Parse a realm role name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Authorities granted by this role.
    pub fn authorities(&self) -> &'static [Authority] {
        match self {
            Role::User => &[Authority::UserDefault],
            Role::Consultant => &[Authority::ConsultantDefault],
            Role::U25Consultant | Role::U25MainConsultant => &[Authority::UseFeedback],
            Role::Technical => &[Authority::TechnicalDefault],
        }
    }
}

/// Compute the granted authority set from realm roles and direct authority strings.
///
/// Unknown role names and unknown authority strings are ignored.
pub fn granted_authorities<R, A>(roles: R, direct: A) -> BTreeSet<Authority>
where
    R: IntoIterator,
    R::Item: AsRef<str>,
    A: IntoIterator,
    A::Item: AsRef<str>,
{
    let mut granted: BTreeSet<Authority> = roles
        .into_iter()
        .filter_map(|name| Role::from_name(name.as_ref()))
        .flat_map(|role| role.authorities().iter().copied())
        .collect();

    granted.extend(
        direct
            .into_iter()
            .filter_map(|value| value.as_ref().parse::<Authority>().ok()),
    );

    granted
}
