//! Deterministic synthetic identities.
//!
//! Every field of an [`Identity`] is derived purely from its numeric index,
//! so a cleanup run can target the users created by an earlier (possibly
//! crashed) load run without any shared state.

use std::ops::RangeInclusive;

use serde::Serialize;

/// Prefix shared by every generated username.
const USERNAME_PREFIX: &str = "user";

/// A synthetic test user.
///
/// Serializes to the registration payload expected by the target service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Numeric index this identity was derived from (1-based).
    #[serde(skip)]
    pub index: u32,
    /// Username, always `user<index>`.
    pub username: String,
    /// Password, identical to the username.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Contact phone number.
    pub contact: String,
    /// Postal address.
    pub address: String,
}

impl Identity {
    /// Derives the identity for index `n`.
    #[must_use]
    pub fn from_index(n: u32) -> Self {
        let username = username_for(n);
        Self {
            index: n,
            password: password_for(&username),
            name: format!("User {n}"),
            email: format!("{username}@example.com"),
            contact: format!("+91 987654{n:04}"),
            address: format!("{n}00 Main St, Anytown, AnyState"),
            username,
        }
    }
}

/// Returns the username for index `n`.
#[must_use]
pub fn username_for(n: u32) -> String {
    format!("{USERNAME_PREFIX}{n}")
}

/// Returns the password for a generated username.
#[must_use]
pub fn password_for(username: &str) -> String {
    username.to_string()
}

/// Recovers the index from a generated username, if it has the expected shape.
#[must_use]
pub fn index_of(username: &str) -> Option<u32> {
    username.strip_prefix(USERNAME_PREFIX)?.parse().ok()
}

/// Builds the working set for the given index range.
#[must_use]
pub fn identities(range: RangeInclusive<u32>) -> Vec<Identity> {
    range.map(Identity::from_index).collect()
}
