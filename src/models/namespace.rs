//! Storage namespace derived from the signed-in user.

use std::fmt;

/// Key stored for sessions without a signed-in user.
pub const ANONYMOUS_KEY: &str = "anon";

const USER_PREFIX: &str = "user-";

/// Which user's data a persisted store is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    /// No signed-in user (data recorded before any sign-in)
    #[default]
    Anonymous,
    /// A signed-in user, identified by the provider's opaque user id
    User(String),
}

impl Namespace {
    /// Namespace for an optional user id. Empty ids count as anonymous.
    pub fn for_user(user_id: Option<&str>) -> Self {
        match user_id {
            Some(id) if !id.is_empty() => Namespace::User(id.to_string()),
            _ => Namespace::Anonymous,
        }
    }

    /// The key string used as storage suffix: `anon` or `user-<id>`.
    pub fn key(&self) -> String {
        match self {
            Namespace::Anonymous => ANONYMOUS_KEY.to_string(),
            Namespace::User(id) => format!("{USER_PREFIX}{id}"),
        }
    }

    /// Parse a previously persisted key. Unknown shapes are rejected.
    pub fn from_key(key: &str) -> Option<Self> {
        if key == ANONYMOUS_KEY {
            return Some(Namespace::Anonymous);
        }
        key.strip_prefix(USER_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Namespace::User(id.to_string()))
    }

    /// The user id, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Namespace::Anonymous => None,
            Namespace::User(id) => Some(id),
        }
    }

    /// Full storage key for a store prefix, e.g. `keepr-store-user-42`.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.key())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
