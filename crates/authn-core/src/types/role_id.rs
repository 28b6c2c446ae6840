//! Role identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

use super::Account;

/// A validated role identifier of the form `kind:id`, optionally qualified
/// with an account (`account:kind:id`).
///
/// The id part may itself contain `:` and `/` (`host:app/web`), so only the
/// leading kind is split off when no account qualifier is present.
///
/// # Example
///
/// ```
/// use authn_core::RoleId;
///
/// let role = RoleId::new("user:alice").unwrap();
/// assert_eq!(role.kind(), "user");
/// assert_eq!(role.id(), "alice");
/// assert!(role.account().is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId {
    account: Option<Account>,
    kind: String,
    id: String,
}

/// Role kinds that can own an API key.
const KINDS: &[&str] = &["user", "host", "group", "layer", "policy"];

impl RoleId {
    /// Parse a role id.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind or id is empty, or contains control characters.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let invalid = |reason: &str| InvalidInputError::RoleId {
            value: s.escape_debug().to_string(),
            reason: reason.to_string(),
        };

        if s.chars().any(char::is_control) {
            return Err(invalid("must not contain control characters").into());
        }

        let (first, rest) = s.split_once(':').ok_or_else(|| invalid("must be 'kind:id'"))?;

        // `account:kind:id` when the first part is not a known kind.
        let (account, kind, id) = if KINDS.contains(&first) {
            (None, first, rest)
        } else {
            let (kind, id) = rest
                .split_once(':')
                .ok_or_else(|| invalid("must be 'kind:id' or 'account:kind:id'"))?;
            let account = Account::new(first).map_err(|_| invalid("account must be non-empty"))?;
            (Some(account), kind, id)
        };

        if kind.is_empty() {
            return Err(invalid("kind must be non-empty").into());
        }
        if id.is_empty() {
            return Err(invalid("id must be non-empty").into());
        }

        Ok(Self {
            account,
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }

    pub(crate) fn from_parts(kind: &str, id: &str) -> Self {
        Self {
            account: None,
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Returns the account qualifier, if present.
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Returns the role kind (`user`, `host`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the role id within its kind.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Compares kind and id, treating a missing account qualifier as `account`.
    pub fn is_same_role(&self, other: &RoleId, account: &Account) -> bool {
        let ours = self.account.as_ref().unwrap_or(account);
        let theirs = other.account.as_ref().unwrap_or(account);
        ours == theirs && self.kind == other.kind && self.id == other.id
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref account) = self.account {
            write!(f, "{}:", account)?;
        }
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for RoleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoleId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RoleId> for String {
    fn from(role: RoleId) -> Self {
        role.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_may_contain_slashes() {
        let role = RoleId::new("host:app/web").unwrap();
        assert_eq!(role.kind(), "host");
        assert_eq!(role.id(), "app/web");
    }

    #[test]
    fn account_qualified_role() {
        let role = RoleId::new("cucumber:user:alice").unwrap();
        assert_eq!(role.account().map(Account::as_str), Some("cucumber"));
        assert_eq!(role.to_string(), "cucumber:user:alice");
    }

    #[test]
    fn same_role_ignores_matching_account_qualifier() {
        let account = Account::new("cucumber").unwrap();
        let bare = RoleId::new("user:admin").unwrap();
        let qualified = RoleId::new("cucumber:user:admin").unwrap();
        assert!(bare.is_same_role(&qualified, &account));
        assert!(!bare.is_same_role(&RoleId::new("user:alice").unwrap(), &account));
    }

    #[test]
    fn invalid_role_ids() {
        assert!(RoleId::new("alice").is_err());
        assert!(RoleId::new("user:").is_err());
        assert!(RoleId::new(":alice").is_err());
        assert!(RoleId::new("\0").is_err());
    }
}
