//! Account name type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated appliance account name (the organization namespace).
///
/// # Example
///
/// ```
/// use authn_core::Account;
///
/// let account = Account::new("cucumber").unwrap();
/// assert_eq!(account.as_str(), "cucumber");
/// assert!(Account::new("").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    /// Create a new account name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains control characters.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        super::check_identifier(&s).map_err(|reason| InvalidInputError::Account {
            value: s.escape_debug().to_string(),
            reason: reason.to_string(),
        })?;
        Ok(Self(s))
    }

    /// Returns the account name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Account {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Account {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}

impl AsRef<str> for Account {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
