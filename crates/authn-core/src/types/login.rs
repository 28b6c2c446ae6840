//! Login type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

use super::RoleId;

/// Prefix that marks a login as a host rather than a user.
const HOST_PREFIX: &str = "host/";

/// A validated login: a user name, or `host/<id>` for a host identity.
///
/// # Example
///
/// ```
/// use authn_core::Login;
///
/// let user = Login::new("admin").unwrap();
/// assert_eq!(user.role_id().to_string(), "user:admin");
///
/// let host = Login::new("host/app/web").unwrap();
/// assert!(host.is_host());
/// assert_eq!(host.role_id().to_string(), "host:app/web");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    /// Create a new login, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the login is empty, contains control characters,
    /// or is a bare `host/` prefix.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        super::check_identifier(&s).map_err(|reason| InvalidInputError::Login {
            value: s.escape_debug().to_string(),
            reason: reason.to_string(),
        })?;
        if s == HOST_PREFIX {
            return Err(InvalidInputError::Login {
                value: s,
                reason: "host id must be non-empty".to_string(),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Returns the login string as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this login names a host identity.
    pub fn is_host(&self) -> bool {
        self.0.starts_with(HOST_PREFIX)
    }

    /// Returns the role this login authenticates as.
    pub fn role_id(&self) -> RoleId {
        match self.0.strip_prefix(HOST_PREFIX) {
            Some(id) => RoleId::from_parts("host", id),
            None => RoleId::from_parts("user", &self.0),
        }
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Login {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Login {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Login> for String {
    fn from(login: Login) -> Self {
        login.0
    }
}

impl AsRef<str> for Login {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_login_maps_to_user_role() {
        let login = Login::new("alice").unwrap();
        assert!(!login.is_host());
        assert_eq!(login.role_id().kind(), "user");
        assert_eq!(login.role_id().id(), "alice");
    }

    #[test]
    fn host_login_maps_to_host_role() {
        let login = Login::new("host/myapp").unwrap();
        assert_eq!(login.role_id().to_string(), "host:myapp");
    }

    #[test]
    fn invalid_logins() {
        assert!(Login::new("").is_err());
        assert!(Login::new("\0").is_err());
        assert!(Login::new("host/").is_err());
    }
}
