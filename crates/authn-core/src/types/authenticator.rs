//! Authenticator selector type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

const DEFAULT: &str = "authn";

/// Which authenticator an appliance login goes through.
///
/// The default `authn` authenticator checks the appliance's own API keys and
/// passwords. Service authenticators such as `authn-ldap/test` check the
/// secret against an external directory and are addressed by kind and
/// service id.
///
/// # Example
///
/// ```
/// use authn_core::Authenticator;
///
/// let ldap: Authenticator = "authn-ldap/test".parse().unwrap();
/// assert_eq!(ldap.name(), "authn-ldap");
/// assert_eq!(ldap.service_id(), Some("test"));
/// assert!(Authenticator::default().is_default());
/// assert!("ldap/test".parse::<Authenticator>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Authenticator {
    name: String,
    service_id: Option<String>,
}

impl Authenticator {
    /// A service authenticator such as `authn-ldap` with id `test`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is `authn-<kind>` and both parts are
    /// single path segments.
    pub fn service(name: impl Into<String>, service_id: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let service_id = service_id.into();
        let invalid = |reason: &str| InvalidInputError::Authenticator {
            value: format!("{}/{}", name, service_id).escape_debug().to_string(),
            reason: reason.to_string(),
        };

        match name.strip_prefix("authn-") {
            Some(kind) if !kind.is_empty() => {}
            _ => return Err(invalid("name must be 'authn-<kind>'").into()),
        }
        for part in [&name, &service_id] {
            segment(part).map_err(invalid)?;
        }

        Ok(Self {
            name,
            service_id: Some(service_id),
        })
    }

    /// Returns the authenticator name, e.g. `authn` or `authn-ldap`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service id, `None` for the default authenticator.
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    /// Whether this is the appliance's built-in `authn` authenticator.
    pub fn is_default(&self) -> bool {
        self.service_id.is_none()
    }

    /// Leading path segments of this authenticator's routes.
    pub fn segments(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.service_id.as_deref())
            .collect()
    }
}

fn segment(s: &str) -> Result<(), &'static str> {
    super::check_identifier(s)?;
    if s.contains('/') {
        return Err("must not contain '/'");
    }
    Ok(())
}

impl Default for Authenticator {
    fn default() -> Self {
        Self {
            name: DEFAULT.to_string(),
            service_id: None,
        }
    }
}

impl fmt::Display for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service_id {
            Some(id) => write!(f, "{}/{}", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Authenticator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            None if s == DEFAULT => Ok(Self::default()),
            Some((name, service_id)) => Self::service(name, service_id),
            None => Err(InvalidInputError::Authenticator {
                value: s.escape_debug().to_string(),
                reason: "expected 'authn' or 'authn-<kind>/<service-id>'".to_string(),
            }
            .into()),
        }
    }
}

impl TryFrom<String> for Authenticator {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Authenticator> for String {
    fn from(authenticator: Authenticator) -> Self {
        authenticator.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_builtin_authn() {
        let authn = Authenticator::default();
        assert_eq!(authn.segments(), vec!["authn"]);
        assert_eq!(authn.to_string(), "authn");
        assert_eq!("authn".parse::<Authenticator>().unwrap(), authn);
    }

    #[test]
    fn service_authenticator_segments() {
        let ldap: Authenticator = "authn-ldap/test".parse().unwrap();
        assert!(!ldap.is_default());
        assert_eq!(ldap.segments(), vec!["authn-ldap", "test"]);
        assert_eq!(ldap.to_string(), "authn-ldap/test");
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "ldap", "ldap/test", "authn-/test", "authn-ldap/", "authn-ldap/a/b"] {
            let err = bad.parse::<Authenticator>().unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(InvalidInputError::Authenticator { .. })),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn serde_uses_display_form() {
        let ldap: Authenticator = serde_json::from_str("\"authn-ldap/test\"").unwrap();
        assert_eq!(serde_json::to_string(&ldap).unwrap(), "\"authn-ldap/test\"");
    }
}
