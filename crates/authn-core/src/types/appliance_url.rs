//! Appliance URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated base URL of a secrets appliance.
///
/// Must use HTTPS; plain HTTP is accepted only for localhost. A path prefix
/// (`https://example.com/api`) is kept and endpoint paths are appended to it.
///
/// # Example
///
/// ```
/// use authn_core::ApplianceUrl;
///
/// let url = ApplianceUrl::new("https://vault.example.com/").unwrap();
/// let endpoint = url.authn_url(&["authn", "cucumber", "host/app", "authenticate"]).unwrap();
/// assert_eq!(
///     endpoint.as_str(),
///     "https://vault.example.com/authn/cucumber/host%2Fapp/authenticate"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApplianceUrl(Url);

impl ApplianceUrl {
    /// Create a new appliance URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ApplianceUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Builds an endpoint URL by appending percent-encoded path segments.
    ///
    /// Each segment is encoded on its own, so a `/` inside a login becomes `%2F`.
    pub fn authn_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.0.clone();
        url.path_segments_mut()
            .map_err(|_| InvalidInputError::ApplianceUrl {
                value: self.0.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        let reason = match (url.scheme(), url.host_str()) {
            _ if url.cannot_be_a_base() => "must be an absolute URL",
            (_, None) => "must have a host",
            ("https", Some(_)) => return Ok(()),
            ("http", Some("localhost" | "127.0.0.1" | "[::1]")) => return Ok(()),
            ("http", Some(_)) => "plain HTTP is only accepted for localhost",
            _ => "scheme must be http or https",
        };
        Err(InvalidInputError::ApplianceUrl {
            value: original.to_string(),
            reason: reason.to_string(),
        }
        .into())
    }
}

impl fmt::Display for ApplianceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApplianceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApplianceUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplianceUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApplianceUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let url = ApplianceUrl::new("https://vault.example.com").unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com/");
    }

    #[test]
    fn valid_localhost_http() {
        assert!(ApplianceUrl::new("http://localhost:8080").is_ok());
        assert!(ApplianceUrl::new("http://127.0.0.1:8080").is_ok());
    }

    #[test]
    fn keeps_path_prefix() {
        let url = ApplianceUrl::new("https://example.com/api/").unwrap();
        let endpoint = url.authn_url(&["authn", "dev", "login"]).unwrap();
        assert_eq!(endpoint.as_str(), "https://example.com/api/authn/dev/login");
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(ApplianceUrl::new("http://vault.example.com").is_err());
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(ApplianceUrl::new("/authn/dev/login").is_err());
        assert!(ApplianceUrl::new("ftp://vault.example.com").is_err());
        assert!(ApplianceUrl::new("mailto:ops@example.com").is_err());
    }
}
