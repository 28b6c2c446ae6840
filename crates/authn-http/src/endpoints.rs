//! Endpoint paths and header names of the appliance's authn REST API.

use authn_core::error::InvalidInputError;
use authn_core::types::{Account, ApplianceUrl, Authenticator, Login};
use authn_core::{Error, Result};
use reqwest::Url;

// ============================================================================
// Headers
// ============================================================================

/// Correlation id sent with every request.
pub const REQUEST_ID: &str = "x-request-id";

// ============================================================================
// Paths
// ============================================================================

fn under<'a>(authenticator: &'a Authenticator, rest: &[&'a str]) -> Vec<&'a str> {
    let mut segments = authenticator.segments();
    segments.extend_from_slice(rest);
    segments
}

/// `GET /{authenticator}/{account}/login` (basic auth) returns the API key.
pub fn login(
    base: &ApplianceUrl,
    authenticator: &Authenticator,
    account: &Account,
) -> Result<Url> {
    base.authn_url(&under(authenticator, &[account.as_str(), "login"]))
}

/// `POST /{authenticator}/{account}/{login}/authenticate` exchanges a secret
/// for a token.
pub fn authenticate(
    base: &ApplianceUrl,
    authenticator: &Authenticator,
    account: &Account,
    login: &Login,
) -> Result<Url> {
    base.authn_url(&under(
        authenticator,
        &[account.as_str(), login.as_str(), "authenticate"],
    ))
}

/// `PATCH /{authn-kind}/{service_id}/{account}` (basic auth) enables or
/// disables a service authenticator.
pub fn authenticator(
    base: &ApplianceUrl,
    authenticator: &Authenticator,
    account: &Account,
) -> Result<Url> {
    if authenticator.is_default() {
        return Err(InvalidInputError::Other {
            message: "the built-in authn authenticator cannot be toggled".to_string(),
        }
        .into());
    }
    base.authn_url(&under(authenticator, &[account.as_str()]))
}

/// `PUT /authn/{account}/password` (basic auth) changes the password.
pub fn password(base: &ApplianceUrl, account: &Account) -> Result<Url> {
    base.authn_url(&["authn", account.as_str(), "password"])
}

/// `PUT /authn/{account}/api_key[?role=kind:id]` (basic auth) rotates a key.
pub fn api_key(base: &ApplianceUrl, account: &Account) -> Result<Url> {
    base.authn_url(&["authn", account.as_str(), "api_key"])
}

/// Resolve a resource path such as `/whoami` against the base URL, keeping
/// any path prefix of the base.
pub fn resource(base: &ApplianceUrl, path: &str) -> Result<Url> {
    let mut root = base.as_url().clone();
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    root.join(path.trim_start_matches('/')).map_err(|e| {
        Error::from(InvalidInputError::Other {
            message: format!("invalid resource path '{}': {}", path, e),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ApplianceUrl {
        ApplianceUrl::new("https://vault.example.com/api").unwrap()
    }

    #[test]
    fn host_login_is_escaped() {
        let account = Account::new("cucumber").unwrap();
        let login = Login::new("host/app/web").unwrap();
        let url = authenticate(&base(), &Authenticator::default(), &account, &login).unwrap();
        assert_eq!(
            url.as_str(),
            "https://vault.example.com/api/authn/cucumber/host%2Fapp%2Fweb/authenticate"
        );
    }

    #[test]
    fn resource_keeps_prefix_and_query() {
        let url = resource(&base(), "/whoami?verbose=true").unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com/api/whoami?verbose=true");
    }

    #[test]
    fn static_paths() {
        let account = Account::new("cucumber").unwrap();
        let authn = Authenticator::default();
        let login_url = login(&base(), &authn, &account).unwrap();
        assert!(login_url.path().ends_with("/authn/cucumber/login"));
        assert!(password(&base(), &account).unwrap().path().ends_with("/authn/cucumber/password"));
        assert!(api_key(&base(), &account).unwrap().path().ends_with("/authn/cucumber/api_key"));
    }

    #[test]
    fn service_authenticator_paths() {
        let account = Account::new("cucumber").unwrap();
        let login_id = Login::new("alice").unwrap();
        let ldap: Authenticator = "authn-ldap/test".parse().unwrap();

        assert_eq!(
            login(&base(), &ldap, &account).unwrap().path(),
            "/api/authn-ldap/test/cucumber/login"
        );
        assert_eq!(
            authenticate(&base(), &ldap, &account, &login_id).unwrap().path(),
            "/api/authn-ldap/test/cucumber/alice/authenticate"
        );
        assert_eq!(
            authenticator(&base(), &ldap, &account).unwrap().path(),
            "/api/authn-ldap/test/cucumber"
        );
        assert!(authenticator(&base(), &Authenticator::default(), &account).is_err());
    }
}
