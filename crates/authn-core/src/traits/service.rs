//! Authn service trait.

use async_trait::async_trait;

use crate::token::TokenEncoding;
use crate::types::{Account, Login, RoleId};
use crate::Result;

/// Login and secret sent as HTTP basic authentication.
#[derive(Clone, Copy)]
pub struct BasicAuth<'a> {
    /// The login authenticating the request.
    pub login: &'a Login,
    /// Its password or API key.
    pub secret: &'a str,
}

impl std::fmt::Debug for BasicAuth<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("login", self.login)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// The appliance's authentication RPCs.
///
/// Implementations map a rejected secret to `AuthError::InvalidCredentials`
/// and reject bodies that are not well-formed rather than passing them on.
#[async_trait]
pub trait AuthnService: Send + Sync {
    /// Exchange a password for the login's current API key (basic auth).
    async fn get_api_key(&self, account: &Account, auth: BasicAuth<'_>) -> Result<String>;

    /// Exchange a secret for a token. Returns the response body as received.
    async fn authenticate(
        &self,
        account: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<String>;

    /// Rotate an API key and return the new one.
    ///
    /// With `role` absent the acting login's own key is rotated.
    async fn rotate_api_key(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        role: Option<&RoleId>,
    ) -> Result<String>;

    /// Change the acting login's password.
    async fn change_password(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        new_password: &str,
    ) -> Result<()>;
}
