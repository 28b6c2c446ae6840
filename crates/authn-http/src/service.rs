//! `AuthnService` over the appliance's REST API.

use std::time::Duration;

use async_trait::async_trait;
use authn_core::traits::{AuthnService, BasicAuth};
use authn_core::types::{Account, ApplianceUrl, Authenticator, Login, RoleId};
use authn_core::{AccessToken, Result, TokenEncoding};
use reqwest::Method;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, instrument};

use crate::client::HttpClient;
use crate::endpoints;

/// A network-backed authn service.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> authn_core::Result<()> {
/// use std::sync::Arc;
/// use authn_core::{ApplianceUrl, AuthSession, ClientConfig, Credential};
/// use authn_http::HttpAuthn;
///
/// let config = ClientConfig::default();
/// let url = ApplianceUrl::new("https://vault.example.com")?;
/// let service = Arc::new(HttpAuthn::new(url, config.timeout)?);
///
/// let creds = Credential::api_key("cucumber", "admin", "K1")?;
/// let session = AuthSession::connect(creds, service, config);
/// let token = session.get_valid_token().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpAuthn {
    client: HttpClient,
    authenticator: Authenticator,
}

impl HttpAuthn {
    /// Create a service for the given appliance.
    pub fn new(url: ApplianceUrl, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(HttpClient::new(url, timeout)?))
    }

    /// Create a service sharing an existing client.
    pub fn with_client(client: HttpClient) -> Self {
        Self {
            client,
            authenticator: Authenticator::default(),
        }
    }

    /// Route logins and token exchanges through a service authenticator.
    ///
    /// Key rotation and password changes always go through the built-in
    /// `authn` authenticator.
    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Enable or disable a service authenticator for an account.
    ///
    /// Authorized with an access token of a role allowed to update the
    /// authenticator's webservice; the appliance answers 204 on success.
    #[instrument(skip(self, token, authenticator), fields(%authenticator))]
    pub async fn enable_authenticator(
        &self,
        account: &Account,
        token: &AccessToken,
        authenticator: &Authenticator,
        enabled: bool,
    ) -> Result<()> {
        debug!(%account, enabled, "Updating authenticator");
        let url = endpoints::authenticator(self.client.base(), authenticator, account)?;
        let request = self
            .client
            .request(Method::PATCH, url)
            .header(AUTHORIZATION, token.authorization_header())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("enabled={}", enabled));

        let response = self.client.send(request).await?;
        self.client.empty(response).await
    }

    /// Returns the appliance URL.
    pub fn url(&self) -> &ApplianceUrl {
        self.client.base()
    }

    fn basic(
        &self,
        method: Method,
        url: reqwest::Url,
        auth: BasicAuth<'_>,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(auth.login.as_str(), Some(auth.secret))
    }
}

#[async_trait]
impl AuthnService for HttpAuthn {
    #[instrument(skip(self, auth), fields(login = %auth.login))]
    async fn get_api_key(&self, account: &Account, auth: BasicAuth<'_>) -> Result<String> {
        debug!(%account, "Fetching API key");
        let url = endpoints::login(self.client.base(), &self.authenticator, account)?;
        let response = self.client.send(self.basic(Method::GET, url, auth)).await?;
        let api_key = self.client.non_empty_text(response).await?;
        Ok(api_key.trim().to_string())
    }

    #[instrument(skip(self, secret))]
    async fn authenticate(
        &self,
        account: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<String> {
        debug!(?encoding, authenticator = %self.authenticator, "Authenticating");
        let url =
            endpoints::authenticate(self.client.base(), &self.authenticator, account, login)?;
        let mut request = self
            .client
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "text/plain")
            .body(secret.to_string());
        if let Some(value) = encoding.accept_encoding() {
            request = request.header(ACCEPT_ENCODING, value);
        }

        let response = self.client.send(request).await?;
        self.client.non_empty_text(response).await
    }

    #[instrument(skip(self, auth), fields(login = %auth.login, role = ?role.map(ToString::to_string)))]
    async fn rotate_api_key(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        role: Option<&RoleId>,
    ) -> Result<String> {
        debug!(%account, "Rotating API key");
        let mut url = endpoints::api_key(self.client.base(), account)?;
        if let Some(role) = role {
            url.query_pairs_mut().append_pair("role", &role.to_string());
        }

        let response = self.client.send(self.basic(Method::PUT, url, auth)).await?;
        let api_key = self.client.non_empty_text(response).await?;
        Ok(api_key.trim().to_string())
    }

    #[instrument(skip(self, auth, new_password), fields(login = %auth.login))]
    async fn change_password(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        new_password: &str,
    ) -> Result<()> {
        debug!(%account, "Changing password");
        let url = endpoints::password(self.client.base(), account)?;
        let request = self
            .basic(Method::PUT, url, auth)
            .header(CONTENT_TYPE, "text/plain")
            .body(new_password.to_string());

        let response = self.client.send(request).await?;
        self.client.empty(response).await
    }
}
