//! Transport wrapper that authenticates outbound requests.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::error::AuthError;
use crate::session::AuthSession;
use crate::traits::{Request, Response, Transport};

/// How a request is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Basic base64(login:secret)` from the current credential. Used while
    /// bootstrapping, before a token can be obtained.
    Basic,
    /// `Token token="..."` from the session's current access token.
    #[default]
    Token,
}

/// Wraps a [`Transport`], attaching authorization from an [`AuthSession`].
///
/// A token-authenticated request that comes back 401 is retried exactly once
/// with a refreshed token; a second 401 fails with `AuthError::TokenRejected`.
/// Basic-authenticated requests are never retried.
#[derive(Debug, Clone)]
pub struct AuthenticatedTransport<T> {
    inner: T,
    session: AuthSession,
}

impl<T: Transport> AuthenticatedTransport<T> {
    /// Wrap `inner`, authenticating through `session`.
    pub fn new(inner: T, session: AuthSession) -> Self {
        Self { inner, session }
    }

    /// Returns the session.
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Send `request` with the given scheme.
    ///
    /// Non-401 responses are returned as-is, whatever their status.
    #[instrument(skip(self, request), fields(method = ?request.method, path = %request.path))]
    pub async fn send_with(&self, request: Request, scheme: AuthScheme) -> Result<Response> {
        match scheme {
            AuthScheme::Basic => self.send_basic(request).await,
            AuthScheme::Token => self.send_token(request).await,
        }
    }

    async fn send_basic(&self, mut request: Request) -> Result<Response> {
        let timeout = self.session.exchanger().config().timeout;
        let (credential, _) = self.session.credential().snapshot(timeout).await?;
        request.authorization = Some(credential.basic_authorization());

        let response = self.inner.send(request).await?;
        if response.is_unauthorized() {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(response)
    }

    async fn send_token(&self, mut request: Request) -> Result<Response> {
        let token = self.session.get_valid_token().await?;
        request.authorization = Some(token.authorization_header());

        let response = self.inner.send(request.clone()).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!("Token rejected, refreshing and retrying once");
        self.session.notify_rejected(&token);
        let token = self.session.get_valid_token().await?;
        request.authorization = Some(token.authorization_header());

        let response = self.inner.send(request).await?;
        if response.is_unauthorized() {
            warn!("Refreshed token rejected");
            self.session.notify_rejected(&token);
            return Err(AuthError::TokenRejected.into());
        }
        Ok(response)
    }
}

#[async_trait]
impl<T: Transport> Transport for AuthenticatedTransport<T> {
    /// Sends with [`AuthScheme::Token`].
    async fn send(&self, request: Request) -> Result<Response> {
        self.send_with(request, AuthScheme::default()).await
    }
}
