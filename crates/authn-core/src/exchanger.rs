//! One-shot exchange of a credential for an access token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::credential::{Credential, SecretKind};
use crate::error::{AuthError, Error, InvalidInputError, TransportError};
use crate::token::{AccessToken, TokenEncoding};
use crate::traits::{AuthnService, BasicAuth};
use crate::types::{Account, Login};
use crate::Result;

/// Run `fut`, failing with a transport timeout after `timeout`.
pub(crate) async fn with_deadline<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
        .into()),
    }
}

/// A 401 from the service means the secret was rejected.
pub(crate) fn normalize_auth(err: Error) -> Error {
    if err.is_auth_error() && !matches!(err, Error::Auth(_)) {
        return AuthError::InvalidCredentials.into();
    }
    err
}

/// Trades a credential for a signed access token.
///
/// Never mutates a credential and never retries: a transport failure or
/// timeout is surfaced for the caller's retry policy.
#[derive(Clone)]
pub struct TokenExchanger {
    service: Arc<dyn AuthnService>,
    config: ClientConfig,
}

impl TokenExchanger {
    /// Create an exchanger over the given service.
    pub fn new(service: Arc<dyn AuthnService>, config: ClientConfig) -> Self {
        Self { service, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn service(&self) -> &Arc<dyn AuthnService> {
        &self.service
    }

    /// Exchange `secret` for a token.
    ///
    /// # Errors
    ///
    /// - `Auth(InvalidCredentials)` if the secret is rejected
    /// - `MalformedToken` if the response is not a three-segment token
    /// - `Transport` on network failure or timeout
    #[instrument(skip(self, secret), fields(%account, %login))]
    pub async fn exchange(
        &self,
        account: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<AccessToken> {
        with_deadline(
            self.config.timeout,
            self.exchange_secret(account, login, secret, encoding),
        )
        .await
    }

    /// Exchange a full credential using the configured encoding.
    ///
    /// A password credential is first traded for the login's API key over
    /// basic auth; the credential itself is left unchanged. Both calls share
    /// one deadline.
    #[instrument(skip(self, credential), fields(account = %credential.account(), login = %credential.login()))]
    pub async fn exchange_credential(&self, credential: &Credential) -> Result<AccessToken> {
        with_deadline(self.config.timeout, self.exchange_unbounded(credential)).await
    }

    /// [`exchange_credential`](Self::exchange_credential) without a deadline of its own.
    pub(crate) async fn exchange_unbounded(&self, credential: &Credential) -> Result<AccessToken> {
        let api_key;
        let secret = match credential.kind() {
            SecretKind::ApiKey => credential.expose_secret(),
            SecretKind::Password => {
                debug!("Fetching API key with password before exchange");
                api_key = self
                    .service
                    .get_api_key(
                        credential.account(),
                        BasicAuth {
                            login: credential.login(),
                            secret: credential.expose_secret(),
                        },
                    )
                    .await
                    .map_err(normalize_auth)?;
                api_key.as_str()
            }
        };

        self.exchange_secret(
            credential.account(),
            credential.login(),
            secret,
            self.config.encoding,
        )
        .await
    }

    async fn exchange_secret(
        &self,
        account: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<AccessToken> {
        if secret.is_empty() {
            return Err(InvalidInputError::Other {
                message: "secret must be non-empty".to_string(),
            }
            .into());
        }

        debug!(?encoding, "Exchanging credential for access token");
        let body = self
            .service
            .authenticate(account, login, secret, encoding)
            .await
            .map_err(normalize_auth)?;

        let token = AccessToken::parse(
            &body,
            encoding,
            Utc::now(),
            self.config.token_lifetime_delta(),
        )?;

        debug!(approx_expiry = %token.approx_expiry(), "Access token issued");
        Ok(token)
    }
}

impl std::fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchanger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use async_trait::async_trait;

    #[test]
    fn unauthorized_protocol_error_becomes_invalid_credentials() {
        let err = normalize_auth(ProtocolError::new(401, None).into());
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));

        let err = normalize_auth(ProtocolError::new(500, None).into());
        assert!(matches!(err, Error::Protocol(_)));
    }

    struct Stalled;

    #[async_trait]
    impl AuthnService for Stalled {
        async fn get_api_key(&self, _: &Account, _: BasicAuth<'_>) -> Result<String> {
            std::future::pending().await
        }

        async fn authenticate(
            &self,
            _: &Account,
            _: &Login,
            _: &str,
            _: TokenEncoding,
        ) -> Result<String> {
            std::future::pending().await
        }

        async fn rotate_api_key(
            &self,
            _: &Account,
            _: BasicAuth<'_>,
            _: Option<&crate::types::RoleId>,
        ) -> Result<String> {
            std::future::pending().await
        }

        async fn change_password(&self, _: &Account, _: BasicAuth<'_>, _: &str) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_times_out_as_transport_error() {
        let exchanger = TokenExchanger::new(
            Arc::new(Stalled),
            ClientConfig::default().with_timeout(Duration::from_secs(2)),
        );
        let account = Account::new("cucumber").unwrap();
        let login = Login::new("admin").unwrap();

        let err = exchanger
            .exchange(&account, &login, "K1", TokenEncoding::Base64)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout { duration_ms: 2000 })
        ));
    }

    /// Answers the basic-auth login after a delay; never answers the exchange.
    struct SlowLogin;

    #[async_trait]
    impl AuthnService for SlowLogin {
        async fn get_api_key(&self, _: &Account, _: BasicAuth<'_>) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Ok("K1".to_string())
        }

        async fn authenticate(
            &self,
            account: &Account,
            login: &Login,
            secret: &str,
            encoding: TokenEncoding,
        ) -> Result<String> {
            Stalled.authenticate(account, login, secret, encoding).await
        }

        async fn rotate_api_key(
            &self,
            account: &Account,
            auth: BasicAuth<'_>,
            role: Option<&crate::types::RoleId>,
        ) -> Result<String> {
            Stalled.rotate_api_key(account, auth, role).await
        }

        async fn change_password(
            &self,
            account: &Account,
            auth: BasicAuth<'_>,
            new_password: &str,
        ) -> Result<()> {
            Stalled.change_password(account, auth, new_password).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn password_exchange_shares_one_deadline() {
        let exchanger = TokenExchanger::new(
            Arc::new(SlowLogin),
            ClientConfig::default().with_timeout(Duration::from_secs(2)),
        );
        let creds = Credential::password("cucumber", "admin", "PAssword!234").unwrap();

        let started = tokio::time::Instant::now();
        let err = exchanger.exchange_credential(&creds).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout { duration_ms: 2000 })
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn empty_secret_is_rejected_before_any_call() {
        let exchanger = TokenExchanger::new(Arc::new(Stalled), ClientConfig::default());
        let account = Account::new("cucumber").unwrap();
        let login = Login::new("admin").unwrap();

        let err = exchanger
            .exchange(&account, &login, "", TokenEncoding::Raw)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
