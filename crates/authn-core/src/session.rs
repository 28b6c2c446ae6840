//! Token caching with single-flight refresh.
//!
//! A session owns one [`SharedCredential`] and caches the token derived from
//! it. When the cache is empty or stale, the first caller spawns a refresh
//! task and every concurrent caller awaits the same shared result; the task
//! runs to completion even if all of them give up waiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::ClientConfig;
use crate::credential::{Credential, SharedCredential};
use crate::error::TransportError;
use crate::exchanger::{TokenExchanger, with_deadline};
use crate::rotator::CredentialRotator;
use crate::token::AccessToken;
use crate::traits::AuthnService;

type Refresh = Shared<BoxFuture<'static, Result<AccessToken>>>;

/// An authenticated session: a credential plus its cached access token.
///
/// Cheap to clone; clones share the cache and the in-flight refresh.
///
/// # Example
///
/// ```no_run
/// # async fn example(service: std::sync::Arc<dyn authn_core::AuthnService>) -> authn_core::Result<()> {
/// use authn_core::{AuthSession, ClientConfig, Credential};
///
/// let creds = Credential::api_key("cucumber", "admin", "K1")?;
/// let session = AuthSession::connect(creds, service, ClientConfig::default());
///
/// let token = session.get_valid_token().await?;
/// println!("{}", token.authorization_header());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

struct Inner {
    credential: SharedCredential,
    exchanger: TokenExchanger,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    current: Option<Cached>,
    in_flight: Option<InFlight>,
    /// Bumped by every invalidation; a token cached under an older epoch is stale.
    epoch: u64,
    next_flight: u64,
}

struct Cached {
    token: AccessToken,
    generation: u64,
    epoch: u64,
}

struct InFlight {
    id: u64,
    epoch: u64,
    /// Credential generation when the refresh started.
    generation: u64,
    refresh: Refresh,
}

impl AuthSession {
    /// Create a session over an existing shared credential and exchanger.
    pub fn new(credential: SharedCredential, exchanger: TokenExchanger) -> Self {
        Self {
            inner: Arc::new(Inner {
                credential,
                exchanger,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Create a session owning `credential`, talking to `service`.
    pub fn connect(
        credential: Credential,
        service: Arc<dyn AuthnService>,
        config: ClientConfig,
    ) -> Self {
        Self::new(
            SharedCredential::new(credential),
            TokenExchanger::new(service, config),
        )
    }

    /// Returns the session's credential.
    pub fn credential(&self) -> &SharedCredential {
        &self.inner.credential
    }

    /// Returns the exchanger used for refreshes.
    pub fn exchanger(&self) -> &TokenExchanger {
        &self.inner.exchanger
    }

    /// A rotator over the same service and configuration.
    ///
    /// Rotations through it invalidate this session's cached token.
    pub fn rotator(&self) -> CredentialRotator {
        let exchanger = &self.inner.exchanger;
        CredentialRotator::new(exchanger.service().clone(), exchanger.config().clone())
    }

    /// Returns a token that is believed valid, refreshing if needed.
    ///
    /// Concurrent callers that find no valid token share one exchange and
    /// all observe its result, success or failure.
    #[instrument(skip(self), fields(account = %self.inner.credential.account(), login = %self.inner.credential.login()))]
    pub async fn get_valid_token(&self) -> Result<AccessToken> {
        let refresh = {
            let mut state = self.state();
            if let Some(token) = self.fresh_token(&state) {
                return Ok(token);
            }

            // A refresh started before an invalidation or a rotation is not joined.
            let epoch = state.epoch;
            let generation = self.inner.credential.generation();
            let joined = state
                .in_flight
                .as_ref()
                .filter(|flight| flight.epoch == epoch && flight.generation == generation)
                .map(|flight| {
                    debug!(flight = flight.id, "Joining in-flight refresh");
                    flight.refresh.clone()
                });
            match joined {
                Some(refresh) => refresh,
                None => self.start_refresh(&mut state),
            }
        };

        refresh.await
    }

    /// Forget the cached token; the next [`get_valid_token`](Self::get_valid_token) exchanges anew.
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.epoch += 1;
        state.current = None;
        debug!(epoch = state.epoch, "Session invalidated");
    }

    /// Record that the remote service rejected the most recent token.
    ///
    /// Overrides the local expiry estimate.
    pub fn notify_unauthorized(&self) {
        warn!(
            account = %self.inner.credential.account(),
            login = %self.inner.credential.login(),
            "Access token rejected"
        );
        self.invalidate();
    }

    /// Record that `token` was rejected.
    ///
    /// Invalidates only if `token` is still the cached one, so a burst of
    /// rejections of the same token causes a single refresh.
    pub fn notify_rejected(&self, token: &AccessToken) {
        let is_current = self
            .state()
            .current
            .as_ref()
            .is_some_and(|cached| cached.token.expose_encoded() == token.expose_encoded());
        if is_current {
            self.notify_unauthorized();
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // State is never left half-updated, so a poisoned lock is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_token(&self, state: &State) -> Option<AccessToken> {
        let cached = state.current.as_ref()?;
        let margin = self.inner.exchanger.config().refresh_margin_delta();
        let fresh = cached.epoch == state.epoch
            && cached.generation == self.inner.credential.generation()
            && !cached.token.is_expired_at(Utc::now(), margin);
        fresh.then(|| cached.token.clone())
    }

    fn start_refresh(&self, state: &mut State) -> Refresh {
        let id = state.next_flight;
        state.next_flight += 1;
        let epoch = state.epoch;
        let generation = self.inner.credential.generation();
        debug!(flight = id, epoch, generation, "Starting token refresh");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = exchange_current(&inner).await;
            inner.complete(id, epoch, &result);
            result.map(|(token, _)| token)
        });

        let refresh = task
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(TransportError::Http {
                        message: format!("token refresh aborted: {}", e),
                    }
                    .into())
                })
            })
            .boxed()
            .shared();

        state.in_flight = Some(InFlight {
            id,
            epoch,
            generation,
            refresh: refresh.clone(),
        });
        refresh
    }
}

impl Inner {
    fn complete(&self, id: u64, epoch: u64, result: &Result<(AccessToken, u64)>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
            state.in_flight = None;
        }
        match result {
            Ok((token, generation)) => {
                // A refresh overtaken by a newer one must not replace its token.
                let newest = state.current.as_ref().is_none_or(|c| {
                    c.epoch < epoch || (c.epoch == epoch && c.generation <= *generation)
                });
                if newest {
                    state.current = Some(Cached {
                        token: token.clone(),
                        generation: *generation,
                        epoch,
                    });
                }
            }
            Err(e) => debug!(flight = id, error = %e, "Token refresh failed"),
        }
    }
}

async fn exchange_current(inner: &Inner) -> Result<(AccessToken, u64)> {
    let exchanger = &inner.exchanger;
    with_deadline(exchanger.config().timeout, async {
        // Rotations wait on this guard, so the secret stays valid on the
        // server until the exchange has been answered.
        let credential = inner.credential.read().await;
        let token = exchanger.exchange_unbounded(credential.credential()).await?;
        Ok((token, credential.generation()))
    })
    .await
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("credential", &self.inner.credential)
            .finish_non_exhaustive()
    }
}
