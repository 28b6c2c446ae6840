//! In-memory appliance implementing the authn RPCs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bcrypt::{DEFAULT_COST, hash};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use authn_core::error::{AuthError, Error, InvalidInputError, ProtocolError};
use authn_core::traits::{AuthnService, BasicAuth, Method, Request, Response, Transport};
use authn_core::types::{Account, Login, RoleId};
use authn_core::{Result, TokenEncoding};

use crate::directory::{Directory, IssuedToken, LocalRole, login_for, new_api_key, verify_basic};
use crate::issuer;
use crate::policy::check_password;

/// Default lifetime of issued tokens.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(8 * 60);

/// Body of `GET /whoami`.
#[derive(Debug, Serialize)]
struct WhoAmI<'a> {
    account: &'a str,
    username: &'a str,
}

/// An in-process appliance for one account.
///
/// Clones share the same directory, so a test can hold one handle for
/// seeding and inspection while sessions use another.
///
/// # Example
///
/// ```
/// # async fn example() -> authn_core::Result<()> {
/// use std::sync::Arc;
/// use authn_core::{Account, AuthSession, ClientConfig, Credential};
/// use authn_local::LocalAuthn;
///
/// let appliance = LocalAuthn::new(Account::new("cucumber")?).with_bcrypt_cost(4);
/// let api_key = appliance.add_admin("admin", "PAssword!234")?;
///
/// let creds = Credential::api_key("cucumber", "admin", api_key)?;
/// let session = AuthSession::connect(creds, Arc::new(appliance.clone()), ClientConfig::default());
/// session.get_valid_token().await?;
/// assert_eq!(appliance.exchange_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalAuthn {
    account: Account,
    latency: Duration,
    token_ttl: Duration,
    bcrypt_cost: u32,
    state: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    directory: Mutex<Directory>,
    exchanges: AtomicUsize,
}

impl LocalAuthn {
    /// Create an empty appliance for `account`.
    pub fn new(account: Account) -> Self {
        Self {
            account,
            latency: Duration::ZERO,
            token_ttl: DEFAULT_TOKEN_TTL,
            bcrypt_cost: DEFAULT_COST,
            state: Arc::new(State::default()),
        }
    }

    /// Delay every RPC by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set how long issued tokens are accepted.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the bcrypt cost for password hashes.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Returns the account this appliance serves.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Add a user with a password. Returns its initial API key.
    pub fn add_user(&self, login: &str, password: &str) -> Result<String> {
        self.add_role(Login::new(login)?, Some(password), false)
    }

    /// Add a user allowed to rotate other roles' keys. Returns its initial API key.
    pub fn add_admin(&self, login: &str, password: &str) -> Result<String> {
        self.add_role(Login::new(login)?, Some(password), true)
    }

    /// Add a host, which has an API key but no password. Returns the key.
    pub fn add_host(&self, id: &str) -> Result<String> {
        self.add_role(Login::new(format!("host/{}", id))?, None, false)
    }

    /// Replace the API key of an existing role, e.g. to seed a known key.
    pub fn set_api_key(&self, login: &str, api_key: &str) -> Result<()> {
        let mut directory = self.directory();
        let role = directory.get_mut(login).ok_or_else(|| {
            Error::from(InvalidInputError::Other {
                message: format!("no role with login '{}'", login),
            })
        })?;
        role.api_key = api_key.to_string();
        Ok(())
    }

    /// Returns the current API key of `login`.
    pub fn api_key_of(&self, login: &str) -> Option<String> {
        let login = Login::new(login).ok()?;
        self.directory().get(&login).map(|role| role.api_key.clone())
    }

    /// Number of `authenticate` calls received, successful or not.
    pub fn exchange_count(&self) -> usize {
        self.state.exchanges.load(Ordering::SeqCst)
    }

    /// Stop accepting every token issued so far. Returns how many were dropped.
    pub fn revoke_tokens(&self) -> usize {
        let count = self.directory().revoke_tokens();
        info!(count, "Revoked issued tokens");
        count
    }

    fn add_role(&self, login: Login, password: Option<&str>, admin: bool) -> Result<String> {
        let password_hash = password.map(|p| self.hash(p)).transpose()?;
        let api_key = new_api_key();
        self.directory().insert(LocalRole {
            login,
            password_hash,
            api_key: api_key.clone(),
            admin,
        });
        Ok(api_key)
    }

    fn hash(&self, password: &str) -> Result<String> {
        hash(password, self.bcrypt_cost).map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: e.to_string(),
            })
        })
    }

    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.state
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Authenticate a basic-auth pair; bcrypt runs after the lock is released.
    fn basic_role(&self, auth: &BasicAuth<'_>) -> Result<LocalRole> {
        let role = self.directory().role(auth.login)?;
        verify_basic(&role, auth.secret)?;
        Ok(role)
    }

    fn check_account(&self, account: &Account) -> Result<()> {
        if account != &self.account {
            debug!(%account, "Unknown account");
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(())
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Resolve the login whose key a rotation targets.
    fn rotation_target(&self, acting: &LocalRole, role: Option<&RoleId>) -> Result<String> {
        let Some(role) = role else {
            return Ok(acting.login.as_str().to_string());
        };
        if role.account().is_some_and(|a| a != &self.account) {
            return Err(not_found(role));
        }
        let target = login_for(role).ok_or_else(|| {
            Error::from(ProtocolError::new(
                422,
                Some(format!("role '{}' cannot hold an API key", role)),
            ))
        })?;
        if target != acting.login.as_str() && !acting.admin {
            return Err(AuthError::Forbidden {
                reason: format!("'{}' may not rotate the API key of '{}'", acting.login, role),
            }
            .into());
        }
        Ok(target)
    }

    fn whoami(&self, request: &Request) -> Response {
        let token = request
            .authorization
            .as_deref()
            .and_then(issuer::parse_header);
        let Some(token) = token else {
            return Response::new(401, "");
        };

        let mut directory = self.directory();
        let Some(issued) = directory.lookup_token(token, Utc::now()) else {
            return Response::new(401, "");
        };
        let body = WhoAmI {
            account: self.account.as_str(),
            username: issued.login.as_str(),
        };
        match serde_json::to_string(&body) {
            Ok(json) => Response::new(200, json),
            Err(e) => Response::new(500, e.to_string()),
        }
    }
}

fn not_found(role: &RoleId) -> Error {
    ProtocolError::new(404, Some(format!("role '{}' not found", role))).into()
}

#[async_trait]
impl AuthnService for LocalAuthn {
    #[instrument(skip(self, auth), fields(login = %auth.login))]
    async fn get_api_key(&self, account: &Account, auth: BasicAuth<'_>) -> Result<String> {
        self.delay().await;
        self.check_account(account)?;
        Ok(self.basic_role(&auth)?.api_key)
    }

    #[instrument(skip(self, secret))]
    async fn authenticate(
        &self,
        account: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<String> {
        let n = self.state.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(exchange = n, "Authenticate received");
        self.delay().await;
        self.check_account(account)?;

        let mut directory = self.directory();
        directory.verify_api_key(login, secret)?;

        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.token_ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        let minted = issuer::mint(
            self.account.as_str(),
            login.as_str(),
            issued_at,
            expires_at,
            encoding,
        );
        directory.record_token(
            minted.encoded,
            IssuedToken {
                login: login.clone(),
                expires_at,
            },
            issued_at,
        );
        Ok(minted.body)
    }

    #[instrument(skip(self, auth), fields(login = %auth.login, role = ?role.map(ToString::to_string)))]
    async fn rotate_api_key(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        role: Option<&RoleId>,
    ) -> Result<String> {
        self.delay().await;
        self.check_account(account)?;

        let acting = self.basic_role(&auth)?;
        let target = self.rotation_target(&acting, role)?;

        let api_key = new_api_key();
        let mut directory = self.directory();
        let entry = directory.get_mut(&target).ok_or_else(|| match role {
            Some(role) => not_found(role),
            None => AuthError::InvalidCredentials.into(),
        })?;
        entry.api_key = api_key.clone();
        info!(%target, "API key rotated");
        Ok(api_key)
    }

    #[instrument(skip(self, auth, new_password), fields(login = %auth.login))]
    async fn change_password(
        &self,
        account: &Account,
        auth: BasicAuth<'_>,
        new_password: &str,
    ) -> Result<()> {
        self.delay().await;
        self.check_account(account)?;

        let role = self.basic_role(&auth)?;
        if role.password_hash.is_none() {
            return Err(AuthError::Forbidden {
                reason: format!("'{}' cannot have a password", role.login),
            }
            .into());
        }

        check_password(new_password)
            .map_err(|reason| ProtocolError::new(422, Some(reason.to_string())))?;
        let password_hash = self.hash(new_password)?;

        let mut directory = self.directory();
        let role = directory
            .get_mut(auth.login.as_str())
            .ok_or(AuthError::InvalidCredentials)?;
        role.password_hash = Some(password_hash);
        info!("Password changed");
        Ok(())
    }
}

#[async_trait]
impl Transport for LocalAuthn {
    #[instrument(skip(self, request), fields(method = ?request.method, path = %request.path))]
    async fn send(&self, request: Request) -> Result<Response> {
        self.delay().await;
        Ok(match (request.method, request.path.as_str()) {
            (Method::Get, "/whoami") => self.whoami(&request),
            _ => Response::new(404, ""),
        })
    }
}
