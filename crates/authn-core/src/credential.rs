//! Credential value type and its lockable, shared holder.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, InvalidInputError};
use crate::types::{Account, Login};

/// What the secret of a [`Credential`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// A user-chosen password. Exchanging it requires a basic-auth login first.
    Password,
    /// An API key issued by the appliance.
    ApiKey,
}

/// Long-lived authentication material: account, login and one secret.
///
/// # Security
///
/// The secret is never exposed in Debug output to prevent accidental logging.
///
/// # Example
///
/// ```
/// use authn_core::{Credential, SecretKind};
///
/// let creds = Credential::api_key("cucumber", "admin", "K1").unwrap();
/// assert_eq!(creds.login().as_str(), "admin");
/// assert_eq!(creds.kind(), SecretKind::ApiKey);
/// assert!(!format!("{:?}", creds).contains("K1"));
/// ```
#[derive(Clone)]
pub struct Credential {
    account: Account,
    login: Login,
    secret: String,
    kind: SecretKind,
}

impl Credential {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the account or login is invalid, or the secret is empty.
    pub fn new(
        account: impl Into<String>,
        login: impl Into<String>,
        secret: impl Into<String>,
        kind: SecretKind,
    ) -> Result<Self, Error> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(InvalidInputError::Other {
                message: "secret must be non-empty".to_string(),
            }
            .into());
        }
        Ok(Self {
            account: Account::new(account)?,
            login: Login::new(login)?,
            secret,
            kind,
        })
    }

    /// Credentials holding an API key.
    pub fn api_key(
        account: impl Into<String>,
        login: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::new(account, login, api_key, SecretKind::ApiKey)
    }

    /// Credentials holding a password.
    pub fn password(
        account: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::new(account, login, password, SecretKind::Password)
    }

    /// Returns the account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Returns the login.
    pub fn login(&self) -> &Login {
        &self.login
    }

    /// Returns what kind of secret this credential holds.
    pub fn kind(&self) -> SecretKind {
        self.kind
    }

    /// Returns the secret.
    ///
    /// # Security
    ///
    /// Use this only when constructing authentication requests.
    /// Never log or display this value.
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }

    /// The `Authorization` header value for basic authentication.
    pub fn basic_authorization(&self) -> String {
        let pair = format!("{}:{}", self.login, self.secret);
        format!("Basic {}", STANDARD.encode(pair))
    }
}

// Intentionally hide the secret in Debug output
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("login", &self.login)
            .field("secret", &"[REDACTED]")
            .field("kind", &self.kind)
            .finish()
    }
}

/// A [`Credential`] shared between a session, its transport and a rotator.
///
/// Exchanges hold a shared guard until the server has answered; rotation and
/// password change take the exclusive guard for their whole duration, so a
/// secret is never rotated away underneath an exchange that is using it. Every committed secret change bumps a
/// generation counter, which tokens carry to detect that they were derived
/// from a superseded secret.
#[derive(Clone)]
pub struct SharedCredential {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    account: Account,
    login: Login,
    credential: RwLock<Credential>,
    generation: AtomicU64,
}

impl SharedCredential {
    /// Wrap a credential for shared use.
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                account: credential.account.clone(),
                login: credential.login.clone(),
                credential: RwLock::new(credential),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the account. Account and login never change after creation.
    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    /// Returns the login.
    pub fn login(&self) -> &Login {
        &self.inner.login
    }

    /// Returns the generation of the currently committed secret.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Copy the credential and its generation under the shared guard.
    ///
    /// Waits at most `timeout` for a rotation holding the exclusive guard.
    pub async fn snapshot(&self, timeout: Duration) -> Result<(Credential, u64), Error> {
        let guard = tokio::time::timeout(timeout, self.inner.credential.read())
            .await
            .map_err(|_| Error::ConcurrentRotation)?;
        // Generation is only bumped under the write guard, so it is stable here.
        Ok((guard.clone(), self.generation()))
    }

    /// Hold the shared guard for the length of an exchange.
    ///
    /// Unbounded; callers put the whole exchange under one deadline.
    pub(crate) async fn read(&self) -> CredentialReadGuard<'_> {
        let guard = self.inner.credential.read().await;
        CredentialReadGuard {
            guard,
            generation: self.generation(),
        }
    }

    /// Acquire the exclusive guard, waiting at most `timeout`.
    pub(crate) async fn lock(&self, timeout: Duration) -> Result<CredentialGuard<'_>, Error> {
        let guard = tokio::time::timeout(timeout, self.inner.credential.write())
            .await
            .map_err(|_| Error::ConcurrentRotation)?;
        Ok(CredentialGuard {
            guard,
            generation: &self.inner.generation,
        })
    }

    /// Acquire the exclusive guard without waiting.
    pub(crate) fn try_lock(&self) -> Result<CredentialGuard<'_>, Error> {
        let guard = self
            .inner
            .credential
            .try_write()
            .map_err(|_| Error::ConcurrentRotation)?;
        Ok(CredentialGuard {
            guard,
            generation: &self.inner.generation,
        })
    }
}

impl fmt::Debug for SharedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCredential")
            .field("account", &self.inner.account)
            .field("login", &self.inner.login)
            .field("generation", &self.generation())
            .finish()
    }
}

/// Shared access to a credential for the duration of an exchange.
pub(crate) struct CredentialReadGuard<'a> {
    guard: RwLockReadGuard<'a, Credential>,
    generation: u64,
}

impl CredentialReadGuard<'_> {
    pub(crate) fn credential(&self) -> &Credential {
        &self.guard
    }

    /// Generation of the secret this guard pins.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Exclusive access to a shared credential for the duration of a rotation.
pub(crate) struct CredentialGuard<'a> {
    guard: RwLockWriteGuard<'a, Credential>,
    generation: &'a AtomicU64,
}

impl CredentialGuard<'_> {
    pub(crate) fn credential(&self) -> &Credential {
        &self.guard
    }

    /// Replace the secret and bump the generation in one step.
    pub(crate) fn commit(&mut self, secret: String, kind: SecretKind) -> u64 {
        self.guard.secret = secret;
        self.guard.kind = kind;
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_hides_secret_in_debug() {
        let creds = Credential::password("cucumber", "admin", "secret123").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn basic_authorization_encodes_login_and_secret() {
        let creds = Credential::api_key("cucumber", "host/app", "K1").unwrap();
        assert_eq!(creds.basic_authorization(), "Basic aG9zdC9hcHA6SzE=");
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(Credential::api_key("cucumber", "admin", "").is_err());
    }

    #[tokio::test]
    async fn commit_bumps_generation() {
        let shared = SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());
        assert_eq!(shared.generation(), 0);

        {
            let mut guard = shared.lock(Duration::from_secs(1)).await.unwrap();
            assert_eq!(guard.credential().expose_secret(), "K1");
            assert_eq!(guard.commit("K2".to_string(), SecretKind::ApiKey), 1);
        }

        let (creds, generation) = shared.snapshot(Duration::from_secs(1)).await.unwrap();
        assert_eq!(creds.expose_secret(), "K2");
        assert_eq!(generation, 1);
    }

    #[tokio::test]
    async fn try_lock_fails_while_held() {
        let shared = SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());
        let _held = shared.lock(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(shared.try_lock(), Err(Error::ConcurrentRotation)));
    }

    #[tokio::test(start_paused = true)]
    async fn writer_waits_for_exchange_reader() {
        let shared = SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());
        let reader = shared.read().await;
        assert_eq!(reader.generation(), 0);

        assert!(matches!(
            shared.lock(Duration::from_millis(50)).await,
            Err(Error::ConcurrentRotation)
        ));

        drop(reader);
        assert!(shared.lock(Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_times_out_behind_writer() {
        let shared = SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());
        let _held = shared.lock(Duration::from_secs(1)).await.unwrap();
        let result = shared.snapshot(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::ConcurrentRotation)));
    }
}
