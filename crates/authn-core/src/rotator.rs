//! API-key rotation and password change.
//!
//! Both operations hold the credential's exclusive guard across the remote
//! call, so a second rotation of the same credential waits for the first and
//! then sees whatever secret the first one left behind. A failed call commits
//! nothing.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::Result;
use crate::config::ClientConfig;
use crate::credential::{CredentialGuard, SecretKind, SharedCredential};
use crate::error::{InvalidInputError, ProtocolError};
use crate::exchanger::{normalize_auth, with_deadline};
use crate::traits::{AuthnService, BasicAuth};
use crate::types::RoleId;

/// Rotates API keys and changes passwords for a [`SharedCredential`].
///
/// Committing a new secret bumps the credential's generation, which makes any
/// token an [`AuthSession`](crate::AuthSession) cached under the old secret
/// stale.
#[derive(Clone)]
pub struct CredentialRotator {
    service: Arc<dyn AuthnService>,
    config: ClientConfig,
}

impl CredentialRotator {
    /// Create a rotator over the given service.
    pub fn new(service: Arc<dyn AuthnService>, config: ClientConfig) -> Self {
        Self { service, config }
    }

    /// Rotate an API key, waiting for any rotation already in progress.
    ///
    /// With `role` absent, or naming the credential's own role, the acting
    /// key is rotated and the credential updated to the returned key. A
    /// foreign role is rotated on the server only.
    ///
    /// # Errors
    ///
    /// `ConcurrentRotation` if the lock is not acquired within the configured
    /// timeout; otherwise whatever the remote call fails with.
    #[instrument(skip(self, credential), fields(account = %credential.account(), login = %credential.login()))]
    pub async fn rotate_api_key(
        &self,
        credential: &SharedCredential,
        role: Option<&RoleId>,
    ) -> Result<String> {
        let mut guard = credential.lock(self.config.timeout).await?;
        self.rotate_locked(&mut guard, role).await
    }

    /// Like [`rotate_api_key`](Self::rotate_api_key) but fails with
    /// `ConcurrentRotation` instead of waiting.
    pub async fn try_rotate_api_key(
        &self,
        credential: &SharedCredential,
        role: Option<&RoleId>,
    ) -> Result<String> {
        let mut guard = credential.try_lock()?;
        self.rotate_locked(&mut guard, role).await
    }

    /// Change the credential's password, waiting for any rotation in progress.
    ///
    /// On success the credential holds `new_password` as a password secret.
    #[instrument(skip(self, credential, new_password), fields(account = %credential.account(), login = %credential.login()))]
    pub async fn change_password(
        &self,
        credential: &SharedCredential,
        new_password: &str,
    ) -> Result<()> {
        let mut guard = credential.lock(self.config.timeout).await?;
        self.change_password_locked(&mut guard, new_password).await
    }

    /// Like [`change_password`](Self::change_password) but fails with
    /// `ConcurrentRotation` instead of waiting.
    pub async fn try_change_password(
        &self,
        credential: &SharedCredential,
        new_password: &str,
    ) -> Result<()> {
        let mut guard = credential.try_lock()?;
        self.change_password_locked(&mut guard, new_password).await
    }

    async fn rotate_locked(
        &self,
        guard: &mut CredentialGuard<'_>,
        role: Option<&RoleId>,
    ) -> Result<String> {
        let current = guard.credential();
        let own = role.is_none_or(|role| {
            role.is_same_role(&current.login().role_id(), current.account())
        });
        debug!(role = ?role.map(ToString::to_string), own, "Rotating API key");

        let api_key = with_deadline(
            self.config.timeout,
            self.service.rotate_api_key(
                current.account(),
                BasicAuth {
                    login: current.login(),
                    secret: current.expose_secret(),
                },
                role,
            ),
        )
        .await
        .map_err(normalize_auth)?;

        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ProtocolError::new(200, Some("empty API key".to_string())).into());
        }

        if own {
            let generation = guard.commit(api_key.clone(), SecretKind::ApiKey);
            info!(generation, "API key rotated");
        } else {
            info!("API key of another role rotated");
        }
        Ok(api_key)
    }

    async fn change_password_locked(
        &self,
        guard: &mut CredentialGuard<'_>,
        new_password: &str,
    ) -> Result<()> {
        if new_password.is_empty() {
            return Err(InvalidInputError::Other {
                message: "new password must be non-empty".to_string(),
            }
            .into());
        }

        let current = guard.credential();
        with_deadline(
            self.config.timeout,
            self.service.change_password(
                current.account(),
                BasicAuth {
                    login: current.login(),
                    secret: current.expose_secret(),
                },
                new_password,
            ),
        )
        .await
        .map_err(normalize_auth)?;

        let generation = guard.commit(new_password.to_string(), SecretKind::Password);
        info!(generation, "Password changed");
        Ok(())
    }
}

impl std::fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::error::{AuthError, Error, TransportError};
    use crate::testing::MockService;
    use std::time::Duration;

    fn setup(service: MockService) -> (Arc<MockService>, CredentialRotator, SharedCredential) {
        let service = Arc::new(service);
        let rotator = CredentialRotator::new(service.clone(), ClientConfig::default());
        let credential =
            SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());
        (service, rotator, credential)
    }

    async fn secret(credential: &SharedCredential) -> String {
        let (creds, _) = credential.snapshot(Duration::from_secs(1)).await.unwrap();
        creds.expose_secret().to_string()
    }

    #[tokio::test]
    async fn rotate_own_key_updates_credential() {
        let (service, rotator, credential) = setup(MockService::new());

        let key = rotator.rotate_api_key(&credential, None).await.unwrap();
        assert_eq!(key, "K2");
        assert_eq!(secret(&credential).await, "K2");
        assert_eq!(credential.generation(), 1);
        assert_eq!(service.secret_of("admin").as_deref(), Some("K2"));
    }

    #[tokio::test]
    async fn rotating_self_by_role_updates_credential() {
        let (_, rotator, credential) = setup(MockService::new());
        let role = RoleId::new("cucumber:user:admin").unwrap();

        rotator.rotate_api_key(&credential, Some(&role)).await.unwrap();
        assert_eq!(secret(&credential).await, "K2");
    }

    #[tokio::test]
    async fn rotating_other_role_leaves_credential() {
        let (service, rotator, credential) = setup(MockService::new());
        let role = RoleId::new("user:alice").unwrap();

        let key = rotator.rotate_api_key(&credential, Some(&role)).await.unwrap();
        assert_eq!(service.secret_of("alice"), Some(key));
        assert_eq!(secret(&credential).await, "K1");
        assert_eq!(credential.generation(), 0);
    }

    #[tokio::test]
    async fn failed_rotation_commits_nothing() {
        let (_, rotator, _) = setup(MockService::new());
        let credential =
            SharedCredential::new(Credential::api_key("cucumber", "admin", "wrong").unwrap());

        let err = rotator.rotate_api_key(&credential, None).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        assert_eq!(secret(&credential).await, "wrong");
        assert_eq!(credential.generation(), 0);
    }

    #[tokio::test]
    async fn concurrent_rotations_serialize() {
        let (_, rotator, credential) =
            setup(MockService::new().with_latency(Duration::from_millis(20)));

        let (first, second) = tokio::join!(
            rotator.rotate_api_key(&credential, None),
            rotator.rotate_api_key(&credential, None),
        );

        // The second call authenticated with the key the first committed.
        let mut keys = vec![first.unwrap(), second.unwrap()];
        keys.sort();
        assert_eq!(keys, ["K2", "K3"]);
        assert_eq!(secret(&credential).await, "K3");
        assert_eq!(credential.generation(), 2);
    }

    #[tokio::test]
    async fn try_rotate_fails_while_locked() {
        let (_, rotator, credential) = setup(MockService::new());
        let _held = credential.lock(Duration::from_secs(1)).await.unwrap();

        let err = rotator.try_rotate_api_key(&credential, None).await.unwrap_err();
        assert!(matches!(err, Error::ConcurrentRotation));
        let err = rotator.try_change_password(&credential, "n3w-Passw0rd!!").await.unwrap_err();
        assert!(matches!(err, Error::ConcurrentRotation));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_rotation_times_out_and_releases_lock() {
        let service = Arc::new(MockService::new().with_latency(Duration::from_secs(60)));
        let rotator = CredentialRotator::new(
            service,
            ClientConfig::default().with_timeout(Duration::from_secs(5)),
        );
        let credential =
            SharedCredential::new(Credential::api_key("cucumber", "admin", "K1").unwrap());

        let err = rotator.rotate_api_key(&credential, None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
        assert!(credential.try_lock().is_ok());
        assert_eq!(credential.generation(), 0);
    }

    #[tokio::test]
    async fn change_password_commits_password() {
        let (service, rotator, credential) = setup(MockService::new());

        rotator.change_password(&credential, "n3w-Passw0rd!!").await.unwrap();
        let (creds, generation) = credential.snapshot(Duration::from_secs(1)).await.unwrap();
        assert_eq!(creds.expose_secret(), "n3w-Passw0rd!!");
        assert_eq!(creds.kind(), SecretKind::Password);
        assert_eq!(generation, 1);
        assert_eq!(service.secret_of("admin").as_deref(), Some("n3w-Passw0rd!!"));
    }

    #[tokio::test]
    async fn empty_new_password_is_rejected() {
        let (_, rotator, credential) = setup(MockService::new());
        let err = rotator.change_password(&credential, "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
