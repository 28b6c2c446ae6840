//! In-memory role directory and issued-token registry.

use std::collections::HashMap;

use bcrypt::verify;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use authn_core::error::{AuthError, Error, InvalidInputError};
use authn_core::types::{Login, RoleId};
use authn_core::Result;

/// A role that can log in.
#[derive(Debug, Clone)]
pub(crate) struct LocalRole {
    pub login: Login,
    /// Bcrypt hash; hosts have no password.
    pub password_hash: Option<String>,
    pub api_key: String,
    /// May rotate the keys of other roles.
    pub admin: bool,
}

/// A token handed out by `authenticate`.
#[derive(Debug, Clone)]
pub(crate) struct IssuedToken {
    pub login: Login,
    pub expires_at: DateTime<Utc>,
}

/// Roles keyed by login, plus the tokens issued to them.
#[derive(Debug, Default)]
pub(crate) struct Directory {
    roles: HashMap<String, LocalRole>,
    tokens: HashMap<String, IssuedToken>,
}

/// A new random API key.
pub(crate) fn new_api_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// The login a role authenticates with, if the role kind can log in.
pub(crate) fn login_for(role: &RoleId) -> Option<String> {
    match role.kind() {
        "user" => Some(role.id().to_string()),
        "host" => Some(format!("host/{}", role.id())),
        _ => None,
    }
}

/// Check a basic-auth secret against `role`: its API key or, failing that,
/// its bcrypt password hash. Slow at real costs; call without holding the
/// directory lock.
pub(crate) fn verify_basic(role: &LocalRole, secret: &str) -> Result<()> {
    if role.api_key == secret {
        return Ok(());
    }

    let Some(ref hash) = role.password_hash else {
        return Err(AuthError::InvalidCredentials.into());
    };
    let ok = verify(secret, hash).map_err(|e| {
        Error::InvalidInput(InvalidInputError::Other {
            message: e.to_string(),
        })
    })?;
    if !ok {
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(())
}

impl Directory {
    pub(crate) fn insert(&mut self, role: LocalRole) {
        debug!(login = %role.login, admin = role.admin, "Adding role");
        self.roles.insert(role.login.as_str().to_string(), role);
    }

    pub(crate) fn get(&self, login: &Login) -> Option<&LocalRole> {
        self.roles.get(login.as_str())
    }

    pub(crate) fn get_mut(&mut self, login: &str) -> Option<&mut LocalRole> {
        self.roles.get_mut(login)
    }

    /// A copy of the role behind `login`, for checks made outside the lock.
    pub(crate) fn role(&self, login: &Login) -> Result<LocalRole> {
        self.get(login)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredentials.into())
    }

    /// Authenticate an API key exchange. Passwords are not accepted here.
    pub(crate) fn verify_api_key(&self, login: &Login, api_key: &str) -> Result<&LocalRole> {
        match self.get(login) {
            Some(role) if role.api_key == api_key => Ok(role),
            _ => Err(AuthError::InvalidCredentials.into()),
        }
    }

    /// Remember an issued token, dropping expired ones on the way.
    pub(crate) fn record_token(&mut self, encoded: String, issued: IssuedToken, now: DateTime<Utc>) {
        self.purge_expired(now);
        self.tokens.insert(encoded, issued);
    }

    /// Look up an unexpired token, dropping expired ones on the way.
    pub(crate) fn lookup_token(&mut self, encoded: &str, now: DateTime<Utc>) -> Option<&IssuedToken> {
        self.purge_expired(now);
        self.tokens.get(encoded)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.tokens.retain(|_, issued| issued.expires_at > now);
    }

    /// Forget every issued token.
    pub(crate) fn revoke_tokens(&mut self) -> usize {
        let count = self.tokens.len();
        self.tokens.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issued(expires_at: DateTime<Utc>) -> IssuedToken {
        IssuedToken {
            login: Login::new("admin").unwrap(),
            expires_at,
        }
    }

    fn directory() -> Directory {
        let mut directory = Directory::default();
        directory.insert(LocalRole {
            login: Login::new("admin").unwrap(),
            password_hash: Some(bcrypt::hash("PAssword!234", 4).unwrap()),
            api_key: "K1".to_string(),
            admin: true,
        });
        directory
    }

    #[test]
    fn basic_accepts_key_or_password() {
        let directory = directory();
        let admin = directory.role(&Login::new("admin").unwrap()).unwrap();
        assert!(verify_basic(&admin, "K1").is_ok());
        assert!(verify_basic(&admin, "PAssword!234").is_ok());
        assert!(verify_basic(&admin, "nope").is_err());
    }

    #[test]
    fn unknown_login_has_no_role() {
        let directory = directory();
        let err = directory.role(&Login::new("nobody").unwrap()).unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
    }

    #[test]
    fn exchange_accepts_only_key() {
        let directory = directory();
        let admin = Login::new("admin").unwrap();
        assert!(directory.verify_api_key(&admin, "K1").is_ok());
        assert!(directory.verify_api_key(&admin, "PAssword!234").is_err());
    }

    #[test]
    fn expired_tokens_are_dropped() {
        let mut directory = directory();
        let now = Utc::now();
        directory.record_token("t".to_string(), issued(now + Duration::seconds(1)), now);
        assert!(directory.lookup_token("t", now).is_some());
        assert!(directory.lookup_token("t", now + Duration::seconds(2)).is_none());
    }

    #[test]
    fn recording_a_token_drops_expired_ones() {
        let mut directory = directory();
        let now = Utc::now();
        for n in 0..10 {
            directory.record_token(format!("old-{}", n), issued(now + Duration::seconds(1)), now);
        }

        let later = now + Duration::seconds(2);
        directory.record_token("new".to_string(), issued(later + Duration::seconds(1)), later);
        assert_eq!(directory.revoke_tokens(), 1);
    }

    #[test]
    fn role_logins() {
        assert_eq!(login_for(&RoleId::new("user:alice").unwrap()).as_deref(), Some("alice"));
        assert_eq!(
            login_for(&RoleId::new("host:app/web").unwrap()).as_deref(),
            Some("host/app/web")
        );
        assert_eq!(login_for(&RoleId::new("group:ops").unwrap()), None);
    }
}
