//! In-crate mock of the authn service for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::Result;
use crate::error::{AuthError, TransportError};
use crate::token::TokenEncoding;
use crate::traits::{AuthnService, BasicAuth};
use crate::types::{Account, Login, RoleId};

/// Keys by login; rotation issues `K2`, `K3`, ...
pub(crate) struct MockService {
    secrets: Mutex<HashMap<String, String>>,
    pub(crate) exchanges: AtomicUsize,
    pub(crate) rotations: AtomicUsize,
    pub(crate) fail_exchange: AtomicBool,
    latency: Duration,
    exchange_latency: Duration,
}

impl MockService {
    pub(crate) fn new() -> Self {
        Self {
            secrets: Mutex::new(HashMap::from([
                ("admin".to_string(), "K1".to_string()),
                ("alice".to_string(), "A1".to_string()),
            ])),
            exchanges: AtomicUsize::new(0),
            rotations: AtomicUsize::new(0),
            fail_exchange: AtomicBool::new(false),
            latency: Duration::ZERO,
            exchange_latency: Duration::ZERO,
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self.exchange_latency = latency;
        self
    }

    /// Slow down `authenticate` only.
    pub(crate) fn with_exchange_latency(mut self, latency: Duration) -> Self {
        self.exchange_latency = latency;
        self
    }

    pub(crate) fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub(crate) fn secret_of(&self, login: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(login).cloned()
    }

    fn check(&self, login: &Login, secret: &str) -> Result<()> {
        match self.secrets.lock().unwrap().get(login.as_str()) {
            Some(current) if current == secret => Ok(()),
            _ => Err(AuthError::InvalidCredentials.into()),
        }
    }

    async fn delay(&self) {
        sleep(self.latency).await;
    }
}

async fn sleep(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl AuthnService for MockService {
    async fn get_api_key(&self, _: &Account, auth: BasicAuth<'_>) -> Result<String> {
        self.check(auth.login, auth.secret)?;
        Ok(self.secret_of(auth.login.as_str()).unwrap_or_default())
    }

    async fn authenticate(
        &self,
        _: &Account,
        login: &Login,
        secret: &str,
        encoding: TokenEncoding,
    ) -> Result<String> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        sleep(self.exchange_latency).await;
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(TransportError::Connection {
                message: "connection reset".to_string(),
            }
            .into());
        }
        self.check(login, secret)?;

        let json = serde_json::json!({
            "protected": "eyJhbGciOiJub25lIn0",
            "payload": format!("{}-{}", login, n),
            "signature": "c2ln",
        })
        .to_string();
        Ok(match encoding {
            TokenEncoding::Base64 => STANDARD.encode(json),
            TokenEncoding::Raw => json,
        })
    }

    async fn rotate_api_key(
        &self,
        _: &Account,
        auth: BasicAuth<'_>,
        role: Option<&RoleId>,
    ) -> Result<String> {
        self.delay().await;
        self.check(auth.login, auth.secret)?;
        let target = match role {
            Some(role) => role.id().to_string(),
            None => auth.login.as_str().to_string(),
        };
        let n = self.rotations.fetch_add(1, Ordering::SeqCst) + 2;
        let key = format!("K{}", n);
        self.secrets.lock().unwrap().insert(target, key.clone());
        Ok(key)
    }

    async fn change_password(
        &self,
        _: &Account,
        auth: BasicAuth<'_>,
        new_password: &str,
    ) -> Result<()> {
        self.delay().await;
        self.check(auth.login, auth.secret)?;
        self.secrets
            .lock()
            .unwrap()
            .insert(auth.login.as_str().to_string(), new_password.to_string());
        Ok(())
    }
}
