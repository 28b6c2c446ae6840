//! Client-side tuning shared by the exchanger, rotator and session.

use std::time::Duration;

use crate::token::TokenEncoding;

/// Default bound for every exchange, rotation and lock wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default estimate of how long an issued token stays valid.
///
/// Appliance tokens typically live eight minutes; the real lifetime is not
/// communicated, so this is only an estimate.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(8 * 60);

/// Default margin before the estimated expiry at which a token is refreshed.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Configuration for talking to the authn service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for each remote call and each credential lock wait.
    pub timeout: Duration,
    /// Estimated token lifetime, counted from when the token was received.
    pub token_lifetime: Duration,
    /// Refresh this long before the estimated expiry.
    pub refresh_margin: Duration,
    /// Response encoding requested from the exchange endpoint.
    pub encoding: TokenEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            encoding: TokenEncoding::default(),
        }
    }
}

impl ClientConfig {
    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the estimated token lifetime.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Set the refresh margin.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Set the exchange response encoding.
    pub fn with_encoding(mut self, encoding: TokenEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub(crate) fn token_lifetime_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.token_lifetime).unwrap_or(chrono::Duration::MAX)
    }

    pub(crate) fn refresh_margin_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.refresh_margin).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.token_lifetime, Duration::from_secs(480));
        assert_eq!(config.encoding, TokenEncoding::Base64);
    }

    #[test]
    fn builders_override_fields() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_millis(250))
            .with_encoding(TokenEncoding::Raw);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.encoding, TokenEncoding::Raw);
        assert_eq!(config.refresh_margin, DEFAULT_REFRESH_MARGIN);
    }
}
