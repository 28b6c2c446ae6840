//! authn-core - Credential-to-token exchange for a secrets appliance.
//!
//! A [`Credential`] (account, login and an API key or password) is traded by
//! a [`TokenExchanger`] for a short-lived [`AccessToken`]. An [`AuthSession`]
//! caches that token and refreshes it single-flight; a [`CredentialRotator`]
//! rotates API keys and changes passwords under the credential's lock; an
//! [`AuthenticatedTransport`] attaches the right `Authorization` header to
//! outbound calls.
//!
//! The remote side is abstracted by the [`AuthnService`] and [`Transport`]
//! traits, implemented over HTTP by `authn-http` and in memory by
//! `authn-local`.

pub mod config;
pub mod credential;
pub mod error;
pub mod exchanger;
pub mod rotator;
pub mod session;
pub mod token;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use credential::{Credential, SecretKind, SharedCredential};
pub use error::Error;
pub use exchanger::TokenExchanger;
pub use rotator::CredentialRotator;
pub use session::AuthSession;
pub use token::{AccessToken, TokenEncoding};
pub use traits::{AuthnService, BasicAuth, Method, Request, Response, Transport};
pub use transport::{AuthScheme, AuthenticatedTransport};
pub use types::{Account, ApplianceUrl, Authenticator, Login, RoleId};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
