//! Error types for authn operations.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, token-shape, rotation and protocol failures.
//!
//! [`Error`] is `Clone` so that a single failed refresh can be handed to every
//! caller that was waiting on it.

use std::fmt;
use thiserror::Error;

/// The unified error type for authn operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Network transport errors (connection, TLS, timeout).
    ///
    /// Retry policy for these is the caller's responsibility.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The remote service rejected the credential or token.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The token response did not have the required three-segment shape.
    #[error("malformed token: {0}")]
    MalformedToken(#[from] MalformedTokenError),

    /// A rotation or password change is already holding the credential lock.
    #[error("credential is locked by a concurrent rotation")]
    ConcurrentRotation,

    /// Protocol errors (unexpected status codes, unexpected bodies).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (account, login, role id, URL format).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true if the error is an authentication failure.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Protocol(e) => e.is_auth_error(),
            _ => false,
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// TLS/SSL error.
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The secret (password or API key) was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The credential is valid but not permitted to perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// A freshly exchanged token was rejected again.
    #[error("access token rejected after refresh")]
    TokenRejected,
}

/// Token-shape errors.
#[derive(Debug, Clone, Error)]
pub enum MalformedTokenError {
    /// The body was not valid base64.
    #[error("token is not valid base64: {message}")]
    Encoding { message: String },

    /// The decoded body was not a JSON object with string segments.
    #[error("token is not a JSON object: {message}")]
    Json { message: String },

    /// A required segment is missing.
    #[error("token is missing the '{segment}' segment")]
    MissingSegment { segment: &'static str },

    /// A required segment is present but empty.
    #[error("token has an empty '{segment}' segment")]
    EmptySegment { segment: &'static str },

    /// The object carries keys other than the three segments.
    #[error("token has unexpected key '{key}'")]
    UnexpectedKey { key: String },
}

/// Protocol-level errors from appliance responses.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error message from the server, if any.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401
    }
}

/// Input validation errors.
#[derive(Debug, Clone, Error)]
pub enum InvalidInputError {
    /// Invalid account name.
    #[error("invalid account '{value}': {reason}")]
    Account { value: String, reason: String },

    /// Invalid login.
    #[error("invalid login '{value}': {reason}")]
    Login { value: String, reason: String },

    /// Invalid role id.
    #[error("invalid role id '{value}': {reason}")]
    RoleId { value: String, reason: String },

    /// Invalid authenticator selector.
    #[error("invalid authenticator '{value}': {reason}")]
    Authenticator { value: String, reason: String },

    /// Invalid appliance URL.
    #[error("invalid appliance URL '{value}': {reason}")]
    ApplianceUrl { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
