//! Access token type.
//!
//! The appliance answers an exchange with a JSON object of exactly three
//! string segments, `protected`, `payload` and `signature`, optionally
//! base64-encoded as a whole. The segments are opaque to the client: the
//! signature is never verified here.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::error::MalformedTokenError;

/// How the exchange response body is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenEncoding {
    /// The body is the base64 encoding of the token JSON.
    #[default]
    Base64,
    /// The body is the token JSON itself.
    Raw,
}

impl TokenEncoding {
    /// Value for the `Accept-Encoding` request header, if any.
    pub fn accept_encoding(&self) -> Option<&'static str> {
        match self {
            TokenEncoding::Base64 => Some("base64"),
            TokenEncoding::Raw => None,
        }
    }
}

const SEGMENTS: [&str; 3] = ["protected", "payload", "signature"];

/// A short-lived, signed access token.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Immutable; a refresh replaces the whole token
#[derive(Clone)]
pub struct AccessToken {
    protected: Vec<u8>,
    payload: Vec<u8>,
    signature: Vec<u8>,
    encoded: String,
    issued_at: DateTime<Utc>,
    approx_expiry: DateTime<Utc>,
}

impl AccessToken {
    /// Parse an exchange response body.
    ///
    /// `lifetime` is the locally estimated validity; the appliance does not
    /// communicate a trustworthy expiry.
    ///
    /// # Errors
    ///
    /// Fails unless the body decodes to an object with exactly the three
    /// required, non-empty string segments.
    pub fn parse(
        body: &str,
        encoding: TokenEncoding,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self, MalformedTokenError> {
        let body = body.trim();
        let (json, encoded) = match encoding {
            TokenEncoding::Base64 => {
                let json = STANDARD
                    .decode(body)
                    .map_err(|e| MalformedTokenError::Encoding {
                        message: e.to_string(),
                    })?;
                (json, body.to_string())
            }
            TokenEncoding::Raw => (body.as_bytes().to_vec(), STANDARD.encode(body)),
        };

        let mut object: Map<String, Value> =
            serde_json::from_slice(&json).map_err(|e| MalformedTokenError::Json {
                message: e.to_string(),
            })?;

        let [protected, payload, signature] = SEGMENTS.map(|name| take_segment(&mut object, name));
        if let Some(key) = object.keys().next() {
            return Err(MalformedTokenError::UnexpectedKey { key: key.clone() });
        }

        Ok(Self {
            protected: protected?,
            payload: payload?,
            signature: signature?,
            encoded,
            issued_at,
            approx_expiry: issued_at
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }

    /// The protected header segment, as received.
    pub fn protected(&self) -> &[u8] {
        &self.protected
    }

    /// The payload segment, as received.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The signature segment, as received. Opaque to the client.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// When the token was obtained.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Locally estimated expiry.
    pub fn approx_expiry(&self) -> DateTime<Utc> {
        self.approx_expiry
    }

    /// Returns true if the token is within `margin` of its estimated expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now.checked_add_signed(margin)
            .is_none_or(|deadline| deadline >= self.approx_expiry)
    }

    /// Best-effort decode of the payload segment as base64url JSON claims.
    ///
    /// Informational only; nothing here is trusted for expiry decisions.
    pub fn claims(&self) -> Option<Value> {
        let payload = std::str::from_utf8(&self.payload).ok()?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// The base64 form sent in the `Authorization` header.
    ///
    /// # Security
    ///
    /// Use only when constructing authorization headers or handing the token
    /// to the caller.
    pub fn expose_encoded(&self) -> &str {
        &self.encoded
    }

    /// The full `Authorization` header value for this token.
    pub fn authorization_header(&self) -> String {
        format!("Token token=\"{}\"", self.encoded)
    }
}

fn take_segment(
    object: &mut Map<String, Value>,
    name: &'static str,
) -> Result<Vec<u8>, MalformedTokenError> {
    match object.remove(name) {
        None | Some(Value::Null) => Err(MalformedTokenError::MissingSegment { segment: name }),
        Some(Value::String(s)) if s.is_empty() => {
            Err(MalformedTokenError::EmptySegment { segment: name })
        }
        Some(Value::String(s)) => Ok(s.into_bytes()),
        Some(other) => Err(MalformedTokenError::Json {
            message: format!("segment '{}' must be a string, got {}", name, other),
        }),
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("approx_expiry", &self.approx_expiry)
            .finish()
    }
}
