//! Minting of access tokens.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use authn_core::TokenEncoding;

/// A freshly minted token.
pub(crate) struct Minted {
    /// Response body in the requested encoding.
    pub body: String,
    /// The base64 form clients send back in `Token token="..."`.
    pub encoded: String,
}

/// Mint a token for `sub` in `account`.
///
/// The signature is random bytes: tokens are recognized by lookup, not by
/// verification.
pub(crate) fn mint(
    account: &str,
    sub: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    encoding: TokenEncoding,
) -> Minted {
    let protected = URL_SAFE_NO_PAD.encode(
        json!({"alg": "local", "kid": Uuid::new_v4().simple().to_string()}).to_string(),
    );
    let claims = json!({
        "account": account,
        "sub": sub,
        "iat": issued_at.timestamp(),
        "exp": expires_at.timestamp(),
        "jti": Uuid::new_v4().to_string(),
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signature = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());

    let json = json!({
        "protected": protected,
        "payload": payload,
        "signature": signature,
    })
    .to_string();
    let encoded = STANDARD.encode(&json);
    let body = match encoding {
        TokenEncoding::Base64 => encoded.clone(),
        TokenEncoding::Raw => json,
    };
    Minted { body, encoded }
}

/// Extract the encoded token from a `Token token="..."` header value.
pub(crate) fn parse_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Token token=\"")?
        .strip_suffix('"')
        .filter(|token| !token.is_empty())
}
