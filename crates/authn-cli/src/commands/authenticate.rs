//! Authenticate command implementation.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Args;
use serde_json::json;
use tracing::debug;

use authn_core::TokenEncoding;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct AuthenticateArgs {
    /// Request the token unencoded and print its JSON form
    #[arg(long, conflicts_with = "header")]
    pub raw: bool,

    /// Print the full `Authorization` header value
    #[arg(long)]
    pub header: bool,

    /// Print the token's estimated expiry and claims as JSON
    #[arg(long, conflicts_with_all = ["raw", "header"])]
    pub json: bool,
}

pub async fn run(connection: &ConnectionArgs, args: AuthenticateArgs) -> Result<()> {
    let encoding = if args.raw {
        TokenEncoding::Raw
    } else {
        TokenEncoding::Base64
    };
    let session = connection.session(
        connection.client()?,
        connection.config().with_encoding(encoding),
    )?;

    let token = session
        .get_valid_token()
        .await
        .context("Failed to authenticate")?;
    debug!(?encoding, expires_at = %token.approx_expiry(), "Token acquired");

    if args.raw {
        output::json(&json!({
            "protected": String::from_utf8_lossy(token.protected()),
            "payload": String::from_utf8_lossy(token.payload()),
            "signature": String::from_utf8_lossy(token.signature()),
        }))?;
    } else if args.header {
        output::value(&token.authorization_header());
    } else if args.json {
        output::json(&json!({
            "token": token.expose_encoded(),
            "issued_at": token.issued_at().to_rfc3339_opts(SecondsFormat::Secs, true),
            "expires_at": token.approx_expiry().to_rfc3339_opts(SecondsFormat::Secs, true),
            "claims": token.claims(),
        }))?;
    } else {
        output::value(token.expose_encoded());
    }

    Ok(())
}
