//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tracing::debug;

use authn_core::{AuthnService, BasicAuth};

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(connection: &ConnectionArgs, args: LoginArgs) -> Result<()> {
    let credential = connection.credential()?;
    let service = connection.service(connection.client()?);

    output::status("Logging in...");
    debug!(
        account = %credential.account(),
        login = %credential.login(),
        kind = ?credential.kind(),
        "Fetching API key"
    );

    let api_key = service
        .get_api_key(
            credential.account(),
            BasicAuth {
                login: credential.login(),
                secret: credential.expose_secret(),
            },
        )
        .await
        .context("Failed to login")?;

    if args.json {
        output::json(&json!({
            "account": credential.account().as_str(),
            "login": credential.login().as_str(),
            "api_key": api_key,
        }))?;
    } else {
        output::success("Logged in");
        output::value(&api_key);
    }

    Ok(())
}
