//! Enable-authenticator command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use authn_core::Authenticator;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct EnableAuthenticatorArgs {
    /// Service authenticator to update (`authn-<kind>/<service-id>`)
    pub target: Authenticator,

    /// Disable the authenticator instead
    #[arg(long)]
    pub disable: bool,
}

pub async fn run(connection: &ConnectionArgs, args: EnableAuthenticatorArgs) -> Result<()> {
    let client = connection.client()?;
    let session = connection.session(client.clone(), connection.config())?;
    let enabled = !args.disable;

    let token = session
        .get_valid_token()
        .await
        .context("Failed to authenticate")?;
    debug!(target_authenticator = %args.target, enabled, "Token acquired");

    connection
        .service(client)
        .enable_authenticator(session.credential().account(), &token, &args.target, enabled)
        .await
        .with_context(|| format!("Failed to update {}", args.target))?;

    let state = if enabled { "enabled" } else { "disabled" };
    output::success(&format!("{} {}", args.target, state));

    Ok(())
}
