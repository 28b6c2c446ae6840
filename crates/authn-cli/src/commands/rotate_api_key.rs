//! Rotate-api-key command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use authn_core::RoleId;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RotateApiKeyArgs {
    /// Role to rotate (`kind:id`, e.g. `host:app/web`); defaults to the login's own
    #[arg(long)]
    pub role: Option<RoleId>,
}

pub async fn run(connection: &ConnectionArgs, args: RotateApiKeyArgs) -> Result<()> {
    let session = connection.session(connection.client()?, connection.config())?;

    let target = args
        .role
        .as_ref()
        .map_or_else(|| session.credential().login().to_string(), ToString::to_string);
    output::status(&format!("Rotating API key of {}...", target));

    let api_key = session
        .rotator()
        .rotate_api_key(session.credential(), args.role.as_ref())
        .await
        .context("Failed to rotate API key")?;
    debug!(%target, generation = session.credential().generation(), "Rotation finished");

    output::success("API key rotated");
    output::value(&api_key);

    Ok(())
}
