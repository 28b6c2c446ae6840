//! Change-password command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ChangePasswordArgs {
    /// The new password
    #[arg(long, env = "AUTHN_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

pub async fn run(connection: &ConnectionArgs, args: ChangePasswordArgs) -> Result<()> {
    let session = connection.session(connection.client()?, connection.config())?;
    debug!(login = %session.credential().login(), "Changing password");

    session
        .rotator()
        .change_password(session.credential(), &args.new_password)
        .await
        .context("Failed to change password")?;

    output::success("Password changed");

    Ok(())
}
