//! Whoami command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;
use tracing::debug;

use authn_core::{AuthenticatedTransport, Request, Transport};
use authn_http::HttpTransport;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the appliance's response as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(connection: &ConnectionArgs, args: WhoamiArgs) -> Result<()> {
    let client = connection.client()?;
    let session = connection.session(client.clone(), connection.config())?;
    let transport = AuthenticatedTransport::new(HttpTransport::new(client), session);

    let response = transport
        .send(Request::get("/whoami"))
        .await
        .context("Failed to query identity")?;
    debug!(status = response.status, "Identity response received");
    if !response.is_success() {
        bail!("whoami failed with status {}: {}", response.status, response.body);
    }

    let identity: Value =
        serde_json::from_str(&response.body).context("Invalid whoami response")?;

    if args.json {
        return output::json(&identity);
    }

    let Some(fields) = identity.as_object() else {
        bail!("Invalid whoami response: expected a JSON object");
    };
    for (label, value) in fields {
        match value {
            Value::String(s) => output::field(label, s),
            other => output::field(label, &other.to_string()),
        }
    }

    Ok(())
}
