//! CLI argument definitions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser};

use authn_core::{ApplianceUrl, AuthSession, Authenticator, ClientConfig, Credential};
use authn_http::{HttpAuthn, HttpClient};

use crate::commands::Commands;

/// CLI for a secrets appliance's authn API.
#[derive(Parser, Debug)]
#[command(name = "authn")]
#[command(author, version = env!("AUTHN_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to connect and who to connect as.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Appliance base URL
    #[arg(long, env = "AUTHN_URL", global = true)]
    pub url: Option<String>,

    /// Organization account
    #[arg(long, env = "AUTHN_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Login name (`alice`, or `host/<id>` for hosts)
    #[arg(long, env = "AUTHN_LOGIN", global = true)]
    pub login: Option<String>,

    /// API key to authenticate with
    #[arg(long, env = "AUTHN_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Password to authenticate with
    #[arg(long, env = "AUTHN_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Authenticator to log in through (`authn`, or `authn-<kind>/<service-id>`)
    #[arg(long, env = "AUTHN_AUTHENTICATOR", default_value = "authn", global = true)]
    pub authenticator: Authenticator,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
}

impl ConnectionArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Default client configuration with the requested timeout.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default().with_timeout(self.timeout())
    }

    /// HTTP client for the configured appliance.
    pub fn client(&self) -> Result<HttpClient> {
        let url = self
            .url
            .as_deref()
            .context("No appliance URL. Pass --url or set AUTHN_URL.")?;
        let url = ApplianceUrl::new(url).context("Invalid appliance URL")?;
        Ok(HttpClient::new(url, self.timeout())?)
    }

    /// Build the credential from the flags. An API key wins over a password.
    pub fn credential(&self) -> Result<Credential> {
        let account = self
            .account
            .as_deref()
            .context("No account. Pass --account or set AUTHN_ACCOUNT.")?;
        let login = self
            .login
            .as_deref()
            .context("No login. Pass --login or set AUTHN_LOGIN.")?;

        let credential = match (&self.api_key, &self.password) {
            (Some(key), _) => Credential::api_key(account, login, key.as_str()),
            (None, Some(password)) => Credential::password(account, login, password.as_str()),
            (None, None) => bail!("No secret. Pass --api-key or --password."),
        };
        credential.context("Invalid credential")
    }

    /// Authn service over `client`, logging in through the chosen authenticator.
    pub fn service(&self, client: HttpClient) -> HttpAuthn {
        HttpAuthn::with_client(client).with_authenticator(self.authenticator.clone())
    }

    /// Session over `client` for the configured credential.
    pub fn session(&self, client: HttpClient, config: ClientConfig) -> Result<AuthSession> {
        Ok(AuthSession::connect(
            self.credential()?,
            Arc::new(self.service(client)),
            config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authn_core::SecretKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("authn").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn connection_flags_after_subcommand() {
        let cli = parse(&[
            "whoami",
            "--url",
            "https://appliance.example",
            "--account",
            "cucumber",
            "--login",
            "admin",
            "--api-key",
            "K1",
        ]);
        let credential = cli.connection.credential().unwrap();
        assert_eq!(credential.kind(), SecretKind::ApiKey);
        assert_eq!(credential.login().as_str(), "admin");
    }

    #[test]
    fn api_key_preferred_over_password() {
        let cli = parse(&[
            "--account", "cucumber", "--login", "admin", "--api-key", "K1", "--password", "pw",
            "authenticate",
        ]);
        assert_eq!(cli.connection.credential().unwrap().expose_secret(), "K1");
    }

    #[test]
    fn missing_secret_is_reported() {
        let cli = parse(&["--account", "cucumber", "--login", "admin", "login"]);
        let err = cli.connection.credential().unwrap_err();
        assert!(err.to_string().contains("No secret"));
    }

    #[test]
    fn authenticator_defaults_to_builtin() {
        let cli = parse(&["whoami"]);
        assert!(cli.connection.authenticator.is_default());

        let cli = parse(&["--authenticator", "authn-ldap/test", "login"]);
        assert_eq!(cli.connection.authenticator.to_string(), "authn-ldap/test");
        assert!(Cli::try_parse_from(["authn", "--authenticator", "ldap", "login"]).is_err());
    }

    #[test]
    fn invalid_url_is_reported() {
        let cli = parse(&["--url", "ftp://appliance", "whoami"]);
        assert!(cli.connection.client().is_err());
    }
}
