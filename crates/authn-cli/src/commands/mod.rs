//! Subcommand implementations.

mod authenticate;
mod change_password;
mod enable_authenticator;
mod login;
mod rotate_api_key;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::ConnectionArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exchange a password for the login's API key
    Login(login::LoginArgs),

    /// Exchange the credential for an access token
    Authenticate(authenticate::AuthenticateArgs),

    /// Rotate the API key of the login, or of another role
    RotateApiKey(rotate_api_key::RotateApiKeyArgs),

    /// Change the login's password
    ChangePassword(change_password::ChangePasswordArgs),

    /// Enable or disable a service authenticator such as `authn-ldap/test`
    EnableAuthenticator(enable_authenticator::EnableAuthenticatorArgs),

    /// Show who the appliance thinks you are
    Whoami(whoami::WhoamiArgs),
}

pub async fn handle(connection: ConnectionArgs, command: Commands) -> Result<()> {
    match command {
        Commands::Login(args) => login::run(&connection, args).await,
        Commands::Authenticate(args) => authenticate::run(&connection, args).await,
        Commands::RotateApiKey(args) => rotate_api_key::run(&connection, args).await,
        Commands::ChangePassword(args) => change_password::run(&connection, args).await,
        Commands::EnableAuthenticator(args) => enable_authenticator::run(&connection, args).await,
        Commands::Whoami(args) => whoami::run(&connection, args).await,
    }
}
