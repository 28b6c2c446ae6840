//! Core identifier types.
//!
//! These types enforce the appliance's identifier rules at construction time,
//! so a malformed account or login fails before any request is sent.

mod account;
mod appliance_url;
mod authenticator;
mod login;
mod role_id;

pub use account::Account;
pub use appliance_url::ApplianceUrl;
pub use authenticator::Authenticator;
pub use login::Login;
pub use role_id::RoleId;

/// Shared rule for path-embedded identifiers: non-empty, no control characters.
fn check_identifier(s: &str) -> Result<(), &'static str> {
    if s.is_empty() {
        return Err("must be non-empty");
    }
    if s.chars().any(char::is_control) {
        return Err("must not contain control characters");
    }
    Ok(())
}
