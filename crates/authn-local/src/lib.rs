//! authn-local - In-memory secrets appliance authn API.
//!
//! [`LocalAuthn`] implements [`authn_core::AuthnService`] and
//! [`authn_core::Transport`] in process: API keys, bcrypt-hashed passwords,
//! the password policy, and issued tokens that `GET /whoami` accepts until
//! they expire. Useful for development and for exercising sessions and
//! rotation without a server.

mod appliance;
mod directory;
mod issuer;
mod policy;

pub use appliance::{DEFAULT_TOKEN_TTL, LocalAuthn};
pub use policy::check_password;
