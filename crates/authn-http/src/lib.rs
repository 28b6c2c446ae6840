//! authn-http - HTTP binding of the secrets appliance authn API.
//!
//! [`HttpAuthn`] implements [`authn_core::AuthnService`] against the
//! appliance's `/authn` endpoints; [`HttpTransport`] carries arbitrary
//! resource requests for [`authn_core::AuthenticatedTransport`].

mod client;
mod endpoints;
mod service;
mod transport;

pub use client::HttpClient;
pub use service::HttpAuthn;
pub use transport::HttpTransport;
