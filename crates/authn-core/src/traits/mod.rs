//! Core traits for the remote authn service and the wrapped transport.

mod service;
mod transport;

pub use service::{AuthnService, BasicAuth};
pub use transport::{Method, Request, Response, Transport};
