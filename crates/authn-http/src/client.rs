//! HTTP client for the appliance's REST API.

use std::time::Duration;

use authn_core::error::{AuthError, ProtocolError, TransportError};
use authn_core::types::ApplianceUrl;
use authn_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use tracing::{Instrument, debug, debug_span, trace};
use uuid::Uuid;

use crate::endpoints::REQUEST_ID;

/// HTTP client bound to one appliance.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base: ApplianceUrl,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client for the given appliance with a per-request timeout.
    pub fn new(base: ApplianceUrl, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("authn/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// Returns the appliance URL this client is configured for.
    pub fn base(&self) -> &ApplianceUrl {
        &self.base
    }

    /// Start a request carrying a fresh request id.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(REQUEST_ID, Uuid::new_v4().to_string())
    }

    /// Send a request, mapping failures to get any response to transport errors.
    ///
    /// The exchange runs in a `request` span carrying the request id, so the
    /// appliance's logs can be matched against ours.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let request = request.build().map_err(|e| self.transport_error(e))?;
        let request_id = request
            .headers()
            .get(REQUEST_ID)
            .and_then(|id| id.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let span = debug_span!(
            "request",
            method = %request.method(),
            url = %request.url(),
            %request_id,
        );

        async {
            debug!("Sending request");
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| self.transport_error(e))?;
            let status = response.status();
            if status.is_success() {
                trace!(%status, "Response received");
            } else {
                debug!(%status, "Request rejected");
            }
            Ok::<_, Error>(response)
        }
        .instrument(span)
        .await
    }

    /// Read a response body as text, whatever the status.
    pub(crate) async fn body(&self, response: reqwest::Response) -> Result<String> {
        response.text().await.map_err(|e| self.transport_error(e))
    }

    /// Read a successful response's body as text; other statuses become errors.
    pub(crate) async fn text(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = self.body(response).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(status_error(status, body))
        }
    }

    /// Like [`text`](Self::text), rejecting a blank body.
    pub(crate) async fn non_empty_text(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = self.text(response).await?;
        if body.trim().is_empty() {
            let message = Some("empty response body".to_string());
            return Err(ProtocolError::new(status.as_u16(), message).into());
        }
        Ok(body)
    }

    /// Expect a success status and ignore the body.
    pub(crate) async fn empty(&self, response: reqwest::Response) -> Result<()> {
        self.text(response).await.map(drop)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        let err = if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        };
        err.into()
    }
}

/// Map a non-success status to the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: String) -> Error {
    let body = body.trim().to_string();
    match status {
        StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials.into(),
        StatusCode::FORBIDDEN => AuthError::Forbidden {
            reason: if body.is_empty() {
                "forbidden".to_string()
            } else {
                body
            },
        }
        .into(),
        _ => ProtocolError::new(status.as_u16(), (!body.is_empty()).then_some(body)).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let base = ApplianceUrl::new("https://vault.example.com").unwrap();
        let client = HttpClient::new(base.clone(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base(), &base);
    }

    #[test]
    fn requests_carry_fresh_ids() {
        let base = ApplianceUrl::new("https://vault.example.com").unwrap();
        let client = HttpClient::new(base.clone(), Duration::from_secs(5)).unwrap();
        let id = |builder: RequestBuilder| {
            let request = builder.build().unwrap();
            let id = request.headers().get(REQUEST_ID).unwrap().to_str().unwrap();
            Uuid::parse_str(id).unwrap()
        };

        let first = id(client.request(Method::GET, base.as_url().clone()));
        let second = id(client.request(Method::GET, base.as_url().clone()));
        assert_ne!(first, second);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            Error::Auth(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "not allowed\n".to_string()),
            Error::Auth(AuthError::Forbidden { reason }) if reason == "not allowed"
        ));
        match status_error(StatusCode::UNPROCESSABLE_ENTITY, "password too short".to_string()) {
            Error::Protocol(e) => {
                assert_eq!(e.status, 422);
                assert_eq!(e.message.as_deref(), Some("password too short"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match status_error(StatusCode::NOT_FOUND, String::new()) {
            Error::Protocol(e) => assert!(e.message.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
