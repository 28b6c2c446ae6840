//! `Transport` for arbitrary appliance resources.

use async_trait::async_trait;
use authn_core::traits::{Method, Request, Response, Transport};
use authn_core::Result;
use reqwest::header::AUTHORIZATION;
use tracing::instrument;

use crate::client::HttpClient;
use crate::endpoints;

/// Sends [`Request`]s to the appliance over HTTP.
///
/// Wrap it in an [`AuthenticatedTransport`](authn_core::AuthenticatedTransport)
/// to have authorization attached.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    /// Create a transport sharing an existing client.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = ?request.method, path = %request.path))]
    async fn send(&self, request: Request) -> Result<Response> {
        let url = endpoints::resource(self.client.base(), &request.path)?;
        let mut builder = self.client.request(method(request.method), url);
        if let Some(authorization) = request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = self.client.send(builder).await?;
        let status = response.status().as_u16();
        let body = self.client.body(response).await?;
        Ok(Response::new(status, body))
    }
}
