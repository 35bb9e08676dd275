//! Remote API client
//!
//! Thin reqwest wrapper that replays queued mutations and fetches
//! collections. Every request is bounded by the configured timeout.

use crate::client::config::Config;
use crate::client::error::{Result, SyncError};
use crate::shared::mutation::{HttpMethod, MutationKind, QueuedMutation};
use crate::shared::record::Record;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

/// Parsed answer to a successful request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body, `Null` when the server sent nothing parseable
    pub body: Value,
}

impl ApiResponse {
    /// Server-assigned id for a create mutation of `kind`
    pub fn server_id(&self, kind: MutationKind) -> Option<u64> {
        let value = self.body.get(kind.response_id_field()?)?;
        match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

/// HTTP client for the collaboration backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Config,
    client: Client,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Issue the request a queued mutation describes.
    ///
    /// `token` fills in `Authorization` when the mutation carries none.
    pub async fn send(&self, mutation: &QueuedMutation, token: Option<&str>) -> Result<ApiResponse> {
        let url = self.config.api_url(&mutation.url);
        let method = match mutation.method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut request = self.client.request(method, &url).json(&mutation.body);
        for (name, value) in &mutation.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !mutation.has_header("Authorization") {
            request = with_bearer(request, token);
        }

        tracing::debug!("Sending {} {}", mutation.method, url);
        let response = request.send().await?;
        let response = ensure_success(mutation.method.as_str(), &url, response).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::debug!("Response from {} is not JSON: {}", url, e);
                Value::Null
            })
        };

        Ok(ApiResponse { status, body })
    }

    /// GET a collection of records
    pub async fn fetch_records(&self, path: &str, token: Option<&str>) -> Result<Vec<Record>> {
        let url = self.config.api_url(path);
        let request = with_bearer(self.client.get(&url), token);

        let response = request.send().await?;
        let response = ensure_success("GET", &url, response).await?;
        Ok(response.json().await?)
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.header("Authorization", format!("Bearer {}", token)),
        None => request,
    }
}

async fn ensure_success(method: &str, url: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| status.to_string());
    Err(SyncError::Rejected {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}
