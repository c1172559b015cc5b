// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote endpoint abstraction for replaying queued mutations.
//!
//! Provides a trait-based request layer that enables:
//! - Real HTTP calls for production
//! - Scripted endpoints for unit testing

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tally_core::Method;

/// Failure reported by the remote endpoint.
///
/// `status` is `None` when no HTTP response was received at all
/// (connection refused, DNS failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.status, .message))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {message}"),
        None => format!("network error: {message}"),
    }
}

impl RemoteError {
    /// A response with a non-success status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        RemoteError {
            status: Some(status),
            message: message.into(),
        }
    }

    /// No response was received.
    pub fn network(message: impl Into<String>) -> Self {
        RemoteError {
            status: None,
            message: message.into(),
        }
    }

    /// True if the server reported the resource as gone.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Request/response surface of the remote API.
///
/// Implementations must be shareable: a drain pass issues many requests
/// concurrently through one endpoint.
pub trait RemoteEndpoint: Send + Sync {
    /// Issue a mutation and return the decoded response body.
    ///
    /// A `null` body is sent without content. An empty response body
    /// decodes to `null`.
    fn request(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>>;

    /// Fetch a resource with `GET`.
    fn fetch(&self, url: &str) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>>;

    /// Check whether the endpoint answers at all.
    ///
    /// Any HTTP response, including an error status, counts as reachable.
    fn probe(&self, url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// HTTP endpoint implementation using reqwest.
pub struct HttpEndpoint {
    client: reqwest::Client,
}

impl HttpEndpoint {
    /// Create an endpoint whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::network(e.to_string()))?;
        Ok(HttpEndpoint { client })
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
    }
}

/// Turn a response into a decoded body or a [`RemoteError`].
async fn read_response(response: reqwest::Response) -> RemoteResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RemoteError::network(e.to_string()))?;

    if !status.is_success() {
        let message = if text.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        };
        return Err(RemoteError::http(status.as_u16(), message));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    // The write already happened; a body we cannot parse is kept as text
    // rather than turned into a failure that would replay the write.
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

impl RemoteEndpoint for HttpEndpoint {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>> {
        let url = url.to_string();
        let body = body.clone();
        Box::pin(async move {
            let mut builder = self.client.request(to_reqwest(method), &url);
            if !body.is_null() {
                builder = builder.json(&body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| RemoteError::network(e.to_string()))?;
            read_response(response).await
        })
    }

    fn fetch(&self, url: &str) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| RemoteError::network(e.to_string()))?;
            read_response(response).await
        })
    }

    fn probe(&self, url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move { self.client.head(&url).send().await.is_ok() })
    }
}
