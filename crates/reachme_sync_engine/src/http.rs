//! HTTP transport implementation.
//!
//! The HTTP client itself is abstracted behind [`HttpClient`] so the engine
//! doesn't pick an HTTP library. Requests are JSON bodies posted to a single
//! endpoint; the command travels in the `cmd` field.

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::RwLock;
use reachme_protocol::{ApiRequest, ResponseBody};
use std::time::Duration;

/// HTTP client abstraction.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// Transport that posts JSON requests through an [`HttpClient`].
pub struct HttpTransport<C: HttpClient> {
    url: String,
    client: C,
    timeout: Duration,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport posting to `url`.
    pub fn new(url: impl Into<String>, client: C) -> Self {
        Self {
            url: url.into(),
            client,
            timeout: Duration::from_secs(30),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the last network error.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn fail(&self, message: String) -> SyncError {
        *self.last_error.write() = Some(message.clone());
        SyncError::NetworkFailure(message)
    }
}

#[async_trait]
impl<C: HttpClient> Transport for HttpTransport<C> {
    async fn send(&self, request: &ApiRequest) -> SyncResult<ResponseBody> {
        let body = request.to_body()?;
        tracing::debug!(command = %request.command(), bytes = body.len(), "posting request");

        let response = match tokio::time::timeout(self.timeout, self.client.post(&self.url, body))
            .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(message)) => return Err(self.fail(message)),
            Err(_) => {
                return Err(self.fail(format!(
                    "{} timed out after {:?}",
                    request.command(),
                    self.timeout
                )))
            }
        };
        *self.last_error.write() = None;

        Ok(ResponseBody::from_slice(&response)?)
    }
}
