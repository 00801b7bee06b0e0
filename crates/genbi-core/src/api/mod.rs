//! HTTP client for the GenBI backend
//!
//! Plain request/response collaborators: database listing and the knowledge
//! base. The streaming ask endpoint is driven separately by [`crate::ask`],
//! which borrows the request-building helpers here.

mod databases;
mod knowledge_base;
pub mod types;

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::error::GenBiError;

/// Client for the GenBI REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, GenBiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into an error carrying the body text
    pub(crate) async fn handle_error_response(
        &self,
        response: Response,
    ) -> Result<Response, GenBiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<no response body>".to_string());
        debug!("API request failed: HTTP {} - {}", status, message);
        Err(GenBiError::Api { status, message })
    }
}
