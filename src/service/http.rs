//! HTTP client for a text-generation estimation endpoint.
//!
//! Wire format:
//!
//! ```text
//! POST {base_url}/v1/generate
//! Authorization: Bearer <key>        (only when a key is configured)
//! {"prompt": "..."}
//!
//! 200 {"text": "..."}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EstimationService;
use crate::{MizanError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Estimation service reached over HTTP.
#[derive(Clone)]
pub struct HttpEstimationService {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEstimationService {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client for `base_url` with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MizanError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Generate text for `prompt`.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/generate", self.base_url);
        debug!(url = %url, prompt_chars = prompt.chars().count(), "calling estimation service");

        let mut request = self.http.post(&url).json(&GenerateRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        Self::handle_response_errors(&response)?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MizanError::MalformedResponse(e.to_string()))?;

        if body.text.trim().is_empty() {
            return Err(MizanError::EmptyResponse);
        }
        Ok(body.text)
    }

    /// Check response status and map to the matching error.
    fn handle_response_errors(response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 => Err(MizanError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(MizanError::RateLimited { retry_after })
            }
            code => Err(MizanError::Api {
                status: code,
                message: format!("estimation service error: {status}"),
            }),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

#[async_trait]
impl EstimationService for HttpEstimationService {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}
