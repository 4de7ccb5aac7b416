//! External estimation service.
//!
//! The generative backend is an opaque async call: prompt in, text out.
//! [`EstimationService`] is the seam; [`HttpEstimationService`] is the
//! production implementation and tests substitute their own.
//!
//! Failures are reported as-is. Nothing in this module substitutes canned
//! text when the backend is unavailable; callers that want a degraded answer
//! decide that themselves.

pub mod http;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use http::HttpEstimationService;
pub use prompt::{ResponseScore, optimize_prompt, score_response};

/// A slow, fallible text-generation backend.
#[async_trait]
pub trait EstimationService: Send + Sync {
    /// Service name for logging/debugging.
    fn name(&self) -> &str;

    /// Send `prompt` and return the generated text.
    ///
    /// Errors are service errors (see
    /// [`MizanError::is_service_error`](crate::MizanError::is_service_error)).
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

/// A completed estimation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub text: String,
    pub score: ResponseScore,
}

impl Estimate {
    /// Wrap service output together with its heuristic score.
    pub fn from_text(text: String) -> Self {
        let score = score_response(&text);
        Self { text, score }
    }
}
