//! Port for the image-understanding model.

use async_trait::async_trait;

use crate::domain::{AnalysisImage, AnalysisIntent, Language, TokenUsage};

use super::define_port_error;

define_port_error! {
    /// Errors raised by vision model adapters.
    pub enum VisionModelError {
        /// The upstream did not answer in time.
        Timeout { message: String } => "vision model timed out: {message}",
        /// Transport-level failure (DNS, TLS, connection reset).
        Transport { message: String } => "vision model transport failed: {message}",
        /// The upstream rejected the request or failed internally.
        Upstream { status: u16, message: String } =>
            "vision model returned {status}: {message}",
        /// The response could not be understood.
        Decode { message: String } => "vision model response invalid: {message}",
    }
}

/// What the model is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    pub image: AnalysisImage,
    pub intent: AnalysisIntent,
    pub language: Language,
}

/// Raw model answer and its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn explain(&self, request: &VisionRequest) -> Result<VisionResponse, VisionModelError>;
}

/// Offline model used when no API key is configured.
///
/// Returns a canned explanation with fixed usage so the full metering path
/// can be exercised locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureVisionModel;

/// Usage reported by [`FixtureVisionModel`].
pub const FIXTURE_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 1_000,
    completion_tokens: 500,
};

#[async_trait]
impl VisionModel for FixtureVisionModel {
    async fn explain(&self, request: &VisionRequest) -> Result<VisionResponse, VisionModelError> {
        let content = serde_json::json!({
            "title": "Sample object",
            "summary": format!(
                "Offline {} explanation in '{}'.",
                request.intent.as_str(),
                request.language.as_str()
            ),
            "keyPoints": ["Configure a vision model API key for real answers."],
            "safetyNotes": [],
        })
        .to_string();
        Ok(VisionResponse {
            content,
            usage: FIXTURE_USAGE,
        })
    }
}
