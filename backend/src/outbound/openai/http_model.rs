//! Reqwest-backed vision model adapter.
//!
//! Owns transport details only: prompt assembly, request serialisation,
//! timeout and HTTP error mapping, and decoding the first completion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use super::dto::{
    ChatRequestDto, ChatResponseDto, ContentPartDto, ImageUrlDto, MessageDto, ResponseFormatDto,
};
use crate::domain::AnalysisIntent;
use crate::domain::ports::{VisionModel, VisionModelError, VisionRequest, VisionResponse};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 800;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub endpoint: Url,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl OpenAiSettings {
    /// Settings for the public OpenAI endpoint with the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in endpoint fails to parse.
    pub fn new(api_key: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            api_key: api_key.into(),
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

/// Vision model adapter that POSTs chat completion requests.
pub struct OpenAiVisionModel {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiVisionModel {
    /// Build an adapter with a client bounded by `settings.timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: OpenAiSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionModel {
    async fn explain(&self, request: &VisionRequest) -> Result<VisionResponse, VisionModelError> {
        let body = build_request(request, &self.settings.model, self.settings.max_tokens);
        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }
        let parsed = parse_response(bytes.as_ref())?;
        debug!(
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            "vision model answered"
        );
        Ok(parsed)
    }
}

fn intent_focus(intent: AnalysisIntent) -> &'static str {
    match intent {
        AnalysisIntent::General => "Explain what the object is and what it is for.",
        AnalysisIntent::Usage => "Explain step by step how to use the object.",
        AnalysisIntent::Maintenance => "Explain how to clean, maintain and troubleshoot the object.",
        AnalysisIntent::Safety => "Focus on hazards, safe handling and when to seek a professional.",
        AnalysisIntent::Identification => {
            "Identify the object as precisely as possible, including make or model if visible."
        }
    }
}

fn system_prompt(request: &VisionRequest) -> String {
    format!(
        "You explain everyday objects from photos. {focus} Reply in the language with \
         BCP 47 tag '{language}'. Respond with a JSON object with keys \"title\" (string), \
         \"summary\" (string), \"keyPoints\" (array of strings) and \"safetyNotes\" \
         (array of strings).",
        focus = intent_focus(request.intent),
        language = request.language.as_str(),
    )
}

fn build_request<'a>(
    request: &'a VisionRequest,
    model: &'a str,
    max_tokens: u32,
) -> ChatRequestDto<'a> {
    ChatRequestDto {
        model,
        messages: vec![
            MessageDto {
                role: "system",
                content: vec![ContentPartDto::Text {
                    text: system_prompt(request),
                }],
            },
            MessageDto {
                role: "user",
                content: vec![
                    ContentPartDto::Text {
                        text: "What is this?".to_owned(),
                    },
                    ContentPartDto::ImageUrl {
                        image_url: ImageUrlDto {
                            url: request.image.as_model_url(),
                        },
                    },
                ],
            },
        ],
        max_tokens,
        response_format: ResponseFormatDto {
            kind: "json_object",
        },
    }
}

fn parse_response(body: &[u8]) -> Result<VisionResponse, VisionModelError> {
    let decoded: ChatResponseDto = serde_json::from_slice(body).map_err(|error| {
        VisionModelError::decode(format!("invalid chat completion payload: {error}"))
    })?;
    let (content, usage) = decoded.into_parts().map_err(VisionModelError::decode)?;
    Ok(VisionResponse { content, usage })
}

fn map_transport_error(error: reqwest::Error) -> VisionModelError {
    if error.is_timeout() {
        VisionModelError::timeout(error.to_string())
    } else {
        VisionModelError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> VisionModelError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            VisionModelError::timeout(format!("status {}", status.as_u16()))
        }
        _ => VisionModelError::upstream(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
