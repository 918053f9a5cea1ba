//! Wire types for the chat completions API.
//!
//! Only the fields the adapter sends or reads are modelled.

use serde::{Deserialize, Serialize};

use crate::domain::TokenUsage;

#[derive(Debug, Serialize)]
pub(super) struct ChatRequestDto<'a> {
    pub(super) model: &'a str,
    pub(super) messages: Vec<MessageDto<'a>>,
    pub(super) max_tokens: u32,
    pub(super) response_format: ResponseFormatDto,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageDto<'a> {
    pub(super) role: &'static str,
    pub(super) content: Vec<ContentPartDto<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum ContentPartDto<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrlDto<'a> },
}

#[derive(Debug, Serialize)]
pub(super) struct ImageUrlDto<'a> {
    pub(super) url: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct ResponseFormatDto {
    #[serde(rename = "type")]
    pub(super) kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponseDto {
    #[serde(default)]
    pub(super) choices: Vec<ChoiceDto>,
    pub(super) usage: Option<UsageDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChoiceDto {
    pub(super) message: ChoiceMessageDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChoiceMessageDto {
    pub(super) content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UsageDto {
    #[serde(default)]
    pub(super) prompt_tokens: u64,
    #[serde(default)]
    pub(super) completion_tokens: u64,
}

impl ChatResponseDto {
    /// First choice's text and the reported usage.
    pub(super) fn into_parts(self) -> Result<(String, TokenUsage), String> {
        let usage = self.usage.unwrap_or_default();
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| "response contained no message content".to_owned())?;
        Ok((
            content,
            TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        ))
    }
}
