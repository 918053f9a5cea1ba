//! Image analysis requests and the explanations returned for them.
//!
//! Input validation happens here so adapters and services only ever see a
//! well-formed [`AnalysisInput`]. Model output is normalised into an
//! [`Explanation`] by [`Explanation::from_model_text`], which accepts JSON,
//! JSON wrapped in Markdown fences, or plain prose.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use super::PaymentSource;

/// Largest decoded inline image accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;
/// Language used when the caller does not supply one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Where the image came from on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Camera,
    Upload,
    Url,
}

/// What the user wants to know about the pictured object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisIntent {
    #[default]
    General,
    Usage,
    Maintenance,
    Safety,
    Identification,
}

impl AnalysisIntent {
    /// Stable label used in prompts and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Usage => "usage",
            Self::Maintenance => "maintenance",
            Self::Safety => "safety",
            Self::Identification => "identification",
        }
    }
}

/// Errors raised while validating an analysis request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisValidationError {
    #[error("exactly one of imageData or imageUrl is required")]
    ImageCount,
    #[error("imageData must be a base64 data URL with an image/* media type")]
    MalformedDataUrl,
    #[error("image exceeds the {max} byte limit")]
    ImageTooLarge { max: usize },
    #[error("imageUrl must be an absolute http or https URL")]
    InvalidImageUrl,
    #[error("language must be a 2-10 character language tag")]
    InvalidLanguage,
}

/// BCP-47-ish language tag such as `en`, `pt-BR` or `zh-Hant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "en")]
pub struct Language(String);

impl Language {
    /// Validate a language tag.
    pub fn new(raw: &str) -> Result<Self, AnalysisValidationError> {
        let tag = raw.trim();
        let length_ok = (2..=10).contains(&tag.len());
        let mut parts = tag.split('-');
        let primary_ok = parts
            .next()
            .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
        let rest_ok = parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()));
        if length_ok && primary_ok && rest_ok {
            Ok(Self(tag.to_owned()))
        } else {
            Err(AnalysisValidationError::InvalidLanguage)
        }
    }

    /// Tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Language {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_owned())
    }
}

impl TryFrom<String> for Language {
    type Error = AnalysisValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.0
    }
}

/// A validated image reference.
#[derive(Clone, PartialEq, Eq)]
pub enum AnalysisImage {
    /// Inline `data:image/*;base64,...` payload, kept verbatim.
    Inline { media_type: String, data_url: String },
    /// Remote http(s) image.
    Remote(Url),
}

impl AnalysisImage {
    /// Validate a data URL and its decoded size.
    pub fn from_data_url(data_url: &str) -> Result<Self, AnalysisValidationError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or(AnalysisValidationError::MalformedDataUrl)?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or(AnalysisValidationError::MalformedDataUrl)?;
        let media_type = header
            .strip_suffix(";base64")
            .filter(|media| media.starts_with("image/") && media.len() > "image/".len())
            .ok_or(AnalysisValidationError::MalformedDataUrl)?;

        // Reject oversized payloads before decoding them.
        if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
            return Err(AnalysisValidationError::ImageTooLarge {
                max: MAX_IMAGE_BYTES,
            });
        }
        let decoded = STANDARD
            .decode(payload)
            .map_err(|_| AnalysisValidationError::MalformedDataUrl)?;
        if decoded.is_empty() {
            return Err(AnalysisValidationError::MalformedDataUrl);
        }
        if decoded.len() > MAX_IMAGE_BYTES {
            return Err(AnalysisValidationError::ImageTooLarge {
                max: MAX_IMAGE_BYTES,
            });
        }
        Ok(Self::Inline {
            media_type: media_type.to_owned(),
            data_url: data_url.to_owned(),
        })
    }

    /// Validate a remote image URL.
    pub fn from_url(raw: &str) -> Result<Self, AnalysisValidationError> {
        let url = Url::parse(raw.trim()).map_err(|_| AnalysisValidationError::InvalidImageUrl)?;
        match url.scheme() {
            "http" | "https" if url.host().is_some() => Ok(Self::Remote(url)),
            _ => Err(AnalysisValidationError::InvalidImageUrl),
        }
    }

    /// Value to pass as the model's image URL.
    #[must_use]
    pub fn as_model_url(&self) -> &str {
        match self {
            Self::Inline { data_url, .. } => data_url.as_str(),
            Self::Remote(url) => url.as_str(),
        }
    }

    /// Remote URL, if any, for storing alongside saved answers.
    #[must_use]
    pub fn remote_url(&self) -> Option<&Url> {
        match self {
            Self::Inline { .. } => None,
            Self::Remote(url) => Some(url),
        }
    }
}

impl fmt::Debug for AnalysisImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline {
                media_type,
                data_url,
            } => f
                .debug_struct("Inline")
                .field("media_type", media_type)
                .field("bytes", &data_url.len())
                .finish(),
            Self::Remote(url) => f.debug_tuple("Remote").field(&url.as_str()).finish(),
        }
    }
}

/// Validated analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    pub source: ImageSource,
    pub image: AnalysisImage,
    pub intent: AnalysisIntent,
    pub language: Language,
}

impl AnalysisInput {
    /// Validate raw request fields. Exactly one image reference is accepted.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{AnalysisInput, AnalysisIntent, ImageSource};
    ///
    /// let input = AnalysisInput::try_new(
    ///     ImageSource::Url,
    ///     None,
    ///     Some("https://example.com/kettle.jpg"),
    ///     None,
    ///     None,
    /// )
    /// .expect("valid request");
    /// assert_eq!(input.intent, AnalysisIntent::General);
    /// assert_eq!(input.language.as_str(), "en");
    /// ```
    pub fn try_new(
        source: ImageSource,
        image_data: Option<&str>,
        image_url: Option<&str>,
        intent: Option<AnalysisIntent>,
        language: Option<&str>,
    ) -> Result<Self, AnalysisValidationError> {
        let image_data = image_data.filter(|value| !value.trim().is_empty());
        let image_url = image_url.filter(|value| !value.trim().is_empty());
        let image = match (image_data, image_url) {
            (Some(data), None) => AnalysisImage::from_data_url(data.trim())?,
            (None, Some(url)) => AnalysisImage::from_url(url)?,
            _ => return Err(AnalysisValidationError::ImageCount),
        };
        let language = match language.filter(|value| !value.trim().is_empty()) {
            Some(raw) => Language::new(raw)?,
            None => Language::default(),
        };
        Ok(Self {
            source,
            image,
            intent: intent.unwrap_or_default(),
            language,
        })
    }
}

/// Normalised explanation returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Explanation {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub safety_notes: Vec<String>,
}

impl Explanation {
    /// Normalise model output.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::Explanation;
    ///
    /// let fenced = "```json\n{\"title\":\"Kettle\",\"summary\":\"Boils water.\"}\n```";
    /// assert_eq!(Explanation::from_model_text(fenced).title, "Kettle");
    ///
    /// let prose = Explanation::from_model_text("It is a kettle.");
    /// assert_eq!(prose.summary, "It is a kettle.");
    /// ```
    #[must_use]
    pub fn from_model_text(text: &str) -> Self {
        let body = strip_code_fence(text.trim());
        match serde_json::from_str::<Self>(body).map(Self::tidy) {
            Ok(parsed) if !(parsed.title.is_empty() && parsed.summary.is_empty()) => parsed,
            _ => Self {
                summary: text.trim().to_owned(),
                ..Self::default()
            },
        }
    }

    fn tidy(mut self) -> Self {
        self.title = self.title.trim().to_owned();
        self.summary = self.summary.trim().to_owned();
        self.key_points.retain(|point| !point.trim().is_empty());
        self.safety_notes.retain(|note| !note.trim().is_empty());
        self
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an info string such as `json` on the opening fence line.
    match inner.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

/// Balances after an analysis completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemainingBalances {
    pub free_answers_remaining: u32,
    pub token_balance: i64,
    /// Subscription analyses left today, when a premium subscription exists.
    pub subscription_remaining_today: Option<u32>,
}

/// Successful analysis response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    #[serde(flatten)]
    pub explanation: Explanation,
    pub intent: AnalysisIntent,
    pub language: Language,
    pub payment_source: PaymentSource,
    pub tokens_charged: i64,
    pub remaining: RemainingBalances,
}
