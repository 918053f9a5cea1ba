//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every rejected field produces `400 invalid_request` with details of the
//! form `{ "field": "<camelCaseName>", "code": "<reason>" }`.

use std::str::FromStr;

use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    AccountValidationError, AnalysisValidationError, CredentialsValidationError, Error,
    SavedAnswerValidationError, UnknownLabel,
};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldErrorCode {
    MissingField,
    InvalidUuid,
    InvalidValue,
    InvalidEmail,
    InvalidPassword,
    InvalidImage,
    InvalidLanguage,
    InvalidTitle,
    InvalidPayload,
}

impl FieldErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidUuid => "invalid_uuid",
            Self::InvalidValue => "invalid_value",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidPassword => "invalid_password",
            Self::InvalidImage => "invalid_image",
            Self::InvalidLanguage => "invalid_language",
            Self::InvalidTitle => "invalid_title",
            Self::InvalidPayload => "invalid_payload",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

pub(crate) const EMAIL: FieldName = FieldName::new("email");
pub(crate) const PASSWORD: FieldName = FieldName::new("password");
pub(crate) const NEW_PASSWORD: FieldName = FieldName::new("newPassword");

pub(crate) fn field_error(
    field: FieldName,
    code: FieldErrorCode,
    message: impl Into<String>,
) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field.as_str(),
        "code": code.as_str(),
    }))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let name = field.as_str();
    field_error(
        field,
        FieldErrorCode::MissingField,
        format!("missing required field: {name}"),
    )
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        let name = field.as_str();
        Error::invalid_request(format!("{name} must be a valid UUID")).with_details(json!({
            "field": name,
            "value": value,
            "code": FieldErrorCode::InvalidUuid.as_str(),
        }))
    })
}

/// Parse a lower-case enum label such as a subscription tier.
pub(crate) fn parse_label<T>(value: &str, field: FieldName) -> Result<T, Error>
where
    T: FromStr<Err = UnknownLabel>,
{
    T::from_str(value.trim())
        .map_err(|err| field_error(field, FieldErrorCode::InvalidValue, err.to_string()))
}

fn email_error(err: &AccountValidationError) -> Error {
    field_error(EMAIL, FieldErrorCode::InvalidEmail, err.to_string())
}

/// Map credential validation failures; `password_field` names the password
/// input of the calling endpoint.
pub(crate) fn credentials_error(
    err: CredentialsValidationError,
    password_field: FieldName,
) -> Error {
    match err {
        CredentialsValidationError::Email(inner) => email_error(&inner),
        other @ (CredentialsValidationError::EmptyPassword
        | CredentialsValidationError::PasswordLength { .. }) => field_error(
            password_field,
            FieldErrorCode::InvalidPassword,
            other.to_string(),
        ),
    }
}

pub(crate) fn account_error(err: AccountValidationError) -> Error {
    email_error(&err)
}

pub(crate) fn analysis_error(err: AnalysisValidationError) -> Error {
    let (field, code) = match err {
        AnalysisValidationError::ImageCount => ("image", FieldErrorCode::InvalidImage),
        AnalysisValidationError::MalformedDataUrl
        | AnalysisValidationError::ImageTooLarge { .. } => {
            ("imageData", FieldErrorCode::InvalidImage)
        }
        AnalysisValidationError::InvalidImageUrl => ("imageUrl", FieldErrorCode::InvalidImage),
        AnalysisValidationError::InvalidLanguage => ("language", FieldErrorCode::InvalidLanguage),
    };
    field_error(FieldName::new(field), code, err.to_string())
}

pub(crate) fn saved_answer_error(err: SavedAnswerValidationError) -> Error {
    let (field, code) = match err {
        SavedAnswerValidationError::EmptyTitle
        | SavedAnswerValidationError::TitleTooLong { .. } => ("title", FieldErrorCode::InvalidTitle),
        SavedAnswerValidationError::PayloadNotObject => {
            ("payload", FieldErrorCode::InvalidPayload)
        }
    };
    field_error(FieldName::new(field), code, err.to_string())
}
