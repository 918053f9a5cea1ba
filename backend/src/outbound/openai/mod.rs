//! OpenAI-compatible vision model adapter.
//!
//! A thin HTTP implementation of the `VisionModel` port against the chat
//! completions API.

mod dto;
mod http_model;

pub use http_model::{OpenAiSettings, OpenAiVisionModel};
