//! Text-generation adapter (`:generateContent` endpoint).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Credential, HttpTransport, TextEndpoint};
use crate::config::EndpointConfig;
use crate::error::{EndpointKind, Result, VibeError};

/// Request body for the generateContent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateContentRequest {
    /// Conversation turns; always a single user turn.
    pub contents: Vec<Content>,
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    /// Speaker role.
    pub role: String,
    /// Turn content.
    pub parts: Vec<Part>,
}

/// Text part of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    /// The text.
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Builds a single-turn request carrying `instruction_text`.
#[must_use]
pub fn build_enhancement_request(instruction_text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: instruction_text.to_string(),
            }],
        }],
    }
}

fn shape_error(message: &str) -> VibeError {
    VibeError::response_shape(EndpointKind::Text, message)
}

/// Validates a success response body and extracts the first text part.
///
/// # Errors
///
/// Returns `VibeError::ResponseShape` at the first missing level of
/// `candidates[0].content.parts[0].text`, or if that text is blank.
pub fn parse_enhancement_response(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| VibeError::response_shape(EndpointKind::Text, e.to_string()))?;

    let candidate = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| shape_error("response has no candidates"))?;
    let parts = candidate
        .content
        .ok_or_else(|| shape_error("first candidate has no content"))?
        .parts
        .ok_or_else(|| shape_error("candidate content has no parts"))?;
    let text = parts
        .into_iter()
        .next()
        .and_then(|p| p.text)
        .ok_or_else(|| shape_error("first part has no text"))?;

    if text.trim().is_empty() {
        return Err(shape_error("first part text is blank"));
    }
    Ok(text)
}

/// Client for the text-generation model.
#[derive(Debug, Clone)]
pub struct GeminiTextClient {
    transport: HttpTransport,
}

impl GeminiTextClient {
    /// Creates a client for `config`, authenticated with `credential`.
    pub fn new(
        config: &EndpointConfig,
        credential: Credential,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(
            EndpointKind::Text,
            config,
            "generateContent",
            credential,
            timeout,
        )?;
        Ok(Self { transport })
    }
}

#[async_trait]
impl TextEndpoint for GeminiTextClient {
    async fn request_enhancement(&self, instruction_text: &str) -> Result<String> {
        let body = self
            .transport
            .post_json(&build_enhancement_request(instruction_text))
            .await?;
        parse_enhancement_response(&body)
    }
}
