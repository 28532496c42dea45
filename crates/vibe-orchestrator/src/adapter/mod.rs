//! Endpoint adapters for the two external models.
//!
//! Adapters are a leaf translation layer: they build the request payload,
//! send exactly one HTTP request, and turn the response into a typed result
//! or a typed failure. They hold no session state and never retry.

mod image;
mod text;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::{EndpointKind, Result, VibeError};
use crate::session::ImageAsset;

pub use image::{
    build_image_request, parse_image_response, ImagenClient, PredictInstance,
    PredictParameters, PredictRequest,
};
pub use text::{
    build_enhancement_request, parse_enhancement_response, Content, GeminiTextClient,
    GenerateContentRequest, Part,
};

/// Produces an image from a prompt.
#[async_trait]
pub trait ImageEndpoint: Send + Sync {
    /// Requests one image for `prompt_text`.
    async fn request_image(&self, prompt_text: &str) -> Result<ImageAsset>;
}

/// Produces text from an instruction.
#[async_trait]
pub trait TextEndpoint: Send + Sync {
    /// Sends `instruction_text` as a single user turn and returns the reply.
    ///
    /// The reply is returned as received; callers trim it.
    async fn request_enhancement(&self, instruction_text: &str) -> Result<String>;
}

/// API key supplied by the hosting environment.
#[derive(Clone)]
pub struct Credential {
    source: String,
    key: Option<String>,
}

impl Credential {
    /// Reads the key from environment variable `var`.
    ///
    /// An unset or blank variable yields a credential without a key; calls
    /// made with it fail as endpoint errors.
    #[must_use]
    pub fn from_env(var: &str) -> Self {
        let key = std::env::var(var).ok().filter(|k| !k.trim().is_empty());
        Self {
            source: var.to_string(),
            key,
        }
    }

    /// Wraps an explicit key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            source: "<explicit>".to_string(),
            key: Some(key.into()),
        }
    }

    /// Returns `true` if a key is available.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.key.is_some()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One authenticated POST target shared by both adapters.
#[derive(Debug, Clone)]
struct HttpTransport {
    endpoint: EndpointKind,
    client: reqwest::Client,
    url: String,
    credential: Credential,
}

impl HttpTransport {
    fn new(
        endpoint: EndpointKind,
        config: &EndpointConfig,
        method: &str,
        credential: Credential,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| VibeError::endpoint_unreachable(endpoint, e.to_string()))?;

        let url = format!(
            "{}/models/{}:{method}",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            endpoint,
            client,
            url,
            credential,
        })
    }

    /// Posts `body` as JSON and returns the success response body.
    async fn post_json<B: Serialize + Sync>(&self, body: &B) -> Result<String> {
        let Some(key) = self.credential.key.as_deref() else {
            return Err(VibeError::endpoint_unreachable(
                self.endpoint,
                format!("no API key found in {}", self.credential.source),
            ));
        };

        debug!(endpoint = %self.endpoint, url = %self.url, "Sending request");

        // Transport errors carry the URL, which includes the key
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", key)])
            .json(body)
            .send()
            .await
            .map_err(|e| VibeError::endpoint_unreachable(self.endpoint, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                body = %detail,
                "Endpoint returned non-success status"
            );
            return Err(VibeError::endpoint_status(
                self.endpoint,
                status.as_u16(),
                detail,
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| VibeError::endpoint_unreachable(self.endpoint, e.without_url().to_string()))?;
        debug!(endpoint = %self.endpoint, bytes = text.len(), "Received response");
        Ok(text)
    }
}
