//! Image-generation adapter (`:predict` endpoint).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Credential, HttpTransport, ImageEndpoint};
use crate::config::EndpointConfig;
use crate::error::{EndpointKind, Result, VibeError};
use crate::session::ImageAsset;

/// Request body for the predict endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictRequest {
    /// Generation instances; always exactly one.
    pub instances: Vec<PredictInstance>,
    /// Sampling parameters.
    pub parameters: PredictParameters,
}

/// One generation instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictInstance {
    /// Scene description.
    pub prompt: String,
}

/// Sampling parameters for a predict call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    /// Number of images to produce.
    pub sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

/// Builds the request body for a single-sample generation.
#[must_use]
pub fn build_image_request(prompt_text: &str) -> PredictRequest {
    PredictRequest {
        instances: vec![PredictInstance {
            prompt: prompt_text.to_string(),
        }],
        parameters: PredictParameters { sample_count: 1 },
    }
}

/// Validates a success response body and extracts the first image.
///
/// # Errors
///
/// Returns `VibeError::ResponseShape` if the body is not JSON, has no
/// `predictions`, has an empty `predictions` array, or the first prediction
/// has no usable base64 payload.
pub fn parse_image_response(body: &str) -> Result<ImageAsset> {
    let response: PredictResponse = serde_json::from_str(body)
        .map_err(|e| VibeError::response_shape(EndpointKind::Image, e.to_string()))?;

    let Some(first) = response.predictions.into_iter().next() else {
        return Err(VibeError::response_shape(
            EndpointKind::Image,
            "predictions is empty",
        ));
    };

    let data = first
        .bytes_base64_encoded
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            VibeError::response_shape(
                EndpointKind::Image,
                "first prediction has no bytesBase64Encoded",
            )
        })?;

    ImageAsset::from_base64_png(data).map_err(|e| {
        VibeError::response_shape(
            EndpointKind::Image,
            format!("bytesBase64Encoded is not valid base64: {e}"),
        )
    })
}

/// Client for the image-generation model.
#[derive(Debug, Clone)]
pub struct ImagenClient {
    transport: HttpTransport,
}

impl ImagenClient {
    /// Creates a client for `config`, authenticated with `credential`.
    pub fn new(
        config: &EndpointConfig,
        credential: Credential,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let transport =
            HttpTransport::new(EndpointKind::Image, config, "predict", credential, timeout)?;
        Ok(Self { transport })
    }
}

#[async_trait]
impl ImageEndpoint for ImagenClient {
    async fn request_image(&self, prompt_text: &str) -> Result<ImageAsset> {
        let body = self
            .transport
            .post_json(&build_image_request(prompt_text))
            .await?;
        parse_image_response(&body)
    }
}
