//! Session state types for the Vibe Wallpaper orchestrator.
//!
//! This module defines the single shared record coordinating what the
//! presentation layer displays with the operations currently in flight.
//! Each operation kind follows the same cycle:
//! `Idle -> Pending -> {Success, Failure} -> Idle`, where `Pending` is the
//! matching busy flag and failures only leave advisory metadata behind.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ImagePolicy;
use crate::error::{ErrorKind, VibeError};

// ============================================================================
// ImageAsset
// ============================================================================

/// Encoding of an [`ImageAsset`] payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// Base64 text of a PNG file.
    #[default]
    #[serde(rename = "base64-png")]
    Base64Png,
}

impl std::fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base64Png => write!(f, "base64-png"),
        }
    }
}

/// A generated image, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    encoding: ImageEncoding,
    data: String,
}

impl ImageAsset {
    /// Wraps a base64-encoded PNG payload after checking that it decodes.
    ///
    /// # Examples
    ///
    /// ```
    /// use vibe_orchestrator::{ImageAsset, ImageEncoding};
    ///
    /// let asset = ImageAsset::from_base64_png("QUJD").unwrap();
    /// assert_eq!(asset.encoding(), ImageEncoding::Base64Png);
    /// assert_eq!(asset.data(), "QUJD");
    /// assert!(ImageAsset::from_base64_png("not base64!").is_err());
    /// ```
    pub fn from_base64_png(data: impl Into<String>) -> Result<Self, base64::DecodeError> {
        let data = data.into();
        BASE64.decode(data.as_bytes())?;
        Ok(Self {
            encoding: ImageEncoding::Base64Png,
            data,
        })
    }

    /// Returns the payload encoding.
    #[must_use]
    pub const fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// Returns the base64 payload as received from the endpoint.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decodes the payload into raw PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.data.as_bytes())
    }

    /// Returns a `data:` URL suitable for an `<img src>` or download link.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.data)
    }
}

// ============================================================================
// OperationKind and ErrorInfo
// ============================================================================

/// The two orchestrated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Image generation from a prompt.
    Generate,
    /// Prompt enhancement through the text model.
    Enhance,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Enhance => write!(f, "enhance"),
        }
    }
}

/// Advisory record of the most recent failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Operation whose attempt failed.
    pub operation: OperationKind,
    /// Failure category.
    pub kind: ErrorKind,
    /// User-facing message. Diagnostic detail is only logged.
    pub message: String,
    /// When the failure was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    /// Creates a new `ErrorInfo` with the current timestamp.
    #[must_use]
    pub fn new(operation: OperationKind, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Builds the user-facing record for an operation error.
    ///
    /// Validation errors keep their own message; every other kind gets the
    /// operation's generic apology.
    #[must_use]
    pub fn from_error(operation: OperationKind, error: &VibeError) -> Self {
        let message = match error {
            VibeError::Validation { message } => message.clone(),
            _ => failure_message(operation).to_string(),
        };
        Self::new(operation, error.kind(), message)
    }
}

/// Generic message shown when an attempt fails past validation.
#[must_use]
pub const fn failure_message(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::Generate => {
            "Sorry, something went wrong while generating the image. Please try again."
        }
        OperationKind::Enhance => "Sorry, couldn't enhance the prompt right now.",
    }
}

/// Message shown when an operation is attempted without a prompt.
#[must_use]
pub const fn empty_prompt_message(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::Generate => "Please enter a prompt before generating.",
        OperationKind::Enhance => "Please enter a prompt idea first.",
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Complete state of one interactive session.
///
/// Written only by the orchestrator; renderers read it through
/// [`SessionState::snapshot`].
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current scene description.
    pub prompt_text: String,

    /// Last successfully generated image.
    pub image: Option<ImageAsset>,

    /// Whether a `generate` attempt is pending.
    pub generation_in_flight: bool,

    /// Whether an `enhance` attempt is pending.
    pub enhancement_in_flight: bool,

    /// Failure of the most recent attempt, if it failed.
    pub last_error: Option<ErrorInfo>,

    /// Display rule for the previous image during a pending generation.
    pub image_policy: ImagePolicy,

    /// Whether the one-time startup generation has been issued.
    pub initial_load_done: bool,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the state was last updated.
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Creates a session seeded with `prompt_text` and no image.
    ///
    /// # Examples
    ///
    /// ```
    /// use vibe_orchestrator::{ImagePolicy, SessionState};
    ///
    /// let state = SessionState::new("A cat on a roof at sunset", ImagePolicy::Retain);
    /// assert_eq!(state.prompt_text, "A cat on a roof at sunset");
    /// assert!(state.image.is_none());
    /// assert!(!state.is_busy());
    /// ```
    #[must_use]
    pub fn new(prompt_text: impl Into<String>, image_policy: ImagePolicy) -> Self {
        let now = Utc::now();
        Self {
            prompt_text: prompt_text.into(),
            image: None,
            generation_in_flight: false,
            enhancement_in_flight: false,
            last_error: None,
            image_policy,
            initial_load_done: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` while either operation is pending.
    ///
    /// Front ends disable both controls whenever this holds.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.generation_in_flight || self.enhancement_in_flight
    }

    /// Returns `true` if an attempt of `operation` is pending.
    #[must_use]
    pub const fn is_in_flight(&self, operation: OperationKind) -> bool {
        match operation {
            OperationKind::Generate => self.generation_in_flight,
            OperationKind::Enhance => self.enhancement_in_flight,
        }
    }

    /// Returns the image renderers should show under the current policy.
    #[must_use]
    pub fn displayed_image(&self) -> Option<&ImageAsset> {
        match self.image_policy {
            ImagePolicy::HideWhilePending if self.generation_in_flight => None,
            _ => self.image.as_ref(),
        }
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Enters `Pending` for `operation`, clearing the previous error.
    pub fn begin(&mut self, operation: OperationKind) {
        self.last_error = None;
        self.set_in_flight(operation, true);
        self.touch();
    }

    /// Applies a successful generation and returns to `Idle`.
    pub fn complete_generation(&mut self, image: ImageAsset) {
        self.image = Some(image);
        self.generation_in_flight = false;
        self.touch();
    }

    /// Applies a successful enhancement and returns to `Idle`.
    ///
    /// The returned text is trimmed of surrounding whitespace.
    pub fn complete_enhancement(&mut self, enhanced: &str) {
        self.prompt_text = enhanced.trim().to_string();
        self.enhancement_in_flight = false;
        self.touch();
    }

    /// Records a failure of `error.operation` and returns it to `Idle`.
    ///
    /// Neither `image` nor `prompt_text` is touched.
    pub fn fail(&mut self, error: ErrorInfo) {
        self.set_in_flight(error.operation, false);
        self.last_error = Some(error);
        self.touch();
    }

    /// Returns a serializable copy of what renderers need.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            prompt_text: self.prompt_text.clone(),
            image: self.displayed_image().cloned(),
            generation_in_flight: self.generation_in_flight,
            enhancement_in_flight: self.enhancement_in_flight,
            busy: self.is_busy(),
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Returns the duration since the session started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    fn set_in_flight(&mut self, operation: OperationKind, value: bool) {
        match operation {
            OperationKind::Generate => self.generation_in_flight = value,
            OperationKind::Enhance => self.enhancement_in_flight = value,
        }
    }
}

/// Read-only view of a session handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current scene description.
    pub prompt_text: String,
    /// Image to display, after applying the image policy.
    pub image: Option<ImageAsset>,
    /// Whether a generation is pending.
    pub generation_in_flight: bool,
    /// Whether an enhancement is pending.
    pub enhancement_in_flight: bool,
    /// Whether controls should be disabled.
    pub busy: bool,
    /// Failure of the most recent attempt.
    pub last_error: Option<ErrorInfo>,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
