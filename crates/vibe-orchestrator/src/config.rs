//! Configuration types for the Vibe Wallpaper orchestrator.
//!
//! This module provides the configuration structures controlling the seed
//! prompt, the two model endpoints, the credential source, and the display
//! policy applied while a generation is pending.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VibeError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "vibe.json";

/// Scene description the session starts with.
pub const DEFAULT_PROMPT: &str = "A stylish person wearing a cap, shades, headset, and jacket walks alone on a grassy field under the moonlight, with a dark forest in the distance.";

/// Default base URL shared by both model endpoints.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}

/// Main configuration for a Vibe Wallpaper session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Prompt the session is seeded with and generated from on startup.
    #[serde(default = "default_prompt")]
    pub default_prompt: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Image-generation endpoint settings.
    #[serde(default = "EndpointConfig::image")]
    pub image: EndpointConfig,

    /// Text-generation endpoint settings.
    #[serde(default = "EndpointConfig::text")]
    pub text: EndpointConfig,

    /// What renderers see while a generation is pending.
    #[serde(default)]
    pub image_policy: ImagePolicy,

    /// Optional per-request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_prompt: default_prompt(),
            api_key_env: default_api_key_env(),
            image: EndpointConfig::image(),
            text: EndpointConfig::text(),
            image_policy: ImagePolicy::default(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `vibe.json`; falls back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            VibeError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `vibe.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the validated default configuration.
    ///
    /// # Errors
    ///
    /// Returns `VibeError::ConfigParseError` if the file exists but cannot be
    /// read or parsed, and `VibeError::ConfigValidationError` if a value is
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(VibeError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| VibeError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `VibeError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.default_prompt.trim().is_empty() {
            return Err(VibeError::config_validation(
                "defaultPrompt must not be empty",
                "Provide a scene description in defaultPrompt in your vibe.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(VibeError::config_validation(
                "apiKeyEnv must not be empty",
                "Name the environment variable that holds your API key (e.g. GEMINI_API_KEY)",
            ));
        }

        self.image.validate("image")?;
        self.text.validate("text")?;

        if self.request_timeout_secs == Some(0) {
            return Err(VibeError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Remove requestTimeoutSecs to disable the timeout, or set it to at least 1",
            ));
        }

        Ok(())
    }

    /// Returns the configured request timeout, if any.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Location and model of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Base URL up to (not including) `/models`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    pub model: String,
}

impl EndpointConfig {
    /// Default image-generation endpoint.
    #[must_use]
    pub fn image() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_image_model(),
        }
    }

    /// Default text-generation endpoint.
    #[must_use]
    pub fn text() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_text_model(),
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(VibeError::config_validation(
                format!("{section}.model must not be empty"),
                format!("Set {section}.model to a model name in your vibe.json"),
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(VibeError::config_validation(
                format!("{section}.baseUrl must be an http(s) URL, got '{}'", self.base_url),
                format!("Use a URL such as {DEFAULT_BASE_URL}"),
            ));
        }

        Ok(())
    }
}

/// Display policy for the previous image while a generation is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagePolicy {
    /// Keep showing the previous image (stale-while-revalidate, default).
    #[default]
    Retain,
    /// Withhold the previous image from renderers until the attempt settles.
    HideWhilePending,
}

impl ImagePolicy {
    /// Parses a string into an `ImagePolicy`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "retain" => Some(Self::Retain),
            "hide_while_pending" => Some(Self::HideWhilePending),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ImagePolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid image policy '{s}': expected one of 'retain', 'hide_while_pending'"
            ))
        })
    }
}

impl std::fmt::Display for ImagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retain => write!(f, "retain"),
            Self::HideWhilePending => write!(f, "hide_while_pending"),
        }
    }
}

impl Serialize for ImagePolicy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
