//! Request orchestration for prompt enhancement and image generation.
//!
//! The [`Orchestrator`] is the only writer of [`SessionState`]. Each operation
//! mutates state at exactly two points, attempt start and outcome
//! application, and never holds the state lock across the network await, so
//! renderers can read busy flags while a request is pending.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::adapter::{Credential, GeminiTextClient, ImageEndpoint, ImagenClient, TextEndpoint};
use crate::config::Config;
use crate::error::{Result, VibeError};
use crate::events::{EventBroadcaster, SessionEvent};
use crate::session::{
    empty_prompt_message, ErrorInfo, ImageAsset, OperationKind, SessionSnapshot, SessionState,
};

/// Fixed directive sent to the text model ahead of the user's idea.
pub const ENHANCEMENT_TEMPLATE: &str = "You are an expert prompt engineer for an AI image generator. \
A user has provided a basic idea. Your task is to expand this idea into a rich, detailed, and artistic prompt. \
Focus on adding specifics about lighting (e.g., golden hour, cinematic lighting), mood (e.g., serene, melancholic, epic), \
composition, and artistic style (e.g., photorealistic, digital painting, fantasy art). \
Keep the final prompt concise, under 100 words, and focused on visual details. \
Do not add any conversational text, just output the enhanced prompt.";

/// Builds the full instruction for enhancing `idea`.
///
/// # Examples
///
/// ```
/// use vibe_orchestrator::{build_instruction, ENHANCEMENT_TEMPLATE};
///
/// let instruction = build_instruction("a dog");
/// assert!(instruction.starts_with(ENHANCEMENT_TEMPLATE));
/// assert!(instruction.ends_with("User's idea: \"a dog\""));
/// ```
#[must_use]
pub fn build_instruction(idea: &str) -> String {
    format!("{ENHANCEMENT_TEMPLATE} User's idea: \"{idea}\"")
}

/// Result of one orchestrator operation, as reported to the caller.
///
/// State has already been updated by the time an outcome is returned; the
/// outcome only summarizes what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The attempt succeeded and its result was applied.
    Succeeded,
    /// The attempt failed; `error` is now `last_error`.
    Failed {
        /// The recorded error.
        error: ErrorInfo,
    },
    /// Another attempt was pending; nothing was changed.
    Busy,
}

impl Outcome {
    /// Returns `true` for `Succeeded`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Coordinates the two endpoint adapters against one session.
#[derive(Clone)]
pub struct Orchestrator {
    state: Arc<Mutex<SessionState>>,
    image: Arc<dyn ImageEndpoint>,
    text: Arc<dyn TextEndpoint>,
    broadcaster: EventBroadcaster,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over `state` using the given adapters.
    #[must_use]
    pub fn new(
        state: SessionState,
        image: Arc<dyn ImageEndpoint>,
        text: Arc<dyn TextEndpoint>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            image,
            text,
            broadcaster: EventBroadcaster::default(),
        }
    }

    /// Creates an orchestrator with HTTP adapters described by `config`.
    ///
    /// The API key is read from the environment variable named by
    /// `config.api_key_env`. A missing key is not an error here; each call
    /// will fail with an endpoint error until one is provided.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credential = Credential::from_env(&config.api_key_env);
        if !credential.is_present() {
            warn!(
                env = %config.api_key_env,
                "No API key found; generation and enhancement will fail"
            );
        }

        let timeout = config.request_timeout();
        let image = ImagenClient::new(&config.image, credential.clone(), timeout)?;
        let text = GeminiTextClient::new(&config.text, credential, timeout)?;
        let state = SessionState::new(config.default_prompt.clone(), config.image_policy);

        Ok(Self::new(state, Arc::new(image), Arc::new(text)))
    }

    /// Returns the broadcaster transitions are published on.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Returns the shared session state handle.
    ///
    /// Callers must not hold the lock across an await.
    #[must_use]
    pub fn state(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Returns a copy of what renderers should currently show.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Returns the last successfully generated image, regardless of policy.
    pub async fn image(&self) -> Option<ImageAsset> {
        self.state.lock().await.image.clone()
    }

    /// Applies a user edit to the prompt.
    pub async fn set_prompt(&self, prompt_text: impl Into<String>) {
        let prompt_text = prompt_text.into();
        {
            let mut state = self.state.lock().await;
            state.prompt_text.clone_from(&prompt_text);
            state.touch();
        }
        debug!(prompt_len = prompt_text.len(), "Prompt edited");
        self.broadcaster
            .publish(SessionEvent::prompt_changed(prompt_text));
    }

    /// Runs the startup generation with the seeded prompt.
    ///
    /// Only the first attempt that actually runs counts; after it, calls
    /// return `None` without touching state. A `Busy` outcome does not use
    /// up the startup generation, so the caller may try again.
    pub async fn initial_load(&self) -> Option<Outcome> {
        let prompt_text = {
            let mut state = self.state.lock().await;
            if state.initial_load_done {
                return None;
            }
            state.initial_load_done = true;
            state.prompt_text.clone()
        };

        info!("Running initial generation");
        let outcome = self.generate(&prompt_text).await;
        if outcome == Outcome::Busy {
            self.state.lock().await.initial_load_done = false;
        }
        Some(outcome)
    }

    /// Generates an image from the current prompt.
    pub async fn generate_current(&self) -> Outcome {
        match self.begin(OperationKind::Generate, None).await {
            Ok(prompt_text) => self.run_generation(&prompt_text).await,
            Err(outcome) => outcome,
        }
    }

    /// Generates an image from `prompt_text`.
    ///
    /// On success the session image is replaced. On any failure the previous
    /// image is kept and `last_error` is set. An empty prompt fails
    /// validation without a network call.
    ///
    /// While another attempt is pending this returns `Busy` before looking
    /// at the prompt, so the pending attempt's flags and `last_error` are
    /// left alone even for an empty prompt.
    pub async fn generate(&self, prompt_text: &str) -> Outcome {
        match self.begin(OperationKind::Generate, Some(prompt_text)).await {
            Ok(prompt_text) => self.run_generation(&prompt_text).await,
            Err(outcome) => outcome,
        }
    }

    /// Rewrites the current prompt through the text model.
    ///
    /// On success the prompt becomes the trimmed reply; on failure it is
    /// left as it was.
    pub async fn enhance(&self) -> Outcome {
        let operation = OperationKind::Enhance;
        let idea = match self.begin(operation, None).await {
            Ok(idea) => idea,
            Err(outcome) => return outcome,
        };

        info!(prompt_len = idea.len(), "Enhancing prompt");
        let result = self.text.request_enhancement(&build_instruction(&idea)).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(enhanced) => {
                state.complete_enhancement(&enhanced);
                let prompt_text = state.prompt_text.clone();
                drop(state);
                info!(prompt_len = prompt_text.len(), "Prompt enhanced");
                self.broadcaster
                    .publish(SessionEvent::prompt_changed(prompt_text));
                self.broadcaster
                    .publish(SessionEvent::operation_succeeded(operation));
                Outcome::Succeeded
            }
            Err(e) => self.fail(state, operation, &e),
        }
    }

    async fn run_generation(&self, prompt_text: &str) -> Outcome {
        let operation = OperationKind::Generate;
        info!(prompt_len = prompt_text.len(), "Generating image");
        let result = self.image.request_image(prompt_text).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(image) => {
                let size = image.data().len();
                state.complete_generation(image);
                drop(state);
                info!(base64_len = size, "Image generated");
                self.broadcaster
                    .publish(SessionEvent::operation_succeeded(operation));
                Outcome::Succeeded
            }
            Err(e) => self.fail(state, operation, &e),
        }
    }

    /// Moves `operation` from `Idle` to `Pending`.
    ///
    /// Uses `prompt_text` when given, otherwise the session prompt. Returns
    /// the prompt to send, or the outcome to report when the attempt ends
    /// before reaching the network.
    async fn begin(
        &self,
        operation: OperationKind,
        prompt_text: Option<&str>,
    ) -> std::result::Result<String, Outcome> {
        let mut state = self.state.lock().await;

        if state.is_busy() {
            warn!(
                operation = %operation,
                generation_in_flight = state.generation_in_flight,
                enhancement_in_flight = state.enhancement_in_flight,
                "Rejecting attempt while another is pending"
            );
            return Err(Outcome::Busy);
        }

        let prompt_text = prompt_text.map_or_else(|| state.prompt_text.clone(), str::to_string);
        if prompt_text.trim().is_empty() {
            let error = VibeError::validation(empty_prompt_message(operation));
            return Err(self.fail(state, operation, &error));
        }

        state.begin(operation);
        drop(state);
        self.broadcaster
            .publish(SessionEvent::operation_started(operation));
        Ok(prompt_text)
    }

    /// Records `error` as the outcome of `operation` and returns to `Idle`.
    fn fail(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        operation: OperationKind,
        error: &VibeError,
    ) -> Outcome {
        warn!(
            operation = %operation,
            kind = %error.kind(),
            status = ?error.status(),
            error = %error,
            "Operation failed"
        );

        let info = ErrorInfo::from_error(operation, error);
        state.fail(info.clone());
        drop(state);
        self.broadcaster
            .publish(SessionEvent::operation_failed(info.clone()));
        Outcome::Failed { error: info }
    }
}

// ============================================================================
// Tests
// ============================================================================
