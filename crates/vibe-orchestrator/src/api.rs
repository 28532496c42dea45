//! HTTP API for driving a session from a front end.
//!
//! # Endpoints
//!
//! - `GET /api/state` - Current session snapshot
//! - `PUT /api/prompt` - Replace the prompt text
//! - `POST /api/generate` - Generate an image (optionally from a given prompt)
//! - `POST /api/enhance` - Enhance the current prompt
//! - `GET /api/image` - Download the current image as PNG
//! - `GET /ws` - Live session events
//!
//! # Example
//!
//! ```no_run
//! use vibe_orchestrator::{create_router, AppState, Config, Orchestrator};
//!
//! # async fn example() -> vibe_orchestrator::Result<()> {
//! let orchestrator = Orchestrator::from_config(&Config::default())?;
//! let router = create_router(AppState::new(orchestrator));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::events::ws_handler;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::session::SessionSnapshot;

/// File name offered when the image is downloaded.
pub const DOWNLOAD_FILE_NAME: &str = "ai-wallpaper.png";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `PUT /api/prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// The new prompt text.
    pub prompt: String,
}

/// Request body for `POST /api/generate`.
///
/// Without `prompt`, the current session prompt is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Prompt to generate from.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Response body for operation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    /// What happened.
    pub outcome: Outcome,
    /// Session snapshot after the outcome was applied.
    pub state: SessionSnapshot,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session orchestrator.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Creates a new `AppState` around `orchestrator`.
    #[must_use]
    pub const fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

#[derive(Debug)]
enum ApiError {
    /// The request body could not be used.
    BadRequest(String),
    /// No image has been generated yet.
    NoImage,
    /// The stored image could not be decoded.
    ImageDecode(String),
    /// The operation task did not complete.
    TaskFailed(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NoImage => (StatusCode::NOT_FOUND, "No image has been generated yet".to_string()),
            Self::ImageDecode(msg) | Self::TaskFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all endpoints.
///
/// Includes permissive CORS for local front ends and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/state", get(handle_state))
        .route("/prompt", put(handle_prompt))
        .route("/generate", post(handle_generate))
        .route("/enhance", post(handle_enhance))
        .route("/image", get(handle_image));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_state(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.orchestrator.snapshot().await)
}

async fn handle_prompt(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Json<SessionSnapshot> {
    state.orchestrator.set_prompt(request.prompt).await;
    Json(state.orchestrator.snapshot().await)
}

/// Handler for `POST /api/generate`.
///
/// A body sent without a JSON content type (including no body at all)
/// means "use the current prompt". Any other unreadable body is a 400.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => GenerateRequest::default(),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejecting generate request body");
            return Err(ApiError::BadRequest(rejection.body_text()));
        }
    };
    info!(explicit_prompt = request.prompt.is_some(), "Generate requested");

    let orchestrator = state.orchestrator.clone();
    let outcome = run_detached(async move {
        match request.prompt {
            Some(prompt) => orchestrator.generate(&prompt).await,
            None => orchestrator.generate_current().await,
        }
    })
    .await?;

    Ok(operation_response(&state.orchestrator, outcome).await)
}

async fn handle_enhance(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    info!("Enhance requested");

    let orchestrator = state.orchestrator.clone();
    let outcome = run_detached(async move { orchestrator.enhance().await }).await?;

    Ok(operation_response(&state.orchestrator, outcome).await)
}

/// Handler for `GET /api/image`.
///
/// Serves the stored image even while a regeneration is pending.
async fn handle_image(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let image = state.orchestrator.image().await.ok_or(ApiError::NoImage)?;
    let bytes = image
        .to_png_bytes()
        .map_err(|e| ApiError::ImageDecode(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Runs an operation on its own task so a dropped connection cannot
/// abandon it between its two state mutations.
async fn run_detached<F>(operation: F) -> Result<Outcome, ApiError>
where
    F: std::future::Future<Output = Outcome> + Send + 'static,
{
    tokio::spawn(operation).await.map_err(|e| {
        warn!(error = %e, "Operation task failed");
        ApiError::TaskFailed(e.to_string())
    })
}

async fn operation_response(orchestrator: &Orchestrator, outcome: Outcome) -> Response {
    let status = match outcome {
        Outcome::Busy => StatusCode::CONFLICT,
        Outcome::Succeeded | Outcome::Failed { .. } => StatusCode::OK,
    };
    let state = orchestrator.snapshot().await;
    (status, Json(OperationResponse { outcome, state })).into_response()
}

// ============================================================================
// Tests
// ============================================================================
