//! Vibe Wallpaper Orchestrator
//!
//! Coordinates prompt enhancement and image generation against a shared
//! session, serving it over an HTTP API with live WebSocket events.

pub mod adapter;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;

pub use adapter::{Credential, GeminiTextClient, ImageEndpoint, ImagenClient, TextEndpoint};
pub use api::{
    create_router, AppState, ErrorResponse, GenerateRequest, OperationResponse, PromptRequest,
    DOWNLOAD_FILE_NAME,
};
pub use config::{Config, EndpointConfig, ImagePolicy, DEFAULT_PROMPT};
pub use error::{EndpointKind, ErrorKind, Result, VibeError};
pub use events::{EventBroadcaster, SessionEvent};
pub use orchestrator::{build_instruction, Orchestrator, Outcome, ENHANCEMENT_TEMPLATE};
pub use session::{
    ErrorInfo, ImageAsset, ImageEncoding, OperationKind, SessionSnapshot, SessionState,
};
