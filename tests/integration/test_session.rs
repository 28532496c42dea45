//! End-to-end tests of a session driven over HTTP against a mock upstream.
//!
//! These tests run the real endpoint adapters and API router, with the
//! model endpoints replaced by a scripted local server.

mod support;

use std::sync::Arc;

use serde_json::{json, Value};
use support::{
    orchestrator_for, spawn_upstream, spawn_vibe_server, MockUpstream, API_KEY, IMAGE_MODEL,
    IMAGE_ONE, IMAGE_TWO, TEXT_MODEL,
};
use vibe_orchestrator::{
    Credential, ErrorKind, ImagePolicy, OperationKind, OperationResponse, Outcome,
    SessionSnapshot, ENHANCEMENT_TEMPLATE,
};

async fn setup(prompt: &str) -> (Arc<MockUpstream>, vibe_orchestrator::Orchestrator) {
    let mock = Arc::new(MockUpstream::default());
    let base_url = spawn_upstream(Arc::clone(&mock)).await;
    let orchestrator = orchestrator_for(
        &base_url,
        prompt,
        ImagePolicy::Retain,
        Credential::new(API_KEY),
    );
    (mock, orchestrator)
}

async fn post_json(client: &reqwest::Client, url: &str, body: Value) -> reqwest::Response {
    client
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("Request failed")
}

// ============================================================================
// Generation
// ============================================================================

/// Initial load generates from the seeded prompt exactly once.
#[tokio::test]
async fn test_initial_load_generates_from_seed_prompt() {
    let (mock, orchestrator) = setup("A cat on a roof at sunset").await;
    mock.reply_image_ok(IMAGE_ONE);

    let outcome = orchestrator.initial_load().await;
    assert_eq!(outcome, Some(Outcome::Succeeded));
    assert_eq!(orchestrator.initial_load().await, None);

    let snapshot = orchestrator.snapshot().await;
    let image = snapshot.image.expect("image should be set");
    assert_eq!(image.data(), IMAGE_ONE);
    assert!(snapshot.last_error.is_none());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, format!("/v1beta/models/{IMAGE_MODEL}:predict"));
    assert_eq!(requests[0].key.as_deref(), Some(API_KEY));
    assert_eq!(
        requests[0].body,
        json!({
            "instances": [{ "prompt": "A cat on a roof at sunset" }],
            "parameters": { "sampleCount": 1 }
        })
    );
}

/// An HTTP 500 keeps the previous image and clears the busy flag.
#[tokio::test]
async fn test_generate_server_error_keeps_previous_image() {
    let (mock, orchestrator) = setup("sunset").await;
    mock.reply_image_ok(IMAGE_ONE);
    mock.reply_image(500, r#"{"error": {"code": 500, "message": "internal"}}"#);

    let addr = spawn_vibe_server(orchestrator).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/generate");

    let first: OperationResponse = post_json(&client, &url, json!({ "prompt": "sunset" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first.outcome, Outcome::Succeeded);

    let response = post_json(&client, &url, json!({ "prompt": "sunset" })).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let second: OperationResponse = response.json().await.unwrap();

    let Outcome::Failed { error } = second.outcome else {
        panic!("Expected failure, got {:?}", second.outcome);
    };
    assert_eq!(error.kind, ErrorKind::Endpoint);
    assert_eq!(error.operation, OperationKind::Generate);
    assert_eq!(second.state.image.unwrap().data(), IMAGE_ONE);
    assert!(!second.state.generation_in_flight);
    assert_eq!(second.state.last_error, Some(error));
}

/// An empty predictions array surfaces as a response-shape error.
#[tokio::test]
async fn test_generate_empty_predictions_is_shape_error() {
    let (mock, orchestrator) = setup("x").await;
    mock.reply_image(200, r#"{ "predictions": [] }"#);

    let outcome = orchestrator.generate("x").await;

    let Outcome::Failed { error } = outcome else {
        panic!("Expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::ResponseShape);
    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.last_error, Some(error));
    assert!(snapshot.image.is_none());
}

/// A later success replaces the image and clears the error.
#[tokio::test]
async fn test_generate_recovers_after_failure() {
    let (mock, orchestrator) = setup("x").await;
    mock.reply_image_ok(IMAGE_ONE);
    mock.reply_image(503, "unavailable");
    mock.reply_image_ok(IMAGE_TWO);

    assert!(orchestrator.generate("x").await.is_success());
    assert!(!orchestrator.generate("x").await.is_success());
    assert!(orchestrator.generate("x").await.is_success());

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.image.unwrap().data(), IMAGE_TWO);
    assert!(snapshot.last_error.is_none());
}

/// Without an API key nothing is sent and the failure is an endpoint error.
#[tokio::test]
async fn test_missing_api_key_sends_nothing() {
    let mock = Arc::new(MockUpstream::default());
    let base_url = spawn_upstream(Arc::clone(&mock)).await;
    let orchestrator = orchestrator_for(
        &base_url,
        "a dog",
        ImagePolicy::Retain,
        Credential::from_env("VIBE_INTEGRATION_KEY_THAT_IS_NEVER_SET"),
    );

    let outcome = orchestrator.generate("a dog").await;

    let Outcome::Failed { error } = outcome else {
        panic!("Expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::Endpoint);
    assert!(mock.requests().is_empty());
}

// ============================================================================
// Enhancement
// ============================================================================

/// A successful enhancement replaces the prompt with the trimmed reply.
#[tokio::test]
async fn test_enhance_trims_reply_into_prompt() {
    let (mock, orchestrator) = setup("a dog").await;
    mock.reply_text_ok("  A golden retriever bathed in cinematic light.  ");

    let addr = spawn_vibe_server(orchestrator).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/enhance"))
        .send()
        .await
        .unwrap();
    let body: OperationResponse = response.json().await.unwrap();

    assert_eq!(body.outcome, Outcome::Succeeded);
    assert_eq!(
        body.state.prompt_text,
        "A golden retriever bathed in cinematic light."
    );

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        format!("/v1beta/models/{TEXT_MODEL}:generateContent")
    );
    let sent = requests[0].body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(sent.starts_with(ENHANCEMENT_TEMPLATE));
    assert!(sent.ends_with("User's idea: \"a dog\""));
    assert_eq!(requests[0].body["contents"][0]["role"], "user");
}

/// An empty prompt fails validation without contacting the text model.
#[tokio::test]
async fn test_enhance_empty_prompt_skips_text_model() {
    let (mock, orchestrator) = setup("").await;

    let outcome = orchestrator.enhance().await;

    let Outcome::Failed { error } = outcome else {
        panic!("Expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::Validation);
    assert!(mock.requests().is_empty());
    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.last_error, Some(error));
    assert!(!snapshot.enhancement_in_flight);
}

/// A reply without candidates leaves the prompt unchanged.
#[tokio::test]
async fn test_enhance_malformed_reply_keeps_prompt() {
    let (mock, orchestrator) = setup("a dog").await;
    mock.reply_text(200, r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#);

    let outcome = orchestrator.enhance().await;

    let Outcome::Failed { error } = outcome else {
        panic!("Expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::ResponseShape);
    assert_eq!(orchestrator.snapshot().await.prompt_text, "a dog");
}

// ============================================================================
// Prompt and download endpoints
// ============================================================================

/// Editing the prompt then generating without a body uses the edit.
#[tokio::test]
async fn test_prompt_edit_then_generate_current() {
    let (mock, orchestrator) = setup("a dog").await;
    mock.reply_image_ok(IMAGE_ONE);

    let addr = spawn_vibe_server(orchestrator).await;
    let client = reqwest::Client::new();

    let snapshot: SessionSnapshot = client
        .put(format!("http://{addr}/api/prompt"))
        .json(&json!({ "prompt": "a red fox in snow" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot.prompt_text, "a red fox in snow");

    let response = client
        .post(format!("http://{addr}/api/generate"))
        .send()
        .await
        .unwrap();
    let body: OperationResponse = response.json().await.unwrap();
    assert_eq!(body.outcome, Outcome::Succeeded);

    let requests = mock.requests();
    assert_eq!(requests[0].body["instances"][0]["prompt"], "a red fox in snow");
}

/// The download endpoint serves PNG bytes once an image exists.
#[tokio::test]
async fn test_image_download() {
    let (mock, orchestrator) = setup("a dog").await;
    mock.reply_image_ok(IMAGE_ONE);

    let addr = spawn_vibe_server(orchestrator.clone()).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("http://{addr}/api/image"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    assert!(orchestrator.generate("a dog").await.is_success());

    let response = client
        .get(format!("http://{addr}/api/image"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"ai-wallpaper.png\""
    );
    assert_eq!(&response.bytes().await.unwrap()[..], b"ABC");
}
