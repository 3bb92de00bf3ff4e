//! HTTP endpoint tests against the router with a scripted generator in
//! place of the real model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use candle_core::Device;
use serde_json::{json, Value};
use tower::ServiceExt;

use local_llm_chat::api;
use local_llm_chat::config::{SamplingParams, FALLBACK_REPLY};
use local_llm_chat::engine::{ChatEngine, TextGenerator};
use local_llm_chat::error::{Result as ServeResult, ServeError};
use local_llm_chat::state::{AppState, LoadStatus};

/// Generator that pops scripted replies, then keeps returning the last
/// default. Counts invocations.
struct Scripted {
    replies: Mutex<VecDeque<&'static str>>,
    default: &'static str,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(replies: &[&'static str], default: &'static str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            default,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for Scripted {
    fn generate(&self, _message: &str, _params: &SamplingParams) -> ServeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);
        Ok(next.to_string())
    }
}

struct Exploding;

impl TextGenerator for Exploding {
    fn generate(&self, _message: &str, _params: &SamplingParams) -> ServeResult<String> {
        Err(ServeError::Generation("tensor shape mismatch".to_string()))
    }
}

fn engine_over(generator: Arc<dyn TextGenerator>) -> Arc<ChatEngine> {
    Arc::new(ChatEngine::new(
        generator,
        SamplingParams::default(),
        SamplingParams::retry_default(),
    ))
}

fn fresh_state() -> Arc<AppState> {
    Arc::new(AppState::new("test-model".to_string(), Device::Cpu))
}

async fn loading_state(stage: &str) -> Arc<AppState> {
    let state = fresh_state();
    state
        .set_status(LoadStatus::Loading {
            stage: stage.to_string(),
        })
        .await;
    state
}

async fn ready_state(generator: Arc<dyn TextGenerator>) -> Arc<AppState> {
    let state = fresh_state();
    assert!(state.publish(engine_over(generator)));
    state.set_status(LoadStatus::Ready).await;
    state
}

async fn post_chat(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn chat_before_ready_returns_503_with_stage() {
    let state = loading_state("fetching tokenizer and model files").await;
    let app = api::router(state);

    let (status, body) = post_chat(app, json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["loading"], true);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("fetching tokenizer and model files"));
}

#[tokio::test]
async fn blank_message_while_loading_still_returns_503() {
    // Load status wins over input validation: before the model is ready
    // every /chat call is a 503, even one with nothing to say.
    let state = loading_state("fetching tokenizer and model files").await;
    let app = api::router(state);

    let (status, body) = post_chat(app, json!({ "message": "   " })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["loading"], true);

    let app = api::router(loading_state("fetching tokenizer and model files").await);
    let (status, _) = post_chat(app, json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_after_failed_load_still_returns_503() {
    let state = fresh_state();
    state
        .set_status(LoadStatus::Failed {
            message: "no weights found".to_string(),
        })
        .await;
    let app = api::router(state);

    let (status, body) = post_chat(app, json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("no weights found"));
}

#[tokio::test]
async fn empty_message_returns_400() {
    let generator = Scripted::new(&[], "Hello!");
    let app = api::router(ready_state(generator.clone()).await);

    let (status, body) = post_chat(app, json!({ "message": "" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn whitespace_message_returns_400() {
    let generator = Scripted::new(&[], "Hello!");
    let app = api::router(ready_state(generator.clone()).await);

    let (status, _) = post_chat(app, json!({ "message": "   \n\t " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(generator.calls(), 0);

    // A body without a message field is treated the same as a blank one.
    let app = api::router(ready_state(Scripted::new(&[], "x")).await);
    let (status, _) = post_chat(app, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn successful_generation_returns_the_reply() {
    let generator = Scripted::new(&["Hello!"], "");
    let app = api::router(ready_state(generator.clone()).await);

    let (status, body) = post_chat(app, json!({ "message": "hi there" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Hello!");
    assert_eq!(body["model"], "test-model (Local)");
    assert_eq!(body["device"], "CPU");
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn empty_generations_fall_back_to_the_fixed_reply() {
    let generator = Scripted::new(&[], "");
    let app = api::router(ready_state(generator.clone()).await);

    let (status, body) = post_chat(app, json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], FALLBACK_REPLY);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn short_first_output_is_resampled_once() {
    let generator = Scripted::new(&["", "ok!"], "");
    let app = api::router(ready_state(generator.clone()).await);

    let (status, body) = post_chat(app, json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "ok!");
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn generation_errors_return_500_not_a_crash() {
    let app = api::router(ready_state(Arc::new(Exploding)).await);

    let (status, body) = post_chat(app, json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("tensor shape mismatch"));
}

#[tokio::test]
async fn status_is_well_formed_in_every_lifecycle_state() {
    // Not started.
    let (status, body) = get_json(api::router(fresh_state()), "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["status"], "loading");
    assert_eq!(body["model_name"], "test-model");
    assert!(body["device_info"]["kind"].is_string());

    // Loading.
    let state = loading_state("loading model weights onto CPU").await;
    let (_, body) = get_json(api::router(state), "/status").await;
    assert_eq!(body["loading_status"], "loading model weights onto CPU");

    // Ready.
    let state = ready_state(Scripted::new(&[], "x")).await;
    let (_, body) = get_json(api::router(state), "/status").await;
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["status"], "online");

    // Failed.
    let state = fresh_state();
    state
        .set_status(LoadStatus::Failed {
            message: "boom".to_string(),
        })
        .await;
    let (_, body) = get_json(api::router(state), "/status").await;
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn favicon_returns_204() {
    let app = api::router(fresh_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/favicon.ico")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn debug_reports_process_info() {
    let (status, body) = get_json(api::router(fresh_state()), "/debug").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server_version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["model_loaded"], false);
    assert!(body["cpu_count"].as_u64().unwrap() >= 1);
    assert!(body["memory_used_percent"].is_number());
    assert!(body["uptime_seconds"].is_number());
}

#[tokio::test]
async fn index_serves_the_chat_page() {
    let app = api::router(fresh_state());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("<form id=\"form\">"));
}

#[tokio::test]
async fn concurrent_chats_share_one_published_engine() {
    let generator = Scripted::new(&[], "Hello!");
    let state = ready_state(generator.clone()).await;

    // The cell only accepts one engine.
    assert!(!state.publish(engine_over(Scripted::new(&[], "other"))));
    let a = state.engine().unwrap();
    let b = state.engine().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let app = api::router(state);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            post_chat(app, json!({ "message": "hi" })).await
        }));
    }

    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Hello!");
    }
    assert_eq!(generator.calls(), 8);
}
