use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dvlens_core::ai_provider::{Completion, CompletionRequest, ModelClient, ProviderError};
use dvlens_core::analysis::AnalysisService;
use dvlens_core::config::{CoreConfig, Credential};
use dvlens_web::{create_app, AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Provider stub: answers per model, records the models it was asked for.
struct StubClient {
    answers: Vec<(&'static str, Result<&'static str, ProviderError>)>,
    calls: Mutex<Vec<String>>,
}

impl StubClient {
    fn new(answers: Vec<(&'static str, Result<&'static str, ProviderError>)>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for StubClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.lock().unwrap().push(request.model.clone());
        let (_, answer) = self
            .answers
            .iter()
            .find(|(model, _)| *model == request.model)
            .expect("unexpected model");
        answer.clone().map(|text| Completion {
            text: text.to_string(),
            usage: None,
        })
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

fn core_config(models: &[&str], credential: bool) -> CoreConfig {
    CoreConfig {
        credential: credential.then(|| Credential::new("test-key")),
        models: models.iter().map(|m| m.to_string()).collect(),
        request_budget_secs: 5,
        ..CoreConfig::default()
    }
}

fn app(config: CoreConfig, client: Arc<StubClient>) -> Router {
    let service = AnalysisService::with_client(config, client);
    create_app(AppState::new(service, WebConfig::default()))
}

async fn post_json(app: Router, body: Body) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze")
                .header("content-type", "application/json")
                .body(body)
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

#[tokio::test]
async fn test_health_endpoint() {
    let app = app(core_config(&["a"], false), StubClient::new(vec![]));

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["remoteReady"], false);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_analyze_files_with_fallback() {
    let client = StubClient::new(vec![
        ("a", Err(ProviderError::Unavailable { status: 503 })),
        ("b", Ok("## Cluster Health Score\n85")),
        ("c", Ok("unused")),
    ]);
    let app = app(core_config(&["a", "b", "c"], true), client.clone());

    let body = json!({
        "filesWithContent": [{
            "name": "charon-0.log",
            "type": "charon",
            "content": "INFO start\nERROR: relay timeout after 30s\nWARN: leader rotation delayed\n"
        }]
    });
    let (status, json) = post_json(app, Body::from(body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["model"], "b");
    assert!(json["analysis"].as_str().unwrap().starts_with("## Cluster Health Score"));
    assert!(json["usage"]["prompt_tokens"].as_u64().unwrap() > 0);
    assert!(json["timestamp"].is_string());
    assert_eq!(client.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_analyze_prompt() {
    let client = StubClient::new(vec![("a", Ok("fine"))]);
    let app = app(core_config(&["a"], true), client);

    let (status, json) = post_json(app, Body::from(json!({"prompt": "check this"}).to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model"], "a");
}

#[tokio::test]
async fn test_missing_prompt_is_400() {
    let client = StubClient::new(vec![("a", Ok("never"))]);
    let app = app(core_config(&["a"], true), client.clone());

    let (status, json) = post_json(app, Body::from(json!({"prompt": "  "}).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "InvalidRequest");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let app = app(core_config(&["a"], true), StubClient::new(vec![]));

    let (status, json) = post_json(app, Body::from("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "InvalidRequest");
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let client = StubClient::new(vec![("a", Ok("never"))]);
    let service = AnalysisService::with_client(core_config(&["a"], true), client.clone());
    let web_config = WebConfig {
        max_body_bytes: 64,
        ..WebConfig::default()
    };
    let app = create_app(AppState::new(service, web_config));

    let body = json!({"prompt": "ERROR relay timeout\n".repeat(20)});
    let (status, json) = post_json(app, Body::from(body.to_string())).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "InvalidRequest");
    assert!(json["error"].as_str().unwrap().contains("64 byte"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_missing_credential_is_500_without_call() {
    let client = StubClient::new(vec![("a", Ok("never"))]);
    let app = app(core_config(&["a"], false), client.clone());

    let (status, json) = post_json(app, Body::from(json!({"prompt": "hi"}).to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "MissingCredential");
    assert!(!json["error"].as_str().unwrap().contains("API_KEY"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_rate_limit_maps_to_429() {
    let client = StubClient::new(vec![("a", Err(ProviderError::RateLimited))]);
    let app = app(core_config(&["a"], true), client);

    let (status, json) = post_json(app, Body::from(json!({"prompt": "hi"}).to_string())).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["kind"], "AllCandidatesExhausted");
    assert_eq!(json["suggestion"], "local");
    assert_eq!(json["failures"][0]["model"], "a");
}

#[tokio::test]
async fn test_local_mode() {
    let client = StubClient::new(vec![]);
    let app = app(core_config(&["a"], false), client.clone());

    let body = json!({
        "mode": "local",
        "filesWithContent": [{"name": "vc.log", "type": "validator", "content": "ERROR beacon node unreachable\n"}]
    });
    let (status, json) = post_json(app, Body::from(body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model"], "local");
    assert!(json["analysis"].as_str().unwrap().contains("beacon node unreachable"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app(core_config(&["a"], true), StubClient::new(vec![]));

    let response = app
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
