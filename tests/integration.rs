//! Integration tests for the intentd HTTP server and classification pipeline.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use intentd::classifier::LinearClassifier;
use intentd::server::{build_router, ServerConfig, ServerState};
use intentd::vectorizer::TfidfVectorizer;
use intentd::ModelBundle;

// ---------------------------------------------------------------------------
// Helpers: a small fitted model and a test server on an ephemeral port
// ---------------------------------------------------------------------------

/// A hand-fitted three-class model over a banking-style vocabulary. Weights
/// are chosen so the expected intent for each test phrase is unambiguous.
fn test_vectorizer() -> TfidfVectorizer {
    let vocabulary = HashMap::from([
        ("balance".to_string(), 0),
        ("account".to_string(), 1),
        ("check".to_string(), 2),
        ("transfer".to_string(), 3),
        ("money".to_string(), 4),
        ("send".to_string(), 5),
        ("friend".to_string(), 6),
        ("hello".to_string(), 7),
        ("thanks".to_string(), 8),
    ]);
    TfidfVectorizer {
        kind: "TfidfVectorizer".to_string(),
        vocabulary,
        idf: vec![1.0; 9],
    }
}

fn test_classifier() -> LinearClassifier {
    LinearClassifier {
        kind: "LogisticRegression".to_string(),
        classes: vec![
            "balance_inquiry".to_string(),
            "transfer_funds".to_string(),
            "greeting".to_string(),
        ],
        coefficients: vec![
            // balance_inquiry: balance, account, check
            vec![3.0, 2.0, 1.5, -2.0, -1.0, -1.0, -1.0, -1.0, -1.0],
            // transfer_funds: transfer, money, send, friend
            vec![-2.0, 0.0, -1.0, 3.0, 2.0, 2.0, 1.0, -1.0, -1.0],
            // greeting: hello, thanks
            vec![-1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 0.5, 3.0, 2.0],
        ],
        intercepts: vec![0.0, 0.0, 0.0],
    }
}

fn test_bundle() -> Arc<ModelBundle> {
    Arc::new(ModelBundle::new(test_vectorizer(), test_classifier()).unwrap())
}

async fn spawn_test_server() -> (SocketAddr, Arc<ServerState>) {
    spawn_test_server_with_rate_limit(0).await
}

async fn spawn_test_server_with_rate_limit(rate_limit_rpm: u32) -> (SocketAddr, Arc<ServerState>) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        rate_limit_rpm,
        access_log_path: "/dev/null".to_string(),
        max_access_log_bytes: 0,
    };
    let state = Arc::new(ServerState::new(config, test_bundle()));
    let app = build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, state)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/health", addr);

    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": "ok"}));
}

// ---------------------------------------------------------------------------
// Single classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_classify_single_valid() {
    let (addr, state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify", addr);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({"text": "Check my account balance"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["intent"], "balance_inquiry");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert!(state
        .bundle
        .classes()
        .contains(&body["intent"].as_str().unwrap().to_string()));
}

#[tokio::test]
async fn test_classify_single_empty_is_rejected() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify", addr);
    let client = reqwest::Client::new();

    for text in ["", "   ", "\t\n"] {
        let resp = client
            .post(&url)
            .json(&serde_json::json!({"text": text}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "text {:?} should be rejected", text);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Input text cannot be empty");
    }
}

#[tokio::test]
async fn test_classify_invalid_json_returns_error() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify", addr);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{invalid json}")
        .send()
        .await
        .unwrap();

    // Axum returns 400 for JSON parse errors
    assert_eq!(resp.status(), 400);
}

// ---------------------------------------------------------------------------
// Batch classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_classify_batch_preserves_length_and_order() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify/batch", addr);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "texts": ["Check my balance", "Transfer money to friend"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);

    assert_eq!(items[0]["text"], "Check my balance");
    assert_eq!(items[0]["intent"], "balance_inquiry");
    assert_eq!(items[1]["text"], "Transfer money to friend");
    assert_eq!(items[1]["intent"], "transfer_funds");
    for item in items {
        let confidence = item["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
}

#[tokio::test]
async fn test_classify_batch_accepts_empty_strings() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify/batch", addr);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({"texts": ["", "hello"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);

    // An empty string scores on the intercepts alone: all three are zero, so
    // the distribution is uniform and argmax falls to the first class.
    assert_eq!(items[0]["text"], "");
    assert_eq!(items[0]["intent"], "balance_inquiry");
    let confidence = items[0]["confidence"].as_f64().unwrap();
    assert!((confidence - 1.0 / 3.0).abs() < 1e-9);

    assert_eq!(items[1]["intent"], "greeting");
}

#[tokio::test]
async fn test_classify_batch_empty_list() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/classify/batch", addr);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({"texts": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

// ---------------------------------------------------------------------------
// Model info + authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_model_info_with_valid_credentials() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/model/info", addr);

    let client = reqwest::Client::new();
    let resp = client
        .get(&url)
        .basic_auth("admin", Some("password"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["model_name"], "LogisticRegression");
    assert_eq!(body["vectorizer_type"], "TfidfVectorizer");
    assert_eq!(body["num_classes"], 3);
    assert_eq!(
        body["classes"],
        serde_json::json!(["balance_inquiry", "transfer_funds", "greeting"])
    );
}

#[tokio::test]
async fn test_model_info_rejects_bad_credentials() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/model/info", addr);
    let client = reqwest::Client::new();

    for (user, pass) in [("admin", "wrong"), ("x", "y"), ("", "")] {
        let resp = client
            .get(&url)
            .basic_auth(user, Some(pass))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401, "credentials {:?} should fail", (user, pass));
        assert_eq!(
            resp.headers().get("www-authenticate").unwrap(),
            "Basic",
            "401 must carry the Basic challenge"
        );
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Incorrect username or password");
    }
}

#[tokio::test]
async fn test_model_info_rejects_missing_credentials() {
    let (addr, _state) = spawn_test_server().await;
    let url = format!("http://{}/api/model/info", addr);

    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers().get("www-authenticate").unwrap(), "Basic");
}

// ---------------------------------------------------------------------------
// End-to-end: artifacts on disk through the full serving path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_artifacts_from_disk_end_to_end() {
    use intentd::artifacts::{CLASSIFIER_FILE, VECTORIZER_FILE};

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(VECTORIZER_FILE),
        serde_json::to_string(&test_vectorizer()).unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join(CLASSIFIER_FILE),
        serde_json::to_string(&test_classifier()).unwrap(),
    )
    .unwrap();

    let bundle = Arc::new(ModelBundle::load(dir.path()).unwrap());

    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        rate_limit_rpm: 0,
        access_log_path: "/dev/null".to_string(),
        max_access_log_bytes: 0,
    };
    let state = Arc::new(ServerState::new(config, bundle));
    let app = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/classify", addr))
        .json(&serde_json::json!({"text": "send money to my friend"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["intent"], "transfer_funds");
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rate_limit_rejects_over_quota() {
    let (addr, _state) = spawn_test_server_with_rate_limit(1).await;
    let url = format!("http://{}/api/classify", addr);
    let client = reqwest::Client::new();

    let resp = client
        .post(&url)
        .json(&serde_json::json!({"text": "check balance"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Quota is 1 request per minute, so the second request is over quota.
    let resp = client
        .post(&url)
        .json(&serde_json::json!({"text": "check balance"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded"),
        "unexpected body: {}",
        body
    );
}

// ---------------------------------------------------------------------------
// Usage metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_metrics_count_requests_and_errors() {
    use std::sync::atomic::Ordering;

    let (addr, state) = spawn_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{}/api/classify", addr))
        .json(&serde_json::json!({"text": "check balance"}))
        .send()
        .await
        .unwrap();
    client
        .post(format!("http://{}/api/classify", addr))
        .json(&serde_json::json!({"text": ""}))
        .send()
        .await
        .unwrap();

    assert_eq!(state.usage.ep_classify.load(Ordering::Relaxed), 2);
    assert_eq!(state.usage.total_requests.load(Ordering::Relaxed), 2);
    assert_eq!(state.usage.total_errors.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_batch_request_counts_as_one_request() {
    use std::sync::atomic::Ordering;

    let (addr, state) = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/api/classify/batch", addr))
        .json(&serde_json::json!({"texts": ["check balance", "hello", "send money"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // One HTTP request, regardless of how many items it carried.
    assert_eq!(state.usage.ep_classify_batch.load(Ordering::Relaxed), 1);
    assert_eq!(state.usage.total_requests.load(Ordering::Relaxed), 1);
}
