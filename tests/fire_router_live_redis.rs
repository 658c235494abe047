//! Full Fire Command Router HTTP surface, end to end (spec §4.E, §8 seed
//! scenarios 3-6). Requires a live Redis reachable at `REDIS_URL` (default
//! `redis://127.0.0.1:6379`) since `AppState` always holds a connected
//! `StreamClient` even in legacy mode — marked `#[ignore]` per DESIGN.md,
//! run explicitly with `cargo test -- --ignored` against a real broker.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use signalfire_core::api::state::AppState;
use signalfire_core::config::Config;
use signalfire_core::ea_ipc::EaIpc;
use signalfire_core::observation::ObservationClient;
use signalfire_core::store::Store;
use signalfire_core::streams::StreamClient;
use signalfire_core::{api, fire};

async fn test_app() -> (Router, tempfile::TempDir, tempfile::TempDir) {
    let db_dir = tempfile::tempdir().unwrap();
    let ipc_dir = tempfile::tempdir().unwrap();
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let store = Store::new(db_dir.path().join("eventbus.db").to_str().unwrap()).unwrap();
    let stream = StreamClient::connect(&redis_url, 250_000).await.unwrap();
    let observation = ObservationClient::connect("tcp://127.0.0.1:5570");
    let ea_ipc = Arc::new(EaIpc::new(ipc_dir.path()));

    let mut cfg = Config::from_env().unwrap();
    cfg.ea_ipc_dir = ipc_dir.path().to_string_lossy().to_string();
    cfg.database_path = db_dir.path().join("eventbus.db").to_string_lossy().to_string();
    // Legacy mode: router writes direct IPC only, no stream append — the
    // one mode this test can exercise without the dispatch bridge running.
    cfg.flags.shadow_only = false;
    cfg.flags.bridge_enqueue = false;

    let now = chrono::Utc::now();
    store
        .ea_instances()
        .unwrap()
        .repo()
        .upsert_heartbeat("U-7", "42", now, Some(10_000.0), Some(10_050.0))
        .unwrap();
    store
        .ea_instances()
        .unwrap()
        .repo()
        .upsert_heartbeat("U-stale", "99", now - chrono::Duration::seconds(200), None, None)
        .unwrap();

    let state = AppState {
        store,
        stream,
        observation,
        ea_ipc,
        cfg: Arc::new(cfg),
    };

    let app = Router::new()
        .route("/fire", axum::routing::post(fire::submit_fire))
        .route("/heartbeat", axum::routing::post(api::heartbeat::heartbeat))
        .route("/status", axum::routing::get(api::status::status))
        .with_state(state);

    (app, db_dir, ipc_dir)
}

async fn post_fire(app: &Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/fire")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn fire_idempotency_round_trip() {
    let (app, _db, _ipc) = test_app().await;
    let body = json!({
        "user_id": "42", "idem_key": "abc", "symbol": "GBPUSD",
        "direction": "SELL", "lot": 0.10, "sl": 1.2700, "tp": 1.2600,
    });

    let (status1, resp1) = post_fire(&app, body.clone()).await;
    assert_eq!(status1, StatusCode::OK);
    let fire_id = resp1["fire_id"].as_str().unwrap().to_string();
    assert_eq!(resp1["deduplicated"], false);

    let (status2, resp2) = post_fire(&app, body).await;
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(resp2["fire_id"], fire_id);
    assert_eq!(resp2["deduplicated"], true);
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn stale_ea_rejection() {
    let (app, _db, _ipc) = test_app().await;
    let body = json!({
        "user_id": "99", "symbol": "EURUSD", "direction": "BUY",
        "lot": 0.10, "sl": 1.08, "tp": 1.09,
    });
    let (status, resp) = post_fire(&app, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp["reason"].as_str().unwrap().contains("stale"));
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn dry_run_never_writes_ipc() {
    let (app, _db, ipc_dir) = test_app().await;
    let body = json!({
        "user_id": "42", "symbol": "EURUSD", "direction": "BUY",
        "lot": 0.10, "sl": 1.08, "tp": 1.09, "dry_run": true,
    });
    let (status, resp) = post_fire(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "dry_run");

    let ea_dir = ipc_dir.path().join("U-7");
    let has_fire_files = ea_dir
        .read_dir()
        .map(|mut entries| entries.any(|e| e.unwrap().path().extension().map_or(false, |ext| ext == "fire")))
        .unwrap_or(false);
    assert!(!has_fire_files, "dry_run must never produce an EA IPC write");
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn forbidden_symbol_rejected() {
    let (app, _db, _ipc) = test_app().await;
    let body = json!({
        "user_id": "42", "symbol": "XAUUSD", "direction": "BUY",
        "lot": 0.10, "sl": 1.0, "tp": 2.0,
    });
    let (status, _resp) = post_fire(&app, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn lot_bounds_are_enforced() {
    let (app, _db, _ipc) = test_app().await;
    let too_small = json!({
        "user_id": "42", "symbol": "EURUSD", "direction": "BUY",
        "lot": 0.001, "sl": 1.0, "tp": 1.1,
    });
    let (status, _) = post_fire(&app, too_small).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let too_large = json!({
        "user_id": "42", "symbol": "EURUSD", "direction": "BUY",
        "lot": 999.0, "sl": 1.0, "tp": 1.1,
    });
    let (status, _) = post_fire(&app, too_large).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "requires a live Redis at REDIS_URL"]
async fn heartbeat_registers_ea_for_fire_routing() {
    let (app, _db, _ipc) = test_app().await;

    // No EA is registered for this user yet.
    let body = json!({
        "user_id": "7", "symbol": "EURUSD", "direction": "BUY",
        "lot": 0.10, "sl": 1.08, "tp": 1.09,
    });
    let (status, _resp) = post_fire(&app, body.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let heartbeat_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/heartbeat")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"target_uuid": "U-fresh", "user_id": "7", "balance": 5000.0, "equity": 5010.0})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(heartbeat_response.status(), StatusCode::OK);

    let (status, resp) = post_fire(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["deduplicated"], false);
}
