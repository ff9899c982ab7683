use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use app_metrics::{create_app, AppState, SystemRegistry, TrackingAllocator, WebConfig};

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

fn state() -> AppState {
    AppState::new(WebConfig::default()).with_allocator(&ALLOCATOR)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn has_line(body: &str, key: &str) -> bool {
    body.lines().any(|line| line.starts_with(&format!("{}=", key)))
}

#[tokio::test(start_paused = true)]
async fn test_debug_stats_one_second() {
    let app = create_app(state());
    let response = app
        .oneshot(
            Request::get("/debug/stats/?seconds=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let body = body_text(response).await;
    for key in ["cpu.tasks", "mem.free.count", "mem.total", "swap.total"] {
        assert!(has_line(&body, key), "missing {} in:\n{}", key, body);
    }
    #[cfg(target_os = "linux")]
    for key in ["cpu.user", "load.load1"] {
        assert!(has_line(&body, key), "missing {} in:\n{}", key, body);
    }

    let keys: Vec<&str> = body
        .lines()
        .filter_map(|line| line.split_once('=').map(|(key, _)| key))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[tokio::test(start_paused = true)]
async fn test_debug_stats_invalid_seconds_uses_default() {
    let app = create_app(state());
    let started = tokio::time::Instant::now();

    let response = app
        .oneshot(
            Request::get("/debug/stats?seconds=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= std::time::Duration::from_secs(30));
}

#[tokio::test]
async fn test_debug_vars_json() {
    let state = state();
    state.vars.system().set("mem.total", 42u64.into());
    let app = create_app(state);

    let response = app
        .oneshot(Request::get("/debug/vars").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["systemStats"]["mem.total"], 42);
    assert!(json["runtimeStats"].is_object());
}

#[tokio::test]
async fn test_metrics_exposition() {
    let state = state();
    let mut registry = SystemRegistry::new(state.registry.clone()).unwrap();
    registry.capture_once();
    let app = create_app(state);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("system_memory_total_bytes"));
    assert!(body.contains("system_capture_seconds"));
}

#[tokio::test]
async fn test_health() {
    let app = create_app(state());
    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}
