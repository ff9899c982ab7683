//! Web application router and middleware setup.

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::web::handlers;
use crate::web::AppState;

/// Create the axum application with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/debug/stats", get(handlers::debug_stats))
        .route("/debug/stats/", get(handlers::debug_stats))
        .route("/debug/vars", get(handlers::debug_vars))
        .route("/api/health", get(handlers::health_check));

    if state.config.enable_registry {
        app = app.route("/metrics", get(handlers::metrics));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::WebConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let app = create_app(AppState::new(WebConfig::default()));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_route_disabled() {
        let app = create_app(AppState::new(WebConfig::default().with_registry(false)));
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
