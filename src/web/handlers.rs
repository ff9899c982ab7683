//! HTTP handlers for the debug and metrics endpoints.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::metrics::data::Values;
use crate::metrics::runtime::RuntimeSampler;
use crate::metrics::system::SystemSampler;
use crate::metrics::traits::{Sampler, Snapshot};
use crate::publish::registry::encode_text;
use crate::web::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Parse the `seconds` query parameter.
///
/// Missing, unparsable and non-positive values fall back to `default`; the
/// result never exceeds `max`.
pub fn normalize_seconds(raw: Option<&str>, default: u64, max: u64) -> u64 {
    let seconds = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&s| s > 0)
        .map(|s| s as u64)
        .unwrap_or(default);
    seconds.min(max)
}

/// Render values as sorted `key=value` lines.
pub fn render_lines(values: &Values) -> String {
    let mut body = String::new();
    for (key, value) in values {
        // Writing to a String cannot fail.
        let _ = writeln!(body, "{}={}", key, value);
    }
    body
}

/// A runtime and a system sampler measuring the same window.
pub type WindowSamplers = (RuntimeSampler, SystemSampler);

/// Sample both samplers and merge their values. Reads `/proc` and every
/// mounted filesystem, so async callers run it on the blocking pool.
pub fn sample_window(mut samplers: WindowSamplers) -> (WindowSamplers, Values) {
    let mut values = samplers.0.sample().values();
    values.extend(samplers.1.sample().values());
    (samplers, values)
}

/// `GET /debug/stats/?seconds=N`: sample, wait, sample again and return every
/// runtime and system metric as plain text.
pub async fn debug_stats(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let seconds = normalize_seconds(
        params.get("seconds").map(String::as_str),
        state.config.default_stats_seconds,
        state.config.max_stats_seconds,
    );
    debug!(seconds, "serving debug stats");

    let runtime = state.runtime_sampler();
    let baseline =
        tokio::task::spawn_blocking(move || sample_window((runtime, SystemSampler::new()))).await;
    let samplers = match baseline {
        Ok((samplers, _)) => samplers,
        Err(e) => return sampling_failed(e),
    };

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    let values = match tokio::task::spawn_blocking(move || sample_window(samplers)).await {
        Ok((_, values)) => values,
        Err(e) => return sampling_failed(e),
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, TEXT_PLAIN),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        render_lines(&values),
    )
        .into_response()
}

fn sampling_failed(e: JoinError) -> Response {
    error!("Sampling task failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// `GET /debug/vars`: the exported-variable maps as JSON.
pub async fn debug_vars(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.vars.to_json())
}

/// `GET /metrics`: the Prometheus registry in text format.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match encode_text(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
