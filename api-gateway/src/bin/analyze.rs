//! Analyze Lambda - Runs the DermAging pipeline.
//!
//! Endpoints:
//! - POST /analyze - Run both stages on uploaded photographs
//! - GET /health - Report stage service health

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use pipeline::http::{error_response, json_response, ApiResponse};
use pipeline::{cancellation, parse_body, AnalyzeUpload, Pipeline, PipelineConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time left for serializing the response once a run is cancelled.
const DEADLINE_MARGIN: Duration = Duration::from_secs(2);

/// Application state
struct AppState {
    pipeline: Pipeline,
}

impl AppState {
    fn new() -> Result<Self, Error> {
        let config = PipelineConfig::from_env()?;
        info!(
            vision = %config.vision_base_url,
            interpretation = %config.interpretation_base_url,
            vision_timeout_s = config.vision_timeout.as_secs_f64(),
            interpretation_timeout_s = config.interpretation_timeout.as_secs_f64(),
            "Pipeline configured"
        );

        Ok(Self {
            pipeline: Pipeline::from_config(&config)?,
        })
    }
}

/// Time until the invocation deadline, if the runtime supplied one.
fn remaining_time(event: &Request) -> Option<Duration> {
    let deadline_ms = event.lambda_context_ref()?.deadline as i64;
    let remaining = deadline_ms - chrono::Utc::now().timestamp_millis();
    Some(Duration::from_millis(remaining.max(0) as u64))
}

async fn analyze(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let upload: AnalyzeUpload = parse_body!(event.body());
    let request = match upload.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    // Cancel the run before Lambda kills the invocation so the caller still
    // gets a structured error.
    let (handle, signal) = cancellation();
    let watchdog = remaining_time(event).map(|remaining| {
        tokio::spawn(async move {
            tokio::time::sleep(remaining.saturating_sub(DEADLINE_MARGIN)).await;
            warn!("Approaching invocation deadline, cancelling analysis");
            handle.cancel();
        })
    });

    let result = state.pipeline.run_with_cancel(request, signal).await;
    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }

    match result {
        Ok(assembled) => json_response(200, &ApiResponse::success(assembled)),
        Err(e) => error_response(&e),
    }
}

async fn health(state: &AppState) -> Result<Response<Body>, Error> {
    let health = state.pipeline.health().await;
    let status = if health.is_healthy() { 200 } else { 503 };
    json_response(status, &ApiResponse::success(health))
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = event.uri().path();

    info!("Analyze request: {} {}", method, path);

    match (method, path) {
        ("POST", "/analyze") => analyze(&state, &event).await,
        ("GET", "/health") => health(&state).await,
        _ => json_response(
            404,
            &serde_json::json!({ "success": false, "error": "Not found" }),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new()?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
