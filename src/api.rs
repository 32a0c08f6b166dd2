use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::extract::{self, ExtractionError};
use crate::models::{ErrorResponse, ExtractionRequest, HealthResponse};

const SERVICE_MESSAGE: &str = "Material Companion API is running";

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub completion: Arc<dyn CompletionClient>,
}

impl AppState {
    pub fn new(config: Config, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: Arc::new(config),
            completion,
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(health).post(extract_endpoint))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(cors))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>, headers: HeaderMap) -> Json<HealthResponse> {
    tracing::info!("health check request received");
    tracing::debug!(?headers, "health check headers");

    Json(HealthResponse {
        message: SERVICE_MESSAGE.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: state.config.environment.clone(),
    })
}

async fn extract_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::error!(error = %rejection.body_text(), "rejected request body");
            return internal_error(rejection.body_text());
        }
    };

    tracing::info!(
        text_len = request.text.as_ref().map(String::len),
        images_count = request.images.as_ref().map(Vec::len),
        url = request.url.as_deref().unwrap_or(""),
        "extract request received"
    );

    match extract::extract_product(state.completion.as_ref(), request).await {
        Ok(result) => {
            tracing::info!(
                name = result.name().unwrap_or(""),
                fields = result.fields().len(),
                "product extracted"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => failure(e),
    }
}

// ── Error responses ──────────────────────────────────────────────────────────

fn failure(err: ExtractionError) -> Response {
    tracing::error!(kind = err.kind(), error = %err, "extraction failed");
    let body = ErrorResponse {
        error: "Failed to process data".to_string(),
        details: err.to_string(),
        kind: Some(err.kind().to_string()),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn internal_error(details: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: "Internal server error".to_string(),
        details: details.into(),
        kind: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(details = %details, "unhandled error");
    internal_error(details)
}

// ── CORS ─────────────────────────────────────────────────────────────────────

/// Opens every response to any origin and answers all preflights with 204.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Accept, Origin"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}
