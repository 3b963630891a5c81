// 🌐 HTTP API - POST /categorize
//
// Thin axum layer over the resolver. Validation problems are 400s with an
// `error` field; classification problems never leave the resolver and come
// back as the all-Uncategorized 200 body.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::categories::CategoryRecord;
use crate::resolver::{Classification, Resolver};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        AppState {
            resolver: Arc::new(resolver),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    NoJson,
    MissingData,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoJson => (StatusCode::BAD_REQUEST, "No JSON data received".to_string()),
            ApiError::MissingData => (StatusCode::BAD_REQUEST, "Missing required data".to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    error!(error = %message, "handler panicked");
    ApiError::Internal(message).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// Pull `account_name` and `categories` out of the request body.
///
/// The categories stay as raw JSON here; turning them into records is part
/// of classification and its failures are masked there.
fn parse_request(body: &[u8]) -> Result<(String, Value), ApiError> {
    let data: Value = serde_json::from_slice(body).map_err(|_| ApiError::NoJson)?;
    let data = match data {
        Value::Object(map) if !map.is_empty() => map,
        _ => return Err(ApiError::NoJson),
    };

    let account_name = match data.get("account_name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(ApiError::MissingData),
    };

    // Only absent or empty values are rejected; anything else of the wrong
    // shape fails later as malformed records
    let categories = match data.get("categories") {
        Some(value) if !is_empty_value(value) => value.clone(),
        _ => return Err(ApiError::MissingData),
    };

    Ok((account_name, categories))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// POST /categorize
async fn categorize(State(state): State<AppState>, body: Bytes) -> Result<Json<Classification>, ApiError> {
    let (account_name, categories) = parse_request(&body).map_err(|e| {
        warn!(error = ?e, "rejected categorize request");
        e
    })?;

    let records: Vec<CategoryRecord> = match serde_json::from_value(categories) {
        Ok(records) => records,
        Err(e) => {
            error!(account = %account_name, error = %e, "malformed category records");
            return Ok(Json(Classification::uncategorized()));
        }
    };

    let result = state.resolver.resolve(&account_name, &records).await;
    Ok(Json(result))
}

// ============================================================================
// Router
// ============================================================================

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Outermost first: tracing, CORS, then panic recovery, so a 500 from a
/// panicking handler still carries the CORS headers.
fn with_middleware(router: Router, allowed_origins: &[String]) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(allowed_origins))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/categorize", post(categorize))
        .with_state(state);

    with_middleware(router, allowed_origins)
}
