use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::compose::Composer;
use crate::models::{ComposeRequest, ComposeResponse, ErrorResponse, HealthResponse, ServiceInfo, TestResponse};

pub const MIN_IMAGES: usize = 2;
pub const MAX_IMAGES: usize = 4;

#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<Composer>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Service(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error, timestamp: None })).into_response()
            }
            ApiError::Service(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error, timestamp: Some(now()) }),
            )
                .into_response(),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn validate_images(images: Option<Value>) -> Result<Vec<String>, ApiError> {
    let Some(Value::Array(items)) = images else {
        return Err(ApiError::Validation("At least 2 images are required".into()));
    };
    if items.len() < MIN_IMAGES {
        return Err(ApiError::Validation("At least 2 images are required".into()));
    }
    if items.len() > MAX_IMAGES {
        return Err(ApiError::Validation("Maximum 4 images allowed".into()));
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(ApiError::Validation("Images must be base64-encoded strings".into())),
        })
        .collect()
}

pub async fn compose(
    State(state): State<AppState>,
    payload: Result<Json<ComposeRequest>, JsonRejection>,
) -> Result<Json<ComposeResponse>, ApiError> {
    info!("[API] Compose endpoint called");
    let Json(body) = payload.map_err(|e| {
        info!("[API] Rejected body: {}", e.body_text());
        ApiError::Validation(e.body_text())
    })?;

    let mode = body.mode.unwrap_or_else(|| "tryOn".to_string());
    let high_resolution = body.high_resolution.unwrap_or(true);
    let face_blur = body.face_blur.unwrap_or(false);
    let images = validate_images(body.images).inspect_err(|e| info!("[API] Invalid images: {}", e))?;

    let span = info_span!("compose", request_id = %Uuid::new_v4(), mode = %mode);
    async move {
        info!(
            "[API] Mode: {}, Images: {}, HighRes: {}, FaceBlur: {}",
            mode,
            images.len(),
            high_resolution,
            face_blur
        );
        let outcome = state.composer.compose(images, &mode).await;
        info!("[API] Composition completed via {} tier", outcome.tier);
        Ok(Json(ComposeResponse {
            success: true,
            mode,
            image_data: outcome.image_data,
            mime_type: outcome.mime_type,
            timestamp: now(),
        }))
    }
    .instrument(span)
    .await
}

pub async fn index() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "SnapWear compose backend is running! 🚀".into(),
        timestamp: now(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn api_test() -> Json<TestResponse> {
    info!("[API] Test endpoint called");
    Json(TestResponse {
        success: true,
        message: "Compose backend is working ✅".into(),
        timestamp: now(),
        server: env!("CARGO_PKG_NAME").into(),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".into(), timestamp: now() })
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("[API] Compose API Error: {}", detail);
    ApiError::Service("Internal server error".into()).into_response()
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/test", get(api_test))
        .route("/api/compose", post(compose))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .with_state(state)
}
