use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rand::Rng;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    config::ServerConfig,
    error::UploadError,
    image_utils::{format_file_size, image_dimensions, to_data_url, validate_image},
    models::{ErrorBody, Generation, GenerationRequest, UploadedFile},
    storage::MemStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemStorage>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self { store: Arc::default(), config: Arc::new(config) }
    }
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody::new(message) }
    }

    fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody { message: "Validation error".into(), errors: Some(errors) },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    }
}

pub fn router(state: AppState) -> Router {
    // Generation bodies carry the image as base64, a third larger than the file.
    let body_limit = (state.config.max_upload_bytes as usize) * 2;

    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/generate", post(generate))
        .route("/api/generations", get(list_generations))
        .route("/api/generations/:id", get(get_generation))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

pub async fn upload_image(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;

        validate_image(&mime_type, bytes.len() as u64, state.config.max_upload_bytes)?;
        let (width, height) = image_dimensions(&bytes)?;

        tracing::info!("📤 Upload '{}' {} ({}x{})", original_name, format_file_size(bytes.len() as u64), width, height);
        return Ok(Json(UploadedFile {
            data_url: to_data_url(&mime_type, &bytes),
            original_name,
            size: bytes.len() as u64,
            mime_type,
            width: Some(width),
            height: Some(height),
        }));
    }
    Err(UploadError::Missing.into())
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<Generation>, ApiError> {
    let Json(raw) = body.map_err(|e| ApiError::validation(vec![e.body_text()]))?;
    let request: GenerationRequest = serde_json::from_value(raw)
        .map_err(|e| ApiError::validation(vec![e.to_string()]))?;
    let errors = request.validate();
    if !errors.is_empty() {
        tracing::info!("🚫 Rejecting generation request: {}", errors.join("; "));
        return Err(ApiError::validation(errors));
    }

    tracing::info!("🚀 Generating: {}", request.summary());

    let (latency, fail) = {
        let mut rng = rand::thread_rng();
        let range = &state.config.latency_ms;
        let latency = if range.is_empty() { range.start } else { rng.gen_range(range.clone()) };
        let fail = rng.gen_bool(state.config.failure_rate.clamp(0.0, 1.0));
        (Duration::from_millis(latency), fail)
    };
    tokio::time::sleep(latency).await;

    if fail {
        tracing::warn!("💥 Simulated failure after {:?}", latency);
        return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Model overloaded"));
    }

    let generation = state.store.create_generation(&request);
    tracing::info!("✅ Generation {} ready after {:?}", generation.id, latency);
    Ok(Json(generation))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub async fn list_generations(State(state): State<AppState>, Query(params): Query<ListParams>) -> Json<Vec<Generation>> {
    Json(state.store.list(params.limit.unwrap_or(5)))
}

pub async fn get_generation(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Generation>, ApiError> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Generation not found"))
}
