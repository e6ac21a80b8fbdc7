use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Request, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use triage_flow::Graph;
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    llm::OpenAiChatModel,
    local_model::LlamaServerModel,
    models::UploadSummary,
    pdf::LopdfExtractor,
    store::{ArchiveCounts, ArchiveStore},
    upload::{parse_multipart, process_file},
    workflow::{TriageDeps, build_triage_workflow},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<ArchiveStore>,
    pub workflow: Arc<Graph>,
}

impl AppState {
    pub fn new(config: ServiceConfig, deps: TriageDeps) -> Self {
        let workflow = Arc::new(build_triage_workflow(&deps));
        Self {
            config: Arc::new(config),
            store: deps.store,
            workflow,
        }
    }

    /// Wires the production backends: lopdf, the hosted LLM and the local
    /// classifier server.
    pub fn from_config(config: ServiceConfig) -> anyhow::Result<Self> {
        let store = Arc::new(ArchiveStore::open(&config.archive_root)?);
        let generator =
            LlamaServerModel::new(&config.local_model_url, config.local_model_timeout)?;
        let chat = OpenAiChatModel::new(config.openai_api_key.clone(), config.openai_model.clone());

        let deps = TriageDeps {
            extractor: Arc::new(LopdfExtractor),
            chat: Arc::new(chat),
            generator: Arc::new(generator),
            sampling: config.sampling,
            store,
        };
        Ok(Self::new(config, deps))
    }
}

pub fn create_app(config: ServiceConfig) -> anyhow::Result<Router> {
    let app_state = AppState::from_config(config)?;
    Ok(build_router(app_state))
}

pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_bytes();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/upload", post(upload))
        .route("/api/download", get(download))
        .route("/api/archive", get(archive_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Runs each request inside a span carrying a fresh correlation id.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "PDF Triage Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Extracts bibliographic parameters from biomedical PDFs and sorts them into good/bad archives",
        "endpoints": {
            "POST /api/upload": "Upload PDFs (multipart field 'pdfs') with an optional 'topic'",
            "GET /api/download": "Download archived PDFs as results.zip and clear the archive",
            "GET /api/archive": "Current archive counts",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadSummary> {
    let multipart = multipart.map_err(|e| {
        warn!(error = %e, "Rejected upload request");
        bad_request_error(&e.body_text())
    })?;
    let form = parse_multipart(multipart).await.map_err(|e| {
        warn!(error = %e, "Rejected upload request");
        bad_request_error(&e.to_string())
    })?;

    info!(files = form.files.len(), topic = %form.topic, "Processing upload");

    let mut results = Vec::with_capacity(form.files.len());
    for file in form.files {
        results.push(process_file(&state.workflow, &form.topic, file).await);
    }

    let summary = UploadSummary::new(form.topic, results);
    info!(
        pdf_count = summary.pdf_count,
        good = summary.good_count,
        bad = summary.bad_count,
        unclassified = summary.unclassified_count,
        "Upload processed"
    );
    Ok(Json(summary))
}

async fn download(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.store.archive_and_clear().await.map_err(|e| {
        error!(error = %e, "Failed to build archive");
        internal_error("Failed to build archive", &e.to_string())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"results.zip\"",
            ),
        ],
        bytes,
    ))
}

async fn archive_status(State(state): State<AppState>) -> ApiResult<ArchiveCounts> {
    state.store.counts().await.map(Json).map_err(|e| {
        error!(error = %e, "Failed to read archive counts");
        internal_error("Failed to read archive", &e.to_string())
    })
}
