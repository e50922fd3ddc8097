//! HTTP surface of the ingestion service.

mod docs;
mod metrics;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE, header::LOCATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use schema::{IngestionRequest, ValidationError, validate_ingestion_request};
use serde_json::json;
use store::{BatchWriter, DynamoDbBatchWriter, InMemoryTableStore};
use thiserror::Error;
use tracing::{info, warn};

pub use metrics::IngestMetrics;

use crate::{
    IngestSettings, ServiceError,
    api::{ErrorBody, IngestReport},
    config::{Config, ResponseMode, StoreBackend},
    ingest_records,
};

#[derive(Clone)]
pub struct AppState {
    pub writer: Arc<dyn BatchWriter>,
    pub settings: IngestSettings,
    pub response_mode: ResponseMode,
    pub metrics: Arc<IngestMetrics>,
}

impl AppState {
    pub fn new(
        writer: Arc<dyn BatchWriter>,
        settings: IngestSettings,
        response_mode: ResponseMode,
    ) -> Self {
        Self {
            writer,
            settings,
            response_mode,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }
}

/// Request-shape failures. Every variant answers with `{"message": ...}`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("content-type must be application/json")]
    UnsupportedContentType,
    #[error("{}", .0.body_text())]
    Body(#[from] BytesRejection),
    #[error("invalid request body: {0}")]
    InvalidBody(#[source] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TransportError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Body(rejection) => rejection.status(),
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api-docs", get(api_docs))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/upload-json", post(upload_json))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn root() -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, "/api-docs")])
}

async fn api_docs() -> Json<serde_json::Value> {
    Json(docs::openapi_document())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn upload_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    state.metrics.observe_request();
    match accept_upload(&state, &headers, body).await {
        Ok(response) => response,
        Err(err) => {
            state.metrics.observe_rejected();
            warn!(error = %err, "upload rejected");
            err.into_response()
        }
    }
}

async fn accept_upload(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, TransportError> {
    let request = match headers.get(CONTENT_TYPE) {
        // Without a content type the body is not read as JSON at all.
        None => {
            body?;
            IngestionRequest::default()
        }
        Some(value) if is_json_media_type(value) => decode_request(&body?)?,
        Some(_) => return Err(TransportError::UnsupportedContentType),
    };
    let request = validate_ingestion_request(request)?;
    let table_name = request.table_name.clone();

    let outcome = ingest_records(state.writer.as_ref(), request, &state.settings).await;
    state.metrics.observe_outcome(&outcome);

    let response = match state.response_mode {
        ResponseMode::Ack => Json(json!({})).into_response(),
        ResponseMode::Echo => Json(outcome.echoed).into_response(),
        ResponseMode::Report => {
            Json(IngestReport::from_outcome(&table_name, &outcome)).into_response()
        }
    };
    Ok(response)
}

/// An empty or all-whitespace body decodes as `{}`.
fn decode_request(body: &[u8]) -> Result<IngestionRequest, TransportError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(IngestionRequest::default());
    }
    serde_json::from_slice(body).map_err(TransportError::InvalidBody)
}

fn is_json_media_type(value: &HeaderValue) -> bool {
    let Ok(value) = value.to_str() else {
        return false;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Builds the configured store client. The memory backend starts with the
/// tables named on the command line and nothing else.
pub async fn build_writer(config: &Config) -> Arc<dyn BatchWriter> {
    match config.store_backend {
        StoreBackend::Dynamodb => {
            let store_config = config.store_config();
            info!(
                region = %store_config.region,
                endpoint = store_config.endpoint.as_deref().unwrap_or("default"),
                "using dynamodb store"
            );
            Arc::new(DynamoDbBatchWriter::connect(&store_config).await)
        }
        StoreBackend::Memory => {
            let store = InMemoryTableStore::new();
            for table in &config.memory_tables {
                store.create_table(&table.table_name, &table.partition_key);
            }
            info!(tables = config.memory_tables.len(), "using in-memory store");
            Arc::new(store)
        }
    }
}

pub fn serve_http(config: Config) -> Result<(), ServiceError> {
    let worker_threads = config.worker_threads();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .map_err(ServiceError::Runtime)?;

    runtime.block_on(async move {
        let bind_addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;

        let writer = build_writer(&config).await;
        let state = AppState::new(writer, config.ingest_settings(), config.response_mode);
        let app = router(state, config.json_body_limit);

        info!(
            addr = %bind_addr,
            worker_threads,
            body_limit = config.json_body_limit,
            batch_size = config.batch_size,
            concurrency = config.concurrency,
            response_mode = ?config.response_mode,
            "ingestion service listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServiceError::Serve)
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
