//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tickavg_analytics::PriceQueryService;
use tickavg_core::parse_timestamp;
use tickavg_feed::IngestionService;
use tickavg_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{CollectRequest, CollectResponse, PriceResponse, SmaParams, StopResponse};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    queries: PriceQueryService,
    ingestion: Arc<IngestionService>,
    config: ApiConfig,
}

impl AppState {
    pub fn new(
        queries: PriceQueryService,
        ingestion: Arc<IngestionService>,
        config: ApiConfig,
    ) -> Self {
        Self {
            queries,
            ingestion,
            config,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/{symbol}/24hAvgPrice", get(get_24h_average))
        .route("/api/{symbol}/SimpleMovingAverage", get(get_sma))
        .route("/api/{symbol}/SimpleMovingAverage/", get(get_sma))
        .route("/api/collectPriceData", post(collect_price_data))
        .route("/api/stopCollecting", post(stop_collecting))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_24h_average(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<PriceResponse>> {
    let outcome = state.queries.get_24h_average(&symbol).await?;
    Ok(Json(PriceResponse::new(symbol, outcome)))
}

async fn get_sma(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    params: Result<Query<SmaParams>, QueryRejection>,
) -> ApiResult<Json<PriceResponse>> {
    let Query(params) = params.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;
    let start = params
        .s
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| ApiError::InvalidParameter(e.to_string()))?;

    let outcome = state
        .queries
        .get_simple_moving_average(&symbol, params.n, &params.p, start)
        .await?;
    Ok(Json(PriceResponse::new(symbol, outcome)))
}

async fn collect_price_data(
    State(state): State<AppState>,
    body: Result<Json<CollectRequest>, JsonRejection>,
) -> ApiResult<Json<CollectResponse>> {
    let Json(request) = body.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;
    let batch_size = request
        .batch_size
        .unwrap_or(state.config.default_batch_size);

    let report = state.ingestion.start(&request.symbols, batch_size).await?;
    info!(
        active = ?report.active,
        failed = report.failed.len(),
        batch_size,
        "Collection started via API"
    );
    Ok(Json(report.into()))
}

async fn stop_collecting(State(state): State<AppState>) -> Json<StopResponse> {
    let stopped = state.ingestion.stop_all().await;
    info!(stopped, "Collections stopped via API");
    Json(StopResponse { stopped })
}

async fn metrics() -> Response {
    match Metrics::gather_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => ApiError::Storage(e.to_string()).into_response(),
    }
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn run_server(
    state: AppState,
    config: ApiConfig,
    shutdown: CancellationToken,
) -> ApiResult<()> {
    let app = create_router(state);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Starting HTTP API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP API server stopped");
    Ok(())
}
