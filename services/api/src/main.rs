//! API Service - JSON views over the CO₂ pipeline
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /emissions - Full country/year index
//! - GET /emissions/coverage - Years with enough reporting countries
//! - GET /emissions/value - One country, year and metric
//! - GET /emissions/map - One metric across countries for a year
//! - GET /co2/forecast - Annual averages, trend line and projection
//! - GET /boundaries - Country boundaries with normalized identifiers
//! - POST /cache/invalidate - Drop cached datasets

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pipeline::{
    build_forecast_report, get_metric_value, parse_finite_str, year_view, Collector,
    CountryYearIndex, DatasetCache, Liveness, Loaded, Metric, PipelineConfig, PipelineError,
    RequestScope, TimeSeriesPoint,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Largest forecast horizon a single request may ask for.
const MAX_HORIZON: usize = 500;

// ============================================================================
// State
// ============================================================================

struct AppState {
    collector: Collector,
    cache: DatasetCache,
    config: PipelineConfig,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
    series_cached: bool,
    countries_cached: bool,
}

#[derive(Serialize)]
struct ValueResponse {
    country: String,
    year: Option<f64>,
    metric: String,
    value: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::EmptyDataset { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct CoverageQuery {
    metric: Option<String>,
    min_countries: Option<usize>,
}

#[derive(Deserialize)]
struct ValueQuery {
    country: String,
    year: String,
    metric: String,
}

#[derive(Deserialize)]
struct MapQuery {
    year: Option<i32>,
    metric: Option<String>,
}

#[derive(Deserialize)]
struct ForecastQuery {
    horizon: Option<usize>,
}

/// Unwrap a query extraction, turning axum's plain-text rejection into the
/// JSON error body every endpoint returns.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn parse_metric(raw: Option<&str>) -> Result<Metric, ApiError> {
    match raw {
        Some(name) => name.parse().map_err(|e: String| ApiError::bad_request(e)),
        None => Ok(Metric::Co2),
    }
}

// ============================================================================
// Cache loading
// ============================================================================

/// Run a cache load on its own task. The task only holds a weak liveness
/// handle, so if this request is dropped mid-fetch the result is discarded
/// instead of published.
async fn load_detached<T, F, Fut>(load: F) -> Result<Arc<T>, ApiError>
where
    F: FnOnce(Liveness) -> Fut,
    Fut: Future<Output = Loaded<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    let scope = RequestScope::new();
    let loaded = tokio::spawn(load(scope.liveness()))
        .await
        .map_err(|e| ApiError::internal(format!("load task failed: {}", e)))??;
    drop(scope);
    loaded.ok_or_else(|| ApiError::internal("load abandoned"))
}

async fn country_index(state: &Arc<AppState>) -> Result<Arc<CountryYearIndex>, ApiError> {
    if let Some(hit) = state.cache.country_index() {
        return Ok(hit);
    }
    let state = Arc::clone(state);
    load_detached(move |liveness| async move {
        state.cache.load_country_index(&state.collector, &liveness).await
    })
    .await
}

async fn series(state: &Arc<AppState>) -> Result<Arc<Vec<TimeSeriesPoint>>, ApiError> {
    if let Some(hit) = state.cache.series() {
        return Ok(hit);
    }
    let state = Arc::clone(state);
    load_detached(move |liveness| async move {
        state.cache.load_series(&state.collector, &liveness).await
    })
    .await
}

async fn boundaries(state: &Arc<AppState>) -> Result<Arc<Value>, ApiError> {
    if let Some(hit) = state.cache.boundaries() {
        return Ok(hit);
    }
    let state = Arc::clone(state);
    load_detached(move |liveness| async move {
        state.cache.load_boundaries(&state.collector, &liveness).await
    })
    .await
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        series_cached: state.cache.series().is_some(),
        countries_cached: state.cache.country_index().is_some(),
    })
}

async fn emissions_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let index = country_index(&state).await?;
    Ok(Json(index.as_ref()).into_response())
}

async fn coverage_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CoverageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let metric = parse_metric(params.metric.as_deref())?;
    let min_countries = params.min_countries.unwrap_or(state.config.min_coverage);
    let index = country_index(&state).await?;
    Ok(Json(index.coverage(metric, min_countries)).into_response())
}

async fn value_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ValueQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let index = country_index(&state).await?;
    let year = parse_finite_str(&params.year);
    let value = get_metric_value(&index, &params.country, year.unwrap_or(f64::NAN), &params.metric);

    Ok(Json(ValueResponse {
        country: params.country,
        year,
        metric: params.metric,
        value,
    })
    .into_response())
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MapQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let metric = parse_metric(params.metric.as_deref())?;
    let index = country_index(&state).await?;

    // Default to the most recent year with enough reporting countries
    let year = match params.year {
        Some(year) => year,
        None => index
            .coverage(metric, state.config.min_coverage)
            .latest_covered_year
            .ok_or_else(|| ApiError::internal("country index has no years"))?,
    };

    Ok(Json(year_view(&index, year, metric)).into_response())
}

async fn forecast_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let horizon = params.horizon.unwrap_or(state.config.forecast_horizon);
    if horizon > MAX_HORIZON {
        return Err(ApiError::bad_request(format!(
            "horizon {} exceeds the maximum of {}",
            horizon, MAX_HORIZON
        )));
    }

    let series = series(&state).await?;
    Ok(Json(build_forecast_report(&series, horizon)).into_response())
}

async fn boundaries_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let collection = boundaries(&state).await?;
    Ok(Json(collection.as_ref()).into_response())
}

async fn invalidate_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.cache.invalidate();
    Json(serde_json::json!({ "ok": true }))
}

fn router(state: Arc<AppState>) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/emissions", get(emissions_handler))
        .route("/emissions/coverage", get(coverage_handler))
        .route("/emissions/value", get(value_handler))
        .route("/emissions/map", get(map_handler))
        .route("/co2/forecast", get(forecast_handler))
        .route("/boundaries", get(boundaries_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .layer(cors)
        .with_state(state)
}

/// Fetch both datasets concurrently so the first requests hit a warm cache.
/// Failures are only logged; handlers retry on demand.
async fn warm_cache(state: Arc<AppState>) {
    let scope = RequestScope::new();
    let liveness = scope.liveness();
    let (series, countries) = state.collector.fetch_both().await;

    if let Err(e) = state.cache.series_or_load(&liveness, async { series }).await {
        warn!(error = %e, "series warm-up failed");
    }
    if let Err(e) = state
        .cache
        .country_index_or_load(&liveness, async { countries })
        .await
    {
        warn!(error = %e, "country table warm-up failed");
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let config = PipelineConfig::from_env();

    info!(series = %config.series_url, table = %config.emissions_csv_url, "=== CO2 Atlas API ===");

    let collector = Collector::new(config.clone()).context("Failed to build HTTP client")?;
    let state = Arc::new(AppState {
        collector,
        cache: DatasetCache::new(),
        config,
    });

    tokio::spawn(warm_cache(Arc::clone(&state)));

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("API listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
