use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::error::ExtractError;
use crate::service::{
    AnalyzeResponse, NewsListResponse, SchedulerStatus, SearchResponse, StartSchedulerResponse,
    StopSchedulerResponse, TelegraphService,
};
use crate::types::NewsRecord;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TelegraphService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news/latest", get(latest))
        .route("/news/search", get(search))
        .route("/news/cached", get(cached))
        .route("/news/analyze", post(analyze))
        .route("/news/{id}", get(record))
        .route("/scheduler/start", post(start_scheduler))
        .route("/scheduler/stop", post(stop_scheduler))
        .route("/scheduler/status", get(scheduler_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub enum ApiError {
    BadRequest(String),
    Upstream(ExtractError),
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Upstream(e) => {
                tracing::warn!(error = %e, "request failed upstream");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

/// Negative limits mean "no limit", same as 0.
fn clamp_limit(limit: Option<i64>) -> usize {
    limit.unwrap_or(0).max(0) as usize
}

#[derive(Deserialize)]
struct LatestQuery {
    limit: Option<i64>,
    #[serde(default)]
    fetch_detail: bool,
}

async fn latest(
    State(state): State<AppState>,
    Query(q): Query<LatestQuery>,
) -> Result<Json<NewsListResponse>, ApiError> {
    let out = state
        .service
        .fetch_latest(clamp_limit(q.limit), q.fetch_detail)
        .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct SearchQuery {
    keyword: Option<String>,
    limit: Option<i64>,
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let keyword = q
        .keyword
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("keyword is required".into()))?;
    let out = state
        .service
        .search(&keyword, clamp_limit(q.limit))
        .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn cached(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Json<NewsListResponse> {
    Json(state.service.cached_news(clamp_limit(q.limit)))
}

async fn record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NewsRecord>, ApiError> {
    Ok(Json(state.service.fetch_record(&id).await?))
}

async fn analyze(
    State(state): State<AppState>,
    Json(records): Json<Vec<NewsRecord>>,
) -> Json<AnalyzeResponse> {
    Json(state.service.analyze(records))
}

#[derive(Deserialize, Default)]
struct StartReq {
    #[serde(default)]
    interval_minutes: i64,
}

/// Body is optional; an empty or unreadable one uses the configured interval.
async fn start_scheduler(State(state): State<AppState>, body: Bytes) -> Json<StartSchedulerResponse> {
    let req: StartReq = if body.is_empty() {
        StartReq::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };
    let minutes = req.interval_minutes.max(0) as u64;
    Json(state.service.start_scheduler(minutes).await)
}

async fn stop_scheduler(State(state): State<AppState>) -> Json<StopSchedulerResponse> {
    Json(state.service.stop_scheduler().await)
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.service.scheduler_status())
}
