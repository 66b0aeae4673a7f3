//! Read-side analytics API: footfall, zone/shelf/queue metrics, promo
//! uplift, spike detection, and the bundled dashboard snapshot.
//!
//! Grounded on `api::routes::get_signals`'s `Query<T>` + `State<AppState>`
//! extraction style, and on the endpoint surface named in
//! `original_source/backend/src/routes/analytics_routes.py`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation;
use crate::error::QueryApiError;
use crate::store::EventStore;

#[derive(Clone)]
pub struct QueryState {
    pub store: Arc<EventStore>,
}

pub fn router(state: QueryState) -> Router {
    Router::new()
        .route("/api/analytics/footfall", get(get_footfall))
        .route("/api/analytics/zones", get(get_zones))
        .route("/api/analytics/shelves", get(get_shelves))
        .route("/api/analytics/queue", get(get_queue))
        .route("/api/analytics/live", get(get_live))
        .route("/api/analytics/peak_hour", get(get_peak_hour))
        .route("/api/analytics/promo", get(get_promo_uplift))
        .route("/api/analytics/spikes", get(get_spikes))
        .route("/api/analytics/dashboard", get(get_dashboard))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub store_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub bucket: Option<String>,
}

fn parse_range(q: &RangeQuery) -> Result<(DateTime<Utc>, DateTime<Utc>), QueryApiError> {
    let from = DateTime::parse_from_rfc3339(&q.from).map_err(|_| QueryApiError::InvalidParameter { field: "from".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    let to = DateTime::parse_from_rfc3339(&q.to).map_err(|_| QueryApiError::InvalidParameter { field: "to".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    Ok((from, to))
}

async fn get_footfall(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    match q.bucket.as_deref().unwrap_or("hour") {
        "hour" => Ok(Json(serde_json::to_value(aggregation::footfall_by_hour(&state.store, &q.store_id, from, to)?)?)),
        "day" => Ok(Json(serde_json::to_value(aggregation::footfall_by_day(&state.store, &q.store_id, from, to)?)?)),
        other => Err(QueryApiError::UnknownBucket(other.to_string())),
    }
}

async fn get_zones(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    Ok(Json(serde_json::to_value(aggregation::zone_metrics(&state.store, &q.store_id, from, to)?)?))
}

async fn get_shelves(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    Ok(Json(serde_json::to_value(aggregation::shelf_metrics(&state.store, &q.store_id, from, to)?)?))
}

async fn get_queue(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    Ok(Json(serde_json::to_value(aggregation::queue_metrics(&state.store, &q.store_id, from, to)?)?))
}

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub store_id: String,
    #[serde(default)]
    pub window_sec: Option<i64>,
}

async fn get_live(Query(q): Query<LiveQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let snapshot = aggregation::live_snapshot(&state.store, &q.store_id, Utc::now(), q.window_sec.unwrap_or(60))?;
    Ok(Json(serde_json::to_value(snapshot)?))
}

async fn get_peak_hour(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    let hourly = aggregation::footfall_by_hour(&state.store, &q.store_id, from, to)?;
    Ok(Json(serde_json::to_value(aggregation::peak_hour(&hourly))?))
}

#[derive(Debug, Deserialize)]
pub struct PromoQuery {
    pub store_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub baseline_days: Option<i64>,
    #[serde(default)]
    pub metric: Option<String>,
}

fn parse_metric(metric: Option<&str>) -> Result<aggregation::MetricKind, QueryApiError> {
    let raw = metric.unwrap_or("footfall");
    aggregation::MetricKind::parse(raw).ok_or_else(|| QueryApiError::UnknownMetric(raw.to_string()))
}

async fn get_promo_uplift(Query(q): Query<PromoQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let from = DateTime::parse_from_rfc3339(&q.from).map_err(|_| QueryApiError::InvalidParameter { field: "from".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    let to = DateTime::parse_from_rfc3339(&q.to).map_err(|_| QueryApiError::InvalidParameter { field: "to".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    let metric = parse_metric(q.metric.as_deref())?;
    let uplift = aggregation::promo_uplift(&state.store, &q.store_id, from, to, q.baseline_days.unwrap_or(14), metric)?;
    Ok(Json(serde_json::to_value(uplift)?))
}

#[derive(Debug, Deserialize)]
pub struct SpikeQuery {
    pub store_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub threshold_z: Option<f64>,
    #[serde(default)]
    pub metric: Option<String>,
}

async fn get_spikes(Query(q): Query<SpikeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let from = DateTime::parse_from_rfc3339(&q.from).map_err(|_| QueryApiError::InvalidParameter { field: "from".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    let to = DateTime::parse_from_rfc3339(&q.to).map_err(|_| QueryApiError::InvalidParameter { field: "to".into(), reason: "expected RFC 3339 timestamp".into() })?.with_timezone(&Utc);
    let metric = parse_metric(q.metric.as_deref())?;
    let daily = aggregation::daily_series(&state.store, &q.store_id, from, to, metric)?;
    let spikes = aggregation::detect_spikes(&daily, q.threshold_z.unwrap_or(2.0));
    Ok(Json(serde_json::to_value(spikes)?))
}

async fn get_dashboard(Query(q): Query<RangeQuery>, State(state): State<QueryState>) -> Result<Json<serde_json::Value>, QueryApiError> {
    let (from, to) = parse_range(&q)?;
    let snapshot = aggregation::analytics_snapshot(&state.store, &q.store_id, from, to, Utc::now())?;
    Ok(Json(serde_json::to_value(snapshot)?))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz(State(state): State<QueryState>) -> Json<HealthResponse> {
    let reachable = state.store.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).map_err(Into::into)).is_ok();
    Json(HealthResponse { status: if reachable { "ok" } else { "degraded" } })
}

impl From<serde_json::Error> for QueryApiError {
    fn from(e: serde_json::Error) -> Self {
        QueryApiError::Storage(anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::body::Body;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_reports_ok_against_a_live_store() {
        let store = EventStore::open_in_memory().unwrap();
        let app = router(QueryState { store: Arc::new(store) });
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn footfall_rejects_malformed_timestamps() {
        let store = EventStore::open_in_memory().unwrap();
        let app = router(QueryState { store: Arc::new(store) });
        let req = Request::builder().uri("/api/analytics/footfall?store_id=store-1&from=not-a-date&to=2026-07-28T00:00:00Z").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
