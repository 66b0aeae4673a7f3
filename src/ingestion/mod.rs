//! Cloud ingestion service: `POST /v1/events/bulk` and
//! `POST /v1/ingest/heartbeat`, the HTTP surface edge devices talk to.
//!
//! Grounded on `original_source/backend/src/api/ingest_routes.py`'s
//! `authenticate_edge`/`v1_post_events_bulk`/`v1_post_heartbeat`, and on the
//! teacher's `api::routes::get_signals` for the `Query`/`State` axum handler
//! shape plus `auth::middleware::extract_claims` for the single
//! bearer-token-lookup chokepoint every handler routes through.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::model::Event;
use crate::scope::Scope;
use crate::store::EventStore;

#[derive(Clone)]
pub struct IngestionState {
    pub store: Arc<EventStore>,
}

#[derive(Debug, Deserialize)]
pub struct EventsBulkRequest {
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize)]
pub struct EventsBulkResponse {
    pub status: &'static str,
    pub inserted: usize,
    pub duplicates: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub org_id: String,
    pub store_id: String,
    pub camera_ids: Vec<String>,
    pub ts: String,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub cameras_count: usize,
}

pub fn router(state: IngestionState) -> Router {
    Router::new().route("/v1/events/bulk", post(post_events_bulk)).route("/v1/ingest/heartbeat", post(post_heartbeat)).with_state(state)
}

fn authenticate(state: &IngestionState, headers: &HeaderMap) -> Result<crate::model::EdgeCredential, IngestError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(IngestError::Unauthorized)?;

    state.store.find_edge_credential(token).map_err(IngestError::Storage)?.ok_or(IngestError::Unauthorized)
}

fn credential_scope(cred: &crate::model::EdgeCredential) -> Scope {
    let scope = Scope::new(cred.org_id.clone(), cred.store_id.clone());
    match &cred.camera_id {
        Some(camera_id) => scope.with_camera(camera_id.clone()),
        None => scope,
    }
}

/// Idempotent bulk ingest: duplicate `event_id`s are counted, never raised as
/// an error. All events in the batch are required to be in-scope for the
/// presented credential — any mismatch rejects the whole batch with no
/// partial insert, since a mixed-scope batch indicates a misconfigured or
/// compromised edge device rather than a transient issue.
async fn post_events_bulk(State(state): State<IngestionState>, headers: HeaderMap, Json(req): Json<EventsBulkRequest>) -> Result<Json<EventsBulkResponse>, IngestError> {
    let cred = authenticate(&state, &headers)?;
    let cred_scope = credential_scope(&cred);

    if req.events.is_empty() {
        return Ok(Json(EventsBulkResponse { status: "ok", inserted: 0, duplicates: 0, total: 0 }));
    }

    for event in &req.events {
        let requested = Scope::new(event.org_id.clone(), event.store_id.clone()).with_camera(event.camera_id.clone());
        cred_scope.authorize(&requested)?;
    }

    let total = req.events.len();
    let outcome = state.store.insert_events(&req.events).map_err(IngestError::Storage)?;
    info!(inserted = outcome.inserted, duplicates = outcome.duplicates, "ingested event batch");
    Ok(Json(EventsBulkResponse { status: "ok", inserted: outcome.inserted, duplicates: outcome.duplicates, total }))
}

async fn post_heartbeat(State(state): State<IngestionState>, headers: HeaderMap, Json(req): Json<HeartbeatRequest>) -> Result<Json<HeartbeatResponse>, IngestError> {
    let cred = authenticate(&state, &headers)?;
    let cred_scope = credential_scope(&cred);
    cred_scope.authorize(&Scope::new(req.org_id.clone(), req.store_id.clone()))?;

    let now = chrono::Utc::now();
    for camera_id in &req.camera_ids {
        if let Err(e) = state.store.record_heartbeat(camera_id, &req.store_id, now, 0) {
            warn!(camera_id = %camera_id, error = %e, "failed to record heartbeat");
        }
    }

    Ok(Json(HeartbeatResponse { status: "ok", timestamp: now.to_rfc3339(), cameras_count: req.camera_ids.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Camera, CameraGeometry, Capability, Direction, EdgeCredential, EventPayload};
    use axum::http::{HeaderValue, Method, Request};
    use axum::body::Body;
    use std::collections::HashSet;
    use tower::ServiceExt;

    fn state_with_credential() -> (IngestionState, String) {
        let store = EventStore::open_in_memory().unwrap();
        let mut caps = HashSet::new();
        caps.insert(Capability::Entrance);
        store.upsert_camera(&Camera { camera_id: "cam-1".into(), store_id: "store-1".into(), is_entrance: true, capabilities: caps, geometry: CameraGeometry::default() }).unwrap();
        let cred = EdgeCredential { token: "tok-1".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: true };
        store.upsert_edge_credential(&cred).unwrap();
        (IngestionState { store: Arc::new(store) }, "tok-1".to_string())
    }

    #[tokio::test]
    async fn bulk_ingest_without_credential_is_rejected() {
        let (state, _) = state_with_credential();
        let app = router(state);
        let body = serde_json::json!({ "events": [] }).to_string();
        let req = Request::builder().method(Method::POST).uri("/v1/events/bulk").header("content-type", "application/json").body(Body::from(body)).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bulk_ingest_with_valid_credential_inserts_events() {
        let (state, token) = state_with_credential();
        let app = router(state);
        let event = Event::new("cam-1", "org-1", "store-1", "1", chrono::Utc::now(), EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() });
        let body = serde_json::json!({ "events": [event] }).to_string();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/v1/events/bulk")
            .header("content-type", "application/json")
            .header(axum::http::header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn bulk_ingest_rejects_scope_mismatch() {
        let (state, token) = state_with_credential();
        let app = router(state);
        let event = Event::new("cam-1", "org-2", "store-9", "1", chrono::Utc::now(), EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() });
        let body = serde_json::json!({ "events": [event] }).to_string();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/v1/events/bulk")
            .header("content-type", "application/json")
            .header(axum::http::header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
