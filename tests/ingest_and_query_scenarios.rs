//! End-to-end scenarios across the store, ingestion router, and aggregation
//! layer: idempotent bulk insert, entrance-only footfall, and zone
//! unique-visitor dedup, exercised the way a cloud deployment actually
//! receives and later queries the data.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use tower::ServiceExt;

use retail_pulse::aggregation;
use retail_pulse::ingestion::{self, IngestionState};
use retail_pulse::model::{Camera, CameraGeometry, Capability, Direction, EdgeCredential, Event, EventPayload};
use retail_pulse::store::EventStore;

fn entrance_camera(camera_id: &str, store_id: &str) -> Camera {
    let mut caps = HashSet::new();
    caps.insert(Capability::Entrance);
    Camera { camera_id: camera_id.into(), store_id: store_id.into(), is_entrance: true, capabilities: caps, geometry: CameraGeometry::default() }
}

fn zone_camera(camera_id: &str, store_id: &str) -> Camera {
    let mut caps = HashSet::new();
    caps.insert(Capability::Zones);
    Camera { camera_id: camera_id.into(), store_id: store_id.into(), is_entrance: false, capabilities: caps, geometry: CameraGeometry::default() }
}

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

async fn post_bulk(store: Arc<EventStore>, token: &str, events: Vec<Event>) -> StatusCode {
    let app = ingestion::router(IngestionState { store });
    let body = serde_json::json!({ "events": events }).to_string();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/v1/events/bulk")
        .header("content-type", "application/json")
        .header(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
        .body(Body::from(body))
        .unwrap();
    app.oneshot(req).await.unwrap().status()
}

#[tokio::test]
async fn resubmitting_a_batch_through_the_http_api_is_idempotent() {
    let store = Arc::new(EventStore::open_in_memory().unwrap());
    store.upsert_camera(&entrance_camera("cam-1", "store-1")).unwrap();
    store.upsert_edge_credential(&EdgeCredential { token: "tok-1".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: true }).unwrap();

    let event = Event::new("cam-1", "org-1", "store-1", "7", ts("2026-07-28T10:00:00Z"), EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() });

    let first = post_bulk(store.clone(), "tok-1", vec![event.clone()]).await;
    assert_eq!(first, StatusCode::OK);
    let second = post_bulk(store.clone(), "tok-1", vec![event]).await;
    assert_eq!(second, StatusCode::OK);

    let from = ts("2026-07-28T00:00:00Z");
    let to = ts("2026-07-29T00:00:00Z");
    let hourly = aggregation::footfall_by_hour(&store, "store-1", from, to).unwrap();
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].footfall, 1, "a resent duplicate must not double-count footfall");
}

#[tokio::test]
async fn footfall_ignores_exits_and_non_entrance_cameras() {
    let store = Arc::new(EventStore::open_in_memory().unwrap());
    store.upsert_camera(&entrance_camera("cam-entrance", "store-1")).unwrap();
    store.upsert_camera(&zone_camera("cam-floor", "store-1")).unwrap();
    store.upsert_edge_credential(&EdgeCredential { token: "tok-1".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: true }).unwrap();

    let t0 = ts("2026-07-28T10:00:00Z");
    let events = vec![
        Event::new("cam-entrance", "org-1", "store-1", "1", t0, EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() }),
        Event::new("cam-entrance", "org-1", "store-1", "2", t0, EventPayload::Entrance { direction: Direction::Out, person_id: "p2".into() }),
        Event::new("cam-floor", "org-1", "store-1", "3", t0, EventPayload::ZoneDwell { logical_zone: "aisle-1".into(), dwell_seconds: 10.0, person_id: "p3".into() }),
    ];
    assert_eq!(post_bulk(store.clone(), "tok-1", events).await, StatusCode::OK);

    let from = ts("2026-07-28T00:00:00Z");
    let to = ts("2026-07-29T00:00:00Z");
    let hourly = aggregation::footfall_by_hour(&store, "store-1", from, to).unwrap();
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].footfall, 1, "only the entrance-in event should count");
}

#[tokio::test]
async fn zone_metrics_dedup_unique_visitors_per_minute() {
    let store = Arc::new(EventStore::open_in_memory().unwrap());
    store.upsert_camera(&zone_camera("cam-floor", "store-1")).unwrap();
    store.upsert_edge_credential(&EdgeCredential { token: "tok-1".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: true }).unwrap();

    let t0 = ts("2026-07-28T10:00:05Z");
    let t1 = ts("2026-07-28T10:00:40Z");
    let events = vec![
        Event::new("cam-floor", "org-1", "store-1", "1", t0, EventPayload::ZoneDwell { logical_zone: "aisle-1".into(), dwell_seconds: 6.0, person_id: "p1".into() }),
        Event::new("cam-floor", "org-1", "store-1", "2", t1, EventPayload::ZoneDwell { logical_zone: "aisle-1".into(), dwell_seconds: 8.0, person_id: "p1".into() }),
        Event::new("cam-floor", "org-1", "store-1", "3", t0, EventPayload::ZoneDwell { logical_zone: "aisle-1".into(), dwell_seconds: 1.0, person_id: "p2".into() }),
    ];
    assert_eq!(post_bulk(store.clone(), "tok-1", events).await, StatusCode::OK);

    let from = ts("2026-07-28T00:00:00Z");
    let to = ts("2026-07-29T00:00:00Z");
    let zones = aggregation::zone_metrics(&store, "store-1", from, to).unwrap();
    let aisle = zones.get("aisle-1").unwrap();
    // p1 counted once per same-minute bucket (both events fall in the same
    // minute, so they collapse to one visitor); p2's 1.0s dwell is below the
    // 4.0s anti-noise floor and is excluded entirely.
    assert_eq!(aisle.unique_visitors, 1);
}
