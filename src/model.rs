//! Core data model: orgs, stores, cameras, edge credentials, and the typed
//! event envelope exchanged between edge and cloud.
//!
//! Mirrors the entity list in the original spec's data model section; field
//! shapes follow `original_source/backend/src/database/models_production.py`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root of tenancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Org {
    pub org_id: String,
    pub name: String,
}

/// Belongs to exactly one org; lifetime = parent org.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,
    pub org_id: String,
    pub timezone: String,
}

/// A single capability a camera's detector can run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Entrance,
    Zones,
    Shelves,
    Queue,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Entrance => "entrance",
            Capability::Zones => "zones",
            Capability::Shelves => "shelves",
            Capability::Queue => "queue",
        }
    }
}

/// Reference-screenshot-relative geometry for one camera: entrance line,
/// zone/shelf/queue polygons keyed by their logical id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CameraGeometry {
    pub screenshot_size: (u32, u32),
    #[serde(default)]
    pub entrance: Option<[(i32, i32); 2]>,
    #[serde(default)]
    pub zones: HashMap<String, Vec<(i32, i32)>>,
    #[serde(default)]
    pub shelves: HashMap<String, Vec<(i32, i32)>>,
    #[serde(default)]
    pub queue: HashMap<String, Vec<(i32, i32)>>,
}

/// `is_entrance=true` is the only signal that a camera's entrance events
/// count toward footfall — the aggregation layer must never drop this filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub camera_id: String,
    pub store_id: String,
    pub is_entrance: bool,
    pub capabilities: HashSet<Capability>,
    pub geometry: CameraGeometry,
}

/// Scopes incoming writes; ingestion rejects events whose `(org_id,
/// store_id)` do not match, and whose `camera_id` doesn't match when the
/// credential is also camera-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCredential {
    pub token: String,
    pub org_id: String,
    pub store_id: String,
    pub camera_id: Option<String>,
    pub active: bool,
}

/// Entrance crossing direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Per-type payload, validated at the wire boundary instead of passed around
/// as an untyped map (spec §9 design note: "dynamic event payloads ... should
/// become a tagged sum").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Entrance {
        direction: Direction,
        person_id: String,
    },
    ZoneDwell {
        logical_zone: String,
        dwell_seconds: f64,
        person_id: String,
    },
    ShelfInteraction {
        logical_shelf: String,
        action: ShelfAction,
        dwell_seconds: f64,
        person_id: String,
    },
    QueuePresence {
        queue: String,
        wait_seconds: f64,
        person_id: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShelfAction {
    Touch,
}

impl EventPayload {
    pub fn type_str(&self) -> &'static str {
        match self {
            EventPayload::Entrance { .. } => "entrance",
            EventPayload::ZoneDwell { .. } => "zone_dwell",
            EventPayload::ShelfInteraction { .. } => "shelf_interaction",
            EventPayload::QueuePresence { .. } => "queue_presence",
        }
    }

    /// The `logical_key` component fed into `event_id::make_event_id`.
    pub fn logical_key(&self) -> &str {
        match self {
            EventPayload::Entrance { direction, .. } => direction.as_str(),
            EventPayload::ZoneDwell { logical_zone, .. } => logical_zone,
            EventPayload::ShelfInteraction { logical_shelf, .. } => logical_shelf,
            EventPayload::QueuePresence { queue, .. } => queue,
        }
    }

    pub fn person_id(&self) -> &str {
        match self {
            EventPayload::Entrance { person_id, .. } => person_id,
            EventPayload::ZoneDwell { person_id, .. } => person_id,
            EventPayload::ShelfInteraction { person_id, .. } => person_id,
            EventPayload::QueuePresence { person_id, .. } => person_id,
        }
    }
}

/// The globally-unique, idempotently-deduplicated unit of observation flowing
/// from edge to cloud.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub org_id: String,
    pub store_id: String,
    pub camera_id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Construct an event and derive its `event_id` so callers never risk
    /// hashing and serializing a different `ts_iso` than what goes on the wire.
    pub fn new(camera_id: impl Into<String>, org_id: impl Into<String>, store_id: impl Into<String>, track_id: &str, ts: DateTime<Utc>, payload: EventPayload) -> Self {
        let camera_id = camera_id.into();
        let ts_iso = ts.to_rfc3339();
        let event_id = crate::event_id::make_event_id(&camera_id, track_id, &ts_iso, payload.type_str(), payload.logical_key());
        Self {
            event_id,
            org_id: org_id.into(),
            store_id: store_id.into(),
            camera_id,
            ts,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json_with_wire_shape() {
        let ts = Utc::now();
        let event = Event::new("cam-1", "org-1", "store-1", "7", ts, EventPayload::Entrance { direction: Direction::In, person_id: "cam-1_t7".into() });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "entrance");
        assert_eq!(json["payload"]["direction"], "in");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
