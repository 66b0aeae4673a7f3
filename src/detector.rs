//! Capability detector: turns per-frame tracker output into typed events,
//! given a camera's enabled capabilities and geometry.
//!
//! Grounded on `original_source/edge_runtime_v2.py`'s `CameraWorker` and
//! `PersonTrack`, restructured as a pure `observe` entry point with no I/O —
//! the same "struct with one processing method, returns owned results" shape
//! as the teacher's `signals/detector.rs`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::geometry::{self, Point};
use crate::model::{Camera, Direction, Event, EventPayload, ShelfAction};

/// A single tracker observation for one frame: a stable track id and its
/// bounding box in frame coordinates. This is the entire interface the
/// detector needs from whatever produces detections — the actual
/// detector/tracker (YOLO + Norfair in the reference implementation) is
/// explicitly out of scope and lives behind this trait.
pub trait Tracker {
    /// Current tracks visible in the latest frame: `(track_id, bbox)`.
    fn next_frame(&mut self) -> Vec<(String, (f64, f64, f64, f64))>;
}

/// A tracker double that replays a scripted sequence of frames, for tests and
/// for exercising the pipeline without a camera attached.
pub struct ScriptedTracker {
    frames: std::vec::IntoIter<Vec<(String, (f64, f64, f64, f64))>>,
}

impl ScriptedTracker {
    pub fn new(frames: Vec<Vec<(String, (f64, f64, f64, f64))>>) -> Self {
        Self { frames: frames.into_iter() }
    }
}

impl Tracker for ScriptedTracker {
    fn next_frame(&mut self) -> Vec<(String, (f64, f64, f64, f64))> {
        self.frames.next().unwrap_or_default()
    }
}

/// A tracker that never detects anyone — used when a camera has no model
/// installed yet. Per spec §7, an empty inference result is not an error: it
/// simply drives the correctness property that no events are emitted.
#[derive(Default)]
pub struct NullTracker;

impl Tracker for NullTracker {
    fn next_frame(&mut self) -> Vec<(String, (f64, f64, f64, f64))> {
        Vec::new()
    }
}

/// Ephemeral per-track state, garbage-collected when unseen for more than
/// [`TRACK_TTL_SECONDS`].
#[derive(Debug, Clone)]
struct PersonTrack {
    centroid: Point,
    prev_centroid: Point,
    last_seen: DateTime<Utc>,
    current_zones: HashSet<String>,
    zone_enter_ts: HashMap<String, DateTime<Utc>>,
    current_shelves: HashSet<String>,
    shelf_enter_ts: HashMap<String, DateTime<Utc>>,
    in_queue: bool,
    queue_id: Option<String>,
    queue_enter_ts: Option<DateTime<Utc>>,
    entrance_crossed: bool,
}

impl PersonTrack {
    fn new(centroid: Point, now: DateTime<Utc>) -> Self {
        Self {
            centroid,
            prev_centroid: centroid,
            last_seen: now,
            current_zones: HashSet::new(),
            zone_enter_ts: HashMap::new(),
            current_shelves: HashSet::new(),
            shelf_enter_ts: HashMap::new(),
            in_queue: false,
            queue_id: None,
            queue_enter_ts: None,
            entrance_crossed: false,
        }
    }
}

/// Track unseen for longer than this is dropped; any open zone/shelf/queue
/// intervals it held are discarded without emission.
pub const TRACK_TTL_SECONDS: i64 = 10;

/// Per-camera capability state machine. Owns the `PersonTrack` table for one
/// camera; no cross-camera or cross-worker sharing.
pub struct CapabilityDetector {
    camera: Camera,
    org_id: String,
    tracks: HashMap<String, PersonTrack>,
}

impl CapabilityDetector {
    pub fn new(camera: Camera, org_id: impl Into<String>) -> Self {
        Self { camera, org_id: org_id.into(), tracks: HashMap::new() }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera.camera_id
    }

    /// Process one frame of tracker observations, returning any events the
    /// frame completed. Detector errors (a malformed bbox, say) skip that
    /// track for the frame rather than aborting the whole call — per the
    /// edge error-propagation policy, a bad frame must not take the worker down.
    pub fn observe(&mut self, frame: &[(String, (f64, f64, f64, f64))], now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();

        for (track_id, bbox) in frame {
            if !bbox.0.is_finite() || !bbox.1.is_finite() || !bbox.2.is_finite() || !bbox.3.is_finite() {
                continue;
            }
            let centroid = geometry::bbox_centroid(*bbox);
            let track = self.tracks.entry(track_id.clone()).or_insert_with(|| PersonTrack::new(centroid, now));
            track.prev_centroid = track.centroid;
            track.centroid = centroid;
            track.last_seen = now;

            let person_id = format!("{}_t{}", self.camera.camera_id, track_id);

            if self.camera.capabilities.contains(&crate::model::Capability::Entrance) {
                if let Some(event) = Self::process_entrance(&self.camera, &self.org_id, track, track_id, &person_id, now) {
                    events.push(event);
                }
            }
            if self.camera.capabilities.contains(&crate::model::Capability::Zones) {
                events.extend(Self::process_zones(&self.camera, &self.org_id, track, track_id, &person_id, now));
            }
            if self.camera.capabilities.contains(&crate::model::Capability::Shelves) {
                events.extend(Self::process_shelves(&self.camera, &self.org_id, track, track_id, &person_id, now));
            }
            if self.camera.capabilities.contains(&crate::model::Capability::Queue) {
                if let Some(event) = Self::process_queue(&self.camera, &self.org_id, track, track_id, &person_id, now) {
                    events.push(event);
                }
            }
        }

        self.gc(now);
        events
    }

    fn process_entrance(camera: &Camera, org_id: &str, track: &mut PersonTrack, track_id: &str, person_id: &str, now: DateTime<Utc>) -> Option<Event> {
        let [p1, p2] = camera.geometry.entrance?;
        let p1 = (p1.0 as f64, p1.1 as f64);
        let p2 = (p2.0 as f64, p2.1 as f64);

        if track.entrance_crossed {
            return None;
        }
        if !geometry::line_crossing(track.prev_centroid, track.centroid, p1, p2) {
            return None;
        }
        let direction = geometry::crossing_direction(track.prev_centroid, track.centroid, p1, p2);
        track.entrance_crossed = true;
        let direction = if direction == "in" { Direction::In } else { Direction::Out };
        Some(Event::new(camera.camera_id.clone(), org_id.to_string(), camera.store_id.clone(), track_id, now, EventPayload::Entrance { direction, person_id: person_id.to_string() }))
    }

    fn process_zones(camera: &Camera, org_id: &str, track: &mut PersonTrack, track_id: &str, person_id: &str, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        if camera.geometry.zones.is_empty() {
            return events;
        }

        let current_zones: HashSet<String> = camera
            .geometry
            .zones
            .iter()
            .filter(|(_, poly)| point_in_poly(track.centroid, poly))
            .map(|(id, _)| id.clone())
            .collect();

        for zone_id in current_zones.difference(&track.current_zones) {
            track.zone_enter_ts.insert(zone_id.clone(), now);
        }

        let left: Vec<String> = track.current_zones.difference(&current_zones).cloned().collect();
        for zone_id in left {
            if let Some(enter_ts) = track.zone_enter_ts.remove(&zone_id) {
                let dwell = (now - enter_ts).num_milliseconds() as f64 / 1000.0;
                if dwell >= geometry::MIN_DWELL_SECONDS {
                    events.push(Event::new(
                        camera.camera_id.clone(),
                        org_id.to_string(),
                        camera.store_id.clone(),
                        track_id,
                        now,
                        EventPayload::ZoneDwell { logical_zone: zone_id, dwell_seconds: round2(dwell), person_id: person_id.to_string() },
                    ));
                }
            }
        }

        track.current_zones = current_zones;
        events
    }

    fn process_shelves(camera: &Camera, org_id: &str, track: &mut PersonTrack, track_id: &str, person_id: &str, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        if camera.geometry.shelves.is_empty() {
            return events;
        }

        let current_shelves: HashSet<String> = camera
            .geometry
            .shelves
            .iter()
            .filter(|(_, poly)| point_in_poly(track.centroid, poly))
            .map(|(id, _)| id.clone())
            .collect();

        for shelf_id in current_shelves.difference(&track.current_shelves) {
            track.shelf_enter_ts.insert(shelf_id.clone(), now);
        }

        let left: Vec<String> = track.current_shelves.difference(&current_shelves).cloned().collect();
        for shelf_id in left {
            if let Some(enter_ts) = track.shelf_enter_ts.remove(&shelf_id) {
                let dwell = (now - enter_ts).num_milliseconds() as f64 / 1000.0;
                if dwell >= geometry::MIN_DWELL_SECONDS {
                    events.push(Event::new(
                        camera.camera_id.clone(),
                        org_id.to_string(),
                        camera.store_id.clone(),
                        track_id,
                        now,
                        EventPayload::ShelfInteraction { logical_shelf: shelf_id, action: ShelfAction::Touch, dwell_seconds: round2(dwell), person_id: person_id.to_string() },
                    ));
                }
            }
        }

        track.current_shelves = current_shelves;
        events
    }

    fn process_queue(camera: &Camera, org_id: &str, track: &mut PersonTrack, track_id: &str, person_id: &str, now: DateTime<Utc>) -> Option<Event> {
        if camera.geometry.queue.is_empty() {
            return None;
        }

        // Single-membership: first polygon (in map iteration order) wins.
        let hit = camera.geometry.queue.iter().find(|(_, poly)| point_in_poly(track.centroid, poly));

        match (hit, track.in_queue) {
            (Some((queue_id, _)), false) => {
                track.in_queue = true;
                track.queue_id = Some(queue_id.clone());
                track.queue_enter_ts = Some(now);
                None
            }
            (None, true) => {
                let event = if let (Some(enter_ts), Some(queue_id)) = (track.queue_enter_ts, track.queue_id.clone()) {
                    let wait = (now - enter_ts).num_milliseconds() as f64 / 1000.0;
                    Some(Event::new(
                        camera.camera_id.clone(),
                        org_id.to_string(),
                        camera.store_id.clone(),
                        track_id,
                        now,
                        EventPayload::QueuePresence { queue: queue_id, wait_seconds: round2(wait), person_id: person_id.to_string() },
                    ))
                } else {
                    None
                };
                track.in_queue = false;
                track.queue_id = None;
                track.queue_enter_ts = None;
                event
            }
            _ => None,
        }
    }

    /// Drop tracks unseen for more than [`TRACK_TTL_SECONDS`]; any open
    /// interval they held is discarded without emission.
    fn gc(&mut self, now: DateTime<Utc>) {
        self.tracks.retain(|_, track| (now - track.last_seen).num_seconds() <= TRACK_TTL_SECONDS);
    }

    /// Current number of live tracks — exposed for live-snapshot style callers.
    pub fn active_track_count(&self) -> usize {
        self.tracks.len()
    }
}

fn point_in_poly(centroid: Point, poly: &[(i32, i32)]) -> bool {
    let poly_f: Vec<Point> = poly.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
    geometry::point_in_polygon(centroid, &poly_f)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Camera, CameraGeometry, Capability};
    use std::collections::HashSet;

    fn entrance_camera() -> Camera {
        let mut caps = HashSet::new();
        caps.insert(Capability::Entrance);
        Camera {
            camera_id: "cam-1".into(),
            store_id: "store-1".into(),
            is_entrance: true,
            capabilities: caps,
            geometry: CameraGeometry { entrance: Some([(0, 0), (0, 10)]), ..Default::default() },
        }
    }

    fn zone_camera() -> Camera {
        let mut caps = HashSet::new();
        caps.insert(Capability::Zones);
        let mut zones = HashMap::new();
        zones.insert("electronics".to_string(), vec![(0, 0), (10, 0), (10, 10), (0, 10)]);
        Camera {
            camera_id: "cam-2".into(),
            store_id: "store-1".into(),
            is_entrance: false,
            capabilities: caps,
            geometry: CameraGeometry { zones, ..Default::default() },
        }
    }

    #[test]
    fn entrance_crossing_emits_once_per_track() {
        let mut detector = CapabilityDetector::new(entrance_camera(), "org-1");
        let t0 = Utc::now();
        // bbox centroid at x=-5 then x=5 crosses the vertical line x=0.
        let frame1 = vec![("1".to_string(), (-6.0, 4.0, -4.0, 12.0))];
        let frame2 = vec![("1".to_string(), (4.0, 4.0, 6.0, 12.0))];

        let events1 = detector.observe(&frame1, t0);
        assert!(events1.is_empty());
        let events2 = detector.observe(&frame2, t0 + chrono::Duration::milliseconds(100));
        assert_eq!(events2.len(), 1);

        // A second crossing of the same already-crossed track emits nothing.
        let frame3 = vec![("1".to_string(), (-6.0, 4.0, -4.0, 12.0))];
        let events3 = detector.observe(&frame3, t0 + chrono::Duration::milliseconds(200));
        assert!(events3.is_empty());
    }

    #[test]
    fn zone_dwell_below_threshold_is_discarded() {
        let mut detector = CapabilityDetector::new(zone_camera(), "org-1");
        let t0 = Utc::now();
        let inside = vec![("1".to_string(), (2.0, 6.0, 4.0, 14.0))];
        detector.observe(&inside, t0);
        let outside = vec![("1".to_string(), (200.0, 6.0, 204.0, 14.0))];
        let events = detector.observe(&outside, t0 + chrono::Duration::milliseconds(500));
        assert!(events.is_empty(), "dwell under 4s must not emit a zone_dwell event");
    }

    #[test]
    fn zone_dwell_meeting_threshold_emits() {
        let mut detector = CapabilityDetector::new(zone_camera(), "org-1");
        let t0 = Utc::now();
        let inside = vec![("1".to_string(), (2.0, 6.0, 4.0, 14.0))];
        detector.observe(&inside, t0);
        let outside = vec![("1".to_string(), (200.0, 6.0, 204.0, 14.0))];
        let events = detector.observe(&outside, t0 + chrono::Duration::seconds(5));
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::ZoneDwell { dwell_seconds, .. } => assert!(*dwell_seconds >= 4.0),
            _ => panic!("expected zone_dwell"),
        }
    }

    #[test]
    fn track_gc_drops_open_intervals_without_emitting() {
        let mut detector = CapabilityDetector::new(zone_camera(), "org-1");
        let t0 = Utc::now();
        let inside = vec![("1".to_string(), (2.0, 6.0, 4.0, 14.0))];
        detector.observe(&inside, t0);
        // No further frames for this track for > TRACK_TTL_SECONDS.
        let events = detector.observe(&[], t0 + chrono::Duration::seconds(11));
        assert!(events.is_empty());
        assert_eq!(detector.active_track_count(), 0);
    }
}
