//! Analytics aggregation: footfall, zone/shelf/queue metrics, live snapshot,
//! peak hour, promo uplift, and spike detection.
//!
//! Grounded on `original_source/backend/src/analytics/multi_camera_aggregator.py`,
//! `promo_analyzer.py`, and `spike_detector.py`, translated from Postgres
//! JSONB operators to SQLite's `json_extract`. Percentile/mean/stddev follow
//! the teacher's `risk::VaRCalculator` sort-then-index idiom rather than
//! pulling in a stats crate for a handful of scalar reductions.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::EventStore;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HourlyFootfall {
    pub hour: DateTime<Utc>,
    pub footfall: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyFootfall {
    pub day: String,
    pub footfall: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ZoneMetric {
    pub unique_visitors: i64,
    pub avg_dwell: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ShelfMetric {
    pub interactions: i64,
    pub avg_dwell: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct QueueMetrics {
    pub avg_wait: f64,
    pub p90_wait: f64,
    pub total_events: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct LiveSnapshot {
    pub footfall_now: i64,
    pub per_zone_active: HashMap<String, i64>,
    pub queue_now: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeakHour {
    pub hour: Option<DateTime<Utc>>,
    pub footfall: i64,
}

/// A metric series selectable for promo uplift and spike detection, mirroring
/// `promo_analyzer.py::calculate_uplift`'s `metric` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Footfall,
    Interactions,
    ZoneDwell,
}

impl MetricKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "footfall" => Some(Self::Footfall),
            "interactions" => Some(Self::Interactions),
            "zone_dwell" | "zone_dwell_avg" => Some(Self::ZoneDwell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Footfall => "footfall",
            MetricKind::Interactions => "interactions",
            MetricKind::ZoneDwell => "zone_dwell",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromoUplift {
    pub metric: &'static str,
    pub promo_value: f64,
    pub baseline_value: f64,
    pub promo_daily: f64,
    pub baseline_daily: f64,
    pub uplift_percent: f64,
    pub baseline_undefined: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Spike {
    pub date: String,
    pub value: f64,
    pub z_score: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// One day's value for an arbitrary metric series, the common input shape
/// for [`detect_spikes`] regardless of which metric produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeriesPoint {
    pub day: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub footfall_by_hour: Vec<HourlyFootfall>,
    pub zone_metrics: HashMap<String, ZoneMetric>,
    pub shelf_metrics: HashMap<String, ShelfMetric>,
    pub queue_metrics: QueueMetrics,
    pub peak_hour: PeakHour,
    pub live: LiveSnapshot,
}

/// Hourly footfall from entrance cameras only: `direction='in'` and the
/// originating camera has `is_entrance=1`. Buckets are truncated-to-hour UTC
/// timestamps.
pub fn footfall_by_hour(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HourlyFootfall>> {
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m-%dT%H:00:00Z', e.ts) AS bucket, COUNT(*) AS footfall
             FROM events e JOIN cameras c ON e.camera_id = c.camera_id
             WHERE e.store_id = ?1 AND e.event_type = 'entrance'
               AND json_extract(e.payload_json, '$.direction') = 'in'
               AND c.is_entrance = 1
               AND e.ts BETWEEN ?2 AND ?3
             GROUP BY bucket ORDER BY bucket",
        )?;
        let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| {
            let bucket: String = row.get(0)?;
            let footfall: i64 = row.get(1)?;
            Ok((bucket, footfall))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (bucket, footfall) = row?;
            if let Ok(hour) = DateTime::parse_from_rfc3339(&bucket) {
                out.push(HourlyFootfall { hour: hour.with_timezone(&Utc), footfall });
            }
        }
        Ok(out)
    })
}

pub fn footfall_by_day(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DailyFootfall>> {
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DATE(e.ts) AS day, COUNT(*) AS footfall
             FROM events e JOIN cameras c ON e.camera_id = c.camera_id
             WHERE e.store_id = ?1 AND e.event_type = 'entrance'
               AND json_extract(e.payload_json, '$.direction') = 'in'
               AND c.is_entrance = 1
               AND e.ts BETWEEN ?2 AND ?3
             GROUP BY day ORDER BY day",
        )?;
        let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| Ok(DailyFootfall { day: row.get(0)?, footfall: row.get(1)? }))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    })
}

/// Unique-visitor dedup at `(camera_id, person_id, minute)` granularity, with
/// the same ≥4.0s anti-noise floor the detector already enforces before
/// emitting a zone_dwell event in the first place.
pub fn zone_metrics(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<HashMap<String, ZoneMetric>> {
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT json_extract(payload_json, '$.logical_zone') AS zone_id,
                    COUNT(DISTINCT camera_id || '_' || json_extract(payload_json, '$.person_id') || '_' || strftime('%Y-%m-%dT%H:%M:00Z', ts)) AS unique_visitors,
                    AVG(json_extract(payload_json, '$.dwell_seconds')) AS avg_dwell
             FROM events
             WHERE store_id = ?1 AND event_type = 'zone_dwell'
               AND json_extract(payload_json, '$.dwell_seconds') >= 4.0
               AND ts BETWEEN ?2 AND ?3
             GROUP BY zone_id ORDER BY zone_id",
        )?;
        let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| {
            let zone_id: Option<String> = row.get(0)?;
            let unique_visitors: i64 = row.get(1)?;
            let avg_dwell: Option<f64> = row.get(2)?;
            Ok((zone_id, unique_visitors, avg_dwell))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (zone_id, unique_visitors, avg_dwell) = row?;
            if let Some(zone_id) = zone_id {
                out.insert(zone_id, ZoneMetric { unique_visitors, avg_dwell: round2(avg_dwell.unwrap_or(0.0)) });
            }
        }
        Ok(out)
    })
}

pub fn shelf_metrics(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<HashMap<String, ShelfMetric>> {
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT json_extract(payload_json, '$.logical_shelf') AS shelf_id,
                    COUNT(*) AS interactions,
                    AVG(json_extract(payload_json, '$.dwell_seconds')) AS avg_dwell
             FROM events
             WHERE store_id = ?1 AND event_type = 'shelf_interaction'
               AND json_extract(payload_json, '$.action') = 'touch'
               AND json_extract(payload_json, '$.dwell_seconds') >= 4.0
               AND ts BETWEEN ?2 AND ?3
             GROUP BY shelf_id ORDER BY shelf_id",
        )?;
        let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| {
            let shelf_id: Option<String> = row.get(0)?;
            let interactions: i64 = row.get(1)?;
            let avg_dwell: Option<f64> = row.get(2)?;
            Ok((shelf_id, interactions, avg_dwell))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (shelf_id, interactions, avg_dwell) = row?;
            if let Some(shelf_id) = shelf_id {
                out.insert(shelf_id, ShelfMetric { interactions, avg_dwell: round2(avg_dwell.unwrap_or(0.0)) });
            }
        }
        Ok(out)
    })
}

pub fn queue_metrics(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<QueueMetrics> {
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT json_extract(payload_json, '$.wait_seconds') FROM events
             WHERE store_id = ?1 AND event_type = 'queue_presence' AND ts BETWEEN ?2 AND ?3
             ORDER BY json_extract(payload_json, '$.wait_seconds')",
        )?;
        let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| row.get::<_, f64>(0))?;
        let waits: Vec<f64> = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        if waits.is_empty() {
            return Ok(QueueMetrics::default());
        }
        Ok(QueueMetrics { avg_wait: round2(mean(&waits)), p90_wait: round2(p90(&waits)), total_events: waits.len() as i64 })
    })
}

/// Current activity within a trailing window (default 60s): footfall from
/// entrance cameras, per-zone active visitor counts, and queue occupancy —
/// all derived from recent-enough events rather than a separately tracked
/// live state table.
pub fn live_snapshot(store: &EventStore, store_id: &str, now: DateTime<Utc>, window_sec: i64) -> Result<LiveSnapshot> {
    let since = now - chrono::Duration::seconds(window_sec);
    store.with_connection(|conn| {
        let footfall: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events e JOIN cameras c ON e.camera_id = c.camera_id
             WHERE e.store_id = ?1 AND e.event_type = 'entrance'
               AND json_extract(e.payload_json, '$.direction') = 'in'
               AND c.is_entrance = 1 AND e.ts >= ?2",
            [store_id, &since.to_rfc3339()],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT json_extract(payload_json, '$.logical_zone'), COUNT(DISTINCT json_extract(payload_json, '$.person_id'))
             FROM events WHERE store_id = ?1 AND event_type = 'zone_dwell' AND ts >= ?2
             GROUP BY 1",
        )?;
        let zone_rows = stmt.query_map([store_id, &since.to_rfc3339()], |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?)))?;
        let mut per_zone_active = HashMap::new();
        for row in zone_rows {
            let (zone_id, count) = row?;
            if let Some(zone_id) = zone_id {
                per_zone_active.insert(zone_id, count);
            }
        }

        let queue_now: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT json_extract(payload_json, '$.person_id')) FROM events
             WHERE store_id = ?1 AND event_type = 'queue_presence' AND ts >= ?2",
            [store_id, &since.to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(LiveSnapshot { footfall_now: footfall, per_zone_active, queue_now })
    })
}

/// Argmax over hourly footfall; ties resolved to the earliest hour, matching
/// Python's `max()` which returns the first maximal element encountered.
pub fn peak_hour(hourly: &[HourlyFootfall]) -> PeakHour {
    // `Iterator::max_by_key` keeps the *last* maximal element on ties; fold
    // manually so the earliest hour wins instead.
    let peak = hourly.iter().fold(None::<&HourlyFootfall>, |best, candidate| match best {
        Some(b) if b.footfall >= candidate.footfall => Some(b),
        _ => Some(candidate),
    });
    match peak {
        Some(peak) => PeakHour { hour: Some(peak.hour), footfall: peak.footfall },
        None => PeakHour { hour: None, footfall: 0 },
    }
}

/// Count or average of one metric over `[from, to]`, matching each branch of
/// `promo_analyzer.py::calculate_uplift`: `footfall` counts entrance-in
/// events, `interactions` counts shelf_interaction events, `zone_dwell`
/// averages zone_dwell's `dwell_seconds`.
fn metric_value(conn: &rusqlite::Connection, store_id: &str, metric: MetricKind, from: &str, to: &str) -> Result<f64> {
    let value = match metric {
        MetricKind::Footfall => conn.query_row(
            "SELECT COUNT(*) FROM events WHERE store_id = ?1 AND event_type = 'entrance'
               AND json_extract(payload_json, '$.direction') = 'in' AND ts BETWEEN ?2 AND ?3",
            [store_id, from, to],
            |row| row.get::<_, i64>(0),
        )? as f64,
        MetricKind::Interactions => conn.query_row(
            "SELECT COUNT(*) FROM events WHERE store_id = ?1 AND event_type = 'shelf_interaction' AND ts BETWEEN ?2 AND ?3",
            [store_id, from, to],
            |row| row.get::<_, i64>(0),
        )? as f64,
        MetricKind::ZoneDwell => conn.query_row(
            "SELECT AVG(json_extract(payload_json, '$.dwell_seconds')) FROM events
               WHERE store_id = ?1 AND event_type = 'zone_dwell' AND ts BETWEEN ?2 AND ?3",
            [store_id, from, to],
            |row| row.get::<_, Option<f64>>(0),
        )?.unwrap_or(0.0),
    };
    Ok(value)
}

/// Uplift for a promo window against a trailing `baseline_days`-day baseline
/// ending the instant before the promo starts, for the requested `metric`.
/// `baseline_undefined` is set (and `uplift_percent` reported as 0) when the
/// baseline's daily rate is zero, since a percent-change against zero is
/// meaningless.
pub fn promo_uplift(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>, baseline_days: i64, metric: MetricKind) -> Result<PromoUplift> {
    let promo_duration_days = (to - from).num_seconds() as f64 / 86400.0;
    let baseline_start = from - chrono::Duration::days(baseline_days);
    let baseline_end = from - chrono::Duration::seconds(1);

    let (promo_value, baseline_value) = store.with_connection(|conn| {
        let promo = metric_value(conn, store_id, metric, &from.to_rfc3339(), &to.to_rfc3339())?;
        let baseline = metric_value(conn, store_id, metric, &baseline_start.to_rfc3339(), &baseline_end.to_rfc3339())?;
        Ok((promo, baseline))
    })?;

    let promo_daily = if promo_duration_days > 0.0 { promo_value / promo_duration_days } else { 0.0 };
    let baseline_daily = if baseline_days > 0 { baseline_value / baseline_days as f64 } else { 0.0 };

    let (uplift_percent, baseline_undefined) = if baseline_daily > 0.0 { (((promo_daily - baseline_daily) / baseline_daily) * 100.0, false) } else { (0.0, true) };

    Ok(PromoUplift {
        metric: metric.as_str(),
        promo_value: round2(promo_value),
        baseline_value: round2(baseline_value),
        promo_daily: round2(promo_daily),
        baseline_daily: round2(baseline_daily),
        uplift_percent: round2(uplift_percent),
        baseline_undefined,
    })
}

/// Daily bucketed series for the requested metric, the shared input to
/// [`detect_spikes`] regardless of which metric is being watched.
pub fn daily_series(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>, metric: MetricKind) -> Result<Vec<DailySeriesPoint>> {
    match metric {
        MetricKind::Footfall => Ok(footfall_by_day(store, store_id, from, to)?.into_iter().map(|d| DailySeriesPoint { day: d.day, value: d.footfall as f64 }).collect()),
        MetricKind::Interactions => store.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DATE(ts) AS day, COUNT(*) AS n FROM events
                 WHERE store_id = ?1 AND event_type = 'shelf_interaction' AND ts BETWEEN ?2 AND ?3
                 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| Ok(DailySeriesPoint { day: row.get(0)?, value: row.get::<_, i64>(1)? as f64 }))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        }),
        MetricKind::ZoneDwell => store.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DATE(ts) AS day, AVG(json_extract(payload_json, '$.dwell_seconds')) AS avg_dwell FROM events
                 WHERE store_id = ?1 AND event_type = 'zone_dwell' AND ts BETWEEN ?2 AND ?3
                 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt.query_map([store_id, &from.to_rfc3339(), &to.to_rfc3339()], |row| Ok(DailySeriesPoint { day: row.get(0)?, value: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0) }))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        }),
    }
}

/// Population-stddev z-score spike detection over a daily metric series.
/// Fewer than 3 buckets, or a constant series (σ=0), yields no spikes —
/// population stddev is used per an explicit override of the Python
/// original's sample stdev.
pub fn detect_spikes(daily: &[DailySeriesPoint], threshold_z: f64) -> Vec<Spike> {
    if daily.len() < 3 {
        return Vec::new();
    }
    let values: Vec<f64> = daily.iter().map(|d| d.value).collect();
    let mean_val = mean(&values);
    let stddev_val = population_stddev(&values, mean_val);
    if stddev_val == 0.0 {
        return Vec::new();
    }
    daily
        .iter()
        .zip(values.iter())
        .filter_map(|(day, &value)| {
            let z = (value - mean_val) / stddev_val;
            if z.abs() >= threshold_z {
                Some(Spike { date: day.day.clone(), value, z_score: round2(z), mean: round2(mean_val), stddev: round2(stddev_val) })
            } else {
                None
            }
        })
        .collect()
}

pub fn analytics_snapshot(store: &EventStore, store_id: &str, from: DateTime<Utc>, to: DateTime<Utc>, now: DateTime<Utc>) -> Result<AnalyticsSnapshot> {
    let footfall = footfall_by_hour(store, store_id, from, to)?;
    let peak = peak_hour(&footfall);
    Ok(AnalyticsSnapshot {
        zone_metrics: zone_metrics(store, store_id, from, to)?,
        shelf_metrics: shelf_metrics(store, store_id, from, to)?,
        queue_metrics: queue_metrics(store, store_id, from, to)?,
        live: live_snapshot(store, store_id, now, 60)?,
        peak_hour: peak,
        footfall_by_hour: footfall,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_stddev(values: &[f64], mean_val: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean_val).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Nearest-rank P90 over a pre-sorted series: `index = ceil(0.9 * n) - 1`.
fn p90(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = ((0.9 * n as f64).ceil() as usize).clamp(1, n);
    sorted[rank - 1]
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Camera, CameraGeometry, Capability, Direction, Event, EventPayload};
    use std::collections::HashSet;

    fn entrance_camera(camera_id: &str, store_id: &str) -> Camera {
        let mut caps = HashSet::new();
        caps.insert(Capability::Entrance);
        Camera { camera_id: camera_id.into(), store_id: store_id.into(), is_entrance: true, capabilities: caps, geometry: CameraGeometry::default() }
    }

    #[test]
    fn footfall_by_hour_counts_only_entrance_ins() {
        let store = EventStore::open_in_memory().unwrap();
        store.upsert_camera(&entrance_camera("cam-1", "store-1")).unwrap();
        let t0 = DateTime::parse_from_rfc3339("2026-07-28T10:05:00Z").unwrap().with_timezone(&Utc);
        let ev_in = Event::new("cam-1", "org-1", "store-1", "1", t0, EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() });
        let ev_out = Event::new("cam-1", "org-1", "store-1", "2", t0, EventPayload::Entrance { direction: Direction::Out, person_id: "p2".into() });
        store.insert_events(&[ev_in, ev_out]).unwrap();

        let from = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2026-07-29T00:00:00Z").unwrap().with_timezone(&Utc);
        let hourly = footfall_by_hour(&store, "store-1", from, to).unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].footfall, 1);
    }

    #[test]
    fn constant_series_has_no_spikes() {
        let daily = vec![
            DailySeriesPoint { day: "2026-07-20".into(), value: 100.0 },
            DailySeriesPoint { day: "2026-07-21".into(), value: 100.0 },
            DailySeriesPoint { day: "2026-07-22".into(), value: 100.0 },
        ];
        assert!(detect_spikes(&daily, 2.0).is_empty());
    }

    #[test]
    fn fewer_than_three_buckets_has_no_spikes() {
        let daily = vec![DailySeriesPoint { day: "2026-07-20".into(), value: 500.0 }, DailySeriesPoint { day: "2026-07-21".into(), value: 10.0 }];
        assert!(detect_spikes(&daily, 2.0).is_empty());
    }

    #[test]
    fn outlier_day_is_flagged() {
        let daily = vec![
            DailySeriesPoint { day: "2026-07-20".into(), value: 100.0 },
            DailySeriesPoint { day: "2026-07-21".into(), value: 105.0 },
            DailySeriesPoint { day: "2026-07-22".into(), value: 98.0 },
            DailySeriesPoint { day: "2026-07-23".into(), value: 600.0 },
        ];
        let spikes = detect_spikes(&daily, 2.0);
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].date, "2026-07-23");
    }

    #[test]
    fn peak_hour_ties_resolve_to_earliest() {
        let t1 = DateTime::parse_from_rfc3339("2026-07-28T09:00:00Z").unwrap().with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2026-07-28T10:00:00Z").unwrap().with_timezone(&Utc);
        let hourly = vec![HourlyFootfall { hour: t1, footfall: 50 }, HourlyFootfall { hour: t2, footfall: 50 }];
        let peak = peak_hour(&hourly);
        assert_eq!(peak.hour, Some(t1));
    }

    #[test]
    fn p90_matches_nearest_rank() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(p90(&sorted), 9.0);
    }

    #[test]
    fn promo_uplift_reports_undefined_baseline_as_zero() {
        let store = EventStore::open_in_memory().unwrap();
        let from = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2026-07-29T00:00:00Z").unwrap().with_timezone(&Utc);
        let uplift = promo_uplift(&store, "store-1", from, to, 14, MetricKind::Footfall).unwrap();
        assert!(uplift.baseline_undefined);
        assert_eq!(uplift.uplift_percent, 0.0);
    }

    /// 7-day baseline with 20 shelf-interaction events, 7-day promo window
    /// with 35, over a matching 7-day baseline_days window.
    #[test]
    fn promo_uplift_interactions_matches_documented_scenario() {
        let store = EventStore::open_in_memory().unwrap();
        let promo_from = DateTime::parse_from_rfc3339("2026-07-21T00:00:00Z").unwrap().with_timezone(&Utc);
        let promo_to = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&Utc);
        let baseline_from = DateTime::parse_from_rfc3339("2026-07-14T00:00:00Z").unwrap().with_timezone(&Utc);

        let mut events = Vec::new();
        for i in 0..20 {
            let ts = baseline_from + chrono::Duration::hours(i * 6);
            events.push(Event::new(
                "cam-1",
                "org-1",
                "store-1",
                &format!("b{i}"),
                ts,
                EventPayload::ShelfInteraction { logical_shelf: "shelf_snacks".into(), action: crate::model::ShelfAction::Touch, dwell_seconds: 3.0, person_id: format!("p{i}") },
            ));
        }
        for i in 0..35 {
            let ts = promo_from + chrono::Duration::hours(i * 4);
            events.push(Event::new(
                "cam-1",
                "org-1",
                "store-1",
                &format!("p{i}"),
                ts,
                EventPayload::ShelfInteraction { logical_shelf: "shelf_snacks".into(), action: crate::model::ShelfAction::Touch, dwell_seconds: 3.0, person_id: format!("q{i}") },
            ));
        }
        store.insert_events(&events).unwrap();

        let uplift = promo_uplift(&store, "store-1", promo_from, promo_to, 7, MetricKind::Interactions).unwrap();
        assert_eq!(uplift.metric, "interactions");
        assert!((uplift.uplift_percent - 75.0).abs() < 0.5, "expected ~75.0, got {}", uplift.uplift_percent);
    }
}
