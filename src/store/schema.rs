//! Cloud-side SQLite schema: tenancy tables plus the append-only event store.
//!
//! WAL + covering indexes follow `signals::db_storage::SCHEMA_SQL`. SQLite has
//! no native JSON-path index type, so the "index on payload fields" the
//! query layer needs is built instead from expression indexes over
//! `json_extract(payload, ...)` — the resolution recorded for the dropped
//! JSONB-path-index idea.
//!
//! `orgs`/`stores` are provisioning records (seeded by whatever onboards a
//! tenant, not by the ingestion or detector paths) and are not wired up to
//! any caller yet, so `cameras`/`edge_credentials` don't enforce foreign
//! keys against them: a camera or credential can be upserted the moment a
//! device is configured, ahead of any admin-side org/store provisioning.

pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS orgs (
    org_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS stores (
    store_id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    timezone TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_stores_org ON stores(org_id);

CREATE TABLE IF NOT EXISTS cameras (
    camera_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    is_entrance INTEGER NOT NULL,
    capabilities_json TEXT NOT NULL,
    geometry_json TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_cameras_store ON cameras(store_id);

CREATE TABLE IF NOT EXISTS edge_credentials (
    token TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    store_id TEXT NOT NULL,
    camera_id TEXT,
    active INTEGER NOT NULL DEFAULT 1
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_edge_credentials_store ON edge_credentials(store_id);

CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    store_id TEXT NOT NULL,
    camera_id TEXT NOT NULL,
    ts TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    received_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_events_store_ts ON events(store_id, ts DESC);
CREATE INDEX IF NOT EXISTS idx_events_camera_ts ON events(camera_id, ts DESC);
CREATE INDEX IF NOT EXISTS idx_events_type_ts ON events(event_type, ts DESC);

-- Expression indexes over frequently-filtered payload fields, in place of a
-- native JSON-path index type SQLite doesn't have.
CREATE INDEX IF NOT EXISTS idx_events_zone
    ON events(json_extract(payload_json, '$.logical_zone'), ts DESC)
    WHERE event_type = 'zone_dwell';

CREATE INDEX IF NOT EXISTS idx_events_shelf
    ON events(json_extract(payload_json, '$.logical_shelf'), ts DESC)
    WHERE event_type = 'shelf_interaction';

CREATE INDEX IF NOT EXISTS idx_events_queue
    ON events(json_extract(payload_json, '$.queue'), ts DESC)
    WHERE event_type = 'queue_presence';

CREATE TABLE IF NOT EXISTS edge_heartbeats (
    camera_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    queue_depth INTEGER NOT NULL DEFAULT 0
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_edge_heartbeats_store ON edge_heartbeats(store_id);
"#;
