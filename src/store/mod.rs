//! Cloud-side persistence: tenancy tables, edge credentials, and the
//! idempotent event store. Single `Arc<Mutex<Connection>>` behind one struct,
//! following `signals::db_storage::DbSignalStorage` — WAL mode lets readers
//! (the query API) run concurrently with the ingestion writer.

mod schema;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{info, warn};

use crate::model::{Camera, CameraGeometry, EdgeCredential, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Clone)]
pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
}

impl EventStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags).with_context(|| format!("opening event store at {db_path}"))?;
        conn.execute_batch(schema::SCHEMA_SQL).context("initializing event store schema")?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }
        info!("event store opened at {}", db_path);

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory store for tests — never persisted, never shared across processes.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory event store")?;
        conn.execute_batch(schema::SCHEMA_SQL).context("initializing in-memory event store schema")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn upsert_org(&self, org_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO orgs (org_id, name) VALUES (?1, ?2) ON CONFLICT(org_id) DO UPDATE SET name = excluded.name", params![org_id, name])?;
        Ok(())
    }

    pub fn upsert_store(&self, store_id: &str, org_id: &str, timezone: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO stores (store_id, org_id, timezone) VALUES (?1, ?2, ?3)
             ON CONFLICT(store_id) DO UPDATE SET org_id = excluded.org_id, timezone = excluded.timezone",
            params![store_id, org_id, timezone],
        )?;
        Ok(())
    }

    pub fn upsert_camera(&self, camera: &Camera) -> Result<()> {
        let conn = self.conn.lock();
        let capabilities_json = serde_json::to_string(&camera.capabilities)?;
        let geometry_json = serde_json::to_string(&camera.geometry)?;
        conn.execute(
            "INSERT INTO cameras (camera_id, store_id, is_entrance, capabilities_json, geometry_json) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(camera_id) DO UPDATE SET store_id = excluded.store_id, is_entrance = excluded.is_entrance,
                capabilities_json = excluded.capabilities_json, geometry_json = excluded.geometry_json",
            params![camera.camera_id, camera.store_id, camera.is_entrance, capabilities_json, geometry_json],
        )?;
        Ok(())
    }

    pub fn get_camera(&self, camera_id: &str) -> Result<Option<Camera>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT camera_id, store_id, is_entrance, capabilities_json, geometry_json FROM cameras WHERE camera_id = ?1",
            params![camera_id],
            |row| {
                let capabilities_json: String = row.get(3)?;
                let geometry_json: String = row.get(4)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?, capabilities_json, geometry_json))
            },
        );
        match row {
            Ok((camera_id, store_id, is_entrance, capabilities_json, geometry_json)) => {
                let capabilities = serde_json::from_str(&capabilities_json)?;
                let geometry: CameraGeometry = serde_json::from_str(&geometry_json)?;
                Ok(Some(Camera { camera_id, store_id, is_entrance, capabilities, geometry }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn upsert_edge_credential(&self, cred: &EdgeCredential) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO edge_credentials (token, org_id, store_id, camera_id, active) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(token) DO UPDATE SET org_id = excluded.org_id, store_id = excluded.store_id,
                camera_id = excluded.camera_id, active = excluded.active",
            params![cred.token, cred.org_id, cred.store_id, cred.camera_id, cred.active],
        )?;
        Ok(())
    }

    pub fn find_edge_credential(&self, token: &str) -> Result<Option<EdgeCredential>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT token, org_id, store_id, camera_id, active FROM edge_credentials WHERE token = ?1 AND active = 1",
            params![token],
            |row| Ok(EdgeCredential { token: row.get(0)?, org_id: row.get(1)?, store_id: row.get(2)?, camera_id: row.get(3)?, active: row.get(4)? }),
        );
        match row {
            Ok(cred) => Ok(Some(cred)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent bulk insert: `event_id` is the primary key, so a retried
    /// batch that includes already-stored events quietly no-ops on those
    /// rows instead of erroring.
    pub fn insert_events(&self, events: &[Event]) -> Result<IngestOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        let mut duplicates = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO events (event_id, org_id, store_id, camera_id, ts, event_type, payload_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for event in events {
                let payload_json = serde_json::to_string(&event.payload)?;
                let changed = stmt.execute(params![
                    event.event_id,
                    event.org_id,
                    event.store_id,
                    event.camera_id,
                    event.ts.to_rfc3339(),
                    event.payload.type_str(),
                    payload_json
                ])?;
                if changed == 1 {
                    inserted += 1;
                } else {
                    duplicates += 1;
                }
            }
        }
        tx.commit()?;
        Ok(IngestOutcome { inserted, duplicates })
    }

    pub fn record_heartbeat(&self, camera_id: &str, store_id: &str, now: DateTime<Utc>, queue_depth: usize) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO edge_heartbeats (camera_id, store_id, last_seen, queue_depth) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(camera_id) DO UPDATE SET last_seen = excluded.last_seen, queue_depth = excluded.queue_depth",
            params![camera_id, store_id, now.to_rfc3339(), queue_depth as i64],
        )?;
        Ok(())
    }

    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, EventPayload};

    fn sample_event(event_id: &str) -> Event {
        Event { event_id: event_id.to_string(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: "cam-1".into(), ts: Utc::now(), payload: EventPayload::Entrance { direction: Direction::In, person_id: "p1".into() } }
    }

    #[test]
    fn duplicate_event_ids_are_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        let event = sample_event("abc123");
        let first = store.insert_events(&[event.clone()]).unwrap();
        assert_eq!(first, IngestOutcome { inserted: 1, duplicates: 0 });
        let second = store.insert_events(&[event]).unwrap();
        assert_eq!(second, IngestOutcome { inserted: 0, duplicates: 1 });
    }

    #[test]
    fn edge_credential_roundtrips() {
        let store = EventStore::open_in_memory().unwrap();
        let cred = EdgeCredential { token: "tok-1".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: true };
        store.upsert_edge_credential(&cred).unwrap();
        let found = store.find_edge_credential("tok-1").unwrap().unwrap();
        assert_eq!(found.org_id, "org-1");
    }

    #[test]
    fn inactive_credential_is_not_returned() {
        let store = EventStore::open_in_memory().unwrap();
        let cred = EdgeCredential { token: "tok-2".into(), org_id: "org-1".into(), store_id: "store-1".into(), camera_id: None, active: false };
        store.upsert_edge_credential(&cred).unwrap();
        assert!(store.find_edge_credential("tok-2").unwrap().is_none());
    }
}
