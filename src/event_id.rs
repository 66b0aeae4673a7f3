//! Deterministic event identity.
//!
//! `event_id = SHA256(camera_id "|" track_id "|" ts_iso "|" type "|" logical_key)`.
//! Two edge workers observing identical inputs produce identical ids, which is
//! what makes retries and duplicate flushes idempotent at the store layer.
//! Grounded on the HMAC/SHA256 usage already in `vault::execution` — this is
//! a plain digest rather than a MAC since there is no shared secret involved.

use sha2::{Digest, Sha256};

/// Compute the hex-encoded event id. `logical_key` is the direction/zone id/
/// shelf id/queue id and is the empty string when the event type carries none.
pub fn make_event_id(camera_id: &str, track_id: &str, ts_iso: &str, event_type: &str, logical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(camera_id.as_bytes());
    hasher.update(b"|");
    hasher.update(track_id.as_bytes());
    hasher.update(b"|");
    hasher.update(ts_iso.as_bytes());
    hasher.update(b"|");
    hasher.update(event_type.as_bytes());
    hasher.update(b"|");
    hasher.update(logical_key.as_bytes());
    hex::encode(hasher.finalize())
}
