//! Edge runtime configuration: `config.yaml` on disk plus environment
//! overrides for everything operationally tunable, following the teacher's
//! `scrapers::binance_session::SessionConfig::from_env` pattern of a
//! `Default` impl with individual env-var overrides layered on top.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::model::{Camera, CameraGeometry, Capability};

/// Backoff schedule for the event dispatcher's retry loop: `delay_n = min(base
/// * multiplier^n, max)`, no jitter. Grounded on `scrapers::binance_session`'s
/// backoff fields, minus jitter — the edge dispatcher already spaces retries
/// out per-camera so a thundering herd across a single device isn't a concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_ms: 500, max_ms: 60_000, multiplier: 1.5, max_retries: 8 }
    }
}

impl BackoffConfig {
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let scaled = self.base_ms as f64 * self.multiplier.powi(attempt as i32);
        scaled.min(self.max_ms as f64) as u64
    }

    fn from_env(mut self) -> Self {
        if let Ok(v) = std::env::var("BACKOFF_BASE") {
            self.base_ms = v.parse::<f64>().map(|secs| (secs * 1000.0) as u64).unwrap_or(self.base_ms);
        }
        if let Ok(v) = std::env::var("BACKOFF_MAX") {
            self.max_ms = v.parse::<f64>().map(|secs| (secs * 1000.0) as u64).unwrap_or(self.max_ms);
        }
        self
    }
}

/// Batching policy for the event flusher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_seconds: f64,
    pub max_batch: usize,
    pub spool_drain_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_seconds: 2.0, max_batch: 500, spool_drain_limit: 2000 }
    }
}

impl BatchConfig {
    fn from_env(mut self) -> Self {
        if let Ok(v) = std::env::var("BATCH_SECONDS") {
            self.batch_seconds = v.parse().unwrap_or(self.batch_seconds);
        }
        if let Ok(v) = std::env::var("MAX_BATCH") {
            self.max_batch = v.parse().unwrap_or(self.max_batch);
        }
        self
    }
}

/// On-disk geometry for a single camera, as the operator's calibration tool
/// writes it. Coordinates are relative to `screenshot_size`; the loader
/// rescales them to each camera's live frame size with [`geometry::scale_polygon`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfigEntry {
    pub camera_id: String,
    pub store_id: String,
    #[serde(default)]
    pub is_entrance: bool,
    pub capabilities: Vec<Capability>,
    pub screenshot_size: (u32, u32),
    #[serde(default)]
    pub frame_size: Option<(u32, u32)>,
    #[serde(default)]
    pub entrance: Option<[(i32, i32); 2]>,
    #[serde(default)]
    pub zones: HashMap<String, Vec<(i32, i32)>>,
    #[serde(default)]
    pub shelves: HashMap<String, Vec<(i32, i32)>>,
    #[serde(default)]
    pub queue: HashMap<String, Vec<(i32, i32)>>,
}

/// Top-level `config.yaml` shape for one edge device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub org_id: String,
    pub cloud_url: String,
    pub edge_token: String,
    #[serde(default)]
    pub spool_path: Option<String>,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub cameras: Vec<CameraConfigEntry>,
}

impl EdgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading edge config at {}", path.display()))?;
        let mut config: EdgeConfig = serde_yaml::from_str(&raw).with_context(|| format!("parsing edge config at {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.backoff = std::mem::take(&mut self.backoff).from_env();
        self.batch = std::mem::take(&mut self.batch).from_env();
        if let Ok(v) = std::env::var("API_BASE") {
            self.cloud_url = v;
        }
        if let Ok(v) = std::env::var("EDGE_API_KEY") {
            self.edge_token = v;
        }
        if let Ok(v) = std::env::var("BUFFER_DIR") {
            self.spool_path = Some(v);
        }
        if let Ok(v) = std::env::var("ORG_ID") {
            self.org_id = v;
        }
        if let Ok(v) = std::env::var("STORE_ID") {
            for cam in &mut self.cameras {
                cam.store_id = v.clone();
            }
        }
    }

    /// Rejects degenerate operator-drawn polygons before a camera ever starts
    /// processing frames — an empty or collinear polygon would silently never
    /// match any centroid.
    fn validate(&self) -> Result<()> {
        for cam in &self.cameras {
            for (zone_id, poly) in cam.zones.iter().chain(cam.shelves.iter()).chain(cam.queue.iter()) {
                let poly_f: Vec<(f64, f64)> = poly.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
                if geometry::polygon_area(&poly_f) <= 0.0 {
                    anyhow::bail!("camera {} has a degenerate polygon for region {}", cam.camera_id, zone_id);
                }
            }
        }
        Ok(())
    }

    pub fn spool_path(&self) -> String {
        self.spool_path.clone().unwrap_or_else(|| "./spool.jsonl".to_string())
    }

    /// Build the runtime [`Camera`] model for each configured camera,
    /// rescaling calibrated geometry to the camera's live frame size.
    pub fn cameras(&self) -> Vec<Camera> {
        self.cameras.iter().map(CameraConfigEntry::to_camera).collect()
    }
}

impl CameraConfigEntry {
    fn to_camera(&self) -> Camera {
        let frame_size = self.frame_size.unwrap_or(self.screenshot_size);

        let entrance = self.entrance.map(|[a, b]| {
            let scaled = geometry::scale_polygon(&[a, b], self.screenshot_size, frame_size);
            [scaled[0], scaled[1]]
        });
        let rescale = |regions: &HashMap<String, Vec<(i32, i32)>>| -> HashMap<String, Vec<(i32, i32)>> {
            regions.iter().map(|(id, poly)| (id.clone(), geometry::scale_polygon(poly, self.screenshot_size, frame_size))).collect()
        };

        Camera {
            camera_id: self.camera_id.clone(),
            store_id: self.store_id.clone(),
            is_entrance: self.is_entrance,
            capabilities: self.capabilities.iter().copied().collect(),
            geometry: CameraGeometry { screenshot_size: frame_size, entrance, zones: rescale(&self.zones), shelves: rescale(&self.shelves), queue: rescale(&self.queue) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
org_id: org-1
cloud_url: "https://cloud.example.com"
edge_token: "secret-token"
cameras:
  - camera_id: cam-1
    store_id: store-1
    is_entrance: true
    capabilities: [entrance]
    screenshot_size: [1920, 1080]
    entrance: [[100, 0], [100, 1080]]
"#
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: EdgeConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.org_id, "org-1");
        assert_eq!(config.backoff.base_ms, 500);
        assert_eq!(config.batch.max_batch, 500);
        assert_eq!(config.cameras.len(), 1);
    }

    #[test]
    fn camera_geometry_rescales_to_frame_size() {
        let mut config: EdgeConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.cameras[0].frame_size = Some((960, 540));
        let cameras = config.cameras();
        let entrance = cameras[0].geometry.entrance.unwrap();
        assert_eq!(entrance[0], (50, 0));
        assert_eq!(entrance[1], (50, 539));
    }

    #[test]
    fn degenerate_polygon_fails_validation() {
        let mut config: EdgeConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.cameras[0].zones.insert("z1".to_string(), vec![(0, 0), (1, 1)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_delay_caps_at_max() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.delay_ms(0), 500);
        assert!(backoff.delay_ms(20) <= backoff.max_ms);
    }
}
