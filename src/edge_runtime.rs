//! Edge supervisor: ties the capability detector, the outbound pipeline, and
//! the heartbeat loop together into one running device process.
//!
//! Grounded on `original_source/edge_runtime_v2.py`'s `main()`/`CameraWorker`/
//! `Heartbeat`, and on the teacher's `edge::receiver::EdgeReceiver` for the
//! "one config struct, one supervisor owning join handles" shape. Camera
//! workers here are `tokio::task::spawn` tasks rather than the teacher's raw
//! OS threads, since nothing in this pipeline binds a low-level socket off
//! the tokio runtime the way the teacher's UDP forwarder does.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::EdgeConfig;
use crate::detector::{CapabilityDetector, NullTracker, Tracker};
use crate::model::Camera;
use crate::pipeline::{self, Dispatcher, EventSender, PipelineHandle, Spool};

/// How often a camera worker polls its tracker for a new frame when no
/// external frame-rate source drives it.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(200);

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct HeartbeatRequest<'a> {
    org_id: &'a str,
    store_id: &'a str,
    camera_ids: &'a [String],
    ts: String,
}

pub struct EdgeSupervisor {
    config: EdgeConfig,
    pipeline: PipelineHandle,
    dispatcher: Dispatcher,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl EdgeSupervisor {
    pub fn bootstrap(config: EdgeConfig) -> anyhow::Result<Self> {
        let dispatcher = Dispatcher::new(config.cloud_url.clone(), &config.edge_token, config.backoff.clone())?;
        let spool = Spool::new(config.spool_path());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pipeline = pipeline::spawn(dispatcher.clone(), spool, config.batch.clone(), shutdown_rx.clone());
        Ok(Self { config, pipeline, dispatcher, shutdown_tx, shutdown_rx, worker_handles: Vec::new() })
    }

    /// Spawns one worker per configured camera using the given tracker
    /// factory, plus the heartbeat task. Generic over how a tracker is
    /// constructed per camera so tests can inject a [`crate::detector::ScriptedTracker`]
    /// while production cameras without a model installed fall back to
    /// [`NullTracker`].
    pub fn spawn_workers<F, T>(&mut self, tracker_factory: F)
    where
        F: Fn(&Camera) -> T,
        T: Tracker + Send + 'static,
    {
        let cameras = self.config.cameras();
        for camera in &cameras {
            let tracker = tracker_factory(camera);
            let handle = spawn_camera_worker(camera.clone(), self.config.org_id.clone(), tracker, self.pipeline.sender.clone(), self.shutdown_rx.clone());
            self.worker_handles.push(handle);
        }

        let camera_ids: Vec<String> = cameras.iter().map(|c| c.camera_id.clone()).collect();
        let heartbeat_handle = spawn_heartbeat(self.dispatcher.clone(), self.config.org_id.clone(), store_id_for(&cameras), camera_ids, self.shutdown_rx.clone());
        self.worker_handles.push(heartbeat_handle);
    }

    pub fn spawn_default_workers(&mut self) {
        self.spawn_workers(|_camera| NullTracker);
    }

    /// Signals shutdown, waits for camera workers and the heartbeat task to
    /// exit, then waits for the pipeline to flush its buffer and spool.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        self.pipeline.join().await;
    }
}

fn store_id_for(cameras: &[Camera]) -> String {
    cameras.first().map(|c| c.store_id.clone()).unwrap_or_default()
}

fn spawn_camera_worker<T>(camera: Camera, org_id: String, mut tracker: T, sender: EventSender, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()>
where
    T: Tracker + Send + 'static,
{
    tokio::task::spawn(async move {
        let camera_id = camera.camera_id.clone();
        let mut detector = CapabilityDetector::new(camera, org_id);
        let mut interval = tokio::time::interval(DEFAULT_FRAME_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let frame = tracker.next_frame();
                    let events = detector.observe(&frame, Utc::now());
                    for event in events {
                        if sender.send(event).await.is_err() {
                            warn!(camera_id = %camera_id, "pipeline channel closed, stopping worker");
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(camera_id = %camera_id, "camera worker shutting down");
                        return;
                    }
                }
            }
        }
    })
}

fn spawn_heartbeat(dispatcher: Dispatcher, org_id: String, store_id: String, camera_ids: Vec<String>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let req = HeartbeatRequest { org_id: &org_id, store_id: &store_id, camera_ids: &camera_ids, ts: Utc::now().to_rfc3339() };
                    if let Err(e) = dispatcher.post_with_retry("/v1/ingest/heartbeat", &req).await {
                        warn!(error = %e, "heartbeat dispatch failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedTracker;
    use crate::model::{Camera, CameraGeometry, Capability};
    use std::collections::HashSet;

    fn test_camera() -> Camera {
        let mut caps = HashSet::new();
        caps.insert(Capability::Entrance);
        Camera { camera_id: "cam-1".into(), store_id: "store-1".into(), is_entrance: true, capabilities: caps, geometry: CameraGeometry { entrance: Some([(0, 0), (0, 10)]), ..Default::default() } }
    }

    #[tokio::test]
    async fn camera_worker_forwards_detector_events_to_the_pipeline() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let sender = EventSender::from(tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let frames = vec![vec![("1".to_string(), (-6.0, 4.0, -4.0, 12.0))], vec![("1".to_string(), (4.0, 4.0, 6.0, 12.0))]];
        let tracker = ScriptedTracker::new(frames);
        let handle = spawn_camera_worker(test_camera(), "org-1".to_string(), tracker, sender, shutdown_rx);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.expect("worker should emit an event").expect("channel open");
        assert_eq!(event.camera_id, "cam-1");

        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }
}
