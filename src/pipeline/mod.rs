//! Outbound event pipeline: bounded channel -> batcher -> dispatcher, with
//! disk-spool fallback. One pipeline instance serves every camera worker on
//! a device; producers share a single [`EventSender`] clone each.

pub mod batcher;
pub mod dispatcher;
pub mod spool;

use tokio::sync::{mpsc, watch};

use crate::config::BatchConfig;
use crate::model::Event;

pub use dispatcher::Dispatcher;
pub use spool::Spool;

/// Minimum channel capacity: generous enough that a momentary cloud outage
/// doesn't force camera workers to block before the spool even engages.
pub const CHANNEL_CAPACITY: usize = 10_000;

#[derive(Clone)]
pub struct EventSender(mpsc::Sender<Event>);

impl From<mpsc::Sender<Event>> for EventSender {
    fn from(tx: mpsc::Sender<Event>) -> Self {
        Self(tx)
    }
}

impl EventSender {
    /// Cooperative backpressure: blocks the caller when the channel is full
    /// rather than dropping the event. A dropped event is a correctness bug,
    /// not an acceptable degradation.
    pub async fn send(&self, event: Event) -> Result<(), Event> {
        self.0.send(event).await.map_err(|e| e.0)
    }
}

pub struct PipelineHandle {
    pub sender: EventSender,
    join_handle: tokio::task::JoinHandle<()>,
}

impl PipelineHandle {
    pub async fn join(self) {
        let _ = self.join_handle.await;
    }
}

/// Spawns the batcher task and returns a cloneable sender for camera workers
/// to push events onto, plus a handle to await at shutdown.
pub fn spawn(dispatcher: Dispatcher, spool: Spool, batch: BatchConfig, shutdown: watch::Receiver<bool>) -> PipelineHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let join_handle = tokio::task::spawn(batcher::run(rx, dispatcher, spool, batch, shutdown));
    PipelineHandle { sender: tx.into(), join_handle }
}
