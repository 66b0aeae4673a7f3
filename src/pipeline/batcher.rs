//! Batches individual events off the bounded channel and flushes them
//! through the [`Dispatcher`], spilling to the [`Spool`] on failure and
//! opportunistically draining it back out once the cloud is reachable again.
//!
//! Grounded on `original_source/edge_runtime_v2.py`'s `EventFlusher`: flush at
//! `BATCH_SECONDS` elapsed or `MAX_BATCH` events, whichever comes first.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::model::Event;
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::spool::Spool;

#[derive(Serialize)]
struct EventsBulkRequest<'a> {
    events: &'a [Event],
}

/// Runs until `shutdown` is signalled, then flushes whatever remains in the
/// buffer before returning — callers await this to know the pipeline has
/// quiesced.
pub async fn run(mut rx: mpsc::Receiver<Event>, dispatcher: Dispatcher, spool: Spool, batch: BatchConfig, mut shutdown: watch::Receiver<bool>) {
    let mut buffer: Vec<Event> = Vec::with_capacity(batch.max_batch);
    let mut interval = tokio::time::interval(std::time::Duration::from_secs_f64(batch.batch_seconds));
    interval.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        buffer.push(event);
                        if buffer.len() >= batch.max_batch {
                            flush(&dispatcher, &spool, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&dispatcher, &spool, &mut buffer).await;
                        drain_spool(&dispatcher, &spool, batch.spool_drain_limit).await;
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                if !buffer.is_empty() {
                    flush(&dispatcher, &spool, &mut buffer).await;
                }
                drain_spool(&dispatcher, &spool, batch.spool_drain_limit).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    flush(&dispatcher, &spool, &mut buffer).await;
                    drain_spool(&dispatcher, &spool, batch.spool_drain_limit).await;
                    return;
                }
            }
        }
    }
}

async fn flush(dispatcher: &Dispatcher, spool: &Spool, buffer: &mut Vec<Event>) {
    if buffer.is_empty() {
        return;
    }
    let batch: Vec<Event> = std::mem::take(buffer);
    match dispatcher.post_with_retry("/v1/events/bulk", &EventsBulkRequest { events: &batch }).await {
        Ok(true) => info!(count = batch.len(), "flushed event batch"),
        Ok(false) => {
            warn!(count = batch.len(), "dispatch exhausted retries, spooling batch to disk");
            if let Err(e) = spool.enqueue(&batch) {
                warn!(error = %e, "failed to spool undelivered batch");
            }
        }
        Err(e) => {
            warn!(error = %e, "dispatcher error building request, spooling batch to disk");
            if let Err(e) = spool.enqueue(&batch) {
                warn!(error = %e, "failed to spool undelivered batch");
            }
        }
    }
}

/// Opportunistic drain: pull up to `limit` spooled events and retry sending
/// them. Anything that still fails goes straight back to the spool rather
/// than being lost.
async fn drain_spool(dispatcher: &Dispatcher, spool: &Spool, limit: usize) {
    let drained = match spool.drain(limit) {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => return,
        Err(e) => {
            warn!(error = %e, "spool drain failed");
            return;
        }
    };
    match dispatcher.post_with_retry("/v1/events/bulk", &EventsBulkRequest { events: &drained }).await {
        Ok(true) => info!(count = drained.len(), "replayed spooled events"),
        _ => {
            if let Err(e) = spool.enqueue(&drained) {
                warn!(error = %e, "failed to re-spool events after a failed replay");
            }
        }
    }
}
