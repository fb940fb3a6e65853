//! Reader worker - pulls block tasks off the work queue and fills their
//! buffers from a privately owned container handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

use crate::error::SourceError;

use super::source::{BlockSource, SourceOpener};
use super::task::WorkItem;

/// Worker thread body. Runs until it pops a `Shutdown` sentinel or the work
/// queue disconnects (early teardown).
pub(crate) fn run_worker<O: SourceOpener>(
    worker_id: usize,
    opener: Arc<O>,
    work_rx: Receiver<WorkItem>,
    cancelled: Arc<AtomicBool>,
) {
    // Each worker opens its own handle; an open failure is not fatal here,
    // it surfaces on every task this worker would have serviced.
    let mut source = match opener.open() {
        Ok(source) => Ok(source),
        Err(error) => {
            warn!(worker_id, %error, "worker failed to open image");
            Err(error.to_string())
        }
    };

    while let Ok(item) = work_rx.recv() {
        let task = match item {
            WorkItem::Shutdown => break,
            WorkItem::Block(task) => task,
        };

        if cancelled.load(Ordering::Relaxed) {
            task.fail(SourceError::Read {
                offset: task.offset(),
                reason: "pipeline cancelled".to_string(),
            });
            continue;
        }

        match &mut source {
            Ok(source) => match source.read_at(task.offset(), task.length()) {
                Ok(buffer) => {
                    trace!(worker_id, offset = task.offset(), len = buffer.len(), "block read complete");
                    task.fill(buffer);
                }
                Err(error) => {
                    // Fatal to the pipeline; the delivery loop re-raises it
                    // at this block's position. No retries.
                    warn!(worker_id, offset = task.offset(), %error, "block read failed");
                    task.fail(error);
                }
            },
            Err(open_error) => task.fail(SourceError::Open(open_error.clone())),
        }
    }

    debug!(worker_id, "worker exiting");
}
