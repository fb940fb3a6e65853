//! Block task - one unit of read work shared between a worker and the
//! delivery loop.
//!
//! A task is created by the producer, filled (or failed) exactly once by
//! exactly one worker, and consumed exactly once by the delivery loop. The
//! buffer travels worker -> delivery loop -> caller by ownership transfer.

use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::SourceError;

/// Item carried by the work queue. The sentinel is an explicit variant so
/// every dequeue site has to handle it.
pub(crate) enum WorkItem {
    Block(Arc<BlockTask>),
    Shutdown,
}

/// Item carried by the delivery queue, in strict offset order.
pub(crate) enum DeliveryItem {
    Block(Arc<BlockTask>),
    End,
}

enum SlotState {
    /// No worker has finished this block yet.
    Pending,
    /// Block bytes ready for delivery.
    Filled(Vec<u8>),
    /// The read failed; the pipeline re-raises this at the block's position.
    Failed(SourceError),
    /// Buffer already handed to the caller.
    Taken,
}

/// One logical block to read: an immutable (offset, length) descriptor plus
/// a single-use output slot the delivery loop blocks on.
pub struct BlockTask {
    offset: u64,
    length: usize,
    slot: Mutex<SlotState>,
    filled: Condvar,
}

impl BlockTask {
    pub(crate) fn new(offset: u64, length: usize) -> Self {
        Self {
            offset,
            length,
            slot: Mutex::new(SlotState::Pending),
            filled: Condvar::new(),
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }

    fn lock_slot(&self) -> MutexGuard<'_, SlotState> {
        // A poisoned slot still holds a coherent SlotState
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store the block bytes and wake the delivery loop. Called by the one
    /// worker servicing this task, exactly once.
    pub(crate) fn fill(&self, buffer: Vec<u8>) {
        let mut slot = self.lock_slot();
        debug_assert!(matches!(*slot, SlotState::Pending));
        *slot = SlotState::Filled(buffer);
        self.filled.notify_one();
    }

    /// Record a fatal read error in place of the buffer.
    pub(crate) fn fail(&self, error: SourceError) {
        let mut slot = self.lock_slot();
        debug_assert!(matches!(*slot, SlotState::Pending));
        *slot = SlotState::Failed(error);
        self.filled.notify_one();
    }

    /// Block until the worker assigned to this task has finished, then take
    /// the buffer (or the error). This is the only suspension point the
    /// caller of the pipeline ever sees.
    pub(crate) fn wait_filled(&self) -> Result<Vec<u8>, SourceError> {
        let mut slot = self.lock_slot();
        loop {
            match mem::replace(&mut *slot, SlotState::Taken) {
                SlotState::Pending => {
                    *slot = SlotState::Pending;
                    slot = self
                        .filled
                        .wait(slot)
                        .unwrap_or_else(|e| e.into_inner());
                }
                SlotState::Filled(buffer) => return Ok(buffer),
                SlotState::Failed(error) => return Err(error),
                SlotState::Taken => {
                    return Err(SourceError::Read {
                        offset: self.offset,
                        reason: "block consumed twice".to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fill_wakes_waiter() {
        let task = Arc::new(BlockTask::new(0, 4));
        let filler = Arc::clone(&task);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            filler.fill(vec![1, 2, 3, 4]);
        });

        assert_eq!(task.wait_filled().unwrap(), vec![1, 2, 3, 4]);
        handle.join().unwrap();
    }

    #[test]
    fn test_fail_propagates_error() {
        let task = Arc::new(BlockTask::new(512, 512));
        task.fail(SourceError::Read {
            offset: 512,
            reason: "corrupt chunk".to_string(),
        });

        match task.wait_filled() {
            Err(SourceError::Read { offset, .. }) => assert_eq!(offset, 512),
            other => panic!("expected read error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_wait_before_fill_does_not_miss_notification() {
        let task = Arc::new(BlockTask::new(0, 1));
        let waiter = Arc::clone(&task);

        let handle = thread::spawn(move || waiter.wait_filled());
        thread::sleep(Duration::from_millis(20));
        task.fill(vec![9]);

        assert_eq!(handle.join().unwrap().unwrap(), vec![9]);
    }
}
