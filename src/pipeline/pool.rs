//! Pipeline façade - owns the worker pool, the producer, and the ordered
//! delivery loop.
//!
//! Workers complete blocks in whatever order scheduling and decompression
//! cost dictate; the delivery queue is populated in offset order by the
//! producer, so popping it (and blocking on each task's slot) yields blocks
//! in strictly ascending offset order no matter which worker finished first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, info, trace};

use crate::error::PipelineError;

use super::source::{BlockSource, SourceOpener};
use super::task::{BlockTask, DeliveryItem, WorkItem};
use super::worker::run_worker;

/// Queue slack beyond worker count: keeps a few tasks in flight so workers
/// are rarely starved while the producer is momentarily behind, without
/// letting production run far ahead of consumption.
const QUEUE_SLACK: usize = 3;

const DEFAULT_BLOCK_SIZE: usize = 256 * 1024 * 1024;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of reader threads. Decompression-bound, so single digits are
    /// usually the sweet spot.
    pub parallelism: usize,
    /// Bytes per delivered block; the final block is the remainder.
    pub block_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().clamp(1, 8),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl PoolConfig {
    pub fn new(parallelism: usize, block_size: usize) -> Self {
        Self {
            parallelism,
            block_size,
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.parallelism < 1 {
            return Err(PipelineError::Config(format!(
                "parallelism must be at least 1, got {}",
                self.parallelism
            )));
        }
        if self.block_size < 1 {
            return Err(PipelineError::Config(format!(
                "block size must be at least 1 byte, got {}",
                self.block_size
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Reader pool
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    /// Workers idle on the work queue, producer not yet started.
    Constructed,
    /// Producer running, blocks being delivered.
    Running,
    /// Teardown in progress (end of data, error, or explicit shutdown).
    Draining,
    /// All threads joined. No way back.
    Closed,
}

/// Bounded-concurrency, order-preserving block reader over any
/// [`SourceOpener`].
///
/// Construction spawns the reader threads (idle until iteration starts);
/// [`blocks`](Self::blocks) lazily starts the producer on its first step and
/// yields buffers in ascending offset order. The sequence is single-pass: a
/// second full iteration needs a new pool.
pub struct BlockReaderPool<O: SourceOpener> {
    config: PoolConfig,
    disk_size: u64,
    state: PoolState,
    cancelled: Arc<AtomicBool>,
    /// Dropping this fires the cancel branch of every producer-side select.
    cancel_tx: Option<Sender<()>>,
    cancel_rx: Receiver<()>,
    /// Held until the producer starts; dropping it releases idle workers.
    work_tx: Option<Sender<WorkItem>>,
    delivery_tx: Option<Sender<DeliveryItem>>,
    delivery_rx: Receiver<DeliveryItem>,
    producer: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    _opener: std::marker::PhantomData<fn() -> O>,
}

impl<O: SourceOpener> BlockReaderPool<O> {
    /// Open the image and start `parallelism` reader threads.
    ///
    /// One throwaway handle is opened to learn the logical size and closed
    /// again; each worker then opens its own.
    pub fn open(opener: O, config: PoolConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let opener = Arc::new(opener);

        let probe = opener.open().map_err(PipelineError::Open)?;
        let disk_size = probe.total_size();
        drop(probe);

        let capacity = config.parallelism + QUEUE_SLACK;
        let (work_tx, work_rx) = bounded(capacity);
        let (delivery_tx, delivery_rx) = bounded(capacity);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));

        let workers = (0..config.parallelism)
            .map(|worker_id| {
                let opener = Arc::clone(&opener);
                let work_rx = work_rx.clone();
                let cancelled = Arc::clone(&cancelled);
                thread::spawn(move || run_worker(worker_id, opener, work_rx, cancelled))
            })
            .collect();

        info!(
            parallelism = config.parallelism,
            block_size = config.block_size,
            disk_size,
            "reader pool started"
        );

        Ok(Self {
            config,
            disk_size,
            state: PoolState::Constructed,
            cancelled,
            cancel_tx: Some(cancel_tx),
            cancel_rx,
            work_tx: Some(work_tx),
            delivery_tx: Some(delivery_tx),
            delivery_rx,
            producer: None,
            workers,
            _opener: std::marker::PhantomData,
        })
    }

    /// Total logical size of the image in bytes.
    pub fn disk_size(&self) -> u64 {
        self.disk_size
    }

    /// Lazy, single-pass sequence of block buffers in ascending offset
    /// order. Consuming it blocks whenever the next block's worker has not
    /// finished yet. After exhaustion (or an error) the pool is closed and
    /// further iteration yields nothing.
    pub fn blocks(&mut self) -> Blocks<'_, O> {
        Blocks { pool: self }
    }

    /// Stop all threads and join them. Idempotent; safe after partial or
    /// full consumption, and invoked by `Drop`.
    pub fn shutdown(&mut self) {
        if self.state == PoolState::Closed {
            return;
        }
        self.state = PoolState::Draining;
        self.cancelled.store(true, Ordering::Relaxed);

        // Unblock the producer (cancel select) and idle workers (work queue
        // disconnect if the producer never started).
        self.cancel_tx.take();
        self.work_tx.take();
        self.delivery_tx.take();

        // Keep the delivery queue moving so a producer mid-send can finish.
        while self.delivery_rx.try_recv().is_ok() {}

        self.join_threads();
        while self.delivery_rx.try_recv().is_ok() {}

        self.state = PoolState::Closed;
        debug!("reader pool shut down");
    }

    fn next_block(&mut self) -> Option<Result<Vec<u8>, PipelineError>> {
        match self.state {
            PoolState::Constructed => self.start_producer(),
            PoolState::Running => {}
            PoolState::Draining | PoolState::Closed => return None,
        }

        match self.delivery_rx.recv() {
            Ok(DeliveryItem::Block(task)) => {
                let offset = task.offset();
                match task.wait_filled() {
                    Ok(buffer) => {
                        trace!(offset, len = buffer.len(), "block delivered");
                        Some(Ok(buffer))
                    }
                    Err(source) => {
                        debug!(offset, error = %source, "fatal block error, tearing pipeline down");
                        self.shutdown();
                        Some(Err(PipelineError::Read { offset, source }))
                    }
                }
            }
            Ok(DeliveryItem::End) => {
                self.state = PoolState::Draining;
                self.join_threads();
                self.state = PoolState::Closed;
                debug!(disk_size = self.disk_size, "all blocks delivered");
                None
            }
            // Producer gone without an End sentinel: torn down mid-stream.
            Err(_) => {
                self.shutdown();
                Some(Err(PipelineError::Cancelled))
            }
        }
    }

    fn start_producer(&mut self) {
        let (Some(work_tx), Some(delivery_tx)) = (self.work_tx.take(), self.delivery_tx.take())
        else {
            return;
        };
        let cancel_rx = self.cancel_rx.clone();
        let disk_size = self.disk_size;
        let block_size = self.config.block_size;
        let parallelism = self.config.parallelism;

        self.producer = Some(thread::spawn(move || {
            run_producer(
                disk_size,
                block_size,
                parallelism,
                work_tx,
                delivery_tx,
                cancel_rx,
            )
        }));
        self.state = PoolState::Running;
    }

    fn join_threads(&mut self) {
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<O: SourceOpener> Drop for BlockReaderPool<O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Iterator handed out by [`BlockReaderPool::blocks`].
pub struct Blocks<'a, O: SourceOpener> {
    pool: &'a mut BlockReaderPool<O>,
}

impl<O: SourceOpener> Iterator for Blocks<'_, O> {
    type Item = Result<Vec<u8>, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pool.next_block()
    }
}

// =============================================================================
// Producer
// =============================================================================

/// Generates tasks in ascending, contiguous offset order and pushes each to
/// both queues; the bounded work queue throttles production. After the last
/// real task: one `Shutdown` per worker, then one `End` for the delivery
/// loop.
fn run_producer(
    disk_size: u64,
    block_size: usize,
    parallelism: usize,
    work_tx: Sender<WorkItem>,
    delivery_tx: Sender<DeliveryItem>,
    cancel_rx: Receiver<()>,
) {
    let mut offset = 0u64;
    while offset < disk_size {
        let length = (disk_size - offset).min(block_size as u64) as usize;
        let task = Arc::new(BlockTask::new(offset, length));

        // A task reaches both queues before any worker can observe it past
        // either; order of the two pushes is immaterial.
        if send_or_cancel(&work_tx, WorkItem::Block(Arc::clone(&task)), &cancel_rx) {
            debug!(offset, "producer cancelled");
            return;
        }
        if send_or_cancel(&delivery_tx, DeliveryItem::Block(task), &cancel_rx) {
            debug!(offset, "producer cancelled");
            return;
        }
        offset += length as u64;
    }

    for _ in 0..parallelism {
        if send_or_cancel(&work_tx, WorkItem::Shutdown, &cancel_rx) {
            return;
        }
    }
    let _ = send_or_cancel(&delivery_tx, DeliveryItem::End, &cancel_rx);
    trace!(disk_size, "producer finished");
}

/// Blocking send that a teardown can always interrupt. Returns `true` when
/// the pipeline is being cancelled (or the far side disconnected).
fn send_or_cancel<T>(tx: &Sender<T>, item: T, cancel_rx: &Receiver<()>) -> bool {
    select! {
        send(tx, item) -> result => result.is_err(),
        recv(cancel_rx) -> _ => true,
    }
}

// =============================================================================
// Tests
// =============================================================================
