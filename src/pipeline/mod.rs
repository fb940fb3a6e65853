//! Bounded-concurrency, order-preserving block pipeline.
//!
//! Reads a large, logically-contiguous image whose physical reads are
//! decompression-bound, using a fixed pool of reader threads, while the
//! consumer observes blocks strictly in offset order.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─> work queue ────> worker 0 ─┐ (own EwfHandle each)
//!  producer ─────────┤   (bounded)   ──> worker 1 ─┤ fills task buffers
//!  (ascending        │               ──> worker N ─┘ in completion order
//!   offsets)         └─> delivery queue (bounded, offset order)
//!                              │
//!                        delivery loop: pop task, block on its slot,
//!                        yield buffer to the caller
//! ```
//!
//! Both queues carry the same task handles: the work queue decides *who
//! fills* a block, the delivery queue decides *who reads it, in what order*.
//! That split is what decouples completion order from delivery order - a
//! worker may finish block 5 before block 3 is done elsewhere, but the
//! caller still sees 3 first because the delivery loop blocks on 3's slot.
//!
//! The bounded queues (capacity `parallelism + 3`) give backpressure for
//! free: the producer cannot outrun the workers or the consumer by more
//! than the queue depth.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ewfstream::ewf::EwfImage;
//! use ewfstream::pipeline::{BlockReaderPool, PoolConfig};
//!
//! let image = EwfImage::open("/evidence/disk.E01".as_ref())?;
//! let mut pool = BlockReaderPool::open(image, PoolConfig::default())?;
//! for block in pool.blocks() {
//!     hasher.update(&block?);
//! }
//! ```

mod pool;
mod source;
mod task;
mod worker;

pub use pool::{BlockReaderPool, Blocks, PoolConfig};
pub use source::{BlockSource, SourceOpener};
pub use task::BlockTask;

// =============================================================================
// In-memory test doubles
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory image doubles used by the pipeline tests: known content,
    //! injectable per-read delay, injectable failures.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::error::SourceError;

    use super::{BlockSource, SourceOpener};

    type ReadObserver = Arc<dyn Fn(u64) + Send + Sync>;

    /// Opener for [`MemorySource`] handles over shared content.
    pub(crate) struct MemoryOpener {
        data: Arc<Vec<u8>>,
        jitter: bool,
        fail_at: Option<u64>,
        observer: Option<ReadObserver>,
        opens: AtomicUsize,
        open_failures_after: Option<usize>,
    }

    impl MemoryOpener {
        pub(crate) fn new(data: Vec<u8>) -> Self {
            Self {
                data: Arc::new(data),
                jitter: false,
                fail_at: None,
                observer: None,
                opens: AtomicUsize::new(0),
                open_failures_after: None,
            }
        }

        /// Sleep a pseudo-random few milliseconds per read so completion
        /// order differs from offset order.
        pub(crate) fn with_jitter(mut self) -> Self {
            self.jitter = true;
            self
        }

        /// Make the read starting exactly at `offset` fail.
        pub(crate) fn with_failure_at(mut self, offset: u64) -> Self {
            self.fail_at = Some(offset);
            self
        }

        /// Invoke `observer` with the offset of every read before it runs.
        pub(crate) fn with_observer<F>(mut self, observer: F) -> Self
        where
            F: Fn(u64) + Send + Sync + 'static,
        {
            self.observer = Some(Arc::new(observer));
            self
        }

        /// Let the first `successes` opens succeed, then fail all later ones.
        pub(crate) fn with_open_failures_after(mut self, successes: usize) -> Self {
            self.open_failures_after = Some(successes);
            self
        }
    }

    impl SourceOpener for MemoryOpener {
        type Source = MemorySource;

        fn open(&self) -> Result<MemorySource, SourceError> {
            let opened = self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.open_failures_after {
                if opened >= limit {
                    return Err(SourceError::Open("injected open failure".to_string()));
                }
            }
            Ok(MemorySource {
                data: Arc::clone(&self.data),
                jitter: self.jitter,
                fail_at: self.fail_at,
                observer: self.observer.clone(),
            })
        }
    }

    pub(crate) struct MemorySource {
        data: Arc<Vec<u8>>,
        jitter: bool,
        fail_at: Option<u64>,
        observer: Option<ReadObserver>,
    }

    impl BlockSource for MemorySource {
        fn total_size(&self) -> u64 {
            self.data.len() as u64
        }

        fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, SourceError> {
            if let Some(observer) = &self.observer {
                observer(offset);
            }
            if self.fail_at == Some(offset) {
                return Err(SourceError::Read {
                    offset,
                    reason: "injected read failure".to_string(),
                });
            }
            if self.jitter {
                // Deterministic per-offset delay, decorrelated from offset order.
                let millis = xxhash_rust::xxh64::xxh64(&offset.to_le_bytes(), 7) % 8;
                thread::sleep(Duration::from_millis(millis));
            }

            let total = self.data.len() as u64;
            if offset > total {
                return Err(SourceError::OutOfBounds {
                    offset,
                    total_size: total,
                });
            }
            let end = (offset + length as u64).min(total) as usize;
            Ok(self.data[offset as usize..end].to_vec())
        }
    }
}
