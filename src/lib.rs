//! ewfstream - bounded-concurrency, order-preserving block reader for
//! EWF (E01) forensic disk images.
//!
//! The library splits an image's logical contents into fixed-size blocks,
//! decompresses them on a small pool of reader threads, and hands them to
//! the caller strictly in offset order, so a sequential consumer (a hash,
//! a copy, an upload) overlaps with decompression without ever reordering:
//!
//! ```no_run
//! use ewfstream::ewf::EwfImage;
//! use ewfstream::pipeline::{BlockReaderPool, PoolConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = EwfImage::open("evidence.E01".as_ref())?;
//! let mut pool = BlockReaderPool::open(image, PoolConfig::default())?;
//! for block in pool.blocks() {
//!     let block = block?;
//!     // consume in offset order
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`pipeline`] is source-agnostic; anything implementing
//! [`pipeline::BlockSource`] plugs in. [`ewf`] supplies the E01 backend.

pub mod common;
pub mod error;
pub mod ewf;
pub mod logging;
pub mod pipeline;

pub use error::{PipelineError, SourceError};
pub use ewf::EwfImage;
pub use pipeline::{BlockReaderPool, PoolConfig};
