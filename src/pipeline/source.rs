//! Traits connecting the pipeline to a container backend.
//!
//! The pipeline never touches a container format directly: it reads through
//! [`BlockSource`], and each worker gets its own source from a shared
//! [`SourceOpener`] because container handles are not safe to share across
//! concurrent readers.

use crate::error::SourceError;

/// Random-access view over the fully decompressed address space of an image.
pub trait BlockSource: Send {
    /// Total logical size in bytes. Stable for the lifetime of the handle.
    fn total_size(&self) -> u64;

    /// Read `length` decompressed bytes starting at `offset`.
    ///
    /// A short read is only permitted when the range extends past the end of
    /// the image; any other short read must be reported as an error. Reading
    /// at an offset beyond `total_size` is an error.
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, SourceError>;
}

/// Factory handing every reader thread its own [`BlockSource`].
pub trait SourceOpener: Send + Sync + 'static {
    type Source: BlockSource + 'static;

    fn open(&self) -> Result<Self::Source, SourceError>;
}
