//! Error types for the block pipeline and the EWF container backend.

use std::io;
use thiserror::Error;

/// Errors produced by a container backend (opening an image or reading
/// decompressed bytes from it).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The image could not be located or opened.
    #[error("failed to open image: {0}")]
    Open(String),

    /// The container data does not parse as a valid image.
    #[error("invalid container format: {0}")]
    Format(String),

    /// An underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A decompressed read at a specific logical offset failed.
    #[error("read at offset {offset} failed: {reason}")]
    Read { offset: u64, reason: String },

    /// A read was requested past the end of the logical address space.
    #[error("offset {offset} beyond end of image ({total_size} bytes)")]
    OutOfBounds { offset: u64, total_size: u64 },
}

/// Errors surfaced by [`BlockReaderPool`](crate::pipeline::BlockReaderPool)
/// to its caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid parallelism or block size; raised at construction, never retried.
    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    /// The image could not be opened at construction.
    #[error("failed to open image")]
    Open(#[source] SourceError),

    /// A worker's read failed. Fatal to the whole pipeline: the error is
    /// yielded at the exact position of the failed block and nothing follows it.
    #[error("block read at offset {offset} failed")]
    Read {
        offset: u64,
        #[source]
        source: SourceError,
    },

    /// The pipeline was torn down before the sequence completed.
    #[error("pipeline shut down before completion")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_carries_offset_and_source() {
        let err = PipelineError::Read {
            offset: 4096,
            source: SourceError::Read {
                offset: 4096,
                reason: "bad zlib stream".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("4096"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = SourceError::OutOfBounds {
            offset: 100,
            total_size: 50,
        };
        assert!(err.to_string().contains("beyond end of image"));
    }
}
