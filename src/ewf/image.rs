//! EwfImage - an opened E01 segment set, shareable across reader threads.
//!
//! The image resolves and validates paths once up front; every reader thread
//! then opens its own [`EwfHandle`] from the stored absolute paths, so the
//! process working directory never matters after open.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::common::segments::discover_e01_segments;
use crate::error::SourceError;
use crate::pipeline::SourceOpener;

use super::handle::EwfHandle;
use super::types::{EwfInfo, StoredImageHash};

pub struct EwfImage {
    /// Absolute segment paths in order, handed to each new handle.
    segment_paths: Vec<PathBuf>,
    info: EwfInfo,
}

impl EwfImage {
    /// Open an image from the path of its first segment (`.E01`).
    ///
    /// The path is resolved to an absolute one before segment discovery, so
    /// handles opened later from other threads are immune to working
    /// directory changes.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let absolute = path.canonicalize().map_err(|e| {
            SourceError::Open(format!("cannot resolve {}: {}", path.display(), e))
        })?;
        let segment_paths = discover_e01_segments(&absolute)?;

        // Probe once to validate the container and collect its geometry.
        let probe = EwfHandle::open_segments(segment_paths.clone())?;
        let volume = probe.volume();
        let info = EwfInfo {
            format_version: "EWF1 (E01)".to_string(),
            segment_count: segment_paths.len() as u32,
            chunk_count: volume.chunk_count,
            sector_count: volume.sector_count,
            bytes_per_sector: volume.bytes_per_sector,
            sectors_per_chunk: volume.sectors_per_chunk,
            total_size: probe.total_size(),
            stored_hashes: probe.stored_hashes().to_vec(),
            segment_files: segment_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        };

        info!(
            path = %absolute.display(),
            segments = info.segment_count,
            total_size = info.total_size,
            "image opened"
        );

        Ok(Self {
            segment_paths,
            info,
        })
    }

    pub fn info(&self) -> &EwfInfo {
        &self.info
    }

    pub fn total_size(&self) -> u64 {
        self.info.total_size
    }

    pub fn stored_hashes(&self) -> &[StoredImageHash] {
        &self.info.stored_hashes
    }
}

impl SourceOpener for EwfImage {
    type Source = EwfHandle;

    fn open(&self) -> Result<EwfHandle, SourceError> {
        EwfHandle::open_segments(self.segment_paths.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hash::{compute_hash, HashAlgorithm, StreamingHasher};
    use crate::ewf::testfixture::write_test_e01;
    use crate::pipeline::{BlockReaderPool, PoolConfig};
    use tempfile::TempDir;

    fn test_content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[test]
    fn test_info_reflects_container() {
        let dir = TempDir::new().unwrap();
        let content = test_content(7 * 2048);
        let path = write_test_e01(dir.path(), "case01", &content, 4, 512);

        let image = EwfImage::open(&path).unwrap();
        let info = image.info();
        assert_eq!(info.total_size, content.len() as u64);
        assert_eq!(info.segment_count, 1);
        assert_eq!(info.chunk_count, 7);
        assert_eq!(info.bytes_per_sector, 512);
        assert_eq!(info.stored_hashes.len(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            EwfImage::open(Path::new("/nonexistent/missing.E01")),
            Err(SourceError::Open(_))
        ));
    }

    /// End to end: pipeline over a real (synthetic) E01, with a block size
    /// that does not divide the chunk size, hashed and compared against the
    /// embedded MD5.
    #[test]
    fn test_pipeline_over_e01_matches_stored_hash() {
        let dir = TempDir::new().unwrap();
        let content = test_content(5 * 2048 + 1024);
        let path = write_test_e01(dir.path(), "case02", &content, 4, 512);

        let image = EwfImage::open(&path).unwrap();
        let expected = image.stored_hashes()[0].hash.clone();

        let mut pool = BlockReaderPool::open(image, PoolConfig::new(3, 1500)).unwrap();
        let mut hasher = StreamingHasher::new(HashAlgorithm::Md5);
        let mut total = 0usize;
        for block in pool.blocks() {
            let block = block.unwrap();
            hasher.update(&block);
            total += block.len();
        }

        assert_eq!(total, content.len());
        let computed = hasher.finalize();
        assert_eq!(computed, expected);
        assert_eq!(computed, compute_hash(&content, HashAlgorithm::Md5));
    }
}
