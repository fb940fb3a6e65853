//! EwfHandle - random access over the decompressed contents of an E01 image
//! (like libewf_handle)

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use tracing::{debug, trace};

use crate::common::{
    binary::{read_u32_le, read_u64_le},
    segments::discover_e01_segments,
    FileIoPool,
};
use crate::error::SourceError;
use crate::pipeline::BlockSource;

use super::types::*;

/// Open handle over one E01 segment set.
///
/// A handle owns its segment file descriptors and is not shared between
/// threads; concurrent readers each open their own handle.
pub struct EwfHandle {
    file_pool: FileIoPool,
    segment_sizes: Vec<u64>,
    volume: VolumeSection,
    /// chunk_index -> storage location; chunks absent from every table are
    /// sparse and read as zeros.
    chunk_table: Vec<ChunkLocation>,
    stored_hashes: Vec<StoredImageHash>,
}

impl EwfHandle {
    /// Open an E01 segment set starting from the first segment's path.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let segment_paths = discover_e01_segments(path)?;
        Self::open_segments(segment_paths)
    }

    /// Open an already-discovered, ordered segment set.
    pub fn open_segments(segment_paths: Vec<PathBuf>) -> Result<Self, SourceError> {
        if segment_paths.is_empty() {
            return Err(SourceError::Open("no segment files".to_string()));
        }
        check_signature(&segment_paths[0])?;

        let mut segment_sizes = Vec::with_capacity(segment_paths.len());
        for path in &segment_paths {
            let size = std::fs::metadata(path)
                .map_err(|e| {
                    SourceError::Open(format!("failed to stat {}: {}", path.display(), e))
                })?
                .len();
            segment_sizes.push(size);
        }

        let mut file_pool = FileIoPool::new(segment_paths, MAX_OPEN_FILES);
        let (volume, chunk_table, stored_hashes) =
            parse_sections(&mut file_pool, &segment_sizes)?;

        debug!(
            segments = segment_sizes.len(),
            chunks = chunk_table.len(),
            sector_count = volume.sector_count,
            "EWF image opened"
        );

        Ok(Self {
            file_pool,
            segment_sizes,
            volume,
            chunk_table,
            stored_hashes,
        })
    }

    pub fn volume(&self) -> &VolumeSection {
        &self.volume
    }

    /// Hashes the acquisition tool embedded in the container, if any.
    pub fn stored_hashes(&self) -> &[StoredImageHash] {
        &self.stored_hashes
    }

    pub fn segment_count(&self) -> usize {
        self.file_pool.file_count()
    }

    pub fn chunk_count(&self) -> usize {
        self.volume.chunk_count as usize
    }

    /// Decompressed bytes per full chunk.
    pub fn chunk_size(&self) -> usize {
        self.volume.sectors_per_chunk as usize * self.volume.bytes_per_sector as usize
    }

    /// Total logical (decompressed) size in bytes.
    pub fn total_size(&self) -> u64 {
        self.volume.sector_count * self.volume.bytes_per_sector as u64
    }

    /// Read `length` decompressed bytes at logical `offset`, assembling from
    /// as many chunks as the range covers. Returns fewer bytes only when the
    /// range runs past the end of the image.
    pub fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, SourceError> {
        let total = self.total_size();
        if offset > total {
            return Err(SourceError::OutOfBounds {
                offset,
                total_size: total,
            });
        }
        let end = (offset + length as u64).min(total);
        if end == offset {
            return Ok(Vec::new());
        }

        let chunk_size = self.chunk_size() as u64;
        let mut out = Vec::with_capacity((end - offset) as usize);
        let mut chunk_index = (offset / chunk_size) as usize;
        let mut pos = offset;

        while pos < end {
            let chunk = self.read_chunk(chunk_index)?;
            let chunk_start = chunk_index as u64 * chunk_size;
            let from = (pos - chunk_start) as usize;
            let to = ((end - chunk_start).min(chunk.len() as u64)) as usize;
            if from >= to {
                return Err(SourceError::Read {
                    offset: pos,
                    reason: format!("chunk {} shorter than expected", chunk_index),
                });
            }
            out.extend_from_slice(&chunk[from..to]);
            pos = chunk_start + to as u64;
            chunk_index += 1;
        }

        Ok(out)
    }

    /// Read and decompress one chunk by global index (like
    /// libewf_handle_read_buffer). The final chunk is truncated to the
    /// sector count.
    pub fn read_chunk(&mut self, chunk_index: usize) -> Result<Vec<u8>, SourceError> {
        let chunk_size = self.chunk_size();
        let expected_chunks = self.chunk_count();

        let location = match self.chunk_table.get(chunk_index) {
            Some(location) => location.clone(),
            None => {
                if chunk_index >= expected_chunks {
                    return Err(SourceError::Read {
                        offset: chunk_index as u64 * chunk_size as u64,
                        reason: format!(
                            "chunk {} beyond expected count {}",
                            chunk_index, expected_chunks
                        ),
                    });
                }
                // Not stored in any table: sparse chunk, reads as zeros.
                return Ok(vec![0u8; self.stored_chunk_len(chunk_index)]);
            }
        };

        let is_compressed = (location.offset & 0x8000_0000) != 0;
        let offset_value = location.offset & 0x7FFF_FFFF;
        let segment_local = if location.base_offset > 0 {
            location.base_offset + offset_value
        } else {
            offset_value
        };
        let segment_start: u64 = self.segment_sizes.iter().take(location.segment_index).sum();
        let (seg_idx, offset_in_segment) =
            global_to_segment_offset(segment_start + segment_local, &self.segment_sizes)?;

        let file = self.file_pool.get_file(seg_idx)?;
        file.seek(SeekFrom::Start(offset_in_segment)).map_err(|e| {
            SourceError::Read {
                offset: chunk_index as u64 * chunk_size as u64,
                reason: format!("seek to segment offset {} failed: {}", offset_in_segment, e),
            }
        })?;

        let mut chunk_data = if is_compressed {
            let buffered =
                std::io::BufReader::with_capacity(65536, file.take(chunk_size as u64 * 2));
            let mut decoder = ZlibDecoder::new(buffered);
            let mut decompressed = Vec::with_capacity(chunk_size);
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SourceError::Read {
                    offset: chunk_index as u64 * chunk_size as u64,
                    reason: format!("chunk {} decompression failed: {}", chunk_index, e),
                })?;
            decompressed
        } else {
            let mut uncompressed = vec![0u8; chunk_size];
            file.read_exact(&mut uncompressed)
                .map_err(|e| SourceError::Read {
                    offset: chunk_index as u64 * chunk_size as u64,
                    reason: format!("read of uncompressed chunk {} failed: {}", chunk_index, e),
                })?;
            uncompressed
        };

        let expected_len = self.stored_chunk_len(chunk_index);
        if chunk_data.len() > expected_len {
            trace!(
                chunk_index,
                len = chunk_data.len(),
                expected_len,
                "truncating final chunk"
            );
            chunk_data.truncate(expected_len);
        }

        Ok(chunk_data)
    }

    /// Decompressed length of a chunk: full size, except a shorter final
    /// chunk when the sector count is not a chunk multiple.
    fn stored_chunk_len(&self, chunk_index: usize) -> usize {
        let chunk_size = self.chunk_size();
        let full_chunks =
            (self.volume.sector_count / self.volume.sectors_per_chunk as u64) as usize;
        if chunk_index == full_chunks {
            let remaining_sectors =
                self.volume.sector_count % self.volume.sectors_per_chunk as u64;
            if remaining_sectors > 0 {
                return (remaining_sectors * self.volume.bytes_per_sector as u64) as usize;
            }
        }
        chunk_size
    }
}

impl BlockSource for EwfHandle {
    fn total_size(&self) -> u64 {
        EwfHandle::total_size(self)
    }

    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, SourceError> {
        EwfHandle::read_at(self, offset, length)
    }
}

// =============================================================================
// Section parsing
// =============================================================================

fn check_signature(path: &Path) -> Result<(), SourceError> {
    let mut file = File::open(path)
        .map_err(|e| SourceError::Open(format!("failed to open {}: {}", path.display(), e)))?;
    let mut signature = [0u8; 8];
    file.read_exact(&mut signature)
        .map_err(|e| SourceError::Format(format!("failed to read signature: {}", e)))?;

    if &signature == EWF2_SIGNATURE {
        return Err(SourceError::Format(
            "EWF2 (Ex01) images are not supported".to_string(),
        ));
    }
    if &signature != EWF_SIGNATURE {
        return Err(SourceError::Format(format!(
            "not an EWF image (signature {:02x?})",
            signature
        )));
    }
    Ok(())
}

/// Walk the section chain globally across all segments (next offsets are
/// global) and collect the volume description, the chunk table and any
/// stored hashes.
fn parse_sections(
    file_pool: &mut FileIoPool,
    segment_sizes: &[u64],
) -> Result<(VolumeSection, Vec<ChunkLocation>, Vec<StoredImageHash>), SourceError> {
    const MAX_SECTIONS: u32 = 10_000;

    let mut volume: Option<VolumeSection> = None;
    let mut chunk_table: Vec<ChunkLocation> = Vec::new();
    let mut stored_hashes: Vec<StoredImageHash> = Vec::new();

    // Table offsets are meaningless without a preceding sectors section.
    let mut seen_sectors = false;
    let mut current_global_offset = FILE_HEADER_SIZE;
    let mut section_count = 0u32;

    trace!("starting global section walk");

    loop {
        if section_count >= MAX_SECTIONS {
            trace!("reached section limit");
            break;
        }
        section_count += 1;

        let (mut seg_idx, offset_in_seg) =
            global_to_segment_offset(current_global_offset, segment_sizes)?;
        if offset_in_seg + 32 > segment_sizes[seg_idx] {
            trace!(current_global_offset, "no room for another descriptor");
            break;
        }

        let file = file_pool.get_file(seg_idx)?;
        let descriptor = read_section_descriptor(file, offset_in_seg)?;
        let section_type = String::from_utf8_lossy(&descriptor.section_type)
            .trim_matches('\0')
            .to_string();
        trace!(
            section = %section_type,
            global = current_global_offset,
            segment = seg_idx,
            "section"
        );

        let data_global_offset = current_global_offset + SECTION_DESCRIPTOR_SIZE;

        match section_type.as_str() {
            "volume" | "disk" => {
                if volume.is_none() {
                    let (data_seg, data_off) =
                        global_to_segment_offset(data_global_offset, segment_sizes)?;
                    volume = Some(read_volume_section(file_pool.get_file(data_seg)?, data_off)?);
                }
            }
            "sectors" => {
                seen_sectors = true;
            }
            "table" => {
                if seen_sectors {
                    let (data_seg, data_off) =
                        global_to_segment_offset(data_global_offset, segment_sizes)?;
                    let table = read_table_section(
                        file_pool.get_file(data_seg)?,
                        data_off,
                        descriptor.size,
                    )?;
                    trace!(
                        entries = table.offsets.len(),
                        base_offset = table.base_offset,
                        "table parsed"
                    );
                    for &offset in &table.offsets {
                        chunk_table.push(ChunkLocation {
                            segment_index: seg_idx,
                            offset,
                            base_offset: table.base_offset,
                        });
                    }
                } else {
                    trace!("skipping table with no preceding sectors section");
                }
            }
            // table2 mirrors table with checksums; nothing for us there.
            "table2" => {}
            "hash" => {
                let (data_seg, data_off) =
                    global_to_segment_offset(data_global_offset, segment_sizes)?;
                read_hash_section(file_pool.get_file(data_seg)?, data_off, &mut stored_hashes);
            }
            "digest" => {
                let (data_seg, data_off) =
                    global_to_segment_offset(data_global_offset, segment_sizes)?;
                read_digest_section(
                    file_pool.get_file(data_seg)?,
                    data_off,
                    descriptor.size,
                    &mut stored_hashes,
                );
            }
            "done" => {
                trace!("reached done section");
                break;
            }
            "next" => {
                // A self-referencing next continues in the following segment.
                if descriptor.next_offset == offset_in_seg {
                    if seg_idx + 1 < segment_sizes.len() {
                        seg_idx += 1;
                        let next_segment_start: u64 =
                            segment_sizes.iter().take(seg_idx).sum();
                        current_global_offset = next_segment_start + FILE_HEADER_SIZE;
                        trace!(segment = seg_idx, "continuing in next segment");
                        continue;
                    }
                    trace!("no more segments");
                    break;
                }
            }
            _ => {}
        }

        if descriptor.next_offset == 0 || descriptor.next_offset == offset_in_seg {
            trace!("section chain ended");
            break;
        }
        let segment_start: u64 = segment_sizes.iter().take(seg_idx).sum();
        current_global_offset = segment_start + descriptor.next_offset;
    }

    trace!(
        sections = section_count,
        chunks = chunk_table.len(),
        "section walk complete"
    );

    let volume = volume.ok_or_else(|| SourceError::Format("no volume section found".to_string()))?;
    Ok((volume, chunk_table, stored_hashes))
}

/// Convert a global byte offset to (segment index, offset within segment).
fn global_to_segment_offset(
    global_offset: u64,
    segment_sizes: &[u64],
) -> Result<(usize, u64), SourceError> {
    let mut cumulative = 0u64;
    for (idx, &size) in segment_sizes.iter().enumerate() {
        if global_offset < cumulative + size {
            return Ok((idx, global_offset - cumulative));
        }
        cumulative += size;
    }
    Err(SourceError::Format(format!(
        "global offset {} beyond all segments",
        global_offset
    )))
}

fn read_section_descriptor(file: &mut File, offset: u64) -> Result<SectionDescriptor, SourceError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| SourceError::Format(format!("seek to section failed: {}", e)))?;

    let mut section_type = [0u8; 16];
    file.read_exact(&mut section_type)
        .map_err(|e| SourceError::Format(format!("failed to read section type: {}", e)))?;
    let next_offset = read_u64_le(file)?;
    let size = read_u64_le(file)?;

    Ok(SectionDescriptor {
        section_type,
        next_offset,
        size,
    })
}

fn read_volume_section(file: &mut File, offset: u64) -> Result<VolumeSection, SourceError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| SourceError::Format(format!("seek to volume failed: {}", e)))?;

    let _media = read_u32_le(file)?;
    let chunk_count = read_u32_le(file)?;
    let sectors_per_chunk = read_u32_le(file)?;
    let bytes_per_sector = read_u32_le(file)?;
    let sector_count = read_u64_le(file)?;

    if sectors_per_chunk == 0 || bytes_per_sector == 0 {
        return Err(SourceError::Format(format!(
            "invalid volume geometry: {} sectors per chunk, {} bytes per sector",
            sectors_per_chunk, bytes_per_sector
        )));
    }

    trace!(
        chunk_count,
        sectors_per_chunk,
        bytes_per_sector,
        sector_count,
        "volume section"
    );

    Ok(VolumeSection {
        chunk_count,
        sectors_per_chunk,
        bytes_per_sector,
        sector_count,
    })
}

fn read_table_section(
    file: &mut File,
    offset: u64,
    section_size: u64,
) -> Result<TableSection, SourceError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| SourceError::Format(format!("seek to table failed: {}", e)))?;

    let mut header = [0u8; 24];
    file.read_exact(&mut header)
        .map_err(|e| SourceError::Format(format!("failed to read table header: {}", e)))?;

    let entry_count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let base_offset = u64::from_le_bytes([
        header[8], header[9], header[10], header[11], header[12], header[13], header[14],
        header[15],
    ]);

    // Some writers leave the count zero; fall back to what fits in the section.
    let entry_count = if entry_count > 0 {
        entry_count
    } else {
        ((section_size.saturating_sub(SECTION_DESCRIPTOR_SIZE + 24 + 4)) / 4) as u32
    };

    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(read_u32_le(file)? as u64);
    }

    Ok(TableSection {
        base_offset,
        offsets,
    })
}

/// EWF1 hash section: 16 bytes of MD5.
fn read_hash_section(file: &mut File, offset: u64, stored_hashes: &mut Vec<StoredImageHash>) {
    if file.seek(SeekFrom::Start(offset)).is_err() {
        return;
    }
    let mut md5_bytes = [0u8; 16];
    if file.read_exact(&mut md5_bytes).is_ok() && md5_bytes.iter().any(|&b| b != 0) {
        stored_hashes.push(StoredImageHash {
            algorithm: "MD5".to_string(),
            hash: hex::encode(md5_bytes),
        });
    }
}

/// Digest section: MD5 followed by SHA1 when the section is large enough.
fn read_digest_section(
    file: &mut File,
    offset: u64,
    section_size: u64,
    stored_hashes: &mut Vec<StoredImageHash>,
) {
    if file.seek(SeekFrom::Start(offset)).is_err() {
        return;
    }
    let mut md5_bytes = [0u8; 16];
    if file.read_exact(&mut md5_bytes).is_ok() && md5_bytes.iter().any(|&b| b != 0) {
        stored_hashes.push(StoredImageHash {
            algorithm: "MD5".to_string(),
            hash: hex::encode(md5_bytes),
        });
    }
    if section_size >= SECTION_DESCRIPTOR_SIZE + 36 {
        let mut sha1_bytes = [0u8; 20];
        if file.read_exact(&mut sha1_bytes).is_ok() && sha1_bytes.iter().any(|&b| b != 0) {
            stored_hashes.push(StoredImageHash {
                algorithm: "SHA1".to_string(),
                hash: hex::encode(sha1_bytes),
            });
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hash::{compute_hash, HashAlgorithm};
    use crate::ewf::testfixture::write_test_e01;
    use tempfile::TempDir;

    fn test_content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_open_reports_geometry() {
        let dir = TempDir::new().unwrap();
        // 5.5 chunks of 2048 bytes (4 sectors x 512).
        let content = test_content(5 * 2048 + 1024);
        let path = write_test_e01(dir.path(), "img", &content, 4, 512);

        let handle = EwfHandle::open(&path).unwrap();
        assert_eq!(handle.total_size(), content.len() as u64);
        assert_eq!(handle.chunk_size(), 2048);
        assert_eq!(handle.chunk_count(), 6);
        assert_eq!(handle.segment_count(), 1);
    }

    #[test]
    fn test_read_at_roundtrip() {
        let dir = TempDir::new().unwrap();
        let content = test_content(5 * 2048 + 1024);
        let path = write_test_e01(dir.path(), "img", &content, 4, 512);
        let mut handle = EwfHandle::open(&path).unwrap();

        // Whole image in one read.
        assert_eq!(handle.read_at(0, content.len()).unwrap(), content);

        // A read spanning chunk boundaries.
        assert_eq!(
            handle.read_at(1000, 3000).unwrap(),
            &content[1000..4000]
        );

        // Short read at end of data.
        let tail = handle.read_at(content.len() as u64 - 100, 1000).unwrap();
        assert_eq!(tail, &content[content.len() - 100..]);
    }

    #[test]
    fn test_read_past_end_is_an_error() {
        let dir = TempDir::new().unwrap();
        let content = test_content(4096);
        let path = write_test_e01(dir.path(), "img", &content, 4, 512);
        let mut handle = EwfHandle::open(&path).unwrap();

        assert!(matches!(
            handle.read_at(content.len() as u64 + 1, 16),
            Err(SourceError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_stored_hash_parsed() {
        let dir = TempDir::new().unwrap();
        let content = test_content(4096);
        let path = write_test_e01(dir.path(), "img", &content, 4, 512);
        let handle = EwfHandle::open(&path).unwrap();

        let stored = handle.stored_hashes();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].algorithm, "MD5");
        assert_eq!(stored[0].hash, compute_hash(&content, HashAlgorithm::Md5));
    }

    #[test]
    fn test_rejects_non_ewf_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.E01");
        std::fs::write(&path, b"definitely not an EWF image").unwrap();

        assert!(matches!(
            EwfHandle::open(&path),
            Err(SourceError::Format(_))
        ));
    }
}
