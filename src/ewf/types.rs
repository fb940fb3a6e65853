//! Type definitions for EWF format parsing

use serde::Serialize;

// =============================================================================
// Core Constants
// =============================================================================

pub(crate) const EWF_SIGNATURE: &[u8; 8] = b"EVF\x09\x0d\x0a\xff\x00";
pub(crate) const EWF2_SIGNATURE: &[u8; 8] = b"EVF2\x0d\x0a\x81\x00";
pub(crate) const MAX_OPEN_FILES: usize = 16; // Like libewf's rlimit handling

/// EWF v1 file header: 8-byte signature, fields start byte, segment number
/// (u16), fields end (u16). Sections begin right after.
pub(crate) const FILE_HEADER_SIZE: u64 = 13;

/// A section descriptor is 16 bytes of type, next offset (u64), size (u64)
/// and padding/checksum; section data follows at this fixed distance.
pub(crate) const SECTION_DESCRIPTOR_SIZE: u64 = 76;

// =============================================================================
// Stored Hash Types - Hashes embedded in EWF containers
// =============================================================================

/// A hash the acquisition tool stored in a `hash` or `digest` section.
#[derive(Serialize, Clone, Debug)]
pub struct StoredImageHash {
    pub algorithm: String,
    pub hash: String,
}

// =============================================================================
// Section Descriptors - EWF Format Structures
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct SectionDescriptor {
    pub section_type: [u8; 16],
    pub next_offset: u64,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct VolumeSection {
    pub chunk_count: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub sector_count: u64,
}

/// Chunk offset table parsed from one `table` section.
pub(crate) struct TableSection {
    pub base_offset: u64,
    /// Raw table entries; bit 31 marks a zlib-compressed chunk.
    pub offsets: Vec<u64>,
}

// =============================================================================
// Chunk Location - Maps chunks to their storage location
// =============================================================================

#[derive(Clone)]
pub(crate) struct ChunkLocation {
    /// Segment file holding the chunk data.
    pub segment_index: usize,
    /// Raw table entry (offset value plus compression flag in bit 31).
    pub offset: u64,
    /// Table base offset for EnCase 6+ (0 for older versions).
    pub base_offset: u64,
}

// =============================================================================
// Public API Types
// =============================================================================

/// Summary of an opened EWF image, serializable for report output.
#[derive(Serialize, Clone, Debug)]
pub struct EwfInfo {
    pub format_version: String,
    pub segment_count: u32,
    pub chunk_count: u32,
    pub sector_count: u64,
    pub bytes_per_sector: u32,
    pub sectors_per_chunk: u32,
    pub total_size: u64,
    pub stored_hashes: Vec<StoredImageHash>,
    pub segment_files: Vec<String>,
}
