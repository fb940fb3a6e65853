//! Minimal EWF1 writer for tests: one segment, volume/sectors/table/hash/done
//! chain, zlib chunks mixed with uncompressed ones.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use md5::{Digest, Md5};

use super::types::{EWF_SIGNATURE, SECTION_DESCRIPTOR_SIZE};

fn append_section(buf: &mut Vec<u8>, section_type: &str, data: &[u8], self_next: bool) {
    let start = buf.len() as u64;
    let next = if self_next {
        start
    } else {
        start + SECTION_DESCRIPTOR_SIZE + data.len() as u64
    };
    let mut type_bytes = [0u8; 16];
    type_bytes[..section_type.len()].copy_from_slice(section_type.as_bytes());
    buf.extend_from_slice(&type_bytes);
    buf.extend_from_slice(&next.to_le_bytes());
    buf.extend_from_slice(&(SECTION_DESCRIPTOR_SIZE + data.len() as u64).to_le_bytes());
    buf.extend_from_slice(&[0u8; 44]);
    buf.extend_from_slice(data);
}

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Write a single-segment E01 under `dir` and return its path.
///
/// `content.len()` must be a multiple of `bytes_per_sector`. Odd-numbered
/// chunks and any short final chunk are zlib compressed, the rest are stored
/// raw. An MD5 of the content goes into the hash section.
pub(crate) fn write_test_e01(
    dir: &Path,
    stem: &str,
    content: &[u8],
    sectors_per_chunk: u32,
    bytes_per_sector: u32,
) -> PathBuf {
    let chunk_size = (sectors_per_chunk * bytes_per_sector) as usize;
    assert_eq!(content.len() % bytes_per_sector as usize, 0);
    let sector_count = (content.len() / bytes_per_sector as usize) as u64;
    let chunk_count = content.len().div_ceil(chunk_size) as u32;

    let mut buf = Vec::new();

    // File header: signature, fields start, segment number, fields end.
    buf.extend_from_slice(EWF_SIGNATURE);
    buf.push(0x01);
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());

    // Volume section.
    let mut volume_data = Vec::new();
    volume_data.extend_from_slice(&0u32.to_le_bytes()); // media type
    volume_data.extend_from_slice(&chunk_count.to_le_bytes());
    volume_data.extend_from_slice(&sectors_per_chunk.to_le_bytes());
    volume_data.extend_from_slice(&bytes_per_sector.to_le_bytes());
    volume_data.extend_from_slice(&sector_count.to_le_bytes());
    append_section(&mut buf, "volume", &volume_data, false);

    // Sectors section: encode every chunk, remembering where each lands.
    let mut blobs: Vec<(Vec<u8>, bool)> = Vec::new();
    for (index, chunk) in content.chunks(chunk_size).enumerate() {
        let compress = index % 2 == 1 || chunk.len() < chunk_size;
        if compress {
            blobs.push((zlib_compress(chunk), true));
        } else {
            blobs.push((chunk.to_vec(), false));
        }
    }
    let mut entries: Vec<u32> = Vec::new();
    let mut data_offset = buf.len() as u64 + SECTION_DESCRIPTOR_SIZE;
    let mut sectors_data = Vec::new();
    for (blob, compressed) in &blobs {
        let mut entry = data_offset as u32;
        if *compressed {
            entry |= 0x8000_0000;
        }
        entries.push(entry);
        data_offset += blob.len() as u64;
        sectors_data.extend_from_slice(blob);
    }
    append_section(&mut buf, "sectors", &sectors_data, false);

    // Table section: count, pad, base offset (zero), pad, then entries.
    let mut table_data = Vec::new();
    table_data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    table_data.extend_from_slice(&[0u8; 4]);
    table_data.extend_from_slice(&0u64.to_le_bytes());
    table_data.extend_from_slice(&[0u8; 8]);
    for entry in &entries {
        table_data.extend_from_slice(&entry.to_le_bytes());
    }
    append_section(&mut buf, "table", &table_data, false);

    // Hash section: MD5 then a zeroed SHA1 slot.
    let md5: [u8; 16] = Md5::digest(content).into();
    let mut hash_data = Vec::new();
    hash_data.extend_from_slice(&md5);
    hash_data.extend_from_slice(&[0u8; 20]);
    append_section(&mut buf, "hash", &hash_data, false);

    // Done section points at itself.
    append_section(&mut buf, "done", &[], true);

    let path = dir.join(format!("{}.E01", stem));
    std::fs::write(&path, &buf).unwrap();
    path
}
