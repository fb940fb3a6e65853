// Unified hashing for image verification
//
// One streaming interface over MD5, SHA-1, SHA-256, SHA-512, BLAKE2b,
// BLAKE3, XXH3, XXH64 and CRC32, so the hashing loop does not care which
// digest the examiner asked for.

use blake2::Blake2b512;
use blake3::Hasher as Blake3Hasher;
use crc32fast::Hasher as Crc32Hasher;
use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};
use xxhash_rust::xxh3::Xxh3;
use xxhash_rust::xxh64::Xxh64;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported hash algorithms.
/// - MD5/SHA1: legacy, but what acquisition tools embed in EWF containers
/// - SHA256/SHA512: NIST approved, court-accepted forensic standards
/// - BLAKE3/BLAKE2b: modern, very fast cryptographic hashes
/// - XXH3/XXH64/CRC32: non-cryptographic, for quick integrity checks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake3,
    Blake2,
    Xxh3,
    Xxh64,
    Crc32,
}

impl HashAlgorithm {
    /// Parse an algorithm name (case-insensitive).
    pub fn parse(algorithm: &str) -> Result<Self, String> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            "blake2" | "blake2b" => Ok(HashAlgorithm::Blake2),
            "xxh3" | "xxhash3" => Ok(HashAlgorithm::Xxh3),
            "xxh64" | "xxhash64" => Ok(HashAlgorithm::Xxh64),
            "crc32" | "crc-32" => Ok(HashAlgorithm::Crc32),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256, sha512, blake3, blake2, xxh3, xxh64, crc32",
                algorithm
            )),
        }
    }

    /// Canonical algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Blake3 => "BLAKE3",
            HashAlgorithm::Blake2 => "BLAKE2b",
            HashAlgorithm::Xxh3 => "XXH3",
            HashAlgorithm::Xxh64 => "XXH64",
            HashAlgorithm::Crc32 => "CRC32",
        }
    }
}

// =============================================================================
// Streaming Hasher
// =============================================================================

/// Incremental hasher over any supported algorithm.
/// Note: Blake3Hasher is boxed because it's ~1920 bytes, while other variants are ~20-600 bytes
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<Blake3Hasher>),
    Blake2(Blake2b512),
    Xxh3(Xxh3),
    Xxh64(Xxh64),
    Crc32(Crc32Hasher),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => StreamingHasher::Blake3(Box::new(Blake3Hasher::new())),
            HashAlgorithm::Blake2 => StreamingHasher::Blake2(Blake2b512::new()),
            HashAlgorithm::Xxh3 => StreamingHasher::Xxh3(Xxh3::new()),
            HashAlgorithm::Xxh64 => StreamingHasher::Xxh64(Xxh64::new(0)),
            HashAlgorithm::Crc32 => StreamingHasher::Crc32(Crc32Hasher::new()),
        }
    }

    /// Update the hash with more data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
            StreamingHasher::Sha512(h) => Digest::update(h, data),
            StreamingHasher::Blake3(h) => {
                h.update(data);
            }
            StreamingHasher::Blake2(h) => Digest::update(h, data),
            StreamingHasher::Xxh3(h) => h.update(data),
            StreamingHasher::Xxh64(h) => h.update(data),
            StreamingHasher::Crc32(h) => h.update(data),
        }
    }

    /// Update with parallel hashing (only effective for BLAKE3).
    /// Falls back to a regular update for other algorithms.
    pub fn update_parallel(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Blake3(h) => {
                h.update_rayon(data);
            }
            _ => self.update(data),
        }
    }

    /// Finalize and return the hash as a hex string.
    pub fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha512(h) => hex::encode(h.finalize()),
            StreamingHasher::Blake3(h) => h.finalize().to_hex().to_string(),
            StreamingHasher::Blake2(h) => hex::encode(h.finalize()),
            StreamingHasher::Xxh3(h) => format!("{:032x}", h.digest128()),
            StreamingHasher::Xxh64(h) => format!("{:016x}", h.digest()),
            StreamingHasher::Crc32(h) => format!("{:08x}", h.finalize()),
        }
    }
}

// =============================================================================
// One-shot helpers
// =============================================================================

/// Compute the hash of a byte slice (one-shot, for small data).
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compare two hex digests (case-insensitive).
pub fn hashes_match(computed: &str, expected: &str) -> bool {
    computed.trim().eq_ignore_ascii_case(expected.trim())
}
