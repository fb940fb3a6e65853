// Utilities shared between the EWF decoder and the hashing CLI

pub mod binary;
pub mod hash;
pub mod io_pool;
pub mod segments;

// Re-exports for convenience
pub use hash::{compute_hash, hashes_match, HashAlgorithm, StreamingHasher};
pub use io_pool::FileIoPool;
pub use segments::discover_e01_segments;
