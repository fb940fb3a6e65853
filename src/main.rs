//! ewfhash - sequentially hash an EWF (E01) image with parallel block readers.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use ewfstream::common::{hashes_match, HashAlgorithm, StreamingHasher};
use ewfstream::ewf::{EwfImage, StoredImageHash};
use ewfstream::pipeline::{BlockReaderPool, PoolConfig};

#[derive(Parser)]
#[command(
    name = "ewfhash",
    version,
    about = "Hash an EWF (E01) disk image, reading and decompressing blocks in parallel"
)]
struct Args {
    /// Path to the first segment of the image (.E01)
    image: PathBuf,

    /// Hash algorithm: md5, sha1, sha256, sha512, blake3, blake2, xxh3,
    /// xxh64 or crc32
    #[arg(short = 'a', long = "hash", default_value = "md5")]
    algorithm: String,

    /// Bytes per block handed to the hasher
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    block_size: usize,

    /// Number of reader threads
    #[arg(short, long, default_value_t = 3)]
    parallelism: usize,

    /// Print the report as JSON on stdout instead of plain text
    #[arg(long)]
    json: bool,

    /// Do not write the `.hash` report file next to the image
    #[arg(long)]
    no_report: bool,

    /// Verbose logging (file:line, thread IDs)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct HashReport {
    image: String,
    algorithm: &'static str,
    hash: String,
    total_bytes: u64,
    elapsed_seconds: f64,
    throughput_mib_s: f64,
    stored_hashes: Vec<StoredImageHash>,
    /// `None` when the container stores no hash for this algorithm.
    verified: Option<bool>,
    created: String,
}

fn main() {
    let args = Args::parse();
    if args.verbose {
        ewfstream::logging::init_verbose();
    } else {
        ewfstream::logging::init();
    }

    if let Err(e) = run(&args) {
        error!(error = %e, "ewfhash failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let algorithm = HashAlgorithm::parse(&args.algorithm)?;

    let image = EwfImage::open(&args.image)?;
    let info = image.info().clone();
    let stored_hashes = image.stored_hashes().to_vec();
    let total_size = image.total_size();
    debug!(
        total_size,
        chunks = info.chunk_count,
        segments = info.segment_count,
        "container opened"
    );

    let config = PoolConfig::new(args.parallelism, args.block_size);
    let mut pool = BlockReaderPool::open(image, config)?;

    let started = Instant::now();
    let mut hasher = StreamingHasher::new(algorithm);
    let mut hashed: u64 = 0;
    let mut last_pct = 0u64;

    for block in pool.blocks() {
        let block = block?;
        hasher.update_parallel(&block);
        hashed += block.len() as u64;

        let pct = if total_size > 0 {
            hashed * 100 / total_size
        } else {
            100
        };
        if pct / 10 > last_pct / 10 {
            info!(
                percent = pct,
                hashed_mib = hashed / (1024 * 1024),
                "hashing"
            );
            last_pct = pct;
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    let hash = hasher.finalize();
    let throughput = if elapsed > 0.0 {
        (hashed as f64 / (1024.0 * 1024.0)) / elapsed
    } else {
        0.0
    };
    info!(
        algorithm = algorithm.name(),
        %hash,
        elapsed_s = format!("{:.2}", elapsed),
        throughput_mib_s = format!("{:.1}", throughput),
        "hashing complete"
    );

    let verified = verify_against_stored(algorithm, &hash, &stored_hashes);
    match verified {
        Some(true) => info!("computed hash matches the hash stored in the container"),
        Some(false) => warn!("computed hash DOES NOT match the hash stored in the container"),
        None => debug!(
            algorithm = algorithm.name(),
            "container stores no hash for this algorithm"
        ),
    }

    let report = HashReport {
        image: args.image.display().to_string(),
        algorithm: algorithm.name(),
        hash: hash.clone(),
        total_bytes: hashed,
        elapsed_seconds: elapsed,
        throughput_mib_s: throughput,
        stored_hashes,
        verified,
        created: chrono::Utc::now().to_rfc3339(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}  {}", hash, args.image.display());
        if let Some(ok) = verified {
            println!(
                "stored {} hash: {}",
                algorithm.name(),
                if ok { "MATCH" } else { "MISMATCH" }
            );
        }
    }

    if !args.no_report {
        let report_path = report_path_for(&args.image);
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        info!(path = %report_path.display(), "report written");
    }

    if verified == Some(false) {
        std::process::exit(2);
    }
    Ok(())
}

/// Compare against any stored hash of the same algorithm. Stored names come
/// from the container ("MD5", "SHA1"), ours are canonical ("MD5", "SHA-1");
/// compare ignoring case and dashes.
fn verify_against_stored(
    algorithm: HashAlgorithm,
    computed: &str,
    stored: &[StoredImageHash],
) -> Option<bool> {
    let wanted = algorithm.name().replace('-', "").to_lowercase();
    stored
        .iter()
        .find(|s| s.algorithm.replace('-', "").to_lowercase() == wanted)
        .map(|s| hashes_match(computed, &s.hash))
}

fn report_path_for(image: &std::path::Path) -> PathBuf {
    let mut name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    name.push_str(".hash");
    image.with_file_name(name)
}
