// Segment discovery for multi-segment EWF images
//
// E01 images split across .E01, .E02, ..., .E99, then .Ex00, .Ex01, etc.
// Only the first segment carries the full metadata chain; the rest carry
// additional chunk data.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::SourceError;

/// Discover all E01 segment files belonging to `base_path`, in segment order.
///
/// `base_path` must point at the first segment (`.E01`); subsequent segments
/// are located next to it, matching either case of the extension.
pub fn discover_e01_segments(base_path: &Path) -> Result<Vec<PathBuf>, SourceError> {
    debug!(path = %base_path.display(), "discovering E01 segments");
    if !base_path.exists() {
        return Err(SourceError::Open(format!(
            "image not found: {}",
            base_path.display()
        )));
    }
    let parent = base_path
        .parent()
        .ok_or_else(|| SourceError::Open(format!("invalid path: {}", base_path.display())))?;
    let stem = base_path
        .file_stem()
        .ok_or_else(|| SourceError::Open(format!("no filename: {}", base_path.display())))?
        .to_string_lossy();

    let mut paths = vec![base_path.to_path_buf()];

    for i in 2..=999u32 {
        let segment_name = if i <= 99 {
            format!("{}.E{:02}", stem, i)
        } else {
            // After E99 comes Ex00, Ex01, etc.
            format!("{}.Ex{:02}", stem, i - 99)
        };

        let segment_path = parent.join(&segment_name);
        if segment_path.exists() {
            trace!(segment = i, path = %segment_path.display(), "found E01 segment");
            paths.push(segment_path);
            continue;
        }

        let lower_path = parent.join(segment_name.to_lowercase());
        if lower_path.exists() {
            trace!(segment = i, path = %lower_path.display(), "found E01 segment (lowercase)");
            paths.push(lower_path);
        } else {
            break;
        }
    }

    debug!(segment_count = paths.len(), "E01 segments discovered");
    Ok(paths)
}
