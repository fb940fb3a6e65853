// File I/O pool for multi-segment images
//
// LRU cache of open segment file handles, so a many-segment image cannot
// exhaust the OS file descriptor limit. Each EwfHandle owns its own pool;
// pools are never shared across threads.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::SourceError;

/// Manages segment file handles with an LRU cap on simultaneously open files.
pub struct FileIoPool {
    /// Paths to all segment files in order
    file_paths: Vec<PathBuf>,
    /// Currently open file handles (file_index -> File)
    open_handles: HashMap<usize, File>,
    /// LRU queue for file handle management
    lru_queue: VecDeque<usize>,
    /// Maximum number of simultaneously open files
    max_open: usize,
}

impl FileIoPool {
    pub fn new(file_paths: Vec<PathBuf>, max_open: usize) -> Self {
        Self {
            file_paths,
            open_handles: HashMap::new(),
            lru_queue: VecDeque::new(),
            max_open: max_open.max(1),
        }
    }

    /// Get a file handle, opening it if necessary and evicting the least
    /// recently used handle when the cap is reached.
    pub fn get_file(&mut self, file_index: usize) -> Result<&mut File, SourceError> {
        if file_index >= self.file_paths.len() {
            return Err(SourceError::Format(format!(
                "segment index {} out of range (have {} segments)",
                file_index,
                self.file_paths.len()
            )));
        }

        if self.open_handles.contains_key(&file_index) {
            self.lru_queue.retain(|&x| x != file_index);
            self.lru_queue.push_front(file_index);
            trace!(file_index, "segment handle cache hit");
            return Ok(self
                .open_handles
                .get_mut(&file_index)
                .expect("handle present"));
        }

        if self.open_handles.len() >= self.max_open {
            if let Some(lru_index) = self.lru_queue.pop_back() {
                trace!(lru_index, "evicting LRU segment handle");
                self.open_handles.remove(&lru_index);
            }
        }

        let file_path = &self.file_paths[file_index];
        debug!(file_index, path = %file_path.display(), "opening segment");
        let file = File::open(file_path).map_err(|e| {
            SourceError::Open(format!("failed to open segment {}: {}", file_index, e))
        })?;

        self.open_handles.insert(file_index, file);
        self.lru_queue.push_front(file_index);

        Ok(self
            .open_handles
            .get_mut(&file_index)
            .expect("handle just inserted"))
    }

    pub fn file_count(&self) -> usize {
        self.file_paths.len()
    }

    pub fn open_count(&self) -> usize {
        self.open_handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_lru_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Vec::new();

        for i in 0..5 {
            let path = temp_dir.path().join(format!("seg_{}.bin", i));
            let mut file = File::create(&path).unwrap();
            file.write_all(&[i as u8; 64]).unwrap();
            paths.push(path);
        }

        let mut pool = FileIoPool::new(paths, 3);
        assert_eq!(pool.file_count(), 5);
        assert_eq!(pool.open_count(), 0);

        pool.get_file(0).unwrap();
        pool.get_file(1).unwrap();
        pool.get_file(2).unwrap();
        assert_eq!(pool.open_count(), 3);

        // A fourth open evicts the least recently used handle.
        pool.get_file(3).unwrap();
        assert_eq!(pool.open_count(), 3);

        pool.get_file(1).unwrap();
        assert_eq!(pool.open_count(), 3);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut pool = FileIoPool::new(Vec::new(), 3);
        assert!(matches!(pool.get_file(0), Err(SourceError::Format(_))));
    }
}
