//! Chunk directory enumeration
//!
//! The partitioner writes one file per chunk named `chunk_<id>` with an
//! optional suffix (`chunk_12.txt`, `chunk_12_overlap.txt`). Entries that do
//! not start with that pattern are skipped. Entries that match it with an id
//! too large for a chunk number are kept as failures.

use super::report::{BatchReport, ChunkFailure, ChunkStep};
use crate::api::ChunkId;
use crate::error::{CliError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static CHUNK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chunk_(\d+)").expect("valid chunk file regex"));

/// Substring of the full path that marks an overlap chunk
pub const OVERLAP_MARKER: &str = "overlap";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkFile {
    pub chunk_id: ChunkId,
    pub path: PathBuf,
}

impl ChunkFile {
    pub fn is_overlap(&self) -> bool {
        is_overlap_path(&self.path)
    }
}

pub fn is_overlap_path(path: &Path) -> bool {
    path.to_string_lossy().contains(OVERLAP_MARKER)
}

/// Chunk id encoded in a file name
///
/// `Ok(None)` for names outside the chunk pattern; an error when the name
/// matches but its id does not fit a chunk number.
pub fn chunk_id_from_name(name: &str) -> Result<Option<ChunkId>> {
    let Some(digits) = CHUNK_NAME.captures(name).and_then(|c| c.get(1)) else {
        return Ok(None);
    };
    digits.as_str().parse().map(Some).map_err(|e| {
        CliError::config(format!(
            "chunk id {} in '{}' is out of range: {}",
            digits.as_str(),
            name,
            e
        ))
    })
}

/// Chunk files found in one or more directories, plus the entries that look
/// like chunks but cannot be ingested
#[derive(Debug, Default, Clone)]
pub struct ChunkListing {
    pub chunks: Vec<ChunkFile>,
    pub rejected: Vec<ChunkFailure>,
}

impl ChunkListing {
    pub fn extend(&mut self, other: ChunkListing) {
        self.chunks.extend(other.chunks);
        self.rejected.extend(other.rejected);
        self.chunks.sort();
    }

    /// Total entries to account for in a batch report
    pub fn len(&self) -> usize {
        self.chunks.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report holding one failure per rejected entry
    pub fn rejected_report(&self) -> BatchReport {
        let mut report = BatchReport::new();
        for failure in &self.rejected {
            report.record_failure(failure.clone());
        }
        report
    }
}

/// List the chunk files of a partition output directory, ordered by chunk id
pub fn scan_chunk_directory(dir: &Path) -> Result<ChunkListing> {
    let dir = std::fs::canonicalize(dir).map_err(|e| {
        CliError::config(format!("chunk directory '{}' is not accessible: {}", dir.display(), e))
    })?;
    if !dir.is_dir() {
        return Err(CliError::config(format!(
            "chunk directory '{}' is not a directory",
            dir.display()
        )));
    }

    let mut listing = ChunkListing::default();
    let mut skipped = 0usize;

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name();
        match chunk_id_from_name(&name.to_string_lossy()) {
            Ok(Some(chunk_id)) => listing.chunks.push(ChunkFile {
                chunk_id,
                path: entry.path(),
            }),
            Ok(None) => skipped += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Unusable chunk file name");
                listing.rejected.push(ChunkFailure {
                    step: ChunkStep::Scan,
                    chunk_id: None,
                    path: entry.path(),
                    transaction_id: None,
                    error: e.to_string(),
                });
            },
        }
    }

    listing.chunks.sort();
    listing.rejected.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        dir = %dir.display(),
        chunks = listing.chunks.len(),
        rejected = listing.rejected.len(),
        skipped,
        "Scanned chunk directory"
    );
    Ok(listing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_id_from_name() {
        assert_eq!(chunk_id_from_name("chunk_12").unwrap(), Some(12));
        assert_eq!(chunk_id_from_name("chunk_7_overlap.txt").unwrap(), Some(7));
        assert_eq!(chunk_id_from_name("chunk_index.bin").unwrap(), None);
        assert_eq!(chunk_id_from_name("readme.txt").unwrap(), None);
        assert_eq!(chunk_id_from_name("my_chunk_3").unwrap(), None);

        let err = chunk_id_from_name("chunk_99999999999").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_out_of_range_chunk_recorded_as_failure() {
        let dir = TempDir::new().unwrap();
        for name in ["chunk_12", "chunk_99999999999.txt", "readme.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let listing = scan_chunk_directory(dir.path()).unwrap();
        assert_eq!(listing.chunks.len(), 1);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.rejected.len(), 1);

        let rejected = &listing.rejected[0];
        assert_eq!(rejected.step, ChunkStep::Scan);
        assert_eq!(rejected.chunk_id, None);
        assert!(rejected.path.ends_with("chunk_99999999999.txt"));

        let report = listing.rejected_report();
        assert_eq!(report.attempted(), 1);
        match report.into_result().unwrap_err() {
            CliError::PartialFailure { failed, total } => assert_eq!((failed, total), (1, 1)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_scan_ignores_unmatched_entries() {
        let dir = TempDir::new().unwrap();
        for name in ["chunk_12", "chunk_7_overlap", "readme.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("chunk_99")).unwrap();

        let listing = scan_chunk_directory(dir.path()).unwrap();
        assert!(listing.rejected.is_empty());
        let chunks = listing.chunks;
        let ids: Vec<ChunkId> = chunks.iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec![7, 12]);
        assert!(chunks[0].is_overlap());
        assert!(!chunks[1].is_overlap());
        assert!(chunks.iter().all(|c| c.path.is_absolute()));
    }

    #[test]
    fn test_overlap_read_from_full_path() {
        assert!(is_overlap_path(Path::new("/data/overlap/chunk_3.txt")));
        assert!(!is_overlap_path(Path::new("/data/chunksSet1/chunk_3.txt")));
    }

    #[test]
    fn test_missing_directory() {
        let err = scan_chunk_directory(Path::new("/nonexistent/chunksSet1")).unwrap_err();
        assert!(matches!(
            err,
            CliError::Ingest(qingest_common::IngestError::Configuration(_))
        ));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("chunk_1");
        std::fs::write(&file, "").unwrap();
        assert!(scan_chunk_directory(&file).is_err());
    }
}
