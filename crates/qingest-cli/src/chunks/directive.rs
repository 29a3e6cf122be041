//! Load directives
//!
//! One line per allocated chunk, whitespace separated:
//!
//! ```text
//! http://<host>:<port> <transaction-id> <table> <path> <chunk-id>
//! ```
//!
//! Paths therefore cannot contain whitespace.

use crate::api::{ChunkId, TransactionId, WorkerLocation};
use crate::chunks::scan::is_overlap_path;
use crate::error::{CliError, Result};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDirective {
    pub worker: WorkerLocation,
    pub transaction_id: TransactionId,
    pub table: String,
    pub path: PathBuf,
    pub chunk_id: ChunkId,
}

impl LoadDirective {
    pub fn is_overlap(&self) -> bool {
        is_overlap_path(&self.path)
    }
}

impl fmt::Display for LoadDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.worker,
            self.transaction_id,
            self.table,
            self.path.display(),
            self.chunk_id
        )
    }
}

impl FromStr for LoadDirective {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [url, transaction_id, table, path, chunk_id] = fields.as_slice() else {
            return Err(format!("expected 5 fields, found {}", fields.len()));
        };

        Ok(Self {
            worker: WorkerLocation::from_url(url)
                .ok_or_else(|| format!("invalid worker URL '{}'", url))?,
            transaction_id: transaction_id
                .parse()
                .map_err(|_| format!("invalid transaction id '{}'", transaction_id))?,
            table: (*table).to_string(),
            path: PathBuf::from(*path),
            chunk_id: chunk_id
                .parse()
                .map_err(|_| format!("invalid chunk id '{}'", chunk_id))?,
        })
    }
}

/// Read a manifest; blank lines are skipped, any malformed line fails the whole read
pub fn read_manifest(path: &Path) -> Result<Vec<LoadDirective>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CliError::config(format!("cannot read load manifest '{}': {}", path.display(), e))
    })?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            line.parse().map_err(|e| {
                CliError::config(format!("{}:{}: {}", path.display(), index + 1, e))
            })
        })
        .collect()
}

pub fn write_manifest(path: &Path, directives: &[LoadDirective]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for directive in directives {
        writeln!(file, "{}", directive)?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn directive(path: &str, chunk_id: ChunkId) -> LoadDirective {
        LoadDirective {
            worker: WorkerLocation::new("qserv-worker-02", 25004),
            transaction_id: 99,
            table: "Object".into(),
            path: PathBuf::from(path),
            chunk_id,
        }
    }

    #[test]
    fn test_line_format() {
        let line = directive("/data/chunksSet1/chunk_12.txt", 12).to_string();
        assert_eq!(
            line,
            "http://qserv-worker-02:25004 99 Object /data/chunksSet1/chunk_12.txt 12"
        );
        assert_eq!(line.parse::<LoadDirective>().unwrap(), directive("/data/chunksSet1/chunk_12.txt", 12));
    }

    #[test]
    fn test_overlap_flag() {
        assert!(directive("/data/chunk_7_overlap.txt", 7).is_overlap());
        assert!(!directive("/data/chunk_7.txt", 7).is_overlap());
    }

    #[test]
    fn test_malformed_lines() {
        assert!("http://w:1 99 Object /x".parse::<LoadDirective>().is_err());
        assert!("http://w 99 Object /x 1".parse::<LoadDirective>().is_err());
        assert!("http://w:1 abc Object /x 1".parse::<LoadDirective>().is_err());
    }

    #[test]
    fn test_manifest_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("load-1.txt");
        let directives = vec![directive("/d/chunk_1.txt", 1), directive("/d/chunk_1_overlap.txt", 1)];

        write_manifest(&path, &directives).unwrap();
        std::fs::write(&path, format!("{}\n\n", std::fs::read_to_string(&path).unwrap())).unwrap();

        assert_eq!(read_manifest(&path).unwrap(), directives);
    }

    #[test]
    fn test_manifest_error_names_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("load-1.txt");
        std::fs::write(&path, "http://w:1 9 Object /d/chunk_1.txt 1\nbroken\n").unwrap();

        let err = read_manifest(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }
}
