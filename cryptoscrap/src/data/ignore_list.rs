//! Durable list of symbols the histo API has no data for

use crate::data::StoreError;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const IGNORE_LIST_FILE: &str = "ignore_list.txt";

/// Plain-text file, one symbol per line, append-only.
#[derive(Debug, Clone)]
pub struct IgnoreListStore {
    path: PathBuf,
}

impl IgnoreListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional location under a data root
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(IGNORE_LIST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every symbol. A missing file is an empty list.
    pub fn load_all(&self) -> Result<HashSet<String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append one symbol. Duplicates are tolerated.
    pub fn append(&self, symbol: &str) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", symbol)?;
        Ok(())
    }
}
