//! File and folder sources. Invalid UTF-8 is replaced, blank lines skipped.

use super::{push_lines, LineSource, RawLine};
use crate::cancel::CancelToken;
use crate::error::SourceError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const MAX_DEPTH: usize = 4;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn read_lossy(path: &Path) -> Result<String, SourceError> {
    let data = std::fs::read(path).map_err(|source| SourceError::Io {
        source_id: path.display().to_string(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

impl LineSource for FileSource {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn read_into(&mut self, out: &mut Vec<RawLine>, cancel: &CancelToken) -> Result<(), SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::NotFound(self.path.clone()));
        }
        let text = read_lossy(&self.path)?;
        let n = push_lines(&text, &self.id(), out, cancel)?;
        debug!(path = %self.path.display(), lines = n, "read file");
        Ok(())
    }
}

/// Every regular file in a folder, in file-name order. Only the top level
/// unless `recursive`.
pub struct FolderSource {
    root: PathBuf,
    recursive: bool,
}

impl FolderSource {
    pub fn new(root: PathBuf, recursive: bool) -> Self {
        Self { root, recursive }
    }
}

impl LineSource for FolderSource {
    fn id(&self) -> String {
        self.root.display().to_string()
    }

    fn read_into(&mut self, out: &mut Vec<RawLine>, cancel: &CancelToken) -> Result<(), SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotFound(self.root.clone()));
        }
        let depth = if self.recursive { MAX_DEPTH } else { 1 };
        let mut files = 0usize;
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            // One unreadable file does not sink the folder.
            let text = match read_lossy(path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable file");
                    continue;
                }
            };
            push_lines(&text, &path.display().to_string(), out, cancel)?;
            files += 1;
        }
        debug!(root = %self.root.display(), files, "read folder");
        Ok(())
    }
}
