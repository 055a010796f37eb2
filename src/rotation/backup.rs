//! Numbered backup chain next to the active log file

use std::fs;
use std::path::{Path, PathBuf};

use super::{Compression, RotateError};

/// Backups of a log file, `<path>.1` being the most recent
#[derive(Debug, Clone)]
pub struct BackupChain {
    base: PathBuf,
    count: usize,
    extension: Option<&'static str>,
}

impl BackupChain {
    pub fn new(base: &Path, count: usize, compression: Option<Compression>) -> Self {
        Self {
            base: base.to_path_buf(),
            count,
            extension: compression.map(|c| c.extension()),
        }
    }

    /// Path of the backup at `index`, including the compression extension
    pub fn path_for(&self, index: usize) -> PathBuf {
        match self.extension {
            Some(ext) => suffixed(&self.base, &format!(".{}.{}", index, ext)),
            None => self.uncompressed_path(index),
        }
    }

    /// Path of the backup at `index` before compression
    pub fn uncompressed_path(&self, index: usize) -> PathBuf {
        suffixed(&self.base, &format!(".{}", index))
    }

    /// Both forms a backup at `index` may take on disk, plain then compressed.
    ///
    /// Compression can be switched between runs, so older backups may be in
    /// either form.
    fn forms(&self, index: usize) -> [PathBuf; 2] {
        let plain = self.uncompressed_path(index);
        let compressed = suffixed(&plain, &format!(".{}", Compression::Gzip.extension()));
        [plain, compressed]
    }

    /// Make room for a new backup 1.
    ///
    /// The backup at `count` is deleted, then every remaining backup moves up
    /// one index, highest first so nothing is overwritten. Plain and
    /// compressed files move alongside each other.
    pub fn shift(&self) -> Result<(), RotateError> {
        if self.count == 0 {
            return Ok(());
        }

        for oldest in self.forms(self.count) {
            if oldest.exists() {
                fs::remove_file(&oldest).map_err(|err| RotateError::RemoveFileError {
                    path: oldest.clone(),
                    error: err.to_string(),
                })?;
            }
        }

        for idx in (1..self.count).rev() {
            for (source, target) in self.forms(idx).into_iter().zip(self.forms(idx + 1)) {
                if source.exists() {
                    fs::rename(&source, &target).map_err(|err| RotateError::RenameFileError {
                        from: source.clone(),
                        to: target.clone(),
                        error: err.to_string(),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Backups found on disk as `(index, path)`, ordered by index.
    ///
    /// Both plain and `.gz` backups are reported so that switching
    /// compression on or off between runs still finds every file.
    pub fn existing(&self) -> Vec<(usize, PathBuf)> {
        let Some(file_name) = self.base.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let prefix = format!("{}.", file_name);

        let directory = match self.base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Ok(entries) = fs::read_dir(&directory) else {
            return Vec::new();
        };

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let index_str = rest
                .strip_suffix(&format!(".{}", Compression::Gzip.extension()))
                .unwrap_or(rest);
            if let Ok(index) = index_str.parse::<usize>() {
                if index >= 1 {
                    backups.push((index, entry.path()));
                }
            }
        }

        backups.sort();
        backups
    }

    /// Remove backups whose index is above `count`, and the second form of
    /// any index present both plain and compressed.
    ///
    /// Returns the number of files deleted. Failures are logged and skipped.
    pub fn prune_excess(&self) -> usize {
        let mut removed = 0;
        for (index, path) in self.existing() {
            let duplicate = index <= self.count
                && path != self.path_for(index)
                && self.path_for(index).exists();
            if index <= self.count && !duplicate {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!("Failed to remove old backup '{}': {}", path.display(), err)
                }
            }
        }
        removed
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
