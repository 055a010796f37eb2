//! Size-bounded rotating log file
//!
//! `RotatingFile` owns the active log file and its backup chain
//! (`path.1`, `path.2`, ...). Records are written whole; a record that would
//! push the active file past `max_bytes` first rotates the file.

mod backup;
mod compress;

pub use backup::BackupChain;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Compression applied to rotated backups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip; backups get the `.gz` extension
    Gzip,
}

impl Compression {
    /// File extension for compressed backups
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
        }
    }
}

/// Rotation limits for a log destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotation threshold in bytes
    pub max_bytes: u64,
    /// Number of rotated files to keep; 0 truncates on rotation
    pub backup_count: usize,
    /// Compression for rotated files
    pub compression: Option<Compression>,
    /// Unix permission bits for created files
    pub file_mode: Option<u32>,
}

impl RotationPolicy {
    /// Plain policy without compression or explicit permissions
    pub fn new(max_bytes: u64, backup_count: usize) -> Self {
        Self {
            max_bytes,
            backup_count,
            compression: None,
            file_mode: None,
        }
    }
}

/// Errors raised while writing or rotating a log file
#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error("failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("failed to rename '{from}' to '{to}': {error}")]
    RenameFileError {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
    #[error("failed to remove '{path}': {error}")]
    RemoveFileError { path: PathBuf, error: String },
    #[error("failed to set permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("failed to compress '{path}': {error}")]
    CompressFailed { path: PathBuf, error: String },
    #[error("log file '{0}' is closed")]
    Closed(PathBuf),
    #[error("{0}")]
    FileIOError(#[from] io::Error),
}

/// The active log file plus its backup chain
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    chain: BackupChain,
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

impl RotatingFile {
    /// Open `path` for appending, creating it (and its directory) if needed.
    ///
    /// The current size is taken from the existing file so a restarted
    /// process keeps honouring the threshold.
    pub fn open(path: impl AsRef<Path>, policy: RotationPolicy) -> Result<Self, RotateError> {
        let path = path.as_ref().to_path_buf();
        let file = open_log_file(&path, false, policy.file_mode)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let chain = BackupChain::new(&path, policy.backup_count, policy.compression);

        Ok(Self {
            path,
            policy,
            chain,
            writer: Some(BufWriter::new(file)),
            current_size,
        })
    }

    /// Bytes in the active file, including buffered ones
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Backups currently on disk, most recent first
    pub fn backups(&self) -> Vec<PathBuf> {
        self.chain.existing().into_iter().map(|(_, path)| path).collect()
    }

    /// Whether a record of `incoming` bytes must rotate the file first.
    ///
    /// An empty active file never rotates, so an oversized record lands in
    /// a fresh file instead of producing an empty backup.
    pub fn should_rotate(&self, incoming: u64) -> bool {
        self.current_size > 0 && self.current_size.saturating_add(incoming) > self.policy.max_bytes
    }

    /// Append one record verbatim, rotating beforehand if it would not fit
    pub fn write_record(&mut self, record: &[u8]) -> Result<(), RotateError> {
        if record.is_empty() {
            return Ok(());
        }
        if self.should_rotate(record.len() as u64) {
            self.rotate()?;
        }
        self.append(record)
    }

    /// Append one record to the active file without checking its size
    pub fn append(&mut self, record: &[u8]) -> Result<(), RotateError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RotateError::Closed(self.path.clone()))?;
        writer.write_all(record)?;
        self.current_size += record.len() as u64;
        Ok(())
    }

    /// Move the active file into the backup chain and start a fresh one.
    ///
    /// On failure the active file stays open for appending.
    pub fn rotate(&mut self) -> Result<(), RotateError> {
        let was_open = self.writer.is_some();
        let result = self.replace_active();
        if result.is_err() && was_open && self.writer.is_none() {
            self.reopen_active();
        }
        result
    }

    fn replace_active(&mut self) -> Result<(), RotateError> {
        // The handle must be closed before renaming on some platforms
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        if self.policy.backup_count == 0 {
            let file = open_log_file(&self.path, true, self.policy.file_mode)?;
            self.writer = Some(BufWriter::new(file));
            self.current_size = 0;
            tracing::debug!(path = %self.path.display(), "Truncated log file (no backups kept)");
            return Ok(());
        }

        self.chain.shift()?;

        if self.path.exists() {
            let first = self.chain.uncompressed_path(1);
            fs::rename(&self.path, &first).map_err(|err| RotateError::RenameFileError {
                from: self.path.clone(),
                to: first.clone(),
                error: err.to_string(),
            })?;

            if let Some(compression) = self.policy.compression {
                let compressed = compress::compress(&first, compression)?;
                set_permissions(&compressed, self.policy.file_mode)?;
            }
        }

        let pruned = self.chain.prune_excess();
        if pruned > 0 {
            tracing::debug!(pruned, "Removed backups beyond the configured count");
        }

        let file = open_log_file(&self.path, false, self.policy.file_mode)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;

        tracing::debug!(path = %self.path.display(), "Rotated log file");
        Ok(())
    }

    fn reopen_active(&mut self) {
        match open_log_file(&self.path, false, self.policy.file_mode) {
            Ok(file) => {
                self.current_size = file.metadata().map(|m| m.len()).unwrap_or(self.current_size);
                self.writer = Some(BufWriter::new(file));
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "Failed to reopen log file: {}", err)
            }
        }
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<(), RotateError> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(RotateError::from),
            None => Err(RotateError::Closed(self.path.clone())),
        }
    }

    /// Flush and release the file handle
    pub fn close(&mut self) -> Result<(), RotateError> {
        let result = self.flush();
        self.writer = None;
        result
    }
}

/// Open a log file for appending (or truncating), creating its parent
/// directory when the first attempt fails.
fn open_log_file(path: &Path, truncate: bool, file_mode: Option<u32>) -> Result<File, RotateError> {
    let mut open_options = OpenOptions::new();
    if truncate {
        open_options.write(true).truncate(true).create(true);
    } else {
        open_options.append(true).create(true);
    }

    let mut result = open_options.open(path);
    if result.is_err() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| RotateError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
            result = open_options.open(path);
        }
    }

    let file = result.map_err(|err| RotateError::CreateFileFailed(path.to_path_buf(), err.to_string()))?;
    set_permissions(path, file_mode)?;
    Ok(file)
}

fn set_permissions(path: &Path, file_mode: Option<u32>) -> Result<(), RotateError> {
    if let Some(mode) = file_mode {
        #[cfg(unix)]
        {
            fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|err| {
                RotateError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                }
            })?;
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            tracing::warn!(path = %path.display(), "File permissions are only applied on Unix");
        }
    }
    Ok(())
}
