//! Error types for the line logger
//!
//! Two failure families stop a logging session: writing the log file
//! (`LoggerError::Io`) and reading an input stream (`LoggerError::StreamRead`).

use std::io;

use crate::input::StreamId;
use crate::rotation::RotateError;

/// Errors that terminate a logging session
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The log file could not be written, rotated or reopened
    #[error("log file error: {0}")]
    Io(#[from] RotateError),
    /// An input stream failed mid-read
    #[error("failed to read {stream} input: {source}")]
    StreamRead {
        stream: StreamId,
        #[source]
        source: io::Error,
    },
}

impl LoggerError {
    /// The underlying IO error, if there is one
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            LoggerError::Io(RotateError::FileIOError(e)) => Some(e),
            LoggerError::Io(_) => None,
            LoggerError::StreamRead { source, .. } => Some(source),
        }
    }

    /// Description used in the stop banner
    ///
    /// Disk-full and permission problems are spelled out so they stand out
    /// when the log is read later.
    pub fn describe(&self) -> String {
        match self.io_error().map(categorize_io_error) {
            Some(kind @ (DiskErrorKind::DiskFull | DiskErrorKind::PermissionDenied)) => {
                format!("{} ({})", self, kind.user_message())
            }
            _ => self.to_string(),
        }
    }
}

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full",
            DiskErrorKind::PermissionDenied => "permission denied",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "io error",
        }
    }
}

/// Categorize an IO error
pub fn categorize_io_error(e: &io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        // On some systems, disk full surfaces as WriteZero
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28; EDQUOT = 122 on Linux, 69 on macOS
                    if os_error == 28 || os_error == 122 || os_error == 69 {
                        return DiskErrorKind::DiskFull;
                    }
                    // EACCES
                    if os_error == 13 {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_categorize_permission_denied() {
        let e = io::Error::new(ErrorKind::PermissionDenied, "nope");
        assert_eq!(categorize_io_error(&e), DiskErrorKind::PermissionDenied);
    }

    #[test]
    fn test_categorize_not_found() {
        let e = io::Error::new(ErrorKind::NotFound, "missing");
        assert_eq!(categorize_io_error(&e), DiskErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_categorize_enospc() {
        let e = io::Error::from_raw_os_error(28);
        assert_eq!(categorize_io_error(&e), DiskErrorKind::DiskFull);
    }

    #[test]
    fn test_describe_stream_read() {
        let err = LoggerError::StreamRead {
            stream: StreamId::Primary,
            source: io::Error::new(ErrorKind::InvalidData, "bad bytes"),
        };
        assert_eq!(err.describe(), "failed to read primary input: bad bytes");
    }

    #[test]
    fn test_describe_flags_permission_problems() {
        let err = LoggerError::Io(RotateError::FileIOError(io::Error::new(
            ErrorKind::PermissionDenied,
            "denied",
        )));
        assert!(err.describe().ends_with("(permission denied)"));
    }
}
