//! Session banners
//!
//! Every run is framed in the log by a start banner and, when the loop gets
//! to observe its own termination, a stop banner stating why it stopped.

use std::fmt;

use chrono::{DateTime, Local};

/// Horizontal rule framing banner messages
const RULE: &str = "-----------------------------------------------------------------------";

/// Timestamp layout used in the start banner
const TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// Why a logging session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The user interrupted the process (Ctrl-C)
    Interrupted,
    /// Every input stream reached end of file
    EndOfInput,
    /// Reading or writing failed
    Failed {
        /// Error description
        error: String,
        /// The last line read before the failure
        last_line: String,
    },
}

impl StopReason {
    /// Whether the session ended because of an error
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed { .. })
    }

    /// Banner block recorded in the log for this reason
    pub fn banner(&self) -> String {
        framed(&self.to_string())
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Interrupted => write!(f, "Stopped logging. Keyboard interrupt."),
            StopReason::EndOfInput => write!(f, "Stopped logging. End of input."),
            StopReason::Failed { error, last_line } => {
                write!(f, "Stopped logging. Exception: \"{}\"; line: \"{}\"", error, last_line)
            }
        }
    }
}

/// Start banner stating the configured limits and the start time
pub fn start_banner(max_size_mb: f64, max_bytes: u64, backup_count: usize, at: DateTime<Local>) -> String {
    framed(&format!(
        "Start logging; Max file size {} MB ({} bytes); Backup count: {}; Time {}",
        max_size_mb,
        max_bytes,
        backup_count,
        at.format(TIME_FORMAT)
    ))
}

fn framed(message: &str) -> String {
    format!("\n\n{RULE}\n{message}\n{RULE}\n\n")
}
