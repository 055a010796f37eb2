//! Diagnostics for logstd itself
//!
//! The tool's own messages go to stderr through tracing, never into the log
//! file it manages.

mod diagnostics;

pub use diagnostics::{env_filter, init_diagnostics, DEFAULT_FILTER};
