//! Command-line surface

use std::path::PathBuf;

use clap::Parser;

/// Log-rotate standard input and errors to a file
///
/// Typical use: `command 2>&1 | logstd app.log --max_size_mb 1`
#[derive(Parser, Clone, Debug)]
#[command(name = "logstd", version)]
pub struct Cli {
    /// Path to the output file [default: log.out]
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Number of backups to keep [default: 5]
    #[arg(long = "backup_count", value_name = "N")]
    pub backup_count: Option<usize>,

    /// Maximum size of the log file in MB [default: 10]
    #[arg(long = "max_size_mb", value_name = "MB")]
    pub max_size_mb: Option<f64>,

    /// Secondary input to log alongside stdin, e.g. a named pipe carrying
    /// the program's error output
    #[arg(long, value_name = "PATH")]
    pub secondary: Option<PathBuf>,

    /// Longest wait for input per poll, in milliseconds [default: 10]
    #[arg(long = "poll_interval_ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Gzip rotated backups
    #[arg(long)]
    pub compress: bool,

    /// Config file [default: ~/.logstd/config.toml when present]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["logstd"]).unwrap();
        assert_eq!(cli.file, None);
        assert_eq!(cli.backup_count, None);
        assert_eq!(cli.max_size_mb, None);
        assert!(!cli.compress);
    }

    #[test]
    fn test_all_arguments() {
        let cli = Cli::try_parse_from([
            "logstd",
            "test.log",
            "--backup_count",
            "3",
            "--max_size_mb",
            "1.5",
            "--secondary",
            "/tmp/errors.fifo",
            "--poll_interval_ms",
            "25",
            "--compress",
        ])
        .unwrap();

        assert_eq!(cli.file, Some(PathBuf::from("test.log")));
        assert_eq!(cli.backup_count, Some(3));
        assert_eq!(cli.max_size_mb, Some(1.5));
        assert_eq!(cli.secondary, Some(PathBuf::from("/tmp/errors.fifo")));
        assert_eq!(cli.poll_interval_ms, Some(25));
        assert!(cli.compress);
    }

    #[test]
    fn test_rejects_negative_backup_count() {
        assert!(Cli::try_parse_from(["logstd", "--backup_count", "-1"]).is_err());
    }
}
