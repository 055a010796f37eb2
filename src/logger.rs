//! Rotating line logger
//!
//! Drains the input channel into a `RotatingFile`, framing the session with
//! start and stop banners.

use std::future::Future;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::banner::{self, StopReason};
use crate::config::Settings;
use crate::error::LoggerError;
use crate::input::{StreamEvent, StreamEventReceiver, StreamId};
use crate::rotation::RotatingFile;

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A line was appended to the log
    Logged { stream: StreamId, bytes: usize },
    /// Nothing arrived within the poll interval
    Idle,
    /// Every input stream has ended
    Exhausted,
}

/// Writes lines from the input streams into a rotating log file
pub struct LineLogger {
    file: RotatingFile,
    events: StreamEventReceiver,
    poll_interval: Duration,
    last_line: Vec<u8>,
}

impl LineLogger {
    /// Open the log file and write the start banner
    pub fn start(settings: &Settings, events: StreamEventReceiver) -> Result<Self, LoggerError> {
        let mut file = RotatingFile::open(&settings.path, settings.rotation_policy())?;

        let banner = banner::start_banner(
            settings.max_size_mb,
            settings.max_bytes,
            settings.backup_count,
            Local::now(),
        );
        file.write_record(banner.as_bytes())?;
        file.flush()?;

        info!(
            path = %settings.path.display(),
            max_bytes = settings.max_bytes,
            backup_count = settings.backup_count,
            "Started logging"
        );

        Ok(Self {
            file,
            events,
            poll_interval: settings.poll_interval,
            last_line: Vec::new(),
        })
    }

    /// Wait up to the poll interval for one line and append it.
    ///
    /// Cancel-safe: the only suspension point is the channel receive.
    pub async fn poll_and_log(&mut self) -> Result<PollOutcome, LoggerError> {
        let event = match tokio::time::timeout(self.poll_interval, self.events.recv()).await {
            Err(_elapsed) => {
                self.file.flush()?;
                return Ok(PollOutcome::Idle);
            }
            Ok(None) => return Ok(PollOutcome::Exhausted),
            Ok(Some(event)) => event,
        };

        match event {
            StreamEvent::Line { stream, bytes } => {
                if bytes.is_empty() {
                    return Ok(PollOutcome::Idle);
                }
                self.last_line = bytes;
                self.file.write_record(&self.last_line)?;
                // Keep the file current for anyone tailing it
                self.file.flush()?;
                Ok(PollOutcome::Logged {
                    stream,
                    bytes: self.last_line.len(),
                })
            }
            StreamEvent::Failed { stream, error } => Err(LoggerError::StreamRead {
                stream,
                source: error,
            }),
        }
    }

    /// Rotate the log file now, regardless of its size
    pub fn rotate(&mut self) -> Result<(), LoggerError> {
        self.file.rotate()?;
        Ok(())
    }

    /// The last line read, without its line ending
    pub fn last_line(&self) -> String {
        String::from_utf8_lossy(&self.last_line)
            .trim_end_matches(['\n', '\r'])
            .to_string()
    }

    /// The log file being written
    pub fn file(&self) -> &RotatingFile {
        &self.file
    }

    /// Write the stop banner and close the file.
    ///
    /// If the file cannot be rotated the banner is appended to it anyway.
    pub fn stop(mut self, reason: &StopReason) -> Result<(), LoggerError> {
        let banner = reason.banner();
        let written = self
            .file
            .write_record(banner.as_bytes())
            .or_else(|_| self.file.append(banner.as_bytes()));
        let closed = self.file.close();
        written?;
        closed?;
        Ok(())
    }

    /// Log until the input is exhausted, an error occurs, or `shutdown`
    /// resolves, then record why in the stop banner.
    pub async fn run<F>(mut self, shutdown: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let reason = loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                outcome = self.poll_and_log() => Some(outcome),
            };

            match outcome {
                None => break StopReason::Interrupted,
                Some(Ok(PollOutcome::Exhausted)) => break StopReason::EndOfInput,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    break StopReason::Failed {
                        error: err.describe(),
                        last_line: self.last_line(),
                    };
                }
            }
        };

        if reason.is_failure() {
            warn!("{}", reason);
        } else {
            info!("{}", reason);
        }
        if let Err(err) = self.stop(&reason) {
            warn!("Failed to record stop banner: {}", err);
        }
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputStreams;
    use std::fs;
    use std::io::{self, Cursor};
    use std::path::Path;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;
    use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke")))
            } else {
                self.sent = true;
                buf.put_slice(b"last words\n");
                Poll::Ready(Ok(()))
            }
        }
    }

    fn settings(dir: &Path, max_bytes: u64, backup_count: usize) -> Settings {
        Settings::new(dir.join("test.log"), max_bytes, backup_count)
    }

    fn receiver_for(input: &[u8]) -> StreamEventReceiver {
        let mut inputs = InputStreams::new(64);
        inputs.attach(StreamId::Primary, Cursor::new(input.to_vec()));
        inputs.into_receiver()
    }

    #[tokio::test]
    async fn test_start_banner_precedes_lines() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 2);

        let logger = LineLogger::start(&settings, receiver_for(b"alpha\nbeta\n")).unwrap();
        let reason = logger.run(std::future::pending()).await;
        assert_eq!(reason, StopReason::EndOfInput);

        let content = fs::read_to_string(&settings.path).unwrap();
        assert_eq!(content.matches("Start logging").count(), 1);
        assert_eq!(content.matches("Stopped logging").count(), 1);

        let start = content.find("Start logging").unwrap();
        let alpha = content.find("alpha\nbeta\n").unwrap();
        let stop = content.find("Stopped logging. End of input.").unwrap();
        assert!(start < alpha && alpha < stop);
    }

    #[tokio::test]
    async fn test_lines_are_written_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 2);
        let mut logger = LineLogger::start(&settings, receiver_for(b"one\n\nno newline")).unwrap();
        let banner_len = logger.file().current_size();

        let mut logged = Vec::new();
        loop {
            match logger.poll_and_log().await.unwrap() {
                PollOutcome::Logged { bytes, .. } => logged.push(bytes),
                PollOutcome::Idle => {}
                PollOutcome::Exhausted => break,
            }
        }
        assert_eq!(logged, vec![4, 1, 10]);
        assert_eq!(logger.last_line(), "no newline");

        let content = fs::read(&settings.path).unwrap();
        assert_eq!(&content[banner_len as usize..], b"one\n\nno newline");
    }

    #[tokio::test]
    async fn test_idle_poll_returns() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024, 1);
        let (_writer, reader) = tokio::io::duplex(64);

        let mut inputs = InputStreams::new(4);
        inputs.attach(StreamId::Primary, reader);
        let mut logger = LineLogger::start(&settings, inputs.into_receiver()).unwrap();

        assert_eq!(logger.poll_and_log().await.unwrap(), PollOutcome::Idle);
        let on_disk = fs::metadata(&settings.path).unwrap().len();
        assert_eq!(on_disk, logger.file().current_size());
    }

    #[tokio::test]
    async fn test_logged_line_is_on_disk_before_stop() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 1);
        let mut logger = LineLogger::start(&settings, receiver_for(b"tail me\n")).unwrap();

        let outcome = logger.poll_and_log().await.unwrap();
        assert!(matches!(outcome, PollOutcome::Logged { bytes: 8, .. }));
        assert!(fs::read_to_string(&settings.path).unwrap().ends_with("tail me\n"));
    }

    #[tokio::test]
    async fn test_lines_from_both_streams() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 1);
        let (mut out_writer, out_reader) = tokio::io::duplex(64);
        let (mut err_writer, err_reader) = tokio::io::duplex(64);

        let mut inputs = InputStreams::new(16);
        inputs.attach(StreamId::Primary, out_reader);
        inputs.attach(StreamId::Secondary, err_reader);
        let mut logger = LineLogger::start(&settings, inputs.into_receiver()).unwrap();

        out_writer.write_all(b"stdout line\n").await.unwrap();
        let first = loop {
            match logger.poll_and_log().await.unwrap() {
                PollOutcome::Idle => continue,
                outcome => break outcome,
            }
        };
        assert_eq!(
            first,
            PollOutcome::Logged {
                stream: StreamId::Primary,
                bytes: 12
            }
        );

        err_writer.write_all(b"stderr line\n").await.unwrap();
        let second = loop {
            match logger.poll_and_log().await.unwrap() {
                PollOutcome::Idle => continue,
                outcome => break outcome,
            }
        };
        assert_eq!(
            second,
            PollOutcome::Logged {
                stream: StreamId::Secondary,
                bytes: 12
            }
        );

        drop(out_writer);
        drop(err_writer);
        assert_eq!(logger.run(std::future::pending()).await, StopReason::EndOfInput);

        let content = fs::read_to_string(&settings.path).unwrap();
        assert!(content.contains("stdout line\nstderr line\n"));
    }

    #[tokio::test]
    async fn test_shutdown_records_interrupt() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024, 1);
        let (_writer, reader) = tokio::io::duplex(64);

        let mut inputs = InputStreams::new(4);
        inputs.attach(StreamId::Primary, reader);
        let logger = LineLogger::start(&settings, inputs.into_receiver()).unwrap();

        let reason = logger
            .run(tokio::time::sleep(Duration::from_millis(30)))
            .await;
        assert_eq!(reason, StopReason::Interrupted);

        let content = fs::read_to_string(&settings.path).unwrap();
        assert!(content.contains("Stopped logging. Keyboard interrupt."));
        assert_eq!(content.matches("Stopped logging").count(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_records_exception_and_line() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 1);

        let mut inputs = InputStreams::new(4);
        inputs.attach(StreamId::Primary, FailingReader { sent: false });
        let logger = LineLogger::start(&settings, inputs.into_receiver()).unwrap();

        let reason = logger.run(std::future::pending()).await;
        assert!(reason.is_failure());

        let content = fs::read_to_string(&settings.path).unwrap();
        assert!(content.contains(
            "Stopped logging. Exception: \"failed to read primary input: pipe broke\"; line: \"last words\""
        ));
    }

    #[tokio::test]
    async fn test_write_failure_records_exception_in_active_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 300, 1);
        // Rotation cannot remove a non-empty directory in the backup slot
        let blocked = temp_dir.path().join("test.log.1");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();

        let overflow = format!("{}\n", "overflow".repeat(10));
        let input = format!("first\n{}", overflow);
        let logger = LineLogger::start(&settings, receiver_for(input.as_bytes())).unwrap();

        let reason = logger.run(std::future::pending()).await;
        match &reason {
            StopReason::Failed { error, last_line } => {
                assert!(error.contains("test.log.1"));
                assert_eq!(last_line, overflow.trim_end());
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let content = fs::read_to_string(&settings.path).unwrap();
        assert!(content.contains("first\n"));
        assert!(!content.contains(&overflow));
        assert!(content.ends_with(&reason.banner()));
        assert!(content.contains(&format!("line: \"{}\"", overflow.trim_end())));
    }

    #[tokio::test]
    async fn test_rotation_keeps_banner_in_backup() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 300, 2);
        let line = format!("{}\n", "x".repeat(99));

        let input = line.repeat(4);
        let logger = LineLogger::start(&settings, receiver_for(input.as_bytes())).unwrap();
        logger.run(std::future::pending()).await;

        // The ~250 byte banner leaves no room for a line, so it sits alone
        // in the oldest backup; three lines fill the next file.
        let oldest = fs::read_to_string(temp_dir.path().join("test.log.2")).unwrap();
        assert_eq!(oldest.matches("Start logging").count(), 1);
        assert!(!oldest.contains('x'));

        let newest = fs::read_to_string(temp_dir.path().join("test.log.1")).unwrap();
        assert_eq!(newest, line.repeat(3));
        assert!(!temp_dir.path().join("test.log.3").exists());

        let active = fs::read_to_string(&settings.path).unwrap();
        assert!(active.starts_with(&line));
        assert!(active.ends_with(&StopReason::EndOfInput.banner()));
    }

    #[tokio::test]
    async fn test_start_fails_on_unwritable_path() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be opened as the log file
        let settings = Settings::new(temp_dir.path(), 1024, 1);

        let result = LineLogger::start(&settings, receiver_for(b""));
        assert!(matches!(result, Err(LoggerError::Io(_))));
    }

    #[tokio::test]
    async fn test_manual_rotate() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path(), 1024 * 1024, 3);
        let mut logger = LineLogger::start(&settings, receiver_for(b"")).unwrap();

        logger.rotate().unwrap();
        assert_eq!(logger.file().current_size(), 0);
        assert_eq!(logger.file().backups().len(), 1);
    }
}
