//! Input streams
//!
//! Each stream is drained by its own task, reading up to and including the
//! next newline and forwarding the bytes through a channel. The channel
//! closes once every reader has finished, which the logger treats as end of
//! input.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default number of lines buffered between readers and the logger
pub const DEFAULT_CHANNEL_BUFFER: usize = 1024;

/// Default cap on a single record; longer lines are split into chunks
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Which input stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    /// Standard input
    Primary,
    /// The optional second stream (typically the program's error output)
    Secondary,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Primary => write!(f, "primary"),
            StreamId::Secondary => write!(f, "secondary"),
        }
    }
}

/// Something a reader observed
#[derive(Debug)]
pub enum StreamEvent {
    /// A line, newline included when one was read
    Line { stream: StreamId, bytes: Vec<u8> },
    /// The stream failed; its reader has stopped
    Failed { stream: StreamId, error: io::Error },
}

/// Sender half of the stream event channel
pub type StreamEventSender = mpsc::Sender<StreamEvent>;

/// Receiver half of the stream event channel
pub type StreamEventReceiver = mpsc::Receiver<StreamEvent>;

/// Set of reader tasks feeding one channel
pub struct InputStreams {
    sender: StreamEventSender,
    receiver: StreamEventReceiver,
    readers: Vec<JoinHandle<()>>,
    max_record: usize,
}

impl InputStreams {
    /// Create an empty set with a bounded channel of `buffer` lines
    pub fn new(buffer: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        Self {
            sender,
            receiver,
            readers: Vec::new(),
            max_record: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// Split lines longer than `bytes` into several records
    pub fn with_max_record(mut self, bytes: usize) -> Self {
        self.max_record = bytes.max(1);
        self
    }

    /// Start draining `reader` as `stream`
    pub fn attach<R>(&mut self, stream: StreamId, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(read_lines(stream, reader, self.sender.clone(), self.max_record));
        self.readers.push(handle);
    }

    /// Start draining the file or named pipe at `path` as `stream`.
    ///
    /// Opening a named pipe blocks until a writer connects, so the open
    /// happens inside the reader task. A failed open is reported like any
    /// other read failure.
    pub fn attach_file(&mut self, stream: StreamId, path: PathBuf) {
        let sender = self.sender.clone();
        let max_record = self.max_record;
        let handle = tokio::spawn(async move {
            match tokio::fs::File::open(&path).await {
                Ok(file) => read_lines(stream, file, sender, max_record).await,
                Err(error) => {
                    debug!(%stream, path = %path.display(), %error, "Failed to open input");
                    let _ = sender.send(StreamEvent::Failed { stream, error }).await;
                }
            }
        });
        self.readers.push(handle);
    }

    /// Hand out the receiving end.
    ///
    /// Our own sender is dropped here, so the channel closes as soon as the
    /// last reader finishes.
    pub fn into_receiver(self) -> StreamEventReceiver {
        self.receiver
    }
}

/// Forward every line of `reader` until end of file or the first error.
///
/// A line longer than `max_record` is forwarded in pieces of at most that
/// many bytes.
async fn read_lines<R>(stream: StreamId, reader: R, sender: StreamEventSender, max_record: usize)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut bytes = Vec::new();
        let mut limited = (&mut reader).take(max_record as u64);
        match limited.read_until(b'\n', &mut bytes).await {
            Ok(0) => {
                debug!(%stream, "Input stream reached end of file");
                break;
            }
            Ok(_) => {
                if sender.send(StreamEvent::Line { stream, bytes }).await.is_err() {
                    debug!(%stream, "Logger gone, stopping reader");
                    break;
                }
            }
            Err(error) => {
                debug!(%stream, %error, "Input stream failed");
                let _ = sender.send(StreamEvent::Failed { stream, error }).await;
                break;
            }
        }
    }
}
