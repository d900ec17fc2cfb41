use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives human-facing progress lines while the pipeline runs.
///
/// Implementations must tolerate a vanished consumer; emitting progress is
/// fire-and-forget and never fails the audit.
pub trait ProgressSink: Send + Sync {
    fn write(&self, message: &str);

    fn write_error(&self, message: &str);

    /// Section headline for the task about to run. Defaults to `write`.
    fn status(&self, message: &str) {
        self.write(message);
    }
}

/// Sink that forwards progress into the `tracing` pipeline.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn write(&self, message: &str) {
        info!(target: "pkgaudit::progress", "{message}");
    }

    fn write_error(&self, message: &str) {
        warn!(target: "pkgaudit::progress", "{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Status(String),
    Info(String),
    Error(String),
}

/// Sink that streams progress over an unbounded channel, for consumers that
/// render it elsewhere (a UI thread, a websocket, a test).
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn write(&self, message: &str) {
        let _ = self.tx.send(ProgressMessage::Info(message.to_string()));
    }

    fn write_error(&self, message: &str) {
        let _ = self.tx.send(ProgressMessage::Error(message.to_string()));
    }

    fn status(&self, message: &str) {
        let _ = self.tx.send(ProgressMessage::Status(message.to_string()));
    }
}
