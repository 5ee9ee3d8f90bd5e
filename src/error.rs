//! Error taxonomy and the fault reporting channel.
//!
//! Nothing in the monitoring pipeline is allowed to stop on an error. Every
//! recoverable problem is wrapped in a [`Fault`] and pushed through a
//! [`FaultSink`] so the host can log or display it.

use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while discovering, watching or reading log files.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("filesystem watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("logs root not found: {}", .0.display())]
    LogsRootMissing(PathBuf),

    #[error("no session folders under {}", .0.display())]
    NoSessions(PathBuf),

    #[error("read of {} did not finish in time", .0.display())]
    ReadTimeout(PathBuf),

    #[error("background read task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TailError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TailError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A recoverable error together with a short tag naming where it happened
/// (e.g. `"read application"`, `"session watch"`).
#[derive(Debug)]
pub struct Fault {
    pub context: String,
    pub error: TailError,
}

/// Sending half of the fault channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FaultSink {
    tx: mpsc::UnboundedSender<Fault>,
}

impl FaultSink {
    /// Create a sink and the receiver the host drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Fault>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Log the fault and forward it to the host. A closed receiver is ignored.
    pub fn report(&self, context: impl Into<String>, error: TailError) {
        let context = context.into();
        tracing::warn!(%context, %error, "recoverable fault");
        let _ = self.tx.send(Fault { context, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_delivers_fault() {
        let (sink, mut rx) = FaultSink::channel();
        sink.report(
            "read application",
            TailError::ReadTimeout(PathBuf::from("/tmp/a.log")),
        );

        let fault = rx.try_recv().unwrap();
        assert_eq!(fault.context, "read application");
        assert!(matches!(fault.error, TailError::ReadTimeout(_)));
    }

    #[test]
    fn test_report_with_dropped_receiver_is_silent() {
        let (sink, rx) = FaultSink::channel();
        drop(rx);
        sink.report("session scan", TailError::NoSessions(PathBuf::from("/logs")));
    }

    #[test]
    fn test_error_display() {
        let err = TailError::LogsRootMissing(PathBuf::from("/nope"));
        assert_eq!(err.to_string(), "logs root not found: /nope");

        let err = TailError::io(
            "/x/y.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        );
        assert!(err.to_string().starts_with("I/O error on /x/y.log"));
    }
}
