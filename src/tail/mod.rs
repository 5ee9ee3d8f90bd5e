//! Incremental tailing of log files.
//!
//! [`LineReader`] owns the read cursor of one file; [`FileChangeNotifier`]
//! decides when to call it.

pub mod notifier;
pub mod reader;

pub use notifier::{FileChangeNotifier, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use reader::{LineReader, MonitoredFile, StartPosition};
