//! Change detection for one monitored file.
//!
//! Two triggers feed the same read: a `notify` watch on the file's parent
//! directory and a fixed poll timer. The watch is best effort; the timer
//! keeps reading even if the watch never fires or could not be set up.

use super::reader::LineReader;
use crate::error::{FaultSink, TailError};
use crate::event::RawLogEvent;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shorter poll intervals are raised to this; zero would panic the timer.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest a single read may take before it is reported as a fault. The
/// read is still awaited afterwards so its lines are not lost.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A running watch + timer pair for one file.
#[derive(Debug)]
pub struct FileChangeNotifier {
    /// Setting this to `true` asks the task to stop after its current read.
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FileChangeNotifier {
    /// Start monitoring `reader`'s file. Every line read is forwarded to
    /// `events` tagged with the next value of `seq`.
    pub fn spawn(
        reader: Arc<LineReader>,
        poll_interval: Duration,
        events: mpsc::Sender<RawLogEvent>,
        seq: Arc<AtomicU64>,
        faults: FaultSink,
    ) -> Self {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (signal_tx, signal_rx) = mpsc::channel::<()>(1);

        let watcher = match watch_file(reader.path(), signal_tx, faults.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                faults.report(format!("watch {}", reader.kind()), e);
                None
            }
        };

        let handle = tokio::spawn(run(
            reader,
            poll_interval,
            watcher,
            signal_rx,
            stop_rx,
            Pump {
                events,
                seq,
                faults,
                read_timeout: READ_TIMEOUT,
            },
        ));

        Self { stop_tx, handle }
    }

    /// Signal the task to stop and wait for it. A read already in progress
    /// is delivered before the task exits.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

struct Pump {
    events: mpsc::Sender<RawLogEvent>,
    seq: Arc<AtomicU64>,
    faults: FaultSink,
    read_timeout: Duration,
}

impl Pump {
    /// Read whatever is new and forward it. Returns `false` once nobody is
    /// listening for lines anymore.
    async fn read_and_forward(&self, reader: &Arc<LineReader>) -> bool {
        let context = format!("read {}", reader.kind());
        let task_reader = Arc::clone(reader);
        let mut read = tokio::task::spawn_blocking(move || task_reader.read_new_lines());

        // A slow read has already advanced the cursor by the time it returns,
        // so it is reported but never abandoned.
        let joined = match timeout(self.read_timeout, &mut read).await {
            Ok(joined) => joined,
            Err(_) => {
                self.faults.report(
                    context.clone(),
                    TailError::ReadTimeout(reader.path().to_path_buf()),
                );
                read.await
            }
        };

        let lines = match joined {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                self.faults.report(context, e);
                return true;
            }
            Err(e) => {
                self.faults.report(context, TailError::Join(e));
                return true;
            }
        };

        for line in lines {
            let event = RawLogEvent {
                kind: reader.kind(),
                line,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            };
            if self.events.send(event).await.is_err() {
                return false;
            }
        }
        true
    }
}

async fn run(
    reader: Arc<LineReader>,
    poll_interval: Duration,
    watcher: Option<RecommendedWatcher>,
    mut signal_rx: mpsc::Receiver<()>,
    mut stop_rx: watch::Receiver<bool>,
    pump: Pump,
) {
    tracing::info!(
        kind = %reader.kind(),
        path = %reader.path().display(),
        watching = watcher.is_some(),
        "monitoring log file"
    );

    // First tick fires immediately, which performs the initial read.
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
            Some(()) = signal_rx.recv() => {}
        }

        if *stop_rx.borrow() {
            break;
        }
        if !pump.read_and_forward(&reader).await {
            break;
        }
    }

    drop(watcher);
    tracing::info!(kind = %reader.kind(), "stopped monitoring log file");
}

/// Watch the parent directory and signal whenever an event touches `path`.
/// Bursts coalesce into a single pending signal.
fn watch_file(
    path: &Path,
    signal: mpsc::Sender<()>,
    faults: FaultSink,
) -> Result<RecommendedWatcher, TailError> {
    let file_name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let context = format!("watch {}", file_name.to_string_lossy());

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_change(&event.kind)
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()))
                {
                    let _ = signal.try_send(());
                }
            }
            Err(e) => faults.report(context.clone(), TailError::Watch(e)),
        },
        Config::default(),
    )?;

    watcher.watch(parent, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Size, write-time and name changes all count; plain reads do not.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}
