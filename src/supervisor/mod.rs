//! Keeps exactly one session's log files monitored and funnels their lines
//! through the parser into the game state.
//!
//! ```text
//! FileChangeNotifier (per kind) --RawLogEvent--> applier task --> GameStateMachine
//!            ^                                                          |
//!   supervisor task (session discovery)                       StateSubscription
//! ```

use crate::error::{FaultSink, TailError};
use crate::event::RawLogEvent;
use crate::parser::LogLineParser;
use crate::session::{self, is_session_dir_name, LogKind, LogSession};
use crate::state::{GameStateHandle, GameStateMachine, StateSubscription};
use crate::tail::{
    FileChangeNotifier, LineReader, StartPosition, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL,
};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Everything the core needs injected at construction.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Directory holding the `log_*` session folders.
    pub logs_root: PathBuf,
    /// Fallback poll interval for files and for session discovery. Raised
    /// to [`MIN_POLL_INTERVAL`] if shorter.
    pub poll_interval: Duration,
    /// Where readers start for the session found at startup. Files attached
    /// later (new session, late-created file) always start at the beginning.
    pub start_position: StartPosition,
}

impl TailConfig {
    pub fn new(logs_root: impl Into<PathBuf>) -> Self {
        Self {
            logs_root: logs_root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_position: StartPosition::Beginning,
        }
    }
}

/// Entry point of the monitoring core.
pub struct LogSetSupervisor;

impl LogSetSupervisor {
    /// Start monitoring. Must be called from within a tokio runtime.
    pub fn start(mut config: TailConfig, faults: FaultSink) -> SupervisorHandle {
        config.poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (active_tx, active_rx) = watch::channel(None);

        let machine = GameStateMachine::new();
        let state = machine.handle();
        let applier = tokio::spawn(apply_events(events_rx, machine, LogLineParser::new()));

        let supervisor = Supervisor {
            config,
            events: events_tx,
            seq: Arc::new(AtomicU64::new(0)),
            faults,
            active: None,
            active_tx,
            attached: BTreeMap::new(),
            initial_attach: true,
            root_watcher: None,
            last_scan_error: None,
        };
        let supervisor = tokio::spawn(supervisor.run(stop_rx));

        SupervisorHandle {
            state,
            active: active_rx,
            stop_tx,
            supervisor,
            applier,
        }
    }
}

/// Running monitor. Call [`shutdown`](Self::shutdown) to stop it cleanly.
#[derive(Debug)]
pub struct SupervisorHandle {
    state: GameStateHandle,
    active: watch::Receiver<Option<LogSession>>,
    stop_tx: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
    applier: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn state(&self) -> GameStateHandle {
        self.state.clone()
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.state.subscribe()
    }

    /// The session currently being monitored, if one has been found.
    pub fn active_session(&self) -> Option<LogSession> {
        self.active.borrow().clone()
    }

    /// Stop watches and timers, wait for lines already read to be applied,
    /// then release everything.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.supervisor.await {
            tracing::warn!(error = %e, "supervisor task ended abnormally");
        }
        // All line senders are gone now; the applier drains and exits.
        if let Err(e) = self.applier.await {
            tracing::warn!(error = %e, "applier task ended abnormally");
        }
    }
}

/// The single ordering point for state transitions.
async fn apply_events(
    mut rx: mpsc::Receiver<RawLogEvent>,
    mut machine: GameStateMachine,
    parser: LogLineParser,
) {
    while let Some(raw) = rx.recv().await {
        if let Some(event) = parser.parse(&raw.line) {
            tracing::debug!(seq = raw.seq, kind = %raw.kind, ?event, "applying event");
            machine.apply(&event);
        }
    }
    tracing::debug!("applier drained");
}

struct Attached {
    path: PathBuf,
    notifier: FileChangeNotifier,
}

struct Supervisor {
    config: TailConfig,
    events: mpsc::Sender<RawLogEvent>,
    seq: Arc<AtomicU64>,
    faults: FaultSink,
    active: Option<LogSession>,
    active_tx: watch::Sender<Option<LogSession>>,
    attached: BTreeMap<LogKind, Attached>,
    /// Set until the first scan, which alone honours `start_position`.
    initial_attach: bool,
    root_watcher: Option<RecommendedWatcher>,
    /// Last structural fault reported, so a persisting problem is reported once.
    last_scan_error: Option<String>,
}

impl Supervisor {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        let (dir_tx, mut dir_rx) = mpsc::channel::<()>(1);

        self.ensure_root_watch(&dir_tx);
        self.refresh().await;

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                Some(()) = dir_rx.recv() => {}
                _ = ticker.tick() => self.ensure_root_watch(&dir_tx),
            }
            if *stop_rx.borrow() {
                break;
            }
            self.refresh().await;
        }

        self.detach_all().await;
        self.root_watcher = None;
        tracing::info!("supervisor stopped");
    }

    /// Pick the newest session and make sure every log kind in it is
    /// attached.
    async fn refresh(&mut self) {
        let position = if std::mem::take(&mut self.initial_attach) {
            self.config.start_position
        } else {
            StartPosition::Beginning
        };

        let latest = match session::latest_session(&self.config.logs_root) {
            Ok(latest) => latest,
            Err(e) => {
                self.report_scan_error(e);
                return;
            }
        };

        if self.active.as_ref().map(|s| &s.root) != Some(&latest.root) {
            if let Some(previous) = &self.active {
                tracing::info!(
                    from = %previous.name(),
                    to = %latest.name(),
                    "new session detected, reattaching"
                );
            } else {
                tracing::info!(session = %latest.name(), "attaching to session");
            }
            self.detach_all().await;
            self.active = Some(latest.clone());
            self.active_tx.send_replace(Some(latest.clone()));
        }

        let files = match latest.log_files() {
            Ok(files) => files,
            Err(e) => {
                self.report_scan_error(e);
                return;
            }
        };
        self.last_scan_error = None;

        for (kind, path) in files {
            if let Some(current) = self.attached.get(&kind) {
                if current.path == path {
                    continue;
                }
            }
            if let Some(stale) = self.attached.remove(&kind) {
                stale.notifier.stop().await;
            }
            self.attach(kind, path, position);
        }
    }

    fn attach(&mut self, kind: LogKind, path: PathBuf, position: StartPosition) {
        tracing::info!(%kind, path = %path.display(), ?position, "attaching reader");
        let reader = Arc::new(LineReader::new(&path, kind, position));
        let notifier = FileChangeNotifier::spawn(
            reader,
            self.config.poll_interval,
            self.events.clone(),
            Arc::clone(&self.seq),
            self.faults.clone(),
        );
        self.attached.insert(kind, Attached { path, notifier });
    }

    async fn detach_all(&mut self) {
        for (kind, attached) in std::mem::take(&mut self.attached) {
            tracing::debug!(%kind, "detaching reader");
            attached.notifier.stop().await;
        }
    }

    /// (Re)create the logs root watch if it is missing. Failures are
    /// reported and retried on the next tick.
    fn ensure_root_watch(&mut self, signal: &mpsc::Sender<()>) {
        if self.root_watcher.is_some() || !self.config.logs_root.is_dir() {
            return;
        }
        match watch_logs_root(&self.config.logs_root, signal.clone(), self.faults.clone()) {
            Ok(watcher) => {
                tracing::debug!(root = %self.config.logs_root.display(), "watching logs root");
                self.root_watcher = Some(watcher);
            }
            Err(e) => self.faults.report("session watch", e),
        }
    }

    fn report_scan_error(&mut self, error: TailError) {
        let text = error.to_string();
        if self.last_scan_error.as_deref() == Some(text.as_str()) {
            return;
        }
        self.last_scan_error = Some(text);
        self.faults.report("session scan", error);
    }
}

fn watch_logs_root(
    root: &std::path::Path,
    signal: mpsc::Sender<()>,
    faults: FaultSink,
) -> Result<RecommendedWatcher, TailError> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Folders moved into the root show up as renames.
                let appeared = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any
                );
                let names_session = event.paths.iter().any(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(is_session_dir_name)
                });
                if appeared && names_session {
                    let _ = signal.try_send(());
                }
            }
            Err(e) => faults.report("session watch", TailError::Watch(e)),
        },
        Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
