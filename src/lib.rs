//! Game log tailer and state inference.
//!
//! Tails the game client's per-session log files, recognises matchmaking,
//! raid and map transitions in them, and keeps a [`GameState`] that
//! consumers can subscribe to.

pub mod config;
pub mod error;
pub mod event;
pub mod parser;
pub mod replay;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod tail;

pub use config::Config;
pub use error::{Fault, FaultSink, TailError};
pub use event::{RawLogEvent, SemanticEvent, SessionMode};
pub use parser::LogLineParser;
pub use session::{latest_session, list_sessions, LogKind, LogSession};
pub use state::{GameState, GameStateHandle, GameStateMachine, StateSubscription};
pub use supervisor::{LogSetSupervisor, SupervisorHandle, TailConfig};
pub use tail::{FileChangeNotifier, LineReader, MonitoredFile, StartPosition};
