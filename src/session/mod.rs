//! Session folder discovery.
//!
//! The game client creates one folder per run under its logs root:
//! `{logs_root}/log_{YYYY.MM.DD_HH-MM-SS}_{client version}/`
//! and writes one file per log kind inside it, e.g.
//! `2024.03.10_18-44-25_0.14.1.2.29197 application.log`.

use crate::error::TailError;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix every session folder name starts with.
pub const SESSION_DIR_PREFIX: &str = "log_";

const SESSION_STAMP_FORMAT: &str = "%Y.%m.%d_%H-%M-%S";
const SESSION_STAMP_LEN: usize = 19;

/// Which semantic log a file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogKind {
    Application,
    Notifications,
}

impl LogKind {
    pub const ALL: [LogKind; 2] = [LogKind::Application, LogKind::Notifications];

    /// File name suffix identifying this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            LogKind::Application => "application.log",
            LogKind::Notifications => "notifications.log",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Application => "application",
            LogKind::Notifications => "notifications",
        }
    }

    /// Classify a file name by its suffix (case-insensitive).
    pub fn from_file_name(name: &str) -> Option<LogKind> {
        let lower = name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| lower.ends_with(kind.suffix()))
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of the game client, identified by its log folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSession {
    /// Absolute path of the session folder.
    pub root: PathBuf,
    /// Taken from the folder name, or from filesystem metadata when the
    /// name carries no parseable timestamp.
    pub created: NaiveDateTime,
}

impl LogSession {
    /// Build a session from a folder path. Returns `None` for anything that
    /// is not a directory following the session naming convention.
    pub fn from_dir(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if !is_session_dir_name(name) {
            return None;
        }
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_dir() {
            return None;
        }

        let created = parse_session_stamp(name).or_else(|| {
            let time = metadata.created().or_else(|_| metadata.modified()).ok()?;
            Some(DateTime::<Local>::from(time).naive_local())
        })?;

        Some(Self {
            root: path.to_path_buf(),
            created,
        })
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Log files present in this session, at most one per kind. When a kind
    /// has several candidates the lexicographically last one wins.
    pub fn log_files(&self) -> Result<Vec<(LogKind, PathBuf)>, TailError> {
        let entries = fs::read_dir(&self.root).map_err(|e| TailError::io(&self.root, e))?;

        let mut found: Vec<(LogKind, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(kind) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(LogKind::from_file_name)
            else {
                continue;
            };

            match found.iter().position(|(k, _)| *k == kind) {
                Some(i) if path > found[i].1 => found[i].1 = path,
                Some(_) => {}
                None => found.push((kind, path)),
            }
        }

        found.sort_by_key(|(kind, _)| *kind);
        Ok(found)
    }
}

/// Whether a folder name follows the `log_<timestamp>` convention.
pub fn is_session_dir_name(name: &str) -> bool {
    name.starts_with(SESSION_DIR_PREFIX) && name.len() > SESSION_DIR_PREFIX.len()
}

/// Parse the timestamp embedded in a session folder name.
pub fn parse_session_stamp(name: &str) -> Option<NaiveDateTime> {
    let rest = name.strip_prefix(SESSION_DIR_PREFIX)?;
    let stamp = rest.get(..SESSION_STAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, SESSION_STAMP_FORMAT).ok()
}

/// All session folders under `logs_root`, oldest first.
pub fn list_sessions(logs_root: &Path) -> Result<Vec<LogSession>, TailError> {
    if !logs_root.is_dir() {
        return Err(TailError::LogsRootMissing(logs_root.to_path_buf()));
    }

    let entries = fs::read_dir(logs_root).map_err(|e| TailError::io(logs_root, e))?;
    let mut sessions: Vec<LogSession> = entries
        .flatten()
        .filter_map(|entry| LogSession::from_dir(&entry.path()))
        .collect();

    sessions.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.root.cmp(&b.root)));
    Ok(sessions)
}

/// The newest session folder under `logs_root`.
pub fn latest_session(logs_root: &Path) -> Result<LogSession, TailError> {
    list_sessions(logs_root)?
        .pop()
        .ok_or_else(|| TailError::NoSessions(logs_root.to_path_buf()))
}
