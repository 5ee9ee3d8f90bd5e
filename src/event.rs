use crate::session::LogKind;
use serde::Serialize;
use std::fmt;

/// One line read from a monitored file. Lives only until it is parsed.
#[derive(Debug, Clone)]
pub struct RawLogEvent {
    pub kind: LogKind,
    pub line: String,
    /// Global arrival order across all monitored files.
    pub seq: u64,
}

/// Game session mode as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionMode {
    #[default]
    Regular,
    Pve,
}

impl SessionMode {
    /// Case-insensitive match against the known mode tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "regular" => Some(SessionMode::Regular),
            "pve" => Some(SessionMode::Pve),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Regular => "Regular",
            SessionMode::Pve => "Pve",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A game-state transition recognised in a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticEvent {
    MatchingStarted,
    MatchingCancelled,
    RaidStarted,
    RaidEnded,
    /// Carries the display name (e.g. "Customs"), not the internal id.
    MapChanged(String),
    SessionModeChanged(SessionMode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_mode_from_token() {
        assert_eq!(SessionMode::from_token("Pve"), Some(SessionMode::Pve));
        assert_eq!(SessionMode::from_token("PVE"), Some(SessionMode::Pve));
        assert_eq!(SessionMode::from_token(" regular "), Some(SessionMode::Regular));
        assert_eq!(SessionMode::from_token("arena"), None);
    }

    #[test]
    fn test_session_mode_default_is_regular() {
        assert_eq!(SessionMode::default(), SessionMode::Regular);
        assert_eq!(SessionMode::Pve.to_string(), "Pve");
    }
}
