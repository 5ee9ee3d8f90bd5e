//! Log line parser.
//!
//! Each line is checked against an ordered rule table; the first rule whose
//! pattern matches and whose fields extract cleanly produces the event.
//! Most lines match nothing, which is expected.

pub mod maps;

use crate::event::{SemanticEvent, SessionMode};
use regex::{Captures, Regex};

type Extract = fn(&Captures<'_>) -> Option<SemanticEvent>;

struct Rule {
    name: &'static str,
    pattern: Regex,
    extract: Extract,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, extract: Extract) -> Self {
        Self {
            name,
            // Patterns are literals below; a bad one is a programming error.
            pattern: Regex::new(pattern).expect("invalid built-in log pattern"),
            extract,
        }
    }
}

/// Stateless translator from log text to [`SemanticEvent`].
pub struct LogLineParser {
    rules: Vec<Rule>,
}

impl LogLineParser {
    pub fn new() -> Self {
        let rules = vec![
            // Matching with group id 66a1b2c3...
            Rule::new("matching-started", r"Matching with group id", |_| {
                Some(SemanticEvent::MatchingStarted)
            }),
            // Network game matching aborted / cancelled
            Rule::new(
                "matching-cancelled",
                r"Network game matching (?:aborted|cancelled|canceled)",
                |_| Some(SemanticEvent::MatchingCancelled),
            ),
            // TRACE-NetworkGameCreate profileStatus: 'Profileid: ..., Location: bigmap, Sid: ...'
            Rule::new(
                "map-loaded",
                r"TRACE-NetworkGameCreate profileStatus.*?Location:\s*([^,']*),",
                extract_map,
            ),
            // ... GameStarted: ...
            Rule::new("raid-started", r"GameStarted", |_| {
                Some(SemanticEvent::RaidStarted)
            }),
            Rule::new(
                "raid-ended",
                r"LeaveGame|Network game finished|NetworkGameDisconnected",
                |_| Some(SemanticEvent::RaidEnded),
            ),
            // Session mode: Pve
            Rule::new(
                "session-mode-changed",
                r"(?i)Session mode:\s*([A-Za-z]+)",
                extract_session_mode,
            ),
        ];

        Self { rules }
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Translate one line into at most one event.
    pub fn parse(&self, line: &str) -> Option<SemanticEvent> {
        self.parse_with_rule(line).map(|(_, event)| event)
    }

    /// Like [`parse`](Self::parse), also returning the name of the rule that fired.
    pub fn parse_with_rule(&self, line: &str) -> Option<(&'static str, SemanticEvent)> {
        for rule in &self.rules {
            let Some(caps) = rule.pattern.captures(line) else {
                continue;
            };
            if let Some(event) = (rule.extract)(&caps) {
                tracing::debug!(rule = rule.name, ?event, "log line matched");
                return Some((rule.name, event));
            }
        }
        None
    }
}

impl Default for LogLineParser {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_map(caps: &Captures<'_>) -> Option<SemanticEvent> {
    let id = caps.get(1)?.as_str().trim();
    if id.is_empty() {
        return None;
    }
    Some(SemanticEvent::MapChanged(maps::display_name(id)))
}

fn extract_session_mode(caps: &Captures<'_>) -> Option<SemanticEvent> {
    let token = caps.get(1)?.as_str();
    match SessionMode::from_token(token) {
        Some(mode) => Some(SemanticEvent::SessionModeChanged(mode)),
        None => {
            tracing::warn!(token, "unrecognized session mode, line dropped");
            None
        }
    }
}
