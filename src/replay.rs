//! One-shot replay of a single log file through parser and state machine.

use crate::error::TailError;
use crate::event::SemanticEvent;
use crate::parser::LogLineParser;
use crate::session::LogKind;
use crate::state::{GameState, GameStateMachine};
use crate::tail::{LineReader, StartPosition};
use std::path::Path;

/// What a replay saw.
#[derive(Debug)]
pub struct ReplayReport {
    pub lines_read: usize,
    /// Recognised events in file order, with the rule that produced each.
    pub events: Vec<(&'static str, SemanticEvent)>,
    pub state: GameState,
}

/// Read `path` from the start and apply every recognised line.
pub fn replay_file(path: &Path) -> Result<ReplayReport, TailError> {
    if !path.is_file() {
        return Err(TailError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "log file not found"),
        ));
    }

    let kind = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(LogKind::from_file_name)
        .unwrap_or(LogKind::Application);
    let reader = LineReader::new(path, kind, StartPosition::Beginning);
    let parser = LogLineParser::new();
    let mut machine = GameStateMachine::new();

    let mut lines_read = 0;
    let mut events = Vec::new();
    let mut apply = |lines: &[String]| {
        lines_read += lines.len();
        for line in lines {
            if let Some((rule, event)) = parser.parse_with_rule(line) {
                machine.apply(&event);
                events.push((rule, event));
            }
        }
    };

    loop {
        let before = reader.monitored().offset;
        let lines = reader.read_new_lines()?;
        if lines.is_empty() && reader.monitored().offset == before {
            break;
        }
        apply(&lines);
    }
    // The file is finished, so an unterminated last line counts too.
    if let Some(last) = reader.read_trailing_line()? {
        apply(&[last]);
    }

    Ok(ReplayReport {
        lines_read,
        events,
        state: machine.handle().snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionMode;
    use std::fs;

    fn write_log(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024.03.10_18-44-25_0.14.1 application.log");
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_replay_matching_raid_map() {
        let (_dir, path) = write_log(&[
            "Matching with group id abc",
            "2024-03-10 18:51:00.000|Info|application|GameStarted:2459.92 real:0.00",
            "TRACE-NetworkGameCreate profileStatus: 'Location: bigmap, Sid: abc'",
        ]);

        let report = replay_file(&path).unwrap();
        assert_eq!(report.lines_read, 3);
        assert_eq!(report.events.len(), 3);
        assert!(!report.state.is_matching);
        assert!(report.state.is_in_raid);
        assert_eq!(report.state.current_map.as_deref(), Some("Customs"));
        assert_eq!(
            report.state.overlay_reference.as_deref(),
            Some("https://tarkov.dev/map/customs")
        );
    }

    #[test]
    fn test_replay_session_mode_only() {
        let (_dir, path) = write_log(&["|Info|application|Session mode: Pve"]);

        let report = replay_file(&path).unwrap();
        assert_eq!(report.state.session_mode, SessionMode::Pve);
        assert!(!report.state.is_in_raid);
        assert!(!report.state.is_matching);
    }

    #[test]
    fn test_replay_leave_game_clears_raid() {
        let (_dir, path) = write_log(&[
            "GameStarted:1.0",
            "TRACE-NetworkGameCreate profileStatus: 'Location: woods, Sid: a'",
            "TRACE-NetworkGameCreate profileStatus: 'Location: bigmap, Sid: b'",
            "TRACE-NetworkGameCreate profileStatus: 'Location: Shoreline, Sid: c'",
            "|Info|application|SelectProfile LeaveGame",
        ]);

        let report = replay_file(&path).unwrap();
        assert!(!report.state.is_in_raid);
        assert_eq!(report.state.current_map, None);
        assert_eq!(report.events.last().unwrap().0, "raid-ended");
    }

    #[test]
    fn test_replay_reads_last_line_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024.03.10_18-44-25_0.14.1 application.log");
        fs::write(&path, "GameStarted:1.0\n|Info|application|SelectProfile LeaveGame").unwrap();

        let report = replay_file(&path).unwrap();
        assert_eq!(report.lines_read, 2);
        assert_eq!(report.events.len(), 2);
        assert!(!report.state.is_in_raid);
    }

    #[test]
    fn test_replay_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(replay_file(&dir.path().join("nope.log")).is_err());
    }
}
