//! Authoritative game state and the transitions that drive it.

use crate::event::{SemanticEvent, SessionMode};
use crate::parser::maps;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// What the game is doing right now, as far as the logs tell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub current_map: Option<String>,
    pub is_in_raid: bool,
    pub is_matching: bool,
    pub session_mode: SessionMode,
    /// Overlay URL for the last map seen. Only recomputed when the map changes.
    pub overlay_reference: Option<String>,
}

impl GameState {
    /// Short label for the current phase.
    pub fn phase(&self) -> &'static str {
        if self.is_in_raid {
            "In raid"
        } else if self.is_matching {
            "Matching"
        } else {
            "Idle"
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | map: {} | mode: {}",
            self.phase(),
            self.current_map.as_deref().unwrap_or("-"),
            self.session_mode
        )?;
        if let Some(url) = &self.overlay_reference {
            write!(f, " | overlay: {url}")?;
        }
        Ok(())
    }
}

/// Shared, read-only view of the game state plus change notification.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct GameStateHandle {
    state: Arc<RwLock<GameState>>,
    revision: watch::Receiver<u64>,
}

impl GameStateHandle {
    /// Copy of the current state.
    pub fn snapshot(&self) -> GameState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of transitions applied so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Register for change notifications. Dropping the subscription
    /// unsubscribes.
    pub fn subscribe(&self) -> StateSubscription {
        let mut rx = self.revision.clone();
        rx.borrow_and_update();
        StateSubscription { rx }
    }
}

/// Receives a wake-up after every applied transition.
#[derive(Debug)]
pub struct StateSubscription {
    rx: watch::Receiver<u64>,
}

impl StateSubscription {
    /// Wait for the next change. Returns `false` once the state machine is
    /// gone and no further changes can arrive. Several transitions applied
    /// between two calls are reported once.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Revision seen by the last `changed` call.
    pub fn revision(&mut self) -> u64 {
        *self.rx.borrow_and_update()
    }
}

/// Owns the writable side of [`GameState`]. Exactly one task applies events.
#[derive(Debug)]
pub struct GameStateMachine {
    state: Arc<RwLock<GameState>>,
    revision: watch::Sender<u64>,
    overlay_recomputations: u64,
}

impl GameStateMachine {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0u64);
        Self {
            state: Arc::new(RwLock::new(GameState::default())),
            revision,
            overlay_recomputations: 0,
        }
    }

    pub fn handle(&self) -> GameStateHandle {
        GameStateHandle {
            state: Arc::clone(&self.state),
            revision: self.revision.subscribe(),
        }
    }

    /// How many times the overlay reference has been recomputed.
    pub fn overlay_recomputations(&self) -> u64 {
        self.overlay_recomputations
    }

    /// Apply one event and notify subscribers. No event is ever rejected.
    pub fn apply(&mut self, event: &SemanticEvent) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match event {
                SemanticEvent::MatchingStarted => {
                    state.is_matching = true;
                    state.is_in_raid = false;
                    state.current_map = None;
                }
                SemanticEvent::MatchingCancelled => {
                    state.is_matching = false;
                }
                SemanticEvent::RaidStarted => {
                    state.is_in_raid = true;
                    state.is_matching = false;
                }
                SemanticEvent::RaidEnded => {
                    state.is_in_raid = false;
                    state.current_map = None;
                }
                SemanticEvent::MapChanged(name) => {
                    if state.current_map.as_deref() != Some(name.as_str()) {
                        state.overlay_reference = Some(maps::overlay_url(name));
                        self.overlay_recomputations += 1;
                    }
                    state.current_map = Some(name.clone());
                }
                SemanticEvent::SessionModeChanged(mode) => {
                    state.session_mode = *mode;
                }
            }
            debug_assert!(!(state.is_in_raid && state.is_matching));
            tracing::debug!(
                ?event,
                phase = state.phase(),
                map = ?state.current_map,
                "transition applied"
            );
        }

        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(name: &str) -> SemanticEvent {
        SemanticEvent::MapChanged(name.to_string())
    }

    #[test]
    fn test_initial_state() {
        let machine = GameStateMachine::new();
        let state = machine.handle().snapshot();
        assert_eq!(state, GameState::default());
        assert_eq!(state.session_mode, SessionMode::Regular);
        assert_eq!(machine.handle().revision(), 0);
    }

    #[test]
    fn test_matching_then_raid_then_map() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::MatchingStarted);
        machine.apply(&SemanticEvent::RaidStarted);
        machine.apply(&map("Customs"));

        let state = machine.handle().snapshot();
        assert!(!state.is_matching);
        assert!(state.is_in_raid);
        assert_eq!(state.current_map.as_deref(), Some("Customs"));
        assert_eq!(
            state.overlay_reference.as_deref(),
            Some("https://tarkov.dev/map/customs")
        );
    }

    #[test]
    fn test_matching_started_clears_raid_and_map() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::RaidStarted);
        machine.apply(&map("Woods"));
        machine.apply(&SemanticEvent::MatchingStarted);

        let state = machine.handle().snapshot();
        assert!(state.is_matching);
        assert!(!state.is_in_raid);
        assert_eq!(state.current_map, None);
    }

    #[test]
    fn test_matching_cancelled() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::MatchingStarted);
        machine.apply(&SemanticEvent::MatchingCancelled);
        assert!(!machine.handle().snapshot().is_matching);
    }

    #[test]
    fn test_raid_ended_clears_map_after_many_map_changes() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::RaidStarted);
        machine.apply(&map("Customs"));
        machine.apply(&map("Woods"));
        machine.apply(&map("Shoreline"));
        machine.apply(&SemanticEvent::RaidEnded);

        let state = machine.handle().snapshot();
        assert!(!state.is_in_raid);
        assert_eq!(state.current_map, None);
    }

    #[test]
    fn test_session_mode_leaves_flags_alone() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::RaidStarted);
        machine.apply(&SemanticEvent::SessionModeChanged(SessionMode::Pve));

        let state = machine.handle().snapshot();
        assert_eq!(state.session_mode, SessionMode::Pve);
        assert!(state.is_in_raid);
        assert!(!state.is_matching);
    }

    #[test]
    fn test_same_map_twice_recomputes_overlay_once() {
        let mut machine = GameStateMachine::new();
        machine.apply(&map("Customs"));
        machine.apply(&map("Customs"));
        assert_eq!(machine.overlay_recomputations(), 1);

        machine.apply(&map("Woods"));
        assert_eq!(machine.overlay_recomputations(), 2);
    }

    #[test]
    fn test_unknown_map_uses_default_overlay() {
        let mut machine = GameStateMachine::new();
        machine.apply(&map("Terminal"));
        assert_eq!(
            machine.handle().snapshot().overlay_reference.as_deref(),
            Some(maps::DEFAULT_OVERLAY_URL)
        );
    }

    #[test]
    fn test_duplicate_events_are_idempotent() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::RaidStarted);
        let first = machine.handle().snapshot();
        machine.apply(&SemanticEvent::RaidStarted);
        assert_eq!(machine.handle().snapshot(), first);
    }

    #[test]
    fn test_never_in_raid_and_matching() {
        let events = [
            SemanticEvent::MatchingStarted,
            SemanticEvent::MatchingCancelled,
            SemanticEvent::RaidStarted,
            SemanticEvent::RaidEnded,
            map("Customs"),
            SemanticEvent::SessionModeChanged(SessionMode::Pve),
        ];

        // Every ordered pair and triple of events, from the default state.
        for a in &events {
            for b in &events {
                for c in &events {
                    let mut machine = GameStateMachine::new();
                    for event in [a, b, c] {
                        machine.apply(event);
                        let state = machine.handle().snapshot();
                        assert!(!(state.is_in_raid && state.is_matching));
                    }
                }
            }
        }
    }

    #[test]
    fn test_revision_bumps_per_event() {
        let mut machine = GameStateMachine::new();
        let handle = machine.handle();
        machine.apply(&SemanticEvent::MatchingStarted);
        machine.apply(&SemanticEvent::MatchingCancelled);
        assert_eq!(handle.revision(), 2);
    }

    #[tokio::test]
    async fn test_subscription_wakes_and_ends() {
        let mut machine = GameStateMachine::new();
        let mut sub = machine.handle().subscribe();

        machine.apply(&SemanticEvent::RaidStarted);
        assert!(sub.changed().await);
        assert_eq!(sub.revision(), 1);

        drop(machine);
        assert!(!sub.changed().await);
    }

    #[test]
    fn test_display() {
        let mut machine = GameStateMachine::new();
        machine.apply(&SemanticEvent::RaidStarted);
        machine.apply(&map("Customs"));
        let text = machine.handle().snapshot().to_string();
        assert_eq!(
            text,
            "In raid | map: Customs | mode: Regular | overlay: https://tarkov.dev/map/customs"
        );
    }
}
