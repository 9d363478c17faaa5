//! Mutable server runtime state.
//!
//! One `ServerState` lives for the whole session, owned by the transition
//! engine and mutated only from the tick thread. It is passed around as an
//! explicit value, never as a global.
//!
//! Invariants maintained by the engine:
//! - context is `Center` iff no grabs are held and the cursor is visible;
//! - a non-`Center` context always names an active client;
//! - `last_sent` is `None` immediately after every context change.

use std::time::Instant;

use tx2tx_core::domain::context::ScreenContext;
use tx2tx_core::domain::geometry::{NormalizedPoint, Position, Screen};

use crate::hotkey::JumpSequenceState;

/// Runtime state of the server's transition engine.
#[derive(Debug)]
pub struct ServerState {
    /// The global context: which screen has control.
    pub context: ScreenContext,
    /// Name of the client receiving forwarded input while remote.
    pub active_client: Option<String>,
    /// When control last returned to CENTER, for entry hysteresis.
    pub last_center_switch: Option<Instant>,
    /// When control last entered a remote context, for the return guard.
    pub last_remote_switch: Option<Instant>,
    /// Deferred-warp protocol: a warp is pending observation.
    pub boundary_crossed: bool,
    /// Target of the pending warp.
    pub target_warp_position: Option<Position>,
    /// Ticks spent re-issuing the pending warp.
    pub warp_retries: u32,
    /// Last coordinate forwarded to the active client, for suppression of
    /// duplicate sends while the pointer is stationary.
    pub last_sent: Option<NormalizedPoint>,
    /// Jump-hotkey sequence progress.
    pub jump_sequence: JumpSequenceState,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            context: ScreenContext::Center,
            active_client: None,
            last_center_switch: None,
            last_remote_switch: None,
            boundary_crossed: false,
            target_warp_position: None,
            warp_retries: 0,
            last_sent: None,
            jump_sequence: JumpSequenceState::default(),
        }
    }

    /// Records a context change into a remote context.
    pub fn enter_remote(&mut self, context: ScreenContext, client: String, now: Instant) {
        debug_assert!(context.is_remote());
        self.context = context;
        self.active_client = Some(client);
        self.last_sent = None;
        self.last_remote_switch = Some(now);
    }

    /// Records a context change back to CENTER.
    pub fn enter_center(&mut self, now: Instant) {
        self.context = ScreenContext::Center;
        self.active_client = None;
        self.last_sent = None;
        self.last_center_switch = Some(now);
        self.clear_pending_warp();
    }

    /// Arms the deferred-warp protocol with a target to confirm.
    pub fn set_pending_warp(&mut self, target: Position) {
        self.boundary_crossed = true;
        self.target_warp_position = Some(target);
        self.warp_retries = 0;
    }

    /// Disarms the deferred-warp protocol.
    pub fn clear_pending_warp(&mut self) {
        self.boundary_crossed = false;
        self.target_warp_position = None;
        self.warp_retries = 0;
    }

    /// Whether `np` differs from the last sent coordinate by at least one
    /// pixel equivalent on `screen`. `true` when nothing has been sent yet.
    ///
    /// Coordinates are binned to whole pixels before comparing, so a
    /// coordinate that came from the same pixel can never register as
    /// movement through float noise alone.
    pub fn position_changed(&self, np: NormalizedPoint, screen: Screen) -> bool {
        let Some(last) = self.last_sent else {
            return true;
        };
        let w = screen.width as f64;
        let h = screen.height as f64;
        (np.x * w).round() as i64 != (last.x * w).round() as i64
            || (np.y * h).round() as i64 != (last.y * h).round() as i64
    }

    /// Records a coordinate as sent.
    pub fn note_sent(&mut self, np: NormalizedPoint) {
        self.last_sent = Some(np);
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Screen = Screen { width: 1920, height: 1080 };

    #[test]
    fn test_initial_state_is_center_with_nothing_pending() {
        let state = ServerState::new();
        assert_eq!(state.context, ScreenContext::Center);
        assert!(state.active_client.is_none());
        assert!(state.last_sent.is_none());
        assert!(!state.boundary_crossed);
        assert!(state.last_center_switch.is_none());
    }

    #[test]
    fn test_enter_remote_sets_context_client_and_clears_last_sent() {
        let mut state = ServerState::new();
        state.note_sent(NormalizedPoint::new(0.5, 0.5));
        state.enter_remote(ScreenContext::West, "laptop".to_string(), Instant::now());
        assert_eq!(state.context, ScreenContext::West);
        assert_eq!(state.active_client.as_deref(), Some("laptop"));
        assert!(state.last_sent.is_none(), "last_sent must clear on context change");
        assert!(state.last_remote_switch.is_some());
    }

    #[test]
    fn test_enter_center_clears_remote_bookkeeping() {
        let mut state = ServerState::new();
        state.enter_remote(ScreenContext::East, "tower".to_string(), Instant::now());
        state.note_sent(NormalizedPoint::new(0.1, 0.1));
        state.set_pending_warp(Position::new(2, 540));

        state.enter_center(Instant::now());
        assert_eq!(state.context, ScreenContext::Center);
        assert!(state.active_client.is_none());
        assert!(state.last_sent.is_none());
        assert!(!state.boundary_crossed);
        assert!(state.target_warp_position.is_none());
        assert!(state.last_center_switch.is_some());
    }

    #[test]
    fn test_position_changed_is_true_before_any_send() {
        let state = ServerState::new();
        assert!(state.position_changed(NormalizedPoint::new(0.5, 0.5), SCREEN));
    }

    #[test]
    fn test_position_changed_suppresses_identical_coordinate() {
        let mut state = ServerState::new();
        let np = NormalizedPoint::new(0.5, 0.5);
        state.note_sent(np);
        assert!(!state.position_changed(np, SCREEN));
    }

    #[test]
    fn test_position_changed_suppresses_sub_pixel_drift() {
        let mut state = ServerState::new();
        state.note_sent(NormalizedPoint::new(0.5, 0.5));
        // Well under a pixel on a 1920-wide screen.
        let drifted = NormalizedPoint::new(0.5 + 0.4 / 1920.0, 0.5);
        assert!(!state.position_changed(drifted, SCREEN));
    }

    #[test]
    fn test_position_changed_detects_one_pixel_move() {
        let mut state = ServerState::new();
        state.note_sent(SCREEN.normalize(Position::new(960, 540)));
        let moved = SCREEN.normalize(Position::new(961, 540));
        assert!(state.position_changed(moved, SCREEN));
    }

    #[test]
    fn test_pending_warp_arm_and_clear() {
        let mut state = ServerState::new();
        state.set_pending_warp(Position::new(1917, 300));
        assert!(state.boundary_crossed);
        assert_eq!(state.target_warp_position, Some(Position::new(1917, 300)));

        state.warp_retries = 7;
        state.clear_pending_warp();
        assert!(!state.boundary_crossed);
        assert_eq!(state.warp_retries, 0);
    }
}
