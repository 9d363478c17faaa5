//! The transition engine: CENTER↔REMOTE control transfer.
//!
//! Entry (CENTER → remote) and return (remote → CENTER) are short ordered
//! sequences over three scarce host resources (pointer grab, keyboard grab,
//! visible cursor) plus the network. The sequences are written so that no
//! failure can leave the host desktop grabbed: every abort funnels through
//! [`TransitionEngine::make_safe`], which releases everything best-effort
//! and restores CENTER.
//!
//! Ordering matters on entry: the calculated entry coordinate is sent to the
//! client *before* grabs and warp, so the client cursor appears at the
//! correct edge even on compositors that silently drop the warp request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use tx2tx_core::config::Config;
use tx2tx_core::domain::context::{
    entry_warp_position, return_warp_position, Direction, ScreenContext,
};
use tx2tx_core::domain::geometry::{Position, Screen};
use tx2tx_core::domain::tracker::PointerTracker;
use tx2tx_core::protocol::message::Message;

use crate::backend::DisplayBackend;
use crate::hotkey::{process_jump_sequence, JumpHotkeySpec, PanicKeySpec};
use crate::network::ClientRouter;
use crate::state::ServerState;

/// Minimum wall time between a return to CENTER and the next entry, so an
/// edge bounce does not ping-pong control.
pub const HYSTERESIS_DELAY: Duration = Duration::from_millis(200);

/// Minimum time in a remote context before the return edge is honoured.
/// Suppresses an immediate bounce-back from the parked entry position.
pub const REMOTE_RETURN_GUARD: Duration = Duration::from_millis(600);

/// Where to park the server pointer on a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parking {
    /// Just inside the edge opposite the crossing, per the warp table.
    Seam(Direction),
    /// The middle of the screen; used for explicit jumps, which have no
    /// crossing edge.
    ScreenCenter,
}

/// Server-side transition engine and forwarder.
///
/// Owns the display backend, the pointer tracker, and the mutable
/// [`ServerState`]; sends through the [`ClientRouter`] seam. All methods run
/// on the single tick thread.
pub struct TransitionEngine {
    backend: Box<dyn DisplayBackend>,
    router: Arc<dyn ClientRouter>,
    screen: Screen,
    tracker: PointerTracker,
    state: ServerState,
    routes: HashMap<ScreenContext, String>,
    velocity_threshold: f64,
    hysteresis: Duration,
    panic_key: PanicKeySpec,
    jump_hotkey: JumpHotkeySpec,
}

impl TransitionEngine {
    pub fn new(
        backend: Box<dyn DisplayBackend>,
        router: Arc<dyn ClientRouter>,
        screen: Screen,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            router,
            screen,
            tracker: PointerTracker::new(
                config.server.edge_threshold,
                config.server.velocity_threshold,
            ),
            state: ServerState::new(),
            routes: config.routes(),
            velocity_threshold: config.server.velocity_threshold,
            hysteresis: HYSTERESIS_DELAY,
            panic_key: PanicKeySpec::from_config(&config.server.panic_key),
            jump_hotkey: JumpHotkeySpec::from_config(&config.server.jump_hotkey),
        }
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn context(&self) -> ScreenContext {
        self.state.context
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Runs one polling-loop tick: sample the pointer, then dispatch to the
    /// CENTER or REMOTE handler.
    pub fn tick(&mut self, now: Instant) {
        let pos = self.backend.pointer_query();
        self.tracker.push_sample(pos, now);
        let velocity = self.tracker.velocity();

        if self.state.context.is_remote() {
            self.remote_tick(pos, velocity, now);
        } else {
            self.center_tick(pos, velocity, now);
        }
    }

    // ── CENTER handling ───────────────────────────────────────────────────────

    fn center_tick(&mut self, pos: Position, velocity: f64, now: Instant) {
        // Jump hotkeys work from CENTER too; without grabs the drain is
        // usually empty, but a recogniser match must still fire.
        let events = self.backend.events_drain();
        if !events.is_empty() {
            let (_, jump) = process_jump_sequence(
                events,
                &self.jump_hotkey,
                &mut self.state.jump_sequence,
                now,
            );
            if let Some(target) = jump {
                self.apply_jump(target, pos, now);
                return;
            }
        }

        if let Some(last) = self.state.last_center_switch {
            if now.duration_since(last) < self.hysteresis {
                return;
            }
        }

        let Some(crossing) = self.tracker.detect_boundary(pos, self.screen) else {
            return;
        };
        let target = crossing.direction.context();
        info!(
            x = crossing.position.x,
            y = crossing.position.y,
            velocity = format_args!("{velocity:.0}"),
            direction = ?crossing.direction,
            context = %target,
            "boundary crossed"
        );
        self.enter_remote(target, Parking::Seam(crossing.direction), crossing.position, now);
    }

    // ── Entry sequence ────────────────────────────────────────────────────────

    /// CENTER → remote entry. Returns `false` when the transition aborted;
    /// every abort leaves the engine safely in CENTER.
    pub(crate) fn enter_remote(
        &mut self,
        target: ScreenContext,
        parking: Parking,
        pos: Position,
        now: Instant,
    ) -> bool {
        let Some(client) = self.routes.get(&target).cloned() else {
            error!(context = %target, "no client configured for context");
            return false;
        };
        if !self.router.is_connected(&client) {
            error!(client, context = %target, "transition blocked: target client not connected");
            return false;
        }

        let warp_target = match parking {
            Parking::Seam(direction) => entry_warp_position(direction, pos, self.screen),
            Parking::ScreenCenter => {
                Position::new(self.screen.width as i32 / 2, self.screen.height as i32 / 2)
            }
        };

        // The calculated entry coordinate goes out first, so the client
        // cursor lands on the correct edge on frame one no matter what the
        // compositor does with the warp below.
        let entry_point = self.screen.normalize(warp_target);
        if !self.router.send(&client, &Message::mouse_move(entry_point)) {
            warn!(client, "entry coordinate rejected, aborting transition");
            return false;
        }

        if let Err(e) = self.backend.pointer_grab() {
            warn!(error = %e, "entry aborted");
            self.make_safe(now);
            return false;
        }
        if let Err(e) = self.backend.keyboard_grab() {
            warn!(error = %e, "entry aborted");
            self.make_safe(now);
            return false;
        }

        self.backend.cursor_hide();
        self.backend.pointer_warp(warp_target);
        if self.backend.needs_warp_confirmation() {
            self.state.set_pending_warp(warp_target);
        }

        self.tracker.reset();
        self.state.enter_remote(target, client, now);
        info!(context = %target, "entered remote context");
        true
    }

    // ── Return sequence ───────────────────────────────────────────────────────

    /// Remote → CENTER return: hide signal, release the grab bundle, show
    /// the cursor, warp to the return seam. Every step is best-effort.
    pub fn return_to_center(&mut self, pos: Position, now: Instant) {
        let prev = self.state.context;
        if let Some(client) = self.state.active_client.clone() {
            if !self.router.send(&client, &Message::hide_signal()) {
                debug!(client, "hide signal not delivered");
            }
        }

        self.backend.keyboard_ungrab();
        self.backend.pointer_ungrab();
        self.backend.cursor_show();

        if prev.is_remote() {
            let return_target = return_warp_position(prev, pos, self.screen);
            self.backend.pointer_warp(return_target);
        }

        self.tracker.reset();
        self.state.enter_center(now);
        info!(from = %prev, "returned to center");
    }

    /// Unconditional return on the panic key. Only ungrabs and shows; never
    /// grabs, so it is safe from any state.
    pub fn panic_return(&mut self, pos: Position, now: Instant) {
        warn!("panic key pressed, forcing return to center");
        if self.state.context.is_remote() {
            self.return_to_center(pos, now);
        }
    }

    /// Single cleanup sink for every error path: release the resource
    /// bundle best-effort and restore CENTER. Unlike the return sequence it
    /// sends nothing and does not warp.
    pub fn make_safe(&mut self, now: Instant) {
        self.backend.keyboard_ungrab();
        self.backend.pointer_ungrab();
        self.backend.cursor_show();
        self.tracker.reset();
        self.state.enter_center(now);
    }

    // ── Jumps, disconnects, shutdown ──────────────────────────────────────────

    /// Applies a completed jump-hotkey sequence.
    pub fn apply_jump(&mut self, target: ScreenContext, pos: Position, now: Instant) {
        if target == ScreenContext::Center {
            if self.state.context.is_remote() {
                info!("jump: returning to center");
                self.return_to_center(pos, now);
            }
            return;
        }
        if self.state.context == target {
            return;
        }

        let mut pos = pos;
        if self.state.context.is_remote() {
            self.return_to_center(pos, now);
            pos = self.backend.pointer_query();
        }
        info!(context = %target, "jump: entering context");
        self.enter_remote(target, Parking::ScreenCenter, pos, now);
    }

    /// Reacts to a client connection going away. If it was the active
    /// client, control returns to CENTER; the hide signal inside the return
    /// sequence is allowed to fail.
    pub fn handle_client_disconnect(&mut self, name: &str, now: Instant) {
        if self.state.active_client.as_deref() != Some(name) {
            return;
        }
        warn!(client = name, "active client disconnected, returning to center");
        let pos = self.backend.pointer_query();
        self.return_to_center(pos, now);
    }

    /// Shutdown path: leave the host desktop exactly as CENTER requires.
    pub fn shutdown(&mut self, now: Instant) {
        if self.state.context.is_remote() {
            let pos = self.backend.pointer_query();
            self.return_to_center(pos, now);
        } else {
            // Belt and braces: a half-acquired bundle must not survive exit.
            self.make_safe(now);
        }
    }

    // ── Shared access for the forwarder half of the engine ────────────────────

    pub(crate) fn backend_mut(&mut self) -> &mut dyn DisplayBackend {
        self.backend.as_mut()
    }

    pub(crate) fn state_mut(&mut self) -> &mut ServerState {
        &mut self.state
    }

    pub(crate) fn tracker_reset(&mut self) {
        self.tracker.reset();
    }

    pub(crate) fn router(&self) -> Arc<dyn ClientRouter> {
        Arc::clone(&self.router)
    }

    pub(crate) fn active_route(&self) -> Option<&String> {
        self.routes.get(&self.state.context)
    }

    pub(crate) fn velocity_threshold(&self) -> f64 {
        self.velocity_threshold
    }

    pub(crate) fn panic_key(&self) -> &PanicKeySpec {
        &self.panic_key
    }

    pub(crate) fn jump_hotkey(&self) -> &JumpHotkeySpec {
        &self.jump_hotkey
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use tx2tx_core::config::{ClientPlacement, ClientPosition};
    use tx2tx_core::protocol::message::{Message, MouseEventKind};

    use crate::backend::mock::{MockBackend, MockHandle};
    use crate::backend::RawInputEvent;
    use crate::testutil::RecordingRouter;

    const SCREEN: Screen = Screen { width: 1920, height: 1080 };

    fn config_with(placements: &[(&str, ClientPosition)]) -> Config {
        let mut config = Config::default();
        config.server.edge_threshold = 0;
        config.server.velocity_threshold = 50.0;
        for (name, position) in placements {
            config.clients.push(ClientPlacement { name: (*name).to_string(), position: *position });
        }
        config
    }

    fn engine_with(
        placements: &[(&str, ClientPosition)],
    ) -> (TransitionEngine, MockHandle, Arc<RecordingRouter>) {
        let backend = MockBackend::new(SCREEN);
        let handle = backend.handle();
        let names: Vec<&str> = placements.iter().map(|(name, _)| *name).collect();
        let router = Arc::new(RecordingRouter::with_clients(&names));
        let engine = TransitionEngine::new(
            Box::new(backend),
            Arc::clone(&router) as Arc<dyn crate::network::ClientRouter>,
            SCREEN,
            &config_with(placements),
        );
        (engine, handle, router)
    }

    fn first_move_to(router: &RecordingRouter, client: &str) -> Option<(f64, f64)> {
        router.sent_to(client).into_iter().find_map(|msg| match msg {
            Message::MouseEvent(ev) if ev.event == MouseEventKind::Move => {
                Some((ev.norm_x, ev.norm_y))
            }
            _ => None,
        })
    }

    /// Drives a fast sweep to the left edge across two ticks.
    fn sweep_left(engine: &mut TransitionEngine, handle: &MockHandle, t0: Instant) {
        handle.set_pointer(Position::new(960, 540));
        engine.tick(t0);
        handle.set_pointer(Position::new(100, 540));
        engine.tick(t0 + Duration::from_millis(20));
        handle.set_pointer(Position::new(0, 540));
        engine.tick(t0 + Duration::from_millis(40));
    }

    // ── Entry ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_fast_left_crossing_enters_west_with_grab_bundle() {
        let (mut engine, handle, _router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        sweep_left(&mut engine, &handle, Instant::now());

        assert_eq!(engine.context(), ScreenContext::West);
        assert_eq!(engine.state().active_client.as_deref(), Some("c_west"));
        assert!(handle.pointer_grabbed());
        assert!(handle.keyboard_grabbed());
        assert!(handle.cursor_hidden());
    }

    #[test]
    fn test_entry_first_message_is_calculated_edge_coordinate() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        sweep_left(&mut engine, &handle, Instant::now());

        let (norm_x, norm_y) = first_move_to(&router, "c_west").expect("entry move sent");
        // Left entry: the first coordinate must sit on the opposite edge,
        // within 3 pixels' worth of 1.0.
        assert!(norm_x >= 1.0 - 3.0 / 1920.0 - 1e-9, "entry norm_x too far from edge: {norm_x}");
        assert!((norm_y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_entry_warps_pointer_to_opposite_seam() {
        let (mut engine, handle, _router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        sweep_left(&mut engine, &handle, Instant::now());

        assert_eq!(engine.context(), ScreenContext::West);
        assert_eq!(handle.warps(), vec![Position::new(1917, 540)]);
    }

    #[test]
    fn test_slow_edge_contact_is_ignored() {
        // 5 px/s against a 50 px/s threshold: S2.
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        handle.set_pointer(Position::new(5, 540));
        engine.tick(t0);
        handle.set_pointer(Position::new(0, 540));
        engine.tick(t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(router.sent().is_empty(), "no messages may leave on a rejected crossing");
    }

    #[test]
    fn test_crossing_toward_unconfigured_edge_stays_center() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        handle.set_pointer(Position::new(960, 540));
        engine.tick(t0);
        handle.set_pointer(Position::new(1919, 540));
        engine.tick(t0 + Duration::from_millis(20));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(router.sent().is_empty());
        assert!(!handle.pointer_grabbed());
    }

    #[test]
    fn test_pointer_grab_failure_aborts_entry_safely() {
        // S3: grab refused -> no message, cursor shown, context CENTER.
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        handle.set_fail_pointer_grab(true);
        sweep_left(&mut engine, &handle, Instant::now());

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
        assert!(!handle.keyboard_grabbed());
        assert!(!handle.cursor_hidden());
        // The entry coordinate goes out before the grab attempt; nothing
        // else may follow it.
        assert!(router.sent().len() <= 1);
        assert!(!router.sent().iter().any(|(_, msg)| matches!(msg, Message::KeyEvent(_))));
    }

    #[test]
    fn test_keyboard_grab_failure_releases_pointer_grab() {
        let (mut engine, handle, _router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        handle.set_fail_keyboard_grab(true);
        sweep_left(&mut engine, &handle, Instant::now());

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed(), "partial bundle must be released within the tick");
        assert!(!handle.cursor_hidden());
    }

    #[test]
    fn test_entry_blocked_when_client_not_connected() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        router.disconnect("c_west");
        sweep_left(&mut engine, &handle, Instant::now());

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
    }

    // ── Hysteresis ────────────────────────────────────────────────────────────

    #[test]
    fn test_reentry_within_hysteresis_window_is_suppressed() {
        let (mut engine, handle, _router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        sweep_left(&mut engine, &handle, t0);
        assert_eq!(engine.context(), ScreenContext::West);

        // Force a return, then immediately hammer the edge again.
        let t1 = t0 + Duration::from_secs(2);
        engine.return_to_center(Position::new(1919, 540), t1);
        assert_eq!(engine.context(), ScreenContext::Center);

        handle.set_pointer(Position::new(100, 540));
        engine.tick(t1 + Duration::from_millis(20));
        handle.set_pointer(Position::new(0, 540));
        engine.tick(t1 + Duration::from_millis(40));
        assert_eq!(engine.context(), ScreenContext::Center, "hysteresis must hold the line");

        // Past the window the same crossing goes through.
        let t2 = t1 + HYSTERESIS_DELAY + Duration::from_millis(50);
        handle.set_pointer(Position::new(100, 540));
        engine.tick(t2);
        handle.set_pointer(Position::new(0, 540));
        engine.tick(t2 + Duration::from_millis(20));
        assert_eq!(engine.context(), ScreenContext::West);
    }

    // ── Return and panic primitives ───────────────────────────────────────────

    #[test]
    fn test_return_sequence_restores_center_invariant() {
        let (mut engine, handle, router) =
            engine_with(&[("c_east", ClientPosition::East)]);
        let t0 = Instant::now();
        handle.set_pointer(Position::new(1919, 300));
        assert!(engine.enter_remote(
            ScreenContext::East,
            Parking::Seam(Direction::Right),
            Position::new(1919, 300),
            t0,
        ));
        router.clear_sent();

        engine.return_to_center(Position::new(0, 300), t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
        assert!(!handle.keyboard_grabbed());
        assert!(!handle.cursor_hidden());
        assert_eq!(router.sent_to("c_east"), vec![Message::hide_signal()]);
        // Return warp parks just inside the left edge the pointer came back
        // through.
        assert_eq!(handle.warps().last(), Some(&Position::new(1917, 300)));
    }

    #[test]
    fn test_panic_return_from_remote_is_unconditional() {
        // S4 core: panic while grabbed releases everything.
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );
        router.clear_sent();

        engine.panic_return(Position::new(400, 400), t0 + Duration::from_millis(50));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
        assert!(!handle.keyboard_grabbed());
        assert!(!handle.cursor_hidden());
        assert_eq!(router.sent_to("c_west"), vec![Message::hide_signal()]);
    }

    #[test]
    fn test_panic_in_center_is_a_no_op() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        engine.panic_return(Position::new(400, 400), Instant::now());
        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(router.sent().is_empty());
        assert!(!handle.cursor_hidden());
    }

    // ── Disconnect of the active client ───────────────────────────────────────

    #[test]
    fn test_active_client_disconnect_forces_return() {
        // S5: the hide signal is allowed to fail; the grabs must not leak.
        let (mut engine, handle, router) =
            engine_with(&[("c_east", ClientPosition::East)]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::East,
            Parking::Seam(Direction::Right),
            Position::new(1919, 540),
            t0,
        );
        router.disconnect("c_east");

        engine.handle_client_disconnect("c_east", t0 + Duration::from_millis(100));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
        assert!(!handle.keyboard_grabbed());
        assert!(!handle.cursor_hidden());
    }

    #[test]
    fn test_unrelated_client_disconnect_changes_nothing() {
        let (mut engine, handle, _router) = engine_with(&[
            ("c_west", ClientPosition::West),
            ("c_east", ClientPosition::East),
        ]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );

        engine.handle_client_disconnect("c_east", t0 + Duration::from_millis(100));

        assert_eq!(engine.context(), ScreenContext::West);
        assert!(handle.pointer_grabbed());
    }

    // ── Jumps ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_jump_from_center_enters_context_with_center_parking() {
        let (mut engine, handle, router) =
            engine_with(&[("c_east", ClientPosition::East)]);
        let t0 = Instant::now();

        engine.apply_jump(ScreenContext::East, Position::new(400, 400), t0);

        assert_eq!(engine.context(), ScreenContext::East);
        assert!(handle.pointer_grabbed());
        assert_eq!(handle.warps(), vec![Position::new(960, 540)]);
        let (norm_x, norm_y) = first_move_to(&router, "c_east").expect("entry move sent");
        assert!((norm_x - 0.5).abs() < 1e-6);
        assert!((norm_y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_jump_between_remote_contexts_passes_through_center() {
        let (mut engine, handle, router) = engine_with(&[
            ("c_west", ClientPosition::West),
            ("c_east", ClientPosition::East),
        ]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );
        router.clear_sent();

        engine.apply_jump(ScreenContext::East, Position::new(1917, 540), t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::East);
        assert_eq!(engine.state().active_client.as_deref(), Some("c_east"));
        // The old client got its hide signal on the way through CENTER.
        assert_eq!(router.sent_to("c_west"), vec![Message::hide_signal()]);
        assert!(handle.pointer_grabbed());
    }

    #[test]
    fn test_jump_to_center_from_remote_returns() {
        let (mut engine, handle, _router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );

        engine.apply_jump(ScreenContext::Center, Position::new(960, 540), t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
    }

    #[test]
    fn test_jump_to_current_context_is_a_no_op() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );
        router.clear_sent();

        engine.apply_jump(ScreenContext::West, Position::new(960, 540), t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::West);
        assert!(router.sent().is_empty());
        assert!(handle.pointer_grabbed());
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    #[test]
    fn test_shutdown_from_remote_releases_everything() {
        let (mut engine, handle, router) =
            engine_with(&[("c_west", ClientPosition::West)]);
        let t0 = Instant::now();
        engine.enter_remote(
            ScreenContext::West,
            Parking::Seam(Direction::Left),
            Position::new(0, 540),
            t0,
        );
        router.clear_sent();

        engine.shutdown(t0 + Duration::from_secs(1));

        assert_eq!(engine.context(), ScreenContext::Center);
        assert!(!handle.pointer_grabbed());
        assert!(!handle.keyboard_grabbed());
        assert!(!handle.cursor_hidden());
        assert_eq!(router.sent_to("c_west"), vec![Message::hide_signal()]);
    }
}
