//! REMOTE-context forwarding: the other half of [`TransitionEngine`].
//!
//! Each tick while a remote context is active: confirm any pending warp,
//! check the return edge, forward the pointer coordinate when it moved, and
//! drain input events through the hotkey recognisers before forwarding them.
//! Exactly one client, the active one, ever receives anything; the
//! forwarder never broadcasts.

use std::time::Instant;

use tracing::{debug, error, warn};

use tx2tx_core::domain::context::at_return_edge;
use tx2tx_core::domain::geometry::Position;
use tx2tx_core::protocol::message::Message;

use crate::backend::RawInputEvent;
use crate::hotkey::process_jump_sequence;
use crate::transition::{TransitionEngine, REMOTE_RETURN_GUARD};

/// Pixel tolerance within which a deferred warp counts as confirmed.
const WARP_CONFIRM_TOLERANCE: i32 = 10;

/// Ticks the deferred-warp protocol retries before giving up (~0.5 s at the
/// REMOTE tick rate).
const WARP_RETRY_LIMIT: u32 = 25;

impl TransitionEngine {
    /// Runs one REMOTE-context tick.
    pub(crate) fn remote_tick(&mut self, pos: Position, velocity: f64, now: Instant) {
        let Some(client) = self.active_route().cloned() else {
            error!(context = %self.context(), "active context has no configured client, reverting");
            let _ = self.backend_mut().events_drain();
            self.make_safe(now);
            return;
        };
        if !self.router().is_connected(&client) {
            warn!(client, "active client connection is gone, reverting");
            let _ = self.backend_mut().events_drain();
            self.make_safe(now);
            return;
        }

        // While a warp awaits confirmation no coordinate is forwarded, but
        // panic and jump must still be able to fire.
        if self.state().boundary_crossed {
            self.deferred_warp_step();
            let handled = self.process_hotkeys_only(pos, now);
            if !handled && self.state().boundary_crossed {
                debug!("deferred warp pending, suppressing forwarding this tick");
            }
            return;
        }

        if self.return_triggered(pos, velocity, now) {
            self.return_to_center(pos, now);
            return;
        }

        let np = self.screen().normalize(pos);
        if self.state().position_changed(np, self.screen()) {
            if self.router().send(&client, &Message::mouse_move(np)) {
                self.state_mut().note_sent(np);
            } else {
                error!(client, "motion send failed, reverting");
                self.make_safe(now);
                return;
            }
        }

        self.forward_events(&client, pos, now);
    }

    /// One deferred-warp retry: re-issue, observe, confirm or give up.
    fn deferred_warp_step(&mut self) {
        let Some(target) = self.state().target_warp_position else {
            self.state_mut().clear_pending_warp();
            return;
        };

        self.backend_mut().pointer_warp(target);
        let observed = self.backend_mut().pointer_query();
        if (observed.x - target.x).abs() <= WARP_CONFIRM_TOLERANCE
            && (observed.y - target.y).abs() <= WARP_CONFIRM_TOLERANCE
        {
            debug!(x = target.x, y = target.y, "deferred warp confirmed");
            self.state_mut().clear_pending_warp();
            // The confirmed jump must not read back as pointer momentum.
            self.tracker_reset();
            return;
        }

        self.state_mut().warp_retries += 1;
        if self.state().warp_retries > WARP_RETRY_LIMIT {
            warn!(
                retries = self.state().warp_retries,
                "deferred warp never confirmed, proceeding without it"
            );
            self.state_mut().clear_pending_warp();
        }
    }

    /// Drains events for panic/jump recognition only, discarding the rest.
    /// Returns `true` when a recogniser consumed the tick.
    fn process_hotkeys_only(&mut self, pos: Position, now: Instant) -> bool {
        let events = self.backend_mut().events_drain();
        if events.is_empty() {
            return false;
        }
        let spec = self.jump_hotkey().clone();
        let (filtered, jump) =
            process_jump_sequence(events, &spec, &mut self.state_mut().jump_sequence, now);
        if let Some(target) = jump {
            self.apply_jump(target, pos, now);
            return true;
        }
        if self.panic_key().pressed(&filtered) {
            self.panic_return(pos, now);
            return true;
        }
        false
    }

    /// Whether the return edge is satisfied. The velocity bar on return is
    /// half the entry threshold, since the user has already committed, and a
    /// guard window right after entry suppresses bounce-back.
    fn return_triggered(&self, pos: Position, velocity: f64, now: Instant) -> bool {
        if let Some(entered) = self.state().last_remote_switch {
            if now.duration_since(entered) < REMOTE_RETURN_GUARD {
                return false;
            }
        }
        at_return_edge(self.context(), pos, self.screen())
            && velocity >= self.velocity_threshold() * 0.5
    }

    /// Drains, filters, and forwards input events to the active client.
    fn forward_events(&mut self, client: &str, pos: Position, now: Instant) {
        let events = self.backend_mut().events_drain();
        if events.is_empty() {
            return;
        }

        let spec = self.jump_hotkey().clone();
        let (filtered, jump) =
            process_jump_sequence(events, &spec, &mut self.state_mut().jump_sequence, now);
        if let Some(target) = jump {
            self.apply_jump(target, pos, now);
            return;
        }
        if self.panic_key().pressed(&filtered) {
            self.panic_return(pos, now);
            return;
        }

        let screen = self.screen();
        for event in filtered {
            let message = match event {
                RawInputEvent::ButtonPress { button, position } => {
                    Message::mouse_button(true, screen.normalize(position), button)
                }
                RawInputEvent::ButtonRelease { button, position } => {
                    Message::mouse_button(false, screen.normalize(position), button)
                }
                RawInputEvent::Scroll { button, delta, position } => {
                    Message::mouse_scroll(screen.normalize(position), button, delta)
                }
                RawInputEvent::KeyPress { keycode, keysym, .. } => {
                    Message::key(true, keycode, keysym)
                }
                RawInputEvent::KeyRelease { keycode, keysym, .. } => {
                    Message::key(false, keycode, keysym)
                }
            };
            if !self.router().send(client, &message) {
                error!(client, msg_type = message.msg_type(), "event send failed, reverting");
                self.make_safe(now);
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
