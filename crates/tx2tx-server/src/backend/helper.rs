//! Helper-mediated display backend for Wayland sessions.
//!
//! Wayland compositors expose no portable pointer-warp or grab primitives to
//! ordinary clients, so this backend shells out to a privileged helper
//! daemon (typically reading evdev devices and injecting through uinput) and
//! speaks a small line-delimited JSON protocol over the child's stdio:
//!
//! ```text
//! -> {"cmd": "pointer_position_get", "payload": {}}
//! <- {"ok": true, "result": {"x": 512, "y": 384}}
//! ```
//!
//! Every request gets exactly one response line. Transport failures degrade
//! per the backend contract: queries return the last known value, mutations
//! become no-ops, grabs report failure.
//!
//! Compositors behind this route routinely delay or drop warps, so the
//! backend opts in to the deferred-warp protocol.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde_json::{json, Value};
use tracing::{debug, warn};

use tx2tx_core::domain::geometry::{Position, Screen};

use super::{BackendError, DisplayBackend, RawInputEvent};

/// Wayland helper implementation of [`DisplayBackend`].
pub struct HelperBackend {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    last_pointer: Position,
    fallback_geometry: Option<Screen>,
}

impl HelperBackend {
    /// Spawns the helper process and takes over its stdio.
    ///
    /// `fallback_geometry` is used when the helper cannot report screen
    /// dimensions (headless evdev helpers often cannot).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connect`] when the helper cannot be spawned.
    pub fn spawn(command: &str, fallback_geometry: Option<Screen>) -> Result<Self, BackendError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BackendError::Connect("empty helper command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Connect(format!("failed to spawn helper '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Connect("helper stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Connect("helper stdout unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            last_pointer: Position::new(0, 0),
            fallback_geometry,
        })
    }

    /// Sends one request and reads its response line. `None` on any
    /// transport or protocol failure.
    fn request(&mut self, cmd: &str, payload: Value) -> Option<Value> {
        let request = json!({ "cmd": cmd, "payload": payload });
        let mut line = request.to_string();
        line.push('\n');
        if let Err(e) = self.stdin.write_all(line.as_bytes()).and_then(|_| self.stdin.flush()) {
            warn!(cmd, error = %e, "helper request write failed");
            return None;
        }

        let mut response_line = String::new();
        match self.stdout.read_line(&mut response_line) {
            Ok(0) => {
                warn!(cmd, "helper terminated unexpectedly");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(cmd, error = %e, "helper response read failed");
                return None;
            }
        }

        let response: Value = match serde_json::from_str(&response_line) {
            Ok(v) => v,
            Err(e) => {
                warn!(cmd, error = %e, "helper response was not valid JSON");
                return None;
            }
        };
        if !response.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = response.get("error").and_then(Value::as_str).unwrap_or("unknown");
            debug!(cmd, error, "helper refused request");
            return None;
        }
        Some(response.get("result").cloned().unwrap_or(Value::Null))
    }

    fn translate_event(event: &Value) -> Option<RawInputEvent> {
        let event_type = event.get("event_type")?.as_str()?;
        let position = Position::new(
            event.get("x").and_then(Value::as_i64).unwrap_or(0) as i32,
            event.get("y").and_then(Value::as_i64).unwrap_or(0) as i32,
        );
        match event_type {
            "mouse_button_press" | "mouse_button_release" => {
                let button = event.get("button").and_then(Value::as_u64)? as u16;
                // Wheel notches arrive as the X11-convention button codes.
                if (4..=7).contains(&button) {
                    if event_type == "mouse_button_release" {
                        return None;
                    }
                    let delta = if button == 4 || button == 6 { 1 } else { -1 };
                    return Some(RawInputEvent::Scroll { button, delta, position });
                }
                if event_type == "mouse_button_press" {
                    Some(RawInputEvent::ButtonPress { button, position })
                } else {
                    Some(RawInputEvent::ButtonRelease { button, position })
                }
            }
            "key_press" | "key_release" => {
                let keycode = event.get("keycode").and_then(Value::as_u64)? as u32;
                let keysym = event.get("keysym").and_then(Value::as_u64);
                let modifiers =
                    event.get("modifier_state").and_then(Value::as_u64).unwrap_or(0) as u32;
                if event_type == "key_press" {
                    Some(RawInputEvent::KeyPress { keycode, keysym, modifiers })
                } else {
                    Some(RawInputEvent::KeyRelease { keycode, keysym, modifiers })
                }
            }
            _ => None,
        }
    }
}

impl DisplayBackend for HelperBackend {
    fn geometry(&mut self) -> Result<Screen, BackendError> {
        if let Some(result) = self.request("screen_geometry_get", json!({})) {
            let width = result.get("width").and_then(Value::as_u64);
            let height = result.get("height").and_then(Value::as_u64);
            if let (Some(width), Some(height)) = (width, height) {
                if width > 0 && height > 0 {
                    return Ok(Screen::new(width as u32, height as u32));
                }
            }
        }
        self.fallback_geometry.ok_or_else(|| {
            BackendError::Geometry(
                "helper reported no geometry and no fallback is configured".to_string(),
            )
        })
    }

    fn pointer_query(&mut self) -> Position {
        if let Some(result) = self.request("pointer_position_get", json!({})) {
            let x = result.get("x").and_then(Value::as_i64);
            let y = result.get("y").and_then(Value::as_i64);
            if let (Some(x), Some(y)) = (x, y) {
                self.last_pointer = Position::new(x as i32, y as i32);
            }
        }
        self.last_pointer
    }

    fn pointer_warp(&mut self, pos: Position) {
        let _ = self.request("cursor_position_set", json!({ "x": pos.x, "y": pos.y }));
    }

    fn pointer_grab(&mut self) -> Result<(), BackendError> {
        self.request("pointer_grab", json!({}))
            .map(|_| ())
            .ok_or(BackendError::GrabFailed { resource: "pointer" })
    }

    fn pointer_ungrab(&mut self) {
        let _ = self.request("pointer_ungrab", json!({}));
    }

    fn keyboard_grab(&mut self) -> Result<(), BackendError> {
        self.request("keyboard_grab", json!({}))
            .map(|_| ())
            .ok_or(BackendError::GrabFailed { resource: "keyboard" })
    }

    fn keyboard_ungrab(&mut self) {
        let _ = self.request("keyboard_ungrab", json!({}));
    }

    fn cursor_hide(&mut self) {
        let _ = self.request("cursor_hide", json!({}));
    }

    fn cursor_show(&mut self) {
        let _ = self.request("cursor_show", json!({}));
    }

    fn events_drain(&mut self) -> Vec<RawInputEvent> {
        let Some(result) = self.request("input_events_read", json!({})) else {
            return Vec::new();
        };
        let modifier_state =
            result.get("modifier_state").and_then(Value::as_u64).unwrap_or(0) as u32;
        let Some(events) = result.get("events").and_then(Value::as_array) else {
            return Vec::new();
        };
        events
            .iter()
            .filter_map(Self::translate_event)
            .map(|event| match event {
                // The helper reports one batch-wide modifier state; stamp it
                // onto key events that carried none of their own.
                RawInputEvent::KeyPress { keycode, keysym, modifiers: 0 } => {
                    RawInputEvent::KeyPress { keycode, keysym, modifiers: modifier_state }
                }
                RawInputEvent::KeyRelease { keycode, keysym, modifiers: 0 } => {
                    RawInputEvent::KeyRelease { keycode, keysym, modifiers: modifier_state }
                }
                other => other,
            })
            .collect()
    }

    fn needs_warp_confirmation(&self) -> bool {
        true
    }
}

impl Drop for HelperBackend {
    fn drop(&mut self) {
        // Fire-and-forget: the helper exits on the shutdown line and may not
        // answer it, so no response read here.
        let _ = self.stdin.write_all(b"{\"cmd\": \"shutdown\", \"payload\": {}}\n");
        let _ = self.stdin.flush();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
