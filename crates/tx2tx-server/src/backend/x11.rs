//! Native X11 display backend.
//!
//! Talks to the X server directly: QueryPointer/WarpPointer for the pointer,
//! active grabs on the root window for input capture, and XFixes for cursor
//! visibility. While the grabs are held, button and key events are reported
//! to this client and drained with `poll_for_event`, so the drain never
//! blocks the tick.
//!
//! Keysyms are resolved through a keycode table fetched once at connect
//! time (first keysym per keycode, which is the unshifted group-0 symbol).

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, EventMask, GrabMode, GrabStatus, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use tx2tx_core::domain::geometry::{Position, Screen};

use super::{BackendError, DisplayBackend, RawInputEvent};

/// X11 implementation of [`DisplayBackend`].
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    screen: Screen,
    last_pointer: Position,
    /// Keysym table indexed by `(keycode - min_keycode) * keysyms_per_keycode`.
    keysyms: Vec<u32>,
    keysyms_per_keycode: u8,
    min_keycode: u8,
    xfixes_available: bool,
}

impl X11Backend {
    /// Connects to the X server named by `display`, or `$DISPLAY` when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connect`] when the connection or the initial
    /// keyboard-mapping fetch fails. This is a startup-only path.
    pub fn connect(display: Option<&str>) -> Result<Self, BackendError> {
        let (conn, screen_num) =
            x11rb::connect(display).map_err(|e| BackendError::Connect(e.to_string()))?;

        let setup = conn.setup();
        let screen_info = &setup.roots[screen_num];
        let root = screen_info.root;
        let screen = Screen::new(
            u32::from(screen_info.width_in_pixels),
            u32::from(screen_info.height_in_pixels),
        );
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;

        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)
            .map_err(|e| BackendError::Connect(e.to_string()))?
            .reply()
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        // XFixes is required for cursor hiding; without it hide/show degrade
        // to no-ops, which the contract permits.
        let xfixes_available = match conn.xfixes_query_version(5, 0) {
            Ok(cookie) => cookie.reply().is_ok(),
            Err(_) => false,
        };
        if !xfixes_available {
            warn!("XFixes unavailable: cursor hide/show will be no-ops");
        }

        Ok(Self {
            conn,
            root,
            screen,
            last_pointer: Position::new(screen.width as i32 / 2, screen.height as i32 / 2),
            keysyms: mapping.keysyms,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            min_keycode,
            xfixes_available,
        })
    }

    fn keysym_for(&self, keycode: u8) -> Option<u64> {
        let index = usize::from(keycode.checked_sub(self.min_keycode)?)
            * usize::from(self.keysyms_per_keycode);
        let sym = *self.keysyms.get(index)?;
        if sym == 0 {
            None
        } else {
            Some(u64::from(sym))
        }
    }

    fn flush_logged(&self, op: &'static str) {
        if let Err(e) = self.conn.flush() {
            debug!(op, error = %e, "X11 flush failed");
        }
    }
}

impl DisplayBackend for X11Backend {
    fn geometry(&mut self) -> Result<Screen, BackendError> {
        Ok(self.screen)
    }

    fn pointer_query(&mut self) -> Position {
        let reply = self
            .conn
            .query_pointer(self.root)
            .ok()
            .and_then(|cookie| cookie.reply().ok());
        match reply {
            Some(reply) => {
                self.last_pointer =
                    Position::new(i32::from(reply.root_x), i32::from(reply.root_y));
                self.last_pointer
            }
            None => {
                debug!("pointer query failed, returning last known position");
                self.last_pointer
            }
        }
    }

    fn pointer_warp(&mut self, pos: Position) {
        let result = self.conn.warp_pointer(
            x11rb::NONE,
            self.root,
            0,
            0,
            0,
            0,
            pos.x as i16,
            pos.y as i16,
        );
        if let Err(e) = result {
            debug!(x = pos.x, y = pos.y, error = %e, "pointer warp dropped");
            return;
        }
        self.flush_logged("warp_pointer");
    }

    fn pointer_grab(&mut self) -> Result<(), BackendError> {
        let mask = EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION;
        let status = self
            .conn
            .grab_pointer(
                false,
                self.root,
                mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )
            .map_err(|_| BackendError::GrabFailed { resource: "pointer" })?
            .reply()
            .map_err(|_| BackendError::GrabFailed { resource: "pointer" })?
            .status;
        if status != GrabStatus::SUCCESS {
            return Err(BackendError::GrabFailed { resource: "pointer" });
        }
        Ok(())
    }

    fn pointer_ungrab(&mut self) {
        if let Err(e) = self.conn.ungrab_pointer(x11rb::CURRENT_TIME) {
            warn!(error = %e, "pointer ungrab failed");
        }
        self.flush_logged("ungrab_pointer");
    }

    fn keyboard_grab(&mut self) -> Result<(), BackendError> {
        let status = self
            .conn
            .grab_keyboard(
                false,
                self.root,
                x11rb::CURRENT_TIME,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .map_err(|_| BackendError::GrabFailed { resource: "keyboard" })?
            .reply()
            .map_err(|_| BackendError::GrabFailed { resource: "keyboard" })?
            .status;
        if status != GrabStatus::SUCCESS {
            return Err(BackendError::GrabFailed { resource: "keyboard" });
        }
        Ok(())
    }

    fn keyboard_ungrab(&mut self) {
        if let Err(e) = self.conn.ungrab_keyboard(x11rb::CURRENT_TIME) {
            warn!(error = %e, "keyboard ungrab failed");
        }
        self.flush_logged("ungrab_keyboard");
    }

    fn cursor_hide(&mut self) {
        if !self.xfixes_available {
            return;
        }
        if let Err(e) = self.conn.xfixes_hide_cursor(self.root) {
            debug!(error = %e, "cursor hide dropped");
            return;
        }
        self.flush_logged("hide_cursor");
    }

    fn cursor_show(&mut self) {
        if !self.xfixes_available {
            return;
        }
        if let Err(e) = self.conn.xfixes_show_cursor(self.root) {
            debug!(error = %e, "cursor show dropped");
            return;
        }
        self.flush_logged("show_cursor");
    }

    fn events_drain(&mut self) -> Vec<RawInputEvent> {
        let mut events = Vec::new();
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => {
                    if let Some(raw) = self.translate_event(event) {
                        events.push(raw);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "event drain aborted");
                    break;
                }
            }
        }
        events
    }
}

impl X11Backend {
    fn translate_event(&self, event: Event) -> Option<RawInputEvent> {
        match event {
            Event::ButtonPress(e) => {
                let position = Position::new(i32::from(e.root_x), i32::from(e.root_y));
                Some(match e.detail {
                    // Buttons 4-7 are the scroll wheel in X11's button model.
                    4 => RawInputEvent::Scroll { button: 4, delta: 1, position },
                    5 => RawInputEvent::Scroll { button: 5, delta: -1, position },
                    6 => RawInputEvent::Scroll { button: 6, delta: 1, position },
                    7 => RawInputEvent::Scroll { button: 7, delta: -1, position },
                    detail => RawInputEvent::ButtonPress { button: u16::from(detail), position },
                })
            }
            Event::ButtonRelease(e) => {
                // Wheel releases carry no information beyond the press.
                if (4..=7).contains(&e.detail) {
                    return None;
                }
                Some(RawInputEvent::ButtonRelease {
                    button: u16::from(e.detail),
                    position: Position::new(i32::from(e.root_x), i32::from(e.root_y)),
                })
            }
            Event::KeyPress(e) => Some(RawInputEvent::KeyPress {
                keycode: u32::from(e.detail),
                keysym: self.keysym_for(e.detail),
                modifiers: u32::from(u16::from(e.state)),
            }),
            Event::KeyRelease(e) => Some(RawInputEvent::KeyRelease {
                keycode: u32::from(e.detail),
                keysym: self.keysym_for(e.detail),
                modifiers: u32::from(u16::from(e.state)),
            }),
            // Motion is sampled by polling, not event-driven.
            Event::MotionNotify(_) => None,
            _ => None,
        }
    }
}
