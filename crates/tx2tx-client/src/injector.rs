//! Input injection into the local display.
//!
//! The production implementation synthesises events through the XTEST
//! extension; the mock records calls for tests. Injection is best-effort:
//! a dropped event is logged and forgotten, matching the lossy nature of
//! forwarded input.

use thiserror::Error;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Window, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
    MOTION_NOTIFY_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use tx2tx_core::domain::geometry::{Position, Screen};

/// Error type for injector construction.
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("display connection failed: {0}")]
    Connect(String),
    #[error("XTEST extension unavailable: {0}")]
    XtestUnavailable(String),
}

/// Injects forwarded input events into the local session.
pub trait InputInjector: Send {
    fn mouse_move(&mut self, pos: Position);
    fn button(&mut self, button: u16, pressed: bool);
    /// One scroll notch with the raw wheel button code.
    fn scroll(&mut self, button: u16, delta: i32);
    fn key(&mut self, keycode: u32, pressed: bool);
}

/// XTEST-based injector.
pub struct X11Injector {
    conn: RustConnection,
    root: Window,
}

impl X11Injector {
    /// Connects and verifies XTEST is present. Returns the injector along
    /// with the local screen geometry, which the dispatcher needs for
    /// denormalization.
    ///
    /// # Errors
    ///
    /// Returns [`InjectorError`] when the display or the XTEST extension is
    /// unavailable. Startup-only.
    pub fn connect(display: Option<&str>) -> Result<(Self, Screen), InjectorError> {
        let (conn, screen_num) =
            x11rb::connect(display).map_err(|e| InjectorError::Connect(e.to_string()))?;
        let screen_info = &conn.setup().roots[screen_num];
        let root = screen_info.root;
        let screen = Screen::new(
            u32::from(screen_info.width_in_pixels),
            u32::from(screen_info.height_in_pixels),
        );

        conn.xtest_get_version(2, 2)
            .map_err(|e| InjectorError::XtestUnavailable(e.to_string()))?
            .reply()
            .map_err(|e| InjectorError::XtestUnavailable(e.to_string()))?;

        Ok((Self { conn, root }, screen))
    }

    fn fake_input(&mut self, event_type: u8, detail: u8, x: i16, y: i16) {
        let result = self
            .conn
            .xtest_fake_input(event_type, detail, x11rb::CURRENT_TIME, self.root, x, y, 0);
        match result {
            Ok(_) => {
                if let Err(e) = self.conn.flush() {
                    debug!(error = %e, "injection flush failed");
                }
            }
            Err(e) => warn!(event_type, detail, error = %e, "event injection dropped"),
        }
    }
}

impl InputInjector for X11Injector {
    fn mouse_move(&mut self, pos: Position) {
        // Detail 0 on a motion event means absolute root coordinates.
        self.fake_input(MOTION_NOTIFY_EVENT, 0, pos.x as i16, pos.y as i16);
    }

    fn button(&mut self, button: u16, pressed: bool) {
        let event_type = if pressed { BUTTON_PRESS_EVENT } else { BUTTON_RELEASE_EVENT };
        self.fake_input(event_type, button as u8, 0, 0);
    }

    fn scroll(&mut self, button: u16, delta: i32) {
        // A wheel notch is a press/release pair of the wheel button code.
        for _ in 0..delta.unsigned_abs().max(1) {
            self.fake_input(BUTTON_PRESS_EVENT, button as u8, 0, 0);
            self.fake_input(BUTTON_RELEASE_EVENT, button as u8, 0, 0);
        }
    }

    fn key(&mut self, keycode: u32, pressed: bool) {
        let event_type = if pressed { KEY_PRESS_EVENT } else { KEY_RELEASE_EVENT };
        self.fake_input(event_type, keycode as u8, 0, 0);
    }
}

// ── Mock ──────────────────────────────────────────────────────────────────────

/// One recorded injection, for assertions in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedEvent {
    MouseMove { pos: Position },
    Button { button: u16, pressed: bool },
    Scroll { button: u16, delta: i32 },
    Key { keycode: u32, pressed: bool },
}

/// Recording injector for tests. State sits behind a shared handle so a
/// test can keep observing after the injector is boxed into a dispatcher.
#[derive(Debug, Default, Clone)]
pub struct MockInjector {
    injected: std::sync::Arc<std::sync::Mutex<Vec<InjectedEvent>>>,
}

impl MockInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone observing the same recorded events.
    pub fn handle(&self) -> MockInjector {
        self.clone()
    }

    /// Snapshot of everything injected so far.
    pub fn injected(&self) -> Vec<InjectedEvent> {
        self.injected.lock().expect("mock injector poisoned").clone()
    }

    fn record(&self, event: InjectedEvent) {
        self.injected.lock().expect("mock injector poisoned").push(event);
    }
}

impl InputInjector for MockInjector {
    fn mouse_move(&mut self, pos: Position) {
        self.record(InjectedEvent::MouseMove { pos });
    }

    fn button(&mut self, button: u16, pressed: bool) {
        self.record(InjectedEvent::Button { button, pressed });
    }

    fn scroll(&mut self, button: u16, delta: i32) {
        self.record(InjectedEvent::Scroll { button, delta });
    }

    fn key(&mut self, keycode: u32, pressed: bool) {
        self.record(InjectedEvent::Key { keycode, pressed });
    }
}
