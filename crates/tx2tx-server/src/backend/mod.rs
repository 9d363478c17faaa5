//! Display-backend abstraction.
//!
//! The engine drives the display server through this narrow trait: pointer
//! query/warp, the grab pair, cursor visibility, and the raw input event
//! drain. Two real implementations exist (a native X11 client and an
//! out-of-process Wayland helper) plus a scripted mock for tests.
//!
//! Failure discipline follows the operation table: geometry errors are fatal
//! at startup only; grabs fail recoverably; warps, ungrabs, and cursor
//! visibility are best-effort and must never raise. A compositor is allowed
//! to silently drop a warp, so no caller may assume a warp became visible.

use thiserror::Error;

use tx2tx_core::domain::geometry::{Position, Screen};

pub mod helper;
pub mod mock;
pub mod x11;

/// Error type for display backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not establish the display connection. Fatal at startup.
    #[error("display backend connection failed: {0}")]
    Connect(String),

    /// The display server refused to hand over a grab. Recoverable: the
    /// entry transition aborts and the user retries the edge crossing.
    #[error("{resource} grab refused by display server")]
    GrabFailed { resource: &'static str },

    /// The backend cannot determine the screen geometry.
    #[error("screen geometry unavailable: {0}")]
    Geometry(String),
}

/// A raw input event read from the display server while grabbed.
///
/// Button and key codes are passed through as the display server reports
/// them; `modifiers` is the raw modifier state bitmask at event time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    ButtonPress { button: u16, position: Position },
    ButtonRelease { button: u16, position: Position },
    /// One scroll notch. `delta` is +1 away from the user / left, -1 toward
    /// the user / right; `button` keeps the raw code for the wire.
    Scroll { button: u16, delta: i32, position: Position },
    KeyPress { keycode: u32, keysym: Option<u64>, modifiers: u32 },
    KeyRelease { keycode: u32, keysym: Option<u64>, modifiers: u32 },
}

/// The display-backend contract consumed by the transition engine.
pub trait DisplayBackend: Send {
    /// Screen geometry. Queried once at startup; failure there is fatal.
    fn geometry(&mut self) -> Result<Screen, BackendError>;

    /// Current pointer position. On a transient query failure the backend
    /// logs and returns the last known position.
    fn pointer_query(&mut self) -> Position;

    /// Moves the pointer. Best-effort: uncooperative compositors may
    /// silently drop the request, so correctness must never depend on the
    /// warp being visible.
    fn pointer_warp(&mut self, pos: Position);

    /// Acquires the pointer grab.
    fn pointer_grab(&mut self) -> Result<(), BackendError>;

    /// Releases the pointer grab. Best-effort; errors are swallowed after
    /// logging.
    fn pointer_ungrab(&mut self);

    /// Acquires the keyboard grab.
    fn keyboard_grab(&mut self) -> Result<(), BackendError>;

    /// Releases the keyboard grab. Best-effort.
    fn keyboard_ungrab(&mut self);

    /// Hides the cursor. May silently no-op; never fatal.
    ///
    /// On compositors that ignore root-window cursor changes, an
    /// implementation may instead show a full-screen, input-transparent
    /// overlay with a blank cursor; that stays its private detail.
    fn cursor_hide(&mut self);

    /// Shows the cursor. May silently no-op; never fatal.
    fn cursor_show(&mut self);

    /// Drains all pending input events without blocking.
    fn events_drain(&mut self) -> Vec<RawInputEvent>;

    /// Whether warps on this backend need observation-confirmed retries.
    ///
    /// When `true` the engine runs the deferred-warp protocol after entry:
    /// re-issue the warp each tick until the queried position lands near the
    /// target, bounded by a retry budget.
    fn needs_warp_confirmation(&self) -> bool {
        false
    }
}
