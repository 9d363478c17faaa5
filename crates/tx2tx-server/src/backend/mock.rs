//! Scripted display backend for tests.
//!
//! The mock records every call and lets tests script pointer positions, grab
//! failures, warp behaviour, and queued input events. State lives behind a
//! shared handle so a test can keep observing after the backend has been
//! boxed into the engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tx2tx_core::domain::geometry::{Position, Screen};

use super::{BackendError, DisplayBackend, RawInputEvent};

#[derive(Debug)]
struct MockInner {
    screen: Screen,
    pointer: Position,
    scripted_positions: VecDeque<Position>,
    warps: Vec<Position>,
    /// When true, a warp also moves the scripted pointer (a cooperative
    /// compositor). When false the warp is recorded but the pointer stays
    /// put (a compositor that drops warps).
    warp_moves_pointer: bool,
    pointer_grabbed: bool,
    keyboard_grabbed: bool,
    fail_pointer_grab: bool,
    fail_keyboard_grab: bool,
    cursor_hidden: bool,
    pending_events: VecDeque<RawInputEvent>,
    needs_warp_confirmation: bool,
}

/// Test double implementing [`DisplayBackend`].
#[derive(Debug, Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<MockInner>>,
}

/// Observation/scripting handle onto a [`MockBackend`]'s shared state.
#[derive(Debug, Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

impl MockBackend {
    pub fn new(screen: Screen) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                screen,
                pointer: Position::new(screen.width as i32 / 2, screen.height as i32 / 2),
                scripted_positions: VecDeque::new(),
                warps: Vec::new(),
                warp_moves_pointer: true,
                pointer_grabbed: false,
                keyboard_grabbed: false,
                fail_pointer_grab: false,
                fail_keyboard_grab: false,
                cursor_hidden: false,
                pending_events: VecDeque::new(),
                needs_warp_confirmation: false,
            })),
        }
    }

    /// A handle that stays valid after the backend is boxed into the engine.
    pub fn handle(&self) -> MockHandle {
        MockHandle { inner: Arc::clone(&self.inner) }
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().expect("mock backend poisoned")
    }
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().expect("mock backend poisoned")
    }

    /// Queues positions for successive `pointer_query` calls; the last one
    /// repeats once the script runs out.
    pub fn script_positions(&self, positions: impl IntoIterator<Item = Position>) {
        self.lock().scripted_positions.extend(positions);
    }

    /// Moves the scripted pointer immediately.
    pub fn set_pointer(&self, pos: Position) {
        self.lock().pointer = pos;
    }

    pub fn set_fail_pointer_grab(&self, fail: bool) {
        self.lock().fail_pointer_grab = fail;
    }

    pub fn set_fail_keyboard_grab(&self, fail: bool) {
        self.lock().fail_keyboard_grab = fail;
    }

    /// Configures whether warps move the scripted pointer.
    pub fn set_warp_moves_pointer(&self, moves: bool) {
        self.lock().warp_moves_pointer = moves;
    }

    pub fn set_needs_warp_confirmation(&self, needs: bool) {
        self.lock().needs_warp_confirmation = needs;
    }

    /// Queues an input event for the next `events_drain`.
    pub fn push_event(&self, event: RawInputEvent) {
        self.lock().pending_events.push_back(event);
    }

    pub fn pointer_grabbed(&self) -> bool {
        self.lock().pointer_grabbed
    }

    pub fn keyboard_grabbed(&self) -> bool {
        self.lock().keyboard_grabbed
    }

    pub fn cursor_hidden(&self) -> bool {
        self.lock().cursor_hidden
    }

    /// Every warp target recorded so far, oldest first.
    pub fn warps(&self) -> Vec<Position> {
        self.lock().warps.clone()
    }

    pub fn pointer(&self) -> Position {
        self.lock().pointer
    }
}

impl DisplayBackend for MockBackend {
    fn geometry(&mut self) -> Result<Screen, BackendError> {
        Ok(self.lock().screen)
    }

    fn pointer_query(&mut self) -> Position {
        let mut inner = self.lock();
        if let Some(next) = inner.scripted_positions.pop_front() {
            inner.pointer = next;
        }
        inner.pointer
    }

    fn pointer_warp(&mut self, pos: Position) {
        let mut inner = self.lock();
        inner.warps.push(pos);
        if inner.warp_moves_pointer {
            inner.pointer = pos;
        }
    }

    fn pointer_grab(&mut self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        if inner.fail_pointer_grab {
            return Err(BackendError::GrabFailed { resource: "pointer" });
        }
        inner.pointer_grabbed = true;
        Ok(())
    }

    fn pointer_ungrab(&mut self) {
        self.lock().pointer_grabbed = false;
    }

    fn keyboard_grab(&mut self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        if inner.fail_keyboard_grab {
            return Err(BackendError::GrabFailed { resource: "keyboard" });
        }
        inner.keyboard_grabbed = true;
        Ok(())
    }

    fn keyboard_ungrab(&mut self) {
        self.lock().keyboard_grabbed = false;
    }

    fn cursor_hide(&mut self) {
        self.lock().cursor_hidden = true;
    }

    fn cursor_show(&mut self) {
        self.lock().cursor_hidden = false;
    }

    fn events_drain(&mut self) -> Vec<RawInputEvent> {
        self.lock().pending_events.drain(..).collect()
    }

    fn needs_warp_confirmation(&self) -> bool {
        self.lock().needs_warp_confirmation
    }
}
