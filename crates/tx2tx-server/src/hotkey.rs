//! Panic-key and jump-hotkey recognition.
//!
//! Both recognisers sit in front of the forwarder's event drain. The panic
//! key triggers an unconditional return to CENTER. The jump hotkey is a
//! two-step sequence: a prefix combination (default `Ctrl+slash`) arms a
//! short window, then a single action key selects the destination context.
//! Keys consumed by a sequence are never forwarded, including their
//! releases, and a sequence that times out hands its accumulated presses
//! back to the forwarder unchanged.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::warn;

use tx2tx_core::config::{JumpHotkeyConfig, PanicKeyConfig};
use tx2tx_core::domain::context::ScreenContext;

use crate::backend::RawInputEvent;

// X11 modifier mask bits.
const SHIFT_MASK: u32 = 1 << 0;
const CONTROL_MASK: u32 = 1 << 2;
const MOD1_MASK: u32 = 1 << 3; // Alt
const MOD4_MASK: u32 = 1 << 6; // Super

/// Resolves a config key name to its X11 keysym.
pub fn keysym_from_name(name: &str) -> Option<u64> {
    let sym = match name {
        "Escape" => 0xFF1B,
        "Scroll_Lock" => 0xFF14,
        "Pause" => 0xFF13,
        "Print" => 0xFF61,
        "Menu" => 0xFF67,
        "Tab" => 0xFF09,
        "Return" => 0xFF0D,
        "BackSpace" => 0xFF08,
        "space" => 0x0020,
        "slash" => 0x002F,
        "grave" => 0x0060,
        "Home" => 0xFF50,
        "End" => 0xFF57,
        "Insert" => 0xFF63,
        "Delete" => 0xFFFF,
        "F1" => 0xFFBE,
        "F2" => 0xFFBF,
        "F3" => 0xFFC0,
        "F4" => 0xFFC1,
        "F5" => 0xFFC2,
        "F6" => 0xFFC3,
        "F7" => 0xFFC4,
        "F8" => 0xFFC5,
        "F9" => 0xFFC6,
        "F10" => 0xFFC7,
        "F11" => 0xFFC8,
        "F12" => 0xFFC9,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                // Single printable ASCII characters map to themselves.
                (Some(c), None) if c.is_ascii_graphic() => c.to_ascii_lowercase() as u64,
                _ => return None,
            }
        }
    };
    Some(sym)
}

/// Builds an X11 modifier mask from config modifier names.
pub fn modifier_mask_from_names<S: AsRef<str>>(names: &[S]) -> u32 {
    let mut mask = 0;
    for name in names {
        mask |= match name.as_ref() {
            "Ctrl" | "Control" => CONTROL_MASK,
            "Shift" => SHIFT_MASK,
            "Alt" | "Mod1" => MOD1_MASK,
            "Super" | "Win" | "Meta" | "Mod4" => MOD4_MASK,
            other => {
                warn!(modifier = other, "unknown modifier name in config, ignoring");
                0
            }
        };
    }
    mask
}

// ── Panic key ─────────────────────────────────────────────────────────────────

/// Resolved panic-key configuration.
#[derive(Debug, Clone)]
pub struct PanicKeySpec {
    keysyms: HashSet<u64>,
    modifier_mask: u32,
}

impl PanicKeySpec {
    pub fn from_config(config: &PanicKeyConfig) -> Self {
        let keysym = keysym_from_name(&config.key).unwrap_or_else(|| {
            warn!(key = %config.key, "unknown panic key name, falling back to Scroll_Lock");
            0xFF14
        });
        Self {
            keysyms: HashSet::from([keysym]),
            modifier_mask: modifier_mask_from_names(&config.modifiers),
        }
    }

    /// Returns `true` when any event in the batch is a press of the panic
    /// key with its required modifiers held.
    pub fn pressed(&self, events: &[RawInputEvent]) -> bool {
        events.iter().any(|event| match event {
            RawInputEvent::KeyPress { keysym: Some(sym), modifiers, .. } => {
                self.keysyms.contains(sym)
                    && (modifiers & self.modifier_mask) == self.modifier_mask
            }
            _ => false,
        })
    }
}

// ── Jump hotkey ───────────────────────────────────────────────────────────────

/// Resolved jump-hotkey configuration.
#[derive(Debug, Clone)]
pub struct JumpHotkeySpec {
    enabled: bool,
    prefix_keysym: u64,
    prefix_modifier_mask: u32,
    timeout: Duration,
    actions: HashMap<u64, ScreenContext>,
}

impl JumpHotkeySpec {
    pub fn from_config(config: &JumpHotkeyConfig) -> Self {
        let mut parts: Vec<&str> = config.prefix.split('+').collect();
        let key_name = parts.pop().unwrap_or("slash");
        let prefix_keysym = keysym_from_name(key_name).unwrap_or_else(|| {
            warn!(key = key_name, "unknown jump prefix key, falling back to slash");
            0x002F
        });

        // Action keys: digits select the destination, 0 returns home.
        let actions = HashMap::from([
            ('1' as u64, ScreenContext::West),
            ('2' as u64, ScreenContext::East),
            ('3' as u64, ScreenContext::North),
            ('4' as u64, ScreenContext::South),
            ('0' as u64, ScreenContext::Center),
        ]);

        Self {
            enabled: config.enabled,
            prefix_keysym,
            prefix_modifier_mask: modifier_mask_from_names(&parts),
            timeout: Duration::from_millis(config.timeout_ms),
            actions,
        }
    }

    fn matches_prefix(&self, keysym: u64, modifiers: u32) -> bool {
        keysym == self.prefix_keysym
            && (modifiers & self.prefix_modifier_mask) == self.prefix_modifier_mask
    }
}

/// Mutable progress of a jump sequence across ticks.
#[derive(Debug, Default)]
pub struct JumpSequenceState {
    /// Arm deadline; `None` when idle.
    armed_until: Option<Instant>,
    /// Action context pressed within the window, resolved on its release.
    pending: Option<ScreenContext>,
    /// Keysyms whose releases are still owed a swallow.
    swallow_keysyms: HashSet<u64>,
    /// Presses consumed by the armed window, replayed on timeout.
    held: Vec<RawInputEvent>,
}

impl JumpSequenceState {
    fn expire(&mut self, out: &mut Vec<RawInputEvent>) {
        for event in self.held.drain(..) {
            if let RawInputEvent::KeyPress { keysym: Some(sym), .. } = event {
                self.swallow_keysyms.remove(&sym);
            }
            out.push(event);
        }
        self.armed_until = None;
        self.pending = None;
    }
}

/// Runs one event batch through the jump-hotkey state machine.
///
/// Returns the events that should continue to the forwarder and, when a
/// sequence completed, the requested destination context.
pub fn process_jump_sequence(
    events: Vec<RawInputEvent>,
    spec: &JumpHotkeySpec,
    seq: &mut JumpSequenceState,
    now: Instant,
) -> (Vec<RawInputEvent>, Option<ScreenContext>) {
    if !spec.enabled {
        return (events, None);
    }

    let mut out = Vec::with_capacity(events.len());
    if let Some(armed_until) = seq.armed_until {
        if now > armed_until {
            seq.expire(&mut out);
        }
    }

    let mut target: Option<ScreenContext> = None;
    for event in events {
        match event {
            RawInputEvent::KeyPress { keysym: Some(sym), modifiers, .. } => {
                if seq.armed_until.is_some() {
                    if let Some(ctx) = spec.actions.get(&sym) {
                        seq.pending = Some(*ctx);
                    }
                    seq.swallow_keysyms.insert(sym);
                    seq.held.push(event);
                } else if spec.matches_prefix(sym, modifiers) {
                    seq.armed_until = Some(now + spec.timeout);
                    seq.pending = None;
                    seq.swallow_keysyms.insert(sym);
                    seq.held.push(event);
                } else {
                    out.push(event);
                }
            }
            RawInputEvent::KeyRelease { keysym: Some(sym), .. } => {
                let resolved = spec.actions.get(&sym).copied();
                if seq.armed_until.is_some() && resolved.is_some() && resolved == seq.pending {
                    target = seq.pending.take();
                    seq.armed_until = None;
                    seq.held.clear();
                    seq.swallow_keysyms.remove(&sym);
                } else if seq.swallow_keysyms.remove(&sym) {
                    // Release of a consumed press: swallowed.
                } else {
                    out.push(event);
                }
            }
            other => out.push(other),
        }
    }
    (out, target)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
