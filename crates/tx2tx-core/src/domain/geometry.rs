//! Screen geometry value types.
//!
//! Coordinates exist in two spaces: absolute pixel positions on a concrete
//! screen, and normalized points in [0, 1]² used on the wire. Normalization
//! makes the protocol resolution-agnostic: a client at a different resolution
//! works because only fractions cross the network.

use serde::{Deserialize, Serialize};

/// An absolute pixel position on a screen, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns `true` if the position lies within a `width` × `height` screen.
    pub fn in_bounds(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && (self.x as i64) < width as i64 && self.y >= 0 && (self.y as i64) < height as i64
    }
}

/// A resolution-independent point with both coordinates in [0.0, 1.0].
///
/// The sentinel `(-1.0, -1.0)` is reserved on the wire as the **hide
/// signal**: it instructs a client to hide its cursor and stop injecting
/// motion until the next real coordinate arrives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// The reserved hide-signal sentinel.
    pub const HIDE_SIGNAL: NormalizedPoint = NormalizedPoint { x: -1.0, y: -1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` for the reserved hide-signal sentinel.
    ///
    /// Any negative coordinate counts: the sentinel is the only message ever
    /// sent outside [0, 1]², so a strict equality test would only add a way
    /// to misread a degraded float.
    pub fn is_hide_signal(&self) -> bool {
        self.x < 0.0 || self.y < 0.0
    }
}

/// A display screen: pixel dimensions plus the coordinate transforms between
/// pixel positions and normalized points.
///
/// Obtained once from the display backend at startup and treated as
/// immutable for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Screen {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if `pos` is within this screen's bounds.
    pub fn contains(&self, pos: Position) -> bool {
        pos.in_bounds(self.width, self.height)
    }

    /// Converts a pixel position to a normalized point, clamped to [0, 1]².
    pub fn normalize(&self, pos: Position) -> NormalizedPoint {
        NormalizedPoint {
            x: (pos.x as f64 / self.width as f64).clamp(0.0, 1.0),
            y: (pos.y as f64 / self.height as f64).clamp(0.0, 1.0),
        }
    }

    /// Converts a normalized point back to a pixel position on this screen.
    ///
    /// The result is clamped to the screen bounds so a coordinate of exactly
    /// 1.0 lands on the last pixel row/column rather than one past it.
    pub fn denormalize(&self, np: NormalizedPoint) -> Position {
        let x = (np.x * self.width as f64) as i32;
        let y = (np.y * self.height as f64) as i32;
        Position {
            x: x.clamp(0, self.width as i32 - 1),
            y: y.clamp(0, self.height as i32 - 1),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
