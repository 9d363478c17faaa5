//! Screen contexts, edge directions, and the transition tables.
//!
//! `ScreenContext` is the global state of the server: `Center` means the
//! server drives its own desktop; any other value means the client at that
//! cardinal direction receives forwarded input. The tables in this module
//! are pure: given a direction or context plus the pointer position and
//! screen geometry, they compute where the server pointer is warped on entry
//! and return, and when the pointer has reached the return edge.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::{Position, Screen};

/// Pixels from the edge at which the pointer is parked after a warp, so the
/// parked position does not immediately re-trigger the boundary detector.
pub const EDGE_ENTRY_OFFSET: i32 = 2;

/// The edge of the server screen a pointer crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

impl Direction {
    /// The context entered when the pointer leaves through this edge.
    pub fn context(self) -> ScreenContext {
        match self {
            Direction::Left => ScreenContext::West,
            Direction::Right => ScreenContext::East,
            Direction::Top => ScreenContext::North,
            Direction::Bottom => ScreenContext::South,
        }
    }
}

/// The global context: which screen has active control.
///
/// Exactly one is active at any time. The cursor is visible and ungrabbed
/// iff the context is `Center`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenContext {
    Center,
    West,
    East,
    North,
    South,
}

impl ScreenContext {
    /// Returns `true` for any non-`Center` context.
    pub fn is_remote(self) -> bool {
        self != ScreenContext::Center
    }

    /// The edge the pointer crossed to enter this context, if remote.
    pub fn entry_direction(self) -> Option<Direction> {
        match self {
            ScreenContext::Center => None,
            ScreenContext::West => Some(Direction::Left),
            ScreenContext::East => Some(Direction::Right),
            ScreenContext::North => Some(Direction::Top),
            ScreenContext::South => Some(Direction::Bottom),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScreenContext::Center => "center",
            ScreenContext::West => "west",
            ScreenContext::East => "east",
            ScreenContext::North => "north",
            ScreenContext::South => "south",
        }
    }
}

impl std::fmt::Display for ScreenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the server pointer is warped when control leaves through `direction`.
///
/// The pointer is parked just inside the *opposite* edge: leaving through the
/// left edge parks it near the right edge, so continued leftward motion on
/// the remote screen maps naturally and a small rightward motion starts the
/// trip home.
pub fn entry_warp_position(direction: Direction, pos: Position, screen: Screen) -> Position {
    let w = screen.width as i32;
    let h = screen.height as i32;
    match direction {
        Direction::Left => Position::new(w - 1 - EDGE_ENTRY_OFFSET, pos.y),
        Direction::Right => Position::new(EDGE_ENTRY_OFFSET, pos.y),
        Direction::Top => Position::new(pos.x, h - 1 - EDGE_ENTRY_OFFSET),
        Direction::Bottom => Position::new(pos.x, EDGE_ENTRY_OFFSET),
    }
}

/// Where the server pointer is warped when control returns from `context`.
///
/// Mirrors [`entry_warp_position`]: returning from WEST places the pointer
/// just inside the left edge, where it originally crossed out.
pub fn return_warp_position(context: ScreenContext, pos: Position, screen: Screen) -> Position {
    let w = screen.width as i32;
    let h = screen.height as i32;
    match context {
        ScreenContext::West => Position::new(EDGE_ENTRY_OFFSET, pos.y),
        ScreenContext::East => Position::new(w - 1 - EDGE_ENTRY_OFFSET, pos.y),
        ScreenContext::North => Position::new(pos.x, EDGE_ENTRY_OFFSET),
        ScreenContext::South => Position::new(pos.x, h - 1 - EDGE_ENTRY_OFFSET),
        ScreenContext::Center => pos,
    }
}

/// Returns `true` when the pointer has reached the return edge for the
/// active remote context: the edge *opposite* the one crossed on entry.
pub fn at_return_edge(context: ScreenContext, pos: Position, screen: Screen) -> bool {
    let w = screen.width as i32;
    let h = screen.height as i32;
    match context {
        ScreenContext::West => pos.x >= w - 1,
        ScreenContext::East => pos.x <= 0,
        ScreenContext::North => pos.y >= h - 1,
        ScreenContext::South => pos.y <= 0,
        ScreenContext::Center => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Screen = Screen { width: 1920, height: 1080 };

    // ── Direction → context ───────────────────────────────────────────────────

    #[test]
    fn test_direction_maps_to_cardinal_context() {
        assert_eq!(Direction::Left.context(), ScreenContext::West);
        assert_eq!(Direction::Right.context(), ScreenContext::East);
        assert_eq!(Direction::Top.context(), ScreenContext::North);
        assert_eq!(Direction::Bottom.context(), ScreenContext::South);
    }

    #[test]
    fn test_entry_direction_round_trips_for_remote_contexts() {
        for dir in [Direction::Left, Direction::Right, Direction::Top, Direction::Bottom] {
            assert_eq!(dir.context().entry_direction(), Some(dir));
        }
        assert_eq!(ScreenContext::Center.entry_direction(), None);
    }

    #[test]
    fn test_only_center_is_not_remote() {
        assert!(!ScreenContext::Center.is_remote());
        for ctx in [ScreenContext::West, ScreenContext::East, ScreenContext::North, ScreenContext::South] {
            assert!(ctx.is_remote());
        }
    }

    // ── Entry warp table ──────────────────────────────────────────────────────

    #[test]
    fn test_entry_warp_left_parks_near_right_edge() {
        let pos = entry_warp_position(Direction::Left, Position::new(0, 540), SCREEN);
        assert_eq!(pos, Position::new(1917, 540));
    }

    #[test]
    fn test_entry_warp_right_parks_near_left_edge() {
        let pos = entry_warp_position(Direction::Right, Position::new(1919, 300), SCREEN);
        assert_eq!(pos, Position::new(2, 300));
    }

    #[test]
    fn test_entry_warp_top_parks_near_bottom_edge() {
        let pos = entry_warp_position(Direction::Top, Position::new(800, 0), SCREEN);
        assert_eq!(pos, Position::new(800, 1077));
    }

    #[test]
    fn test_entry_warp_bottom_parks_near_top_edge() {
        let pos = entry_warp_position(Direction::Bottom, Position::new(800, 1079), SCREEN);
        assert_eq!(pos, Position::new(800, 2));
    }

    #[test]
    fn test_entry_warp_preserves_perpendicular_coordinate() {
        let pos = entry_warp_position(Direction::Left, Position::new(0, 123), SCREEN);
        assert_eq!(pos.y, 123);
    }

    // ── Return warp table ─────────────────────────────────────────────────────

    #[test]
    fn test_return_warp_from_west_parks_near_left_edge() {
        let pos = return_warp_position(ScreenContext::West, Position::new(1919, 540), SCREEN);
        assert_eq!(pos, Position::new(2, 540));
    }

    #[test]
    fn test_return_warp_from_east_parks_near_right_edge() {
        let pos = return_warp_position(ScreenContext::East, Position::new(0, 540), SCREEN);
        assert_eq!(pos, Position::new(1917, 540));
    }

    #[test]
    fn test_return_warp_from_north_parks_near_top_edge() {
        let pos = return_warp_position(ScreenContext::North, Position::new(640, 1079), SCREEN);
        assert_eq!(pos, Position::new(640, 2));
    }

    #[test]
    fn test_return_warp_from_south_parks_near_bottom_edge() {
        let pos = return_warp_position(ScreenContext::South, Position::new(640, 0), SCREEN);
        assert_eq!(pos, Position::new(640, 1077));
    }

    #[test]
    fn test_warp_targets_do_not_retrigger_return_edge() {
        // The parked position after a return must sit strictly inside the
        // screen, outside every return-edge band.
        for ctx in [ScreenContext::West, ScreenContext::East, ScreenContext::North, ScreenContext::South] {
            let pos = return_warp_position(ctx, Position::new(960, 540), SCREEN);
            assert!(!at_return_edge(ctx, pos, SCREEN), "{ctx} return warp landed on its own edge");
        }
    }

    // ── Return edge predicate ─────────────────────────────────────────────────

    #[test]
    fn test_return_edge_for_west_is_right_edge() {
        assert!(at_return_edge(ScreenContext::West, Position::new(1919, 540), SCREEN));
        assert!(!at_return_edge(ScreenContext::West, Position::new(1900, 540), SCREEN));
    }

    #[test]
    fn test_return_edge_for_east_is_left_edge() {
        assert!(at_return_edge(ScreenContext::East, Position::new(0, 540), SCREEN));
        assert!(!at_return_edge(ScreenContext::East, Position::new(5, 540), SCREEN));
    }

    #[test]
    fn test_return_edge_for_north_is_bottom_edge() {
        assert!(at_return_edge(ScreenContext::North, Position::new(960, 1079), SCREEN));
        assert!(!at_return_edge(ScreenContext::North, Position::new(960, 0), SCREEN));
    }

    #[test]
    fn test_return_edge_for_south_is_top_edge() {
        assert!(at_return_edge(ScreenContext::South, Position::new(960, 0), SCREEN));
        assert!(!at_return_edge(ScreenContext::South, Position::new(960, 1079), SCREEN));
    }

    #[test]
    fn test_center_has_no_return_edge() {
        assert!(!at_return_edge(ScreenContext::Center, Position::new(0, 0), SCREEN));
    }
}
