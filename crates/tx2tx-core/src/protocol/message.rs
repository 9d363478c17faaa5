//! All tx2tx protocol message types.
//!
//! Every message serializes to one JSON object of the form
//! `{"msg_type": "<name>", "payload": {...}}`. Mouse coordinates cross the
//! wire as normalized fractions (`norm_x`/`norm_y` in [0, 1]); the sentinel
//! `(-1.0, -1.0)` is the hide signal. Keyboard events carry the raw keycode
//! plus, where known, the keysym; no modifier translation happens on the
//! wire.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::NormalizedPoint;

/// Protocol version string carried in the handshake.
pub const PROTOCOL_VERSION: &str = "2.0";

// ── Per-message payload structs ───────────────────────────────────────────────

/// Screen dimensions advertised in a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// `hello`: sent by the client to identify itself, and by the server as a
/// greeting on accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloPayload {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenSize>,
}

/// `screen_info`: client reports its geometry. Informational; the server
/// logs it and nothing else, since only normalized coordinates cross the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfoPayload {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseEventKind {
    Move,
    Press,
    Release,
    Scroll,
}

/// `mouse_event`: pointer motion, button, or scroll, at a normalized
/// position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseEventPayload {
    pub event: MouseEventKind,
    pub norm_x: f64,
    pub norm_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i32>,
}

impl MouseEventPayload {
    pub fn point(&self) -> NormalizedPoint {
        NormalizedPoint::new(self.norm_x, self.norm_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventKind {
    Press,
    Release,
}

/// `key_event`: keyboard press or release as a raw (keycode, keysym) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEventPayload {
    pub event: KeyEventKind,
    pub keycode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keysym: Option<u64>,
}

/// `keepalive`: empty payload, both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeepalivePayload {}

/// `error`: human-readable error notification, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid tx2tx messages, discriminated by the `msg_type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Hello(HelloPayload),
    ScreenInfo(ScreenInfoPayload),
    MouseEvent(MouseEventPayload),
    KeyEvent(KeyEventPayload),
    Keepalive(KeepalivePayload),
    Error(ErrorPayload),
}

impl Message {
    /// The `msg_type` discriminant, for logging.
    pub fn msg_type(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::ScreenInfo(_) => "screen_info",
            Message::MouseEvent(_) => "mouse_event",
            Message::KeyEvent(_) => "key_event",
            Message::Keepalive(_) => "keepalive",
            Message::Error(_) => "error",
        }
    }

    pub fn hello(name: impl Into<String>, screen: Option<ScreenSize>) -> Self {
        Message::Hello(HelloPayload {
            name: name.into(),
            version: PROTOCOL_VERSION.to_string(),
            screen,
        })
    }

    /// A pointer-motion event at a normalized position.
    pub fn mouse_move(point: NormalizedPoint) -> Self {
        Message::MouseEvent(MouseEventPayload {
            event: MouseEventKind::Move,
            norm_x: point.x,
            norm_y: point.y,
            button: None,
            delta: None,
        })
    }

    /// The hide signal: `mouse_event{move, -1.0, -1.0}`. Clients hide their
    /// cursor and stop injecting until the next real coordinate.
    pub fn hide_signal() -> Self {
        Self::mouse_move(NormalizedPoint::HIDE_SIGNAL)
    }

    /// A button press or release at a normalized position.
    pub fn mouse_button(pressed: bool, point: NormalizedPoint, button: u16) -> Self {
        Message::MouseEvent(MouseEventPayload {
            event: if pressed { MouseEventKind::Press } else { MouseEventKind::Release },
            norm_x: point.x,
            norm_y: point.y,
            button: Some(button),
            delta: None,
        })
    }

    /// A scroll event at a normalized position, with the raw button code and
    /// signed notch delta.
    pub fn mouse_scroll(point: NormalizedPoint, button: u16, delta: i32) -> Self {
        Message::MouseEvent(MouseEventPayload {
            event: MouseEventKind::Scroll,
            norm_x: point.x,
            norm_y: point.y,
            button: Some(button),
            delta: Some(delta),
        })
    }

    /// A key press or release.
    pub fn key(pressed: bool, keycode: u32, keysym: Option<u64>) -> Self {
        Message::KeyEvent(KeyEventPayload {
            event: if pressed { KeyEventKind::Press } else { KeyEventKind::Release },
            keycode,
            keysym,
        })
    }

    pub fn keepalive() -> Self {
        Message::Keepalive(KeepalivePayload {})
    }

    pub fn error(message: impl Into<String>) -> Self {
        Message::Error(ErrorPayload { message: message.into() })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Message) -> Message {
        let json = serde_json::to_string(msg).expect("serialize failed");
        serde_json::from_str(&json).expect("deserialize failed")
    }

    #[test]
    fn test_hello_round_trip_with_screen() {
        let msg = Message::Hello(HelloPayload {
            name: "dev-east".to_string(),
            version: PROTOCOL_VERSION.to_string(),
            screen: Some(ScreenSize { width: 2560, height: 1440 }),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_hello_round_trip_without_screen_omits_field() {
        let msg = Message::hello("bare", None);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("screen"), "None screen must be omitted: {json}");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_wire_shape_has_msg_type_and_payload() {
        let json = serde_json::to_value(Message::keepalive()).unwrap();
        assert_eq!(json["msg_type"], "keepalive");
        assert!(json["payload"].is_object());

        let json = serde_json::to_value(Message::mouse_move(NormalizedPoint::new(0.5, 0.25))).unwrap();
        assert_eq!(json["msg_type"], "mouse_event");
        assert_eq!(json["payload"]["event"], "move");
        assert_eq!(json["payload"]["norm_x"], 0.5);
        assert_eq!(json["payload"]["norm_y"], 0.25);
    }

    #[test]
    fn test_mouse_move_omits_button_and_delta() {
        let json = serde_json::to_string(&Message::mouse_move(NormalizedPoint::new(0.1, 0.2))).unwrap();
        assert!(!json.contains("button"));
        assert!(!json.contains("delta"));
    }

    #[test]
    fn test_hide_signal_is_move_at_minus_one() {
        match Message::hide_signal() {
            Message::MouseEvent(ev) => {
                assert_eq!(ev.event, MouseEventKind::Move);
                assert!(ev.point().is_hide_signal());
                assert_eq!(ev.norm_x, -1.0);
                assert_eq!(ev.norm_y, -1.0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_button_round_trip_keeps_raw_code() {
        let msg = Message::mouse_button(true, NormalizedPoint::new(0.3, 0.7), 3);
        match round_trip(&msg) {
            Message::MouseEvent(ev) => {
                assert_eq!(ev.event, MouseEventKind::Press);
                assert_eq!(ev.button, Some(3));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_scroll_round_trip_keeps_delta() {
        let msg = Message::mouse_scroll(NormalizedPoint::new(0.5, 0.5), 4, 1);
        match round_trip(&msg) {
            Message::MouseEvent(ev) => {
                assert_eq!(ev.event, MouseEventKind::Scroll);
                assert_eq!(ev.delta, Some(1));
                assert_eq!(ev.button, Some(4));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_key_event_round_trip() {
        let msg = Message::key(true, 38, Some(0x61));
        match round_trip(&msg) {
            Message::KeyEvent(ev) => {
                assert_eq!(ev.event, KeyEventKind::Press);
                assert_eq!(ev.keycode, 38);
                assert_eq!(ev.keysym, Some(0x61));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_key_event_without_keysym_round_trips() {
        let msg = Message::key(false, 105, None);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_error_round_trip() {
        let msg = Message::error("handshake timed out");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_deserialize_from_literal_json() {
        let json = r#"{"msg_type":"mouse_event","payload":{"event":"move","norm_x":-1.0,"norm_y":-1.0}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg, Message::hide_signal());
    }

    #[test]
    fn test_unknown_msg_type_is_rejected() {
        let json = r#"{"msg_type":"hint_show","payload":{}}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }
}
