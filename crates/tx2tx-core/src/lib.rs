//! # tx2tx-core
//!
//! Shared library for tx2tx containing the wire protocol, domain types, and
//! configuration schema.
//!
//! tx2tx is a software KVM: one server machine captures local pointer and
//! keyboard input and forwards it to one of several client machines, so a
//! single set of input devices drives multiple displays. Moving the pointer
//! off an edge of the server display hands control to the client configured
//! at that cardinal direction; moving back through the opposite edge returns
//! control to the server.
//!
//! This crate is used by both the server and client applications. It has no
//! dependencies on OS display APIs or network sockets:
//!
//! - **`protocol`** – how messages travel over the wire: typed message
//!   structs and the length-delimited JSON framing codec.
//! - **`domain`** – pure logic: pixel/normalized geometry, the screen-context
//!   state space, direction/warp tables, and the velocity-gated pointer
//!   tracker.
//! - **`config`** – the YAML configuration schema shared by both roles.

pub mod config;
pub mod domain;
pub mod protocol;

pub use config::{Config, ConfigError};
pub use domain::context::{Direction, ScreenContext, EDGE_ENTRY_OFFSET};
pub use domain::geometry::{NormalizedPoint, Position, Screen};
pub use domain::tracker::{EdgeCrossing, PointerTracker};
pub use protocol::codec::{encode_frame, FrameDecoder, ProtocolError};
pub use protocol::message::Message;
