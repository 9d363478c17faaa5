//! # tx2tx-server
//!
//! The tx2tx server: captures local pointer and keyboard input and forwards
//! it to the client at the cardinal direction the pointer crossed.
//!
//! The server straddles the display server and the network. Three scarce
//! host resources (the pointer grab, the keyboard grab, and the visible
//! cursor) are acquired as a bundle when control leaves the server screen
//! and released as a bundle when it returns, on panic, and on shutdown. No
//! error path may leave the host desktop grabbed.
//!
//! Layers:
//!
//! - **`backend`** – the display-backend trait plus its native X11,
//!   Wayland-helper, and mock implementations.
//! - **`network`** – TCP listener, per-client IO tasks, the client registry,
//!   and the [`network::ClientRouter`] seam the engine sends through.
//! - **`state`** / **`transition`** / **`forwarder`** / **`hotkey`** – the
//!   transition engine proper: context state machine, entry/return
//!   sequences, REMOTE-tick forwarding, and the panic/jump recogniser.
//! - **`runtime`** – the polling loop tying it all together.

pub mod backend;
pub mod forwarder;
pub mod hotkey;
pub mod network;
pub mod runtime;
pub mod state;
pub mod transition;

#[cfg(test)]
mod testutil;

pub use backend::{BackendError, DisplayBackend, RawInputEvent};
pub use network::{ClientRouter, NetworkError, ServerNetwork};
pub use runtime::{run, ServerError};
pub use state::ServerState;
pub use transition::TransitionEngine;
