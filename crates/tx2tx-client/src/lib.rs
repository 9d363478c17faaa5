//! # tx2tx-client
//!
//! The tx2tx client: connects to the server, receives forwarded input
//! events, and injects them into the local display.
//!
//! The client is deliberately thin. Coordinates arrive normalized, so the
//! only local knowledge it needs is its own screen geometry; the hide
//! signal gates motion injection while control is back on the server.

pub mod injector;
pub mod network;
pub mod runtime;

pub use injector::{InputInjector, X11Injector};
pub use network::ClientError;
pub use runtime::{run, Dispatcher};
