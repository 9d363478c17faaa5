//! Wire protocol: typed messages and the length-delimited JSON framing.

pub mod codec;
pub mod message;
