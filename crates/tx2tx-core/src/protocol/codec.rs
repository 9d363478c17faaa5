//! Length-delimited framing for protocol messages.
//!
//! Wire format:
//! ```text
//! [payload_len:4][payload:N]
//! ```
//! The 4-byte length prefix is big-endian and counts the UTF-8 JSON payload
//! only. One frame carries exactly one [`Message`].

use thiserror::Error;

use crate::protocol::message::Message;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a single frame's payload. Protects the receive buffer
/// against a malformed or hostile length prefix.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors that can occur while framing or deframing messages.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A frame declared a payload larger than [`MAX_FRAME_SIZE`].
    #[error("frame too large: {declared} bytes exceeds the {MAX_FRAME_SIZE}-byte limit")]
    FrameTooLarge { declared: usize },

    /// The payload bytes were not valid JSON for any known message.
    #[error("malformed frame payload: {0}")]
    Malformed(String),
}

/// Encodes one message into a length-prefixed frame.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the serialized payload exceeds
/// [`MAX_FRAME_SIZE`]; serialization itself cannot fail for these types.
///
/// # Examples
///
/// ```rust
/// use tx2tx_core::protocol::codec::{encode_frame, FrameDecoder};
/// use tx2tx_core::protocol::message::Message;
///
/// let frame = encode_frame(&Message::keepalive()).unwrap();
/// let mut decoder = FrameDecoder::new();
/// decoder.extend(&frame).unwrap();
/// assert_eq!(decoder.next_message().unwrap(), Some(Message::keepalive()));
/// ```
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(msg).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { declared: payload.len() });
    }
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Incremental frame decoder.
///
/// Feed raw socket bytes in with [`extend`](Self::extend), then drain
/// complete messages with [`next_message`](Self::next_message). Partial
/// frames stay buffered across calls, so arbitrary TCP segmentation is
/// handled.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes to the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] when buffered data grows past
    /// the frame limit without yielding a complete frame. The connection
    /// should be dropped; the buffer is not recoverable.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > LENGTH_PREFIX_SIZE + MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge { declared: self.buf.len() });
        }
        Ok(())
    }

    /// Takes the next complete message off the buffer, if one is available.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] for a hostile length prefix
    /// and [`ProtocolError::Malformed`] for a payload that is not a valid
    /// message. Both are fatal for the connection.
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        if self.buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let declared =
            u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if declared > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge { declared });
        }
        let total = LENGTH_PREFIX_SIZE + declared;
        if self.buf.len() < total {
            return Ok(None);
        }

        let msg = serde_json::from_slice(&self.buf[LENGTH_PREFIX_SIZE..total])
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        self.buf.drain(..total);
        Ok(Some(msg))
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
