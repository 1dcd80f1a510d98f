//! APDU response definitions
//!
//! A response is whatever the card sent back, split into payload and the
//! trailing status word.

pub mod error;
pub mod status;

use bytes::Bytes;
use tracing::trace;

use error::ResponseError;
use status::StatusWord;

/// Payload and status word returned by the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Option<Bytes>,
    status: StatusWord,
}

impl Response {
    /// Create a response, an empty payload is stored as `None`
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.filter(|p| !p.is_empty()),
            status: status.into(),
        }
    }

    /// Split raw bytes into payload and the last two status bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        let [payload @ .., sw1, sw2] = data else {
            return Err(ResponseError::MalformedResponse(data.len()));
        };

        trace!(
            sw = %StatusWord::new(*sw1, *sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self::new(Some(Bytes::copy_from_slice(payload)), (*sw1, *sw2)))
    }

    /// Build a response from a payload and separately delivered status bytes
    pub fn from_parts(payload: &[u8], sw1: u8, sw2: u8) -> Self {
        Self::new(Some(Bytes::copy_from_slice(payload)), (sw1, sw2))
    }

    /// Response payload, if any
    pub const fn payload(&self) -> &Option<Bytes> {
        &self.payload
    }

    /// Payload as a byte slice, empty when absent
    pub fn data(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the card reported final success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the card expects another frame
    pub const fn is_additional_frame(&self) -> bool {
        self.status.is_additional_frame()
    }
}
