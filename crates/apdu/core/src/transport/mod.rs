//! Transport traits for APDU communication with cards
//!
//! The platform NFC stack is abstracted behind [`CardTransport`]. It moves raw
//! command bytes to the card and returns the raw response, status word included.

pub mod error;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

use crate::command::ApduCommand;
use crate::response::Response;

/// Platform NFC stack
///
/// Implementations only override [`CardTransport::do_transmit_raw`]; tracing of
/// every exchange happens in the provided [`CardTransport::transmit_raw`].
pub trait CardTransport: Send + Sync + fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = ?hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = ?hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Exchange one frame with the card
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Serialize a command, send it and parse the response
    fn transmit<C: ApduCommand + ?Sized>(&mut self, command: &C) -> crate::Result<Response>
    where
        Self: Sized,
    {
        let raw = self.transmit_raw(&command.to_bytes())?;
        Ok(Response::from_bytes(&raw)?)
    }

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Bound the time a single exchange may take
    ///
    /// Transports without a notion of timeout ignore this.
    fn set_timeout(&mut self, _timeout: Duration) {}
}

/// Lets a borrowed transport drive a card handle
impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }
}

/// Scripted transport replaying canned responses
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Mock responses to return, in order
    pub responses: Vec<Bytes>,
    /// Commands that were sent
    pub commands: Vec<Bytes>,
    /// Whether the transport is connected
    pub connected: bool,
    /// Last timeout requested by the caller
    pub timeout: Option<Duration>,
}

#[cfg(any(test, feature = "mock"))]
impl MockTransport {
    /// Create a new mock transport with the given responses
    pub const fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            connected: true,
            timeout: None,
        }
    }

    /// Create a new mock transport that always returns the given response
    pub fn with_response(response: Bytes) -> Self {
        Self::new(vec![response])
    }

    /// Create a new mock transport that always returns native success (91 00)
    pub fn with_success() -> Self {
        Self::with_response(Bytes::from_static(&[0x91, 0x00]))
    }
}

#[cfg(any(test, feature = "mock"))]
impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Connection);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        if self.responses.is_empty() {
            return Err(TransportError::Transmission);
        }

        // Either clone the single response or take the next one
        if self.responses.len() == 1 {
            Ok(self.responses[0].clone())
        } else {
            Ok(self.responses.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        self.commands.clear();
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}
