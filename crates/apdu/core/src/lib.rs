//! Command and response APDUs for contactless cards
//!
//! - Short command APDUs ([`Command`], [`ApduCommand`])
//! - Responses split into payload and [`StatusWord`], including the `91xx`
//!   family used by native DESFire-style instruction sets
//! - [`CardTransport`], the NFC stack that moves raw bytes to the card
//!
//! The transport exchanges byte arrays and knows nothing about secure
//! messaging or command semantics.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub use bytes::Bytes;

pub mod command;
pub mod error;
pub mod response;
pub mod transport;

pub use command::{ApduCommand, Command, ExpectedLength, error::CommandError};
pub use error::{Error, Result};
pub use response::Response;
pub use response::error::ResponseError;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
