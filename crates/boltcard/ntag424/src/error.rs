use boltcard_apdu_core::{CommandError, ResponseError, StatusWord, TransportError};

use crate::keys::KeySlot;

/// Result type for NTAG 424 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for NTAG 424 operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command-related errors
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Response-related errors
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The chip rejected a command
    #[error("Card returned {0}: {desc}", desc = .0.description())]
    Status(StatusWord),

    /// Mutual authentication did not complete
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// The chip refused a key change, or its answer did not verify
    #[error("Key change rejected for {slot}{}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    KeyChangeRejected {
        /// Slot being changed
        slot: KeySlot,
        /// Status returned by the chip, if it returned an error status
        status: Option<StatusWord>,
    },

    /// SDM offsets fall outside the stored NDEF record or overlap
    #[error("Invalid SDM offset {offset}: {reason}")]
    InvalidOffset {
        /// Offending offset within the NDEF file
        offset: u32,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The decrypted PICC data names a different chip
    #[error("UID in PICC data does not match the expected card")]
    UidMismatch,

    /// The SUN MAC does not verify
    #[error("SUN MAC is invalid")]
    TagInvalid,

    /// The read counter did not move forward
    #[error("Read counter {current} is not newer than {previous}")]
    CounterNotFresh {
        /// Highest counter accepted so far
        previous: u32,
        /// Counter presented now
        current: u32,
    },

    /// A key was not 16 bytes long
    #[error("Invalid key length: {0} bytes, expected 16")]
    InvalidKeyLength(usize),

    /// Block cipher input was not a whole number of blocks
    #[error("Invalid block alignment: {0} bytes is not a multiple of 16")]
    InvalidBlockAlignment(usize),

    /// A response MAC did not verify, or response padding was corrupt
    #[error("Response integrity check failed")]
    IntegrityError,

    /// The operation needs an authenticated session
    #[error("No authenticated session")]
    NoSession,

    /// Data returned by the chip or supplied by the caller is malformed
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),

    /// Hex decoding failed
    #[error(transparent)]
    InvalidHex(#[from] hex::FromHexError),

    /// The NDEF message does not fit the NDEF file
    #[error("NDEF message of {0} bytes does not fit the NDEF file")]
    NdefTooLarge(usize),
}

impl From<boltcard_apdu_core::Error> for Error {
    fn from(error: boltcard_apdu_core::Error) -> Self {
        match error {
            boltcard_apdu_core::Error::Transport(e) => Self::Transport(e),
            boltcard_apdu_core::Error::Response(e) => Self::Response(e),
            boltcard_apdu_core::Error::Command(e) => Self::Command(e),
        }
    }
}

impl Error {
    /// Status word carried by this error, if the chip returned one
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Status(sw) => Some(*sw),
            Self::KeyChangeRejected { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether this error means the card already holds non-factory keys
    ///
    /// Authenticating a written card with the factory key fails with `91 AE`,
    /// and some readers surface `69 82` for the same condition.
    pub fn is_written_card(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
            || self.status().is_some_and(|sw| {
                sw.is_authentication_error() || sw.is_security_condition_not_satisfied()
            })
    }

    /// Whether the transport failed, which also ends any session
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
