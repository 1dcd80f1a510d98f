//! Error type for APDU exchanges

use crate::command::error::CommandError;
use crate::response::error::ResponseError;
use crate::transport::error::TransportError;

/// Result type for APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of a single command/response exchange
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to move bytes to or from the card
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The card answered with something that is not a valid response
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// A command could not be encoded
    #[error(transparent)]
    Command(#[from] CommandError),
}
