//! Error types specific to APDU responses

use thiserror::Error;

/// Error for APDU response processing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Response shorter than the two status bytes
    #[error("Malformed response: {0} bytes, expected at least 2")]
    MalformedResponse(usize),
}
