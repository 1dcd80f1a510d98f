//! Error types specific to APDU commands

use thiserror::Error;

/// Error for APDU command encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Data too long for a short APDU
    #[error("Data too long: {0} bytes (max {1})")]
    DataTooLong(usize, usize),
}
