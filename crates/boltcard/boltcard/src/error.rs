use crate::provisioning::Stage;

/// Result type for Bolt Card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for key material, configuration and provisioning
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Card or cryptography error
    #[error(transparent)]
    Card(#[from] boltcard_ntag424::Error),

    /// JSON encoding or decoding failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Reading a file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A wipe backup document is not usable
    #[error("Invalid wipe backup: {0}")]
    InvalidBackup(&'static str),

    /// A write or wipe flow stopped part way
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// A write or wipe flow that stopped part way
///
/// `last_completed` tells how far the card got, which decides whether the
/// factory key or the new master key opens it now.
#[derive(Debug, thiserror::Error)]
#[error(
    "Provisioning failed at {stage} (last completed: {last}): {source}",
    last = .last_completed.map_or_else(|| "none".to_owned(), |s| s.to_string())
)]
pub struct ProvisionError {
    /// Stage that failed
    pub stage: Stage,
    /// Last stage that finished before the failure
    pub last_completed: Option<Stage>,
    /// Underlying card error
    #[source]
    pub source: boltcard_ntag424::Error,
}

impl ProvisionError {
    /// Whether the card rejected the factory key because it is already written
    pub fn is_written_card(&self) -> bool {
        self.stage == Stage::Authenticating && self.source.is_written_card()
    }

    /// Whether the reader or the card dropped out
    pub const fn is_transport(&self) -> bool {
        self.source.is_transport()
    }
}
