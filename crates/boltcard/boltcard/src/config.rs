//! Provisioning configuration

use std::path::Path;
use std::time::Duration;

use boltcard_ntag424::{AesKey, KeyVersion};
use serde::{Deserialize, Serialize};

use crate::Result;

/// How the version byte of each installed key is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyVersionPolicy {
    /// Read the current version with GetKeyVersion and write the next one
    #[default]
    Increment,
    /// Write the same version on every change
    ///
    /// Compatibility mode for cards personalized by the Bolt Card wallet,
    /// which writes `01` when provisioning and `00` when wiping. Versions then
    /// no longer increase by one per change, so this is never the default.
    Fixed(KeyVersion),
}

/// Settings of the write and wipe flows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Key every slot of a blank card holds
    pub factory_key: AesKey,
    /// Upper bound on a single exchange with the card, in milliseconds
    pub timeout_ms: u64,
    /// Verify the first SUN message after writing
    pub verify_after_write: bool,
    /// Version byte policy for ChangeKey
    pub key_versions: KeyVersionPolicy,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            factory_key: AesKey::FACTORY,
            timeout_ms: 5_000,
            verify_after_write: true,
            key_versions: KeyVersionPolicy::Increment,
        }
    }
}

impl ProvisioningConfig {
    /// Use a different factory key
    pub fn with_factory_key(mut self, key: AesKey) -> Self {
        self.factory_key = key;
        self
    }

    /// Set the per-exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable the SUN self-check
    pub const fn with_verify_after_write(mut self, verify: bool) -> Self {
        self.verify_after_write = verify;
        self
    }

    /// Set the key version policy
    pub const fn with_key_versions(mut self, policy: KeyVersionPolicy) -> Self {
        self.key_versions = policy;
        self
    }

    /// Per-exchange timeout
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse a JSON configuration, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
