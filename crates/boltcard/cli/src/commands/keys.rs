//! Key set generation and wipe backups

use boltcard::{BoltcardKeySet, CardDetails};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::utils::{display, write_output};

/// Generate a random key set, optionally wrapped as card details
pub fn keygen_command(
    lnurlw_base: Option<String>,
    output: Option<&PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let keys = BoltcardKeySet::random();
    let json = match lnurlw_base {
        Some(lnurlw_base) => serde_json::to_string_pretty(&CardDetails { lnurlw_base, keys })?,
        None => serde_json::to_string_pretty(&keys)?,
    };

    info!("Generated a new key set");
    println!("{}", display::sensitive_data_warning());
    write_output(&json, output)
}

/// Turn a key set file into a wipe backup document
pub fn backup_command(keys: &Path, output: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let json = std::fs::read_to_string(keys)?;
    let keys: BoltcardKeySet = serde_json::from_str(&json)?;
    let backup = keys.to_wipe_backup().to_json()?;
    write_output(&backup, output)
}
