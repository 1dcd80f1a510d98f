//! Bolt Card personalization
//!
//! Sequences the NTAG 424 DNA operations that turn a factory chip into a
//! Bolt Card and back:
//!
//! - [`Provisioner::write_card`] writes the LNURL-withdraw template, enables
//!   SDM, installs the five keys and checks the first SUN message
//! - [`Provisioner::wipe_card`] disables SDM, restores the factory keys and
//!   blanks the NDEF file
//!
//! Key material travels as lowercase hex JSON ([`BoltcardKeySet`],
//! [`WipeBackup`]).
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod config;
mod error;
mod keyset;
mod provisioning;

pub use config::{KeyVersionPolicy, ProvisioningConfig};
pub use error::{Error, ProvisionError, Result};
pub use keyset::{BoltcardKeySet, CardDetails, ProvisionedCard, WipeBackup};
pub use provisioning::{Provisioner, Stage, StageObserver};

pub use boltcard_ntag424 as ntag424;

/// Whether a scanned payload is an LNURL-withdraw link written by a Bolt Card
pub fn is_withdraw_url(payload: &str) -> bool {
    payload
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("lnurlw"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_withdraw_url() {
        assert!(is_withdraw_url("lnurlw://card.example.com/ln?p=00&c=00"));
        assert!(is_withdraw_url("LNURLW://CARD.EXAMPLE.COM"));
        assert!(!is_withdraw_url("https://example.com"));
        assert!(!is_withdraw_url("lnurl"));
    }
}
