//! NTAG 424 DNA support for Bolt Card personalization
//!
//! This crate speaks the native instruction set of the NXP NTAG 424 DNA over
//! any [`boltcard_apdu_core::CardTransport`]:
//!
//! - AES-128 primitives, CMAC and the ChangeKey CRC32
//! - AuthenticateEV2First / NonFirst and EV2 secure messaging
//! - ChangeKey, GetKeyVersion, Change/GetFileSettings, Read/WriteData, GetCardUID
//! - NDEF URI encoding with SUN placeholders and SDM offsets
//! - Offline SUN (`p`/`c`) verification
//!
//! The `simulator` feature adds [`simulator::SimulatedCard`], a software chip
//! that answers the same APDUs.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod card;
pub mod commands;
pub mod constants;
pub mod crypto;
mod error;
pub mod file_settings;
mod keys;
pub mod ndef;
pub mod secure_channel;
pub mod session;
#[cfg(any(test, feature = "simulator"))]
pub mod simulator;
pub mod sun;

pub use card::{MAX_CHUNK, Ntag424};
pub use error::{Error, Result};
pub use file_settings::{FileInfo, FileSettings};
pub use keys::{AesKey, KeySlot, KeyVersion};
pub use ndef::{SunMessage, SunTemplate};
pub use secure_channel::CommMode;
pub use session::CardSession;
pub use sun::{SunVerification, Uid, ensure_fresh, test_p_and_c};
