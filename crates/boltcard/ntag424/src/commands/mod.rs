//! Command builders for the NTAG 424 DNA instruction set
//!
//! Native commands travel ISO-wrapped as `90 INS 00 00 Lc <data> 00`. The
//! builders here produce the plaintext header and data; secure messaging is
//! applied by the card handle according to [`NativeCommand::MODE`].

mod authenticate;
pub use authenticate::*;
mod card_uid;
pub use card_uid::*;
mod change_key;
pub use change_key::*;
mod data;
pub use data::*;
mod file_settings;
pub use file_settings::*;
mod key_version;
pub use key_version::*;
mod select;
pub use select::*;

use boltcard_apdu_core::Command;

use crate::Result;
use crate::constants::CLA_NATIVE;
use crate::secure_channel::CommMode;

/// A native command run through secure messaging
pub trait NativeCommand {
    /// Instruction code
    const INS: u8;

    /// Communication mode the chip expects for this command
    const MODE: CommMode;

    /// Command header, covered by the MAC but never encrypted
    fn header(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Command data, encrypted in Full mode
    fn data(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Wrap a native instruction and its data field as an ISO 7816-4 APDU
pub fn native_command(ins: u8, data: Vec<u8>) -> Result<Command> {
    Ok(Command::new(CLA_NATIVE, ins, 0x00, 0x00)
        .with_data(data)?
        .with_le(0x00))
}

pub(crate) fn u24_le(value: u32) -> [u8; 3] {
    let b = value.to_le_bytes();
    [b[0], b[1], b[2]]
}
