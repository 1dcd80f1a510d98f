use boltcard_apdu_core::Command;

use super::native_command;
use crate::Result;
use crate::constants::ins;
use crate::keys::KeySlot;

/// First part of AuthenticateEV2First: key number and an empty capability vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticateEv2First {
    /// Slot to authenticate with
    pub slot: KeySlot,
}

impl AuthenticateEv2First {
    /// Build the APDU
    pub fn to_command(&self) -> Result<Command> {
        native_command(ins::AUTHENTICATE_EV2_FIRST, vec![self.slot.number(), 0x00])
    }
}

/// First part of AuthenticateEV2NonFirst, inside an existing transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticateEv2NonFirst {
    /// Slot to authenticate with
    pub slot: KeySlot,
}

impl AuthenticateEv2NonFirst {
    /// Build the APDU
    pub fn to_command(&self) -> Result<Command> {
        native_command(ins::AUTHENTICATE_EV2_NON_FIRST, vec![self.slot.number()])
    }
}

/// Continuation frame of a multi-part exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalFrame {
    /// Frame payload
    pub data: Vec<u8>,
}

impl AdditionalFrame {
    /// Build the APDU
    pub fn to_command(&self) -> Result<Command> {
        native_command(ins::ADDITIONAL_FRAME, self.data.clone())
    }
}
