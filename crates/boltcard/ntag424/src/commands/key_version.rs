use super::NativeCommand;
use crate::constants::ins;
use crate::keys::KeySlot;
use crate::secure_channel::CommMode;

/// GetKeyVersion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetKeyVersion {
    /// Slot to query
    pub slot: KeySlot,
}

impl NativeCommand for GetKeyVersion {
    const INS: u8 = ins::GET_KEY_VERSION;
    const MODE: CommMode = CommMode::Mac;

    fn header(&self) -> Vec<u8> {
        vec![self.slot.number()]
    }
}
