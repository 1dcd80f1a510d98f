use super::NativeCommand;
use crate::constants::ins;
use crate::secure_channel::CommMode;

/// GetCardUID, answered with the encrypted 7-byte UID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetCardUid;

impl NativeCommand for GetCardUid {
    const INS: u8 = ins::GET_CARD_UID;
    const MODE: CommMode = CommMode::Full;
}
