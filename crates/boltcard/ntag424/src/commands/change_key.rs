use zeroize::Zeroize;

use super::NativeCommand;
use crate::constants::ins;
use crate::crypto::{crc32_nk, xor};
use crate::keys::{AesKey, KeySlot, KeyVersion};
use crate::secure_channel::CommMode;

/// ChangeKey
///
/// Changing the key the session was authenticated with sends the new key in
/// clear (inside Full mode) and ends the session. Any other slot receives
/// `new ⊕ old ‖ version ‖ CRC32NK(new)`.
#[derive(Debug)]
pub struct ChangeKey<'a> {
    /// Slot to change
    pub slot: KeySlot,
    /// Key currently in the slot
    pub old_key: &'a AesKey,
    /// Key to install
    pub new_key: &'a AesKey,
    /// Version to store with the new key
    pub version: KeyVersion,
    /// Slot the current session is authenticated with
    pub authenticated_slot: KeySlot,
}

impl ChangeKey<'_> {
    /// Whether this change replaces the session's own key
    pub fn changes_session_key(&self) -> bool {
        self.slot == self.authenticated_slot
    }
}

impl NativeCommand for ChangeKey<'_> {
    const INS: u8 = ins::CHANGE_KEY;
    const MODE: CommMode = CommMode::Full;

    fn header(&self) -> Vec<u8> {
        vec![self.slot.number()]
    }

    fn data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        if self.changes_session_key() {
            out.extend_from_slice(self.new_key.as_bytes());
            out.push(self.version.0);
        } else {
            let mut diff = xor(self.new_key.as_bytes(), self.old_key.as_bytes());
            out.extend_from_slice(&diff);
            diff.zeroize();
            out.push(self.version.0);
            out.extend_from_slice(&crc32_nk(self.new_key.as_bytes()));
        }
        out
    }
}
