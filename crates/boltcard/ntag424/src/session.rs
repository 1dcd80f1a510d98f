//! Session state for an EV2 authenticated channel
//!
//! This module provides the [`CardSession`] type that holds the session keys,
//! transaction identifier and command counter established by
//! AuthenticateEV2First.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{IV_LABEL_COMMAND, IV_LABEL_RESPONSE, SV1_HEADER, SV2_HEADER, TI_SIZE};
use crate::crypto::{Block, TruncatedMac, cmac, cmac_truncated, encrypt_block, session_vector};
use crate::keys::{AesKey, KeySlot};
use crate::{Error, Result};

/// Transaction identifier assigned by the chip
pub type TransactionId = [u8; TI_SIZE];

/// Authenticated session with the chip
///
/// The keys are wiped when the session is dropped, which happens on
/// re-authentication, any failed command, any transport error and when the
/// authenticating key is changed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CardSession {
    /// SesAuthENCKey
    enc_key: [u8; 16],
    /// SesAuthMACKey
    mac_key: [u8; 16],
    /// Transaction identifier
    ti: TransactionId,
    /// Command counter, little-endian on the wire
    cmd_counter: u16,
    /// Slot the session was authenticated with
    #[zeroize(skip)]
    slot: KeySlot,
}

impl CardSession {
    /// Derive a fresh session from the authentication exchange
    ///
    /// # Arguments
    ///
    /// * `key` - The key the chip was authenticated with
    /// * `slot` - Slot of that key
    /// * `rnd_a` - Host random
    /// * `rnd_b` - Chip random
    /// * `ti` - Transaction identifier returned by the chip
    ///
    /// # Returns
    ///
    /// A session with the command counter at zero
    pub fn derive(
        key: &AesKey,
        slot: KeySlot,
        rnd_a: &Block,
        rnd_b: &Block,
        ti: TransactionId,
    ) -> Result<Self> {
        let (enc_key, mac_key) = derive_session_keys(key, rnd_a, rnd_b)?;
        Ok(Self {
            enc_key,
            mac_key,
            ti,
            cmd_counter: 0,
            slot,
        })
    }

    /// Replace the session keys after AuthenticateEV2NonFirst
    ///
    /// The transaction identifier and command counter carry over.
    pub fn rekey(&mut self, key: &AesKey, slot: KeySlot, rnd_a: &Block, rnd_b: &Block) -> Result<()> {
        let (mut enc_key, mut mac_key) = derive_session_keys(key, rnd_a, rnd_b)?;
        self.enc_key = enc_key;
        self.mac_key = mac_key;
        self.slot = slot;
        enc_key.zeroize();
        mac_key.zeroize();
        Ok(())
    }

    /// Transaction identifier
    pub const fn ti(&self) -> &TransactionId {
        &self.ti
    }

    /// Current command counter
    pub const fn cmd_counter(&self) -> u16 {
        self.cmd_counter
    }

    /// Slot the session was authenticated with
    pub const fn slot(&self) -> KeySlot {
        self.slot
    }

    pub(crate) const fn enc_key(&self) -> &[u8; 16] {
        &self.enc_key
    }

    fn next_counter(&self) -> Result<u16> {
        self.cmd_counter
            .checked_add(1)
            .ok_or(Error::InvalidData("command counter exhausted"))
    }

    /// Record a successful command
    pub(crate) fn advance(&mut self) -> Result<()> {
        self.cmd_counter = self.next_counter()?;
        Ok(())
    }

    fn iv(&self, label: [u8; 2], counter: u16) -> Result<Block> {
        let mut input = [0u8; 16];
        input[0..2].copy_from_slice(&label);
        input[2..6].copy_from_slice(&self.ti);
        input[6..8].copy_from_slice(&counter.to_le_bytes());
        encrypt_block(&self.enc_key, &input)
    }

    /// IV for encrypting command data: `E(SesENC, A5 5A ‖ TI ‖ CmdCtr ‖ 0…)`
    pub fn command_iv(&self) -> Result<Block> {
        self.iv(IV_LABEL_COMMAND, self.cmd_counter)
    }

    /// IV for decrypting response data, keyed on the counter after the command
    pub fn response_iv(&self) -> Result<Block> {
        self.iv(IV_LABEL_RESPONSE, self.next_counter()?)
    }

    /// MAC over a command: `INS ‖ CmdCtr ‖ TI ‖ header ‖ data`
    pub fn command_mac(&self, ins: u8, header: &[u8], data: &[u8]) -> Result<TruncatedMac> {
        let mut input = Vec::with_capacity(7 + header.len() + data.len());
        input.push(ins);
        input.extend_from_slice(&self.cmd_counter.to_le_bytes());
        input.extend_from_slice(&self.ti);
        input.extend_from_slice(header);
        input.extend_from_slice(data);
        cmac_truncated(&self.mac_key, &input)
    }

    /// MAC over a response: `RC ‖ CmdCtr+1 ‖ TI ‖ data`
    pub fn response_mac(&self, return_code: u8, data: &[u8]) -> Result<TruncatedMac> {
        let mut input = Vec::with_capacity(7 + data.len());
        input.push(return_code);
        input.extend_from_slice(&self.next_counter()?.to_le_bytes());
        input.extend_from_slice(&self.ti);
        input.extend_from_slice(data);
        cmac_truncated(&self.mac_key, &input)
    }
}

impl fmt::Debug for CardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("ti", &hex::encode(self.ti))
            .field("cmd_counter", &self.cmd_counter)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Derive `(SesAuthENCKey, SesAuthMACKey)` from the authentication randoms
pub fn derive_session_keys(
    key: &AesKey,
    rnd_a: &Block,
    rnd_b: &Block,
) -> Result<([u8; 16], [u8; 16])> {
    let mut sv1 = session_vector(&SV1_HEADER, rnd_a, rnd_b);
    let mut sv2 = session_vector(&SV2_HEADER, rnd_a, rnd_b);
    let enc = cmac(key.as_bytes(), &sv1);
    let mac = cmac(key.as_bytes(), &sv2);
    sv1.zeroize();
    sv2.zeroize();
    Ok((enc?, mac?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::decrypt_ecb;
    use hex_literal::hex;

    const RND_A: Block = hex!("13c5db8a5930439fc3def9a4c675360f");
    const RND_B: Block = hex!("b9e2fc789b64bf237ccccaa20ec7e6e4");
    const TI: TransactionId = hex!("9d00c4df");

    fn session() -> CardSession {
        CardSession::derive(&AesKey::FACTORY, KeySlot::Master, &RND_A, &RND_B, TI).unwrap()
    }

    #[test]
    fn test_session_keys_are_deterministic() {
        let a = derive_session_keys(&AesKey::FACTORY, &RND_A, &RND_B).unwrap();
        let b = derive_session_keys(&AesKey::FACTORY, &RND_A, &RND_B).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.0, a.1);

        let mut other_a = RND_A;
        other_a[15] ^= 0x01;
        let c = derive_session_keys(&AesKey::FACTORY, &other_a, &RND_B).unwrap();
        assert_ne!(a.0, c.0);
        assert_ne!(a.1, c.1);

        let d = derive_session_keys(&AesKey::new([0x11; 16]), &RND_A, &RND_B).unwrap();
        assert_ne!(a.0, d.0);
    }

    #[test]
    fn test_session_keys_follow_cmac_of_session_vectors() {
        let (enc, mac) = derive_session_keys(&AesKey::FACTORY, &RND_A, &RND_B).unwrap();
        let sv1 = session_vector(&SV1_HEADER, &RND_A, &RND_B);
        let sv2 = session_vector(&SV2_HEADER, &RND_A, &RND_B);
        assert_eq!(enc, cmac(&[0u8; 16], &sv1).unwrap());
        assert_eq!(mac, cmac(&[0u8; 16], &sv2).unwrap());
    }

    #[test]
    fn test_session_keys_an12196() {
        // AN12196, AuthenticateEV2First with the all-zero key
        let rnd_a = hex!("b98f4c50cf1c2e084fd150e33992b048");
        let rnd_b = hex!("91517975190dcea6104948efa3085c1b");
        let (enc, mac) = derive_session_keys(&AesKey::FACTORY, &rnd_a, &rnd_b).unwrap();
        assert_eq!(enc, hex!("7a93d6571e4b180fca6ac90c9a7488d4"));
        assert_eq!(mac, hex!("fc4af159b62e549b5812394cab1918cc"));
    }

    #[test]
    fn test_ivs_encode_ti_and_counter() {
        let mut session = session();
        session.advance().unwrap();
        session.advance().unwrap();

        let iv_c = decrypt_ecb(session.enc_key(), &session.command_iv().unwrap()).unwrap();
        assert_eq!(iv_c, hex!("a55a9d00c4df02000000000000000000"));

        let iv_r = decrypt_ecb(session.enc_key(), &session.response_iv().unwrap()).unwrap();
        assert_eq!(iv_r, hex!("5aa59d00c4df03000000000000000000"));
    }

    #[test]
    fn test_counter_and_macs() {
        let mut session = session();
        assert_eq!(session.cmd_counter(), 0);

        let mac0 = session.command_mac(0xC4, &[0x01], &[0xAA; 32]).unwrap();
        session.advance().unwrap();
        assert_eq!(session.cmd_counter(), 1);
        let mac1 = session.command_mac(0xC4, &[0x01], &[0xAA; 32]).unwrap();
        assert_ne!(mac0, mac1);

        session.cmd_counter = u16::MAX;
        assert!(session.advance().is_err());
        assert!(session.response_mac(0x00, &[]).is_err());
    }

    #[test]
    fn test_rekey_keeps_ti_and_counter() {
        let mut session = session();
        session.advance().unwrap();
        let before = session.enc_key;
        session
            .rekey(&AesKey::new([0x22; 16]), KeySlot::App1, &RND_A, &RND_B)
            .unwrap();
        assert_ne!(session.enc_key, before);
        assert_eq!(session.ti(), &TI);
        assert_eq!(session.cmd_counter(), 1);
        assert_eq!(session.slot(), KeySlot::App1);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", session());
        assert!(rendered.contains("9d00c4df"));
        assert!(!rendered.contains("enc_key"));
    }
}
