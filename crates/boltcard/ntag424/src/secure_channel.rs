//! EV2 secure messaging
//!
//! This module provides the host side of the AuthenticateEV2 challenge-response
//! and the command/response transformation for the three communication modes.

use boltcard_apdu_core::Response;
use derive_more::Display;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::constants::{AUTH_FIRST_RESPONSE_SIZE, BLOCK_SIZE, MAC_SIZE, TI_SIZE};
use crate::crypto::{Block, ZERO_IV, decrypt_cbc, encrypt_cbc, pad_m2, rotate_left, unpad_m2};
use crate::keys::{AesKey, KeySlot};
use crate::session::{CardSession, TransactionId};
use crate::{Error, Result};

/// Communication mode of a command
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommMode {
    /// No protection, the counter still advances inside a session
    #[default]
    Plain,
    /// Command and response carry a truncated CMAC
    Mac,
    /// Data is encrypted and both directions carry a truncated CMAC
    Full,
}

impl CommMode {
    /// Whether the mode needs an authenticated session
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

/// Host side of one AuthenticateEV2 exchange
///
/// Holds the two randoms until the chip's answer has been checked.
pub(crate) struct Ev2Handshake<'a> {
    key: &'a AesKey,
    slot: KeySlot,
    rnd_a: Block,
    rnd_b: Block,
}

impl<'a> Ev2Handshake<'a> {
    /// Start from the chip's encrypted RndB
    pub(crate) fn new(
        key: &'a AesKey,
        slot: KeySlot,
        encrypted_rnd_b: &[u8],
        rnd_a: Block,
    ) -> Result<Self> {
        if encrypted_rnd_b.len() != BLOCK_SIZE {
            return Err(Error::InvalidData("RndB challenge must be 16 bytes"));
        }
        let decrypted = decrypt_cbc(key.as_bytes(), &ZERO_IV, encrypted_rnd_b)?;
        let mut rnd_b = [0u8; BLOCK_SIZE];
        rnd_b.copy_from_slice(&decrypted);
        Ok(Self {
            key,
            slot,
            rnd_a,
            rnd_b,
        })
    }

    /// `E(K, RndA ‖ RndB')`, the payload of the second frame
    pub(crate) fn challenge_response(&self) -> Result<Vec<u8>> {
        let mut plain = Vec::with_capacity(2 * BLOCK_SIZE);
        plain.extend_from_slice(&self.rnd_a);
        plain.extend_from_slice(&rotate_left(&self.rnd_b));
        let encrypted = encrypt_cbc(self.key.as_bytes(), &ZERO_IV, &plain);
        plain.zeroize();
        encrypted
    }

    fn check_rnd_a(&self, returned: &[u8]) -> Result<()> {
        let expected = rotate_left(&self.rnd_a);
        if bool::from(expected.as_slice().ct_eq(returned)) {
            Ok(())
        } else {
            warn!("Chip returned a different RndA'");
            Err(Error::AuthenticationFailed("RndA' does not match"))
        }
    }

    /// Verify the AuthenticateEV2First answer and derive a new session
    ///
    /// The decrypted answer is `TI ‖ RndA' ‖ PDcap2 ‖ PCDcap2`.
    pub(crate) fn finish_first(self, encrypted: &[u8]) -> Result<CardSession> {
        if encrypted.len() != AUTH_FIRST_RESPONSE_SIZE {
            return Err(Error::AuthenticationFailed("unexpected answer length"));
        }
        let mut plain = decrypt_cbc(self.key.as_bytes(), &ZERO_IV, encrypted)?;
        let result = self.check_rnd_a(&plain[TI_SIZE..TI_SIZE + BLOCK_SIZE]).and_then(|_| {
            let mut ti: TransactionId = [0u8; TI_SIZE];
            ti.copy_from_slice(&plain[..TI_SIZE]);
            debug!(
                ti = %hex::encode(ti),
                pd_cap2 = %hex::encode(&plain[20..26]),
                "EV2 session established"
            );
            CardSession::derive(self.key, self.slot, &self.rnd_a, &self.rnd_b, ti)
        });
        plain.zeroize();
        result
    }

    /// Verify the AuthenticateEV2NonFirst answer and rekey the existing session
    pub(crate) fn finish_non_first(self, encrypted: &[u8], session: &mut CardSession) -> Result<()> {
        if encrypted.len() != BLOCK_SIZE {
            return Err(Error::AuthenticationFailed("unexpected answer length"));
        }
        let mut plain = decrypt_cbc(self.key.as_bytes(), &ZERO_IV, encrypted)?;
        let result = self
            .check_rnd_a(&plain)
            .and_then(|_| session.rekey(self.key, self.slot, &self.rnd_a, &self.rnd_b));
        plain.zeroize();
        result
    }
}

impl Drop for Ev2Handshake<'_> {
    fn drop(&mut self) {
        self.rnd_a.zeroize();
        self.rnd_b.zeroize();
    }
}

impl CardSession {
    /// Build the data field of a command in the given mode
    ///
    /// Returns `header ‖ data` for Plain, `header ‖ data ‖ MAC` for Mac and
    /// `header ‖ E(pad(data)) ‖ MAC` for Full.
    pub fn wrap_command(
        &self,
        ins: u8,
        header: &[u8],
        data: &[u8],
        mode: CommMode,
    ) -> Result<Vec<u8>> {
        let body = match mode {
            CommMode::Full if !data.is_empty() => {
                let mut padded = pad_m2(data);
                let encrypted = encrypt_cbc(self.enc_key(), &self.command_iv()?, &padded);
                padded.zeroize();
                encrypted?
            }
            _ => data.to_vec(),
        };

        let mut out = Vec::with_capacity(header.len() + body.len() + MAC_SIZE);
        out.extend_from_slice(header);
        out.extend_from_slice(&body);
        if mode != CommMode::Plain {
            out.extend_from_slice(&self.command_mac(ins, header, &body)?);
        }
        Ok(out)
    }

    /// Check and strip protection from a successful response, then advance the counter
    pub fn unwrap_response(&mut self, response: &Response, mode: CommMode) -> Result<Vec<u8>> {
        let payload = response.data();
        let data = match mode {
            CommMode::Plain => payload.to_vec(),
            CommMode::Mac | CommMode::Full => {
                if payload.len() < MAC_SIZE {
                    return Err(Error::IntegrityError);
                }
                let (body, mac) = payload.split_at(payload.len() - MAC_SIZE);
                let expected = self.response_mac(response.status().sw2, body)?;
                if !bool::from(expected.as_slice().ct_eq(mac)) {
                    warn!("Response MAC mismatch");
                    return Err(Error::IntegrityError);
                }
                if mode == CommMode::Full && !body.is_empty() {
                    let plain = decrypt_cbc(self.enc_key(), &self.response_iv()?, body)
                        .map_err(|_| Error::IntegrityError)?;
                    unpad_m2(&plain)?.to_vec()
                } else {
                    body.to_vec()
                }
            }
        };
        self.advance()?;
        Ok(data)
    }
}
