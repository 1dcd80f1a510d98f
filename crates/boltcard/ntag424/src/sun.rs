//! SUN (Secure Unique NFC) message verification
//!
//! A tapped card appends `p`, the PICC data encrypted with the SDM meta read
//! key, and `c`, a truncated CMAC keyed by a session key derived from the SDM
//! file read key, the UID and the read counter. Verification needs no chip.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::constants::{PICC_DATA_TAG, SDM_COUNTER_SIZE, SDM_SV2_HEADER, UID_SIZE};
use crate::crypto::{ZERO_IV, cmac, cmac_truncated, decrypt_cbc};
use crate::keys::AesKey;
use crate::{Error, Result};

/// Chip UID
pub type Uid = [u8; UID_SIZE];

/// Identity proven by a verified SUN message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunVerification {
    /// UID of the card
    pub uid: Uid,
    /// SDM read counter at the time of the tap
    pub counter: u32,
}

impl SunVerification {
    /// UID as lowercase hex
    pub fn uid_hex(&self) -> String {
        hex::encode(self.uid)
    }
}

/// Decrypted PICC data: `0xC7 ‖ UID ‖ counter ‖ random`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiccData {
    /// Mirrored UID
    pub uid: Uid,
    /// Mirrored read counter
    pub counter: u32,
}

/// Decrypt the `p` parameter with the SDM meta read key
pub fn decrypt_picc_data(encrypted: &[u8], meta_read_key: &AesKey) -> Result<PiccData> {
    if encrypted.len() != 16 {
        return Err(Error::InvalidData("PICC data must be 16 bytes"));
    }
    let mut plain = decrypt_cbc(meta_read_key.as_bytes(), &ZERO_IV, encrypted)?;
    let result = if plain[0] != PICC_DATA_TAG {
        // A wrong key decrypts to noise, so the tag byte catches it first
        Err(Error::UidMismatch)
    } else {
        let mut uid = [0u8; UID_SIZE];
        uid.copy_from_slice(&plain[1..1 + UID_SIZE]);
        let c = &plain[1 + UID_SIZE..1 + UID_SIZE + SDM_COUNTER_SIZE];
        Ok(PiccData {
            uid,
            counter: u32::from_le_bytes([c[0], c[1], c[2], 0]),
        })
    };
    plain.zeroize();
    result
}

/// Derive the SDM session MAC key: `CMAC(k, 3C C3 00 01 00 80 ‖ UID ‖ counter)`
pub fn sdm_session_mac_key(file_read_key: &AesKey, uid: &Uid, counter: u32) -> Result<[u8; 16]> {
    let mut sv2 = [0u8; 16];
    sv2[0..6].copy_from_slice(&SDM_SV2_HEADER);
    sv2[6..13].copy_from_slice(uid);
    sv2[13..16].copy_from_slice(&counter.to_le_bytes()[..SDM_COUNTER_SIZE]);
    cmac(file_read_key.as_bytes(), &sv2)
}

/// Compute the truncated SDM MAC over an empty input
pub fn sdm_mac(file_read_key: &AesKey, uid: &Uid, counter: u32) -> Result<[u8; 8]> {
    let mut session_key = sdm_session_mac_key(file_read_key, uid, counter)?;
    let tag = cmac_truncated(&session_key, &[]);
    session_key.zeroize();
    tag
}

/// Verify a SUN message offline
///
/// # Arguments
///
/// * `p` - Encrypted PICC data, 32 hex characters
/// * `c` - Truncated SDM MAC, 16 hex characters
/// * `uid` - Expected UID, 14 hex characters
/// * `k1` - SDM meta read key, decrypts `p`
/// * `k2` - SDM file read key, verifies `c`
///
/// # Returns
///
/// The UID and read counter carried by the message. Replay protection is left
/// to the caller, see [`ensure_fresh`].
pub fn test_p_and_c(
    p: &str,
    c: &str,
    uid: &str,
    k1: &AesKey,
    k2: &AesKey,
) -> Result<SunVerification> {
    let encrypted = hex::decode(p)?;
    let tag = hex::decode(c)?;
    let expected_uid = hex::decode(uid)?;
    if tag.len() != 8 {
        return Err(Error::InvalidData("SDM MAC must be 8 bytes"));
    }
    if expected_uid.len() != UID_SIZE {
        return Err(Error::InvalidData("UID must be 7 bytes"));
    }

    let picc = decrypt_picc_data(&encrypted, k1)?;
    if !bool::from(picc.uid.as_slice().ct_eq(&expected_uid)) {
        warn!("PICC data names a different UID");
        return Err(Error::UidMismatch);
    }

    let computed = sdm_mac(k2, &picc.uid, picc.counter)?;
    if !bool::from(computed.as_slice().ct_eq(&tag)) {
        warn!(counter = picc.counter, "SUN MAC mismatch");
        return Err(Error::TagInvalid);
    }

    debug!(uid = %hex::encode(picc.uid), counter = picc.counter, "SUN message verified");
    Ok(SunVerification {
        uid: picc.uid,
        counter: picc.counter,
    })
}

/// Reject a counter that does not strictly exceed the last accepted one
pub fn ensure_fresh(previous: Option<u32>, current: u32) -> Result<()> {
    match previous {
        Some(previous) if current <= previous => Err(Error::CounterNotFresh { previous, current }),
        _ => Ok(()),
    }
}
