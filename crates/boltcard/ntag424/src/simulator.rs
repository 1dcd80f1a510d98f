//! Software model of an NTAG 424 DNA chip
//!
//! [`SimulatedCard`] answers the APDUs of the NDEF application the way a chip
//! does: EV2 authentication, secure messaging, key and file settings changes
//! and SDM mirroring on unauthenticated reads. It implements
//! [`CardTransport`], so it can stand in for a reader in tests. Faults can be
//! injected per instruction to exercise recovery paths.

use boltcard_apdu_core::{Bytes, CardTransport, StatusWord, TransportError};
use rand::RngCore;
use tracing::trace;

use crate::constants::{
    BLOCK_SIZE, CLA_ISO, CLA_NATIVE, NDEF_APPLICATION_DF_NAME, NDEF_FILE_NO, NDEF_FILE_SIZE,
    PICC_DATA_TAG, TI_SIZE, ins,
};
use crate::crypto::{
    Block, ZERO_IV, cmac_truncated, crc32_nk, decrypt_cbc, encrypt_cbc, pad_m2, rotate_left,
    unpad_m2, xor,
};
use crate::file_settings::{AccessCondition, FileSettings, SdmOptions};
use crate::keys::{AesKey, KeySlot, KeyVersion};
use crate::ndef::decode_uri_file;
use crate::secure_channel::CommMode;
use crate::session::CardSession;
use crate::sun::{Uid, sdm_session_mac_key};

/// Second status byte of native answers
mod sw {
    pub(super) const OK: u8 = 0x00;
    pub(super) const ILLEGAL_COMMAND: u8 = 0x1C;
    pub(super) const INTEGRITY_ERROR: u8 = 0x1E;
    pub(super) const NO_SUCH_KEY: u8 = 0x40;
    pub(super) const LENGTH_ERROR: u8 = 0x7E;
    pub(super) const PERMISSION_DENIED: u8 = 0x9D;
    pub(super) const PARAMETER_ERROR: u8 = 0x9E;
    pub(super) const AUTHENTICATION_ERROR: u8 = 0xAE;
    pub(super) const ADDITIONAL_FRAME: u8 = 0xAF;
    pub(super) const BOUNDARY_ERROR: u8 = 0xBE;
    pub(super) const COMMAND_ABORTED: u8 = 0xCA;
    pub(super) const FILE_NOT_FOUND: u8 = 0xF0;
}

/// Largest value of the 24-bit SDM read counter
const SDM_COUNTER_MAX: u32 = 0x00FF_FFFF;

type Answer = Result<(Vec<u8>, u8), u8>;

/// What a handled command asks the secure messaging layer to do
enum Reply {
    Data(Vec<u8>),
    /// Answer without a MAC and leave the authenticated state
    EndSession,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Status(StatusWord),
    Disconnect,
}

#[derive(Debug, Clone, Copy)]
struct FaultTrigger {
    ins: u8,
    key_no: Option<u8>,
    fault: Fault,
}

#[derive(Debug)]
struct PendingAuth {
    slot: KeySlot,
    rnd_b: Block,
    first: bool,
}

/// In-memory NTAG 424 DNA
#[derive(Debug)]
pub struct SimulatedCard {
    uid: Uid,
    keys: [AesKey; 5],
    versions: [KeyVersion; 5],
    ndef: Vec<u8>,
    settings: FileSettings,
    sdm_read_counter: u32,
    selected: bool,
    session: Option<CardSession>,
    pending: Option<PendingAuth>,
    connected: bool,
    faults: Vec<FaultTrigger>,
    received: Vec<u8>,
}

fn random<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::rng().fill_bytes(&mut out);
    out
}

fn u24(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

fn integrity<T>(result: crate::Result<T>) -> Result<T, u8> {
    result.map_err(|_| sw::INTEGRITY_ERROR)
}

impl SimulatedCard {
    /// A factory-fresh chip: zero keys at version 0, SDM off, empty NDEF file
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            keys: std::array::from_fn(|_| AesKey::FACTORY),
            versions: [KeyVersion::FACTORY; 5],
            ndef: vec![0u8; NDEF_FILE_SIZE],
            settings: FileSettings::factory(),
            sdm_read_counter: 0,
            selected: false,
            session: None,
            pending: None,
            connected: true,
            faults: Vec::new(),
            received: Vec::new(),
        }
    }

    /// UID of the chip
    pub const fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Key stored in a slot
    pub const fn key(&self, slot: KeySlot) -> &AesKey {
        &self.keys[slot as usize]
    }

    /// Version stored with a key
    pub const fn key_version(&self, slot: KeySlot) -> KeyVersion {
        self.versions[slot as usize]
    }

    /// Overwrite a key, as if a previous personalization had set it
    pub fn set_key(&mut self, slot: KeySlot, key: AesKey, version: KeyVersion) {
        self.keys[slot as usize] = key;
        self.versions[slot as usize] = version;
    }

    /// Current settings of the NDEF file
    pub const fn file_settings(&self) -> &FileSettings {
        &self.settings
    }

    /// Raw NDEF file content, without SDM mirroring
    pub fn ndef_file(&self) -> &[u8] {
        &self.ndef
    }

    /// Current SDM read counter
    pub const fn sdm_read_counter(&self) -> u32 {
        self.sdm_read_counter
    }

    /// Whether the chip is in an authenticated state
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Instruction bytes of every command received, in order
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Answer the next matching command with `status` instead of executing it
    ///
    /// `key_no` narrows the match to commands whose first data byte is that
    /// key or file number.
    pub fn inject_status(&mut self, ins: u8, key_no: Option<u8>, status: StatusWord) {
        self.faults.push(FaultTrigger {
            ins,
            key_no,
            fault: Fault::Status(status),
        });
    }

    /// Drop the field on the next matching command, before executing it
    pub fn inject_disconnect(&mut self, ins: u8, key_no: Option<u8>) {
        self.faults.push(FaultTrigger {
            ins,
            key_no,
            fault: Fault::Disconnect,
        });
    }

    /// Pull the card out of the field
    pub fn remove(&mut self) {
        self.connected = false;
        self.selected = false;
        self.session = None;
        self.pending = None;
    }

    /// Simulate a phone tap: one unauthenticated read of the NDEF file
    ///
    /// Returns the URI with any SDM mirrors filled in.
    pub fn tap(&mut self) -> crate::Result<String> {
        if self.settings.sdm.is_some() {
            self.bump_sdm_counter();
        }
        decode_uri_file(&self.mirrored())
    }

    fn bump_sdm_counter(&mut self) {
        self.sdm_read_counter = (self.sdm_read_counter + 1).min(SDM_COUNTER_MAX);
    }

    fn take_fault(&mut self, ins: u8, data: &[u8]) -> Option<Fault> {
        let index = self.faults.iter().position(|f| {
            f.ins == ins && f.key_no.is_none_or(|k| data.first() == Some(&k))
        })?;
        Some(self.faults.remove(index).fault)
    }

    fn process(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        if raw.len() < 4 {
            return Ok(status_bytes(&[], 0x67, 0x00));
        }
        let (cla, ins) = (raw[0], raw[1]);
        let data = if raw.len() > 5 {
            let lc = raw[4] as usize;
            raw.get(5..5 + lc).unwrap_or(&[])
        } else {
            &[]
        };
        self.received.push(ins);
        trace!(cla, ins, len = data.len(), "Simulated chip received command");

        if let Some(fault) = self.take_fault(ins, data) {
            self.session = None;
            self.pending = None;
            return match fault {
                Fault::Status(status) => Ok(status_bytes(&[], status.sw1, status.sw2)),
                Fault::Disconnect => {
                    self.remove();
                    Err(TransportError::TagLost)
                }
            };
        }

        match cla {
            CLA_ISO if ins == ins::ISO_SELECT_FILE => Ok(self.select(raw[2], data)),
            CLA_NATIVE => Ok(self.native(ins, data)),
            _ => Ok(status_bytes(&[], 0x6E, 0x00)),
        }
    }

    fn select(&mut self, p1: u8, data: &[u8]) -> Bytes {
        self.session = None;
        self.pending = None;
        if p1 == 0x04 && data == NDEF_APPLICATION_DF_NAME {
            self.selected = true;
            status_bytes(&[], 0x90, 0x00)
        } else {
            self.selected = false;
            status_bytes(&[], 0x6A, 0x82)
        }
    }

    fn native(&mut self, ins: u8, data: &[u8]) -> Bytes {
        if !self.selected {
            return status_bytes(&[], 0x91, sw::PERMISSION_DENIED);
        }
        let pending = self.pending.take();
        let answer = match ins {
            ins::AUTHENTICATE_EV2_FIRST => self.auth_part1(data, true),
            ins::AUTHENTICATE_EV2_NON_FIRST => self.auth_part1(data, false),
            ins::ADDITIONAL_FRAME => self.auth_part2(pending, data),
            _ => self.secure_command(ins, data),
        };
        match answer {
            Ok((payload, sw2)) => status_bytes(&payload, 0x91, sw2),
            Err(sw2) => {
                self.session = None;
                status_bytes(&[], 0x91, sw2)
            }
        }
    }

    fn auth_part1(&mut self, data: &[u8], first: bool) -> Answer {
        let expected_len = if first { 2 } else { 1 };
        if data.len() < expected_len {
            return Err(sw::LENGTH_ERROR);
        }
        let slot = KeySlot::try_from(data[0]).map_err(|_| sw::NO_SUCH_KEY)?;
        if first {
            self.session = None;
        } else if self.session.is_none() {
            return Err(sw::AUTHENTICATION_ERROR);
        }

        let rnd_b: Block = random();
        let encrypted = integrity(encrypt_cbc(self.key(slot).as_bytes(), &ZERO_IV, &rnd_b))?;
        self.pending = Some(PendingAuth { slot, rnd_b, first });
        Ok((encrypted, sw::ADDITIONAL_FRAME))
    }

    fn auth_part2(&mut self, pending: Option<PendingAuth>, data: &[u8]) -> Answer {
        let PendingAuth { slot, rnd_b, first } = pending.ok_or(sw::COMMAND_ABORTED)?;
        if data.len() != 2 * BLOCK_SIZE {
            return Err(sw::LENGTH_ERROR);
        }
        let key = self.key(slot).clone();
        let plain = integrity(decrypt_cbc(key.as_bytes(), &ZERO_IV, data))?;
        if plain[BLOCK_SIZE..] != rotate_left(&rnd_b)[..] {
            return Err(sw::AUTHENTICATION_ERROR);
        }
        let mut rnd_a = [0u8; BLOCK_SIZE];
        rnd_a.copy_from_slice(&plain[..BLOCK_SIZE]);

        if first {
            let ti: [u8; TI_SIZE] = random();
            let mut answer = Vec::with_capacity(2 * BLOCK_SIZE);
            answer.extend_from_slice(&ti);
            answer.extend_from_slice(&rotate_left(&rnd_a));
            // PDcap2 and PCDcap2
            answer.extend_from_slice(&[0u8; 12]);
            let encrypted = integrity(encrypt_cbc(key.as_bytes(), &ZERO_IV, &answer))?;
            self.session = Some(integrity(CardSession::derive(
                &key, slot, &rnd_a, &rnd_b, ti,
            ))?);
            Ok((encrypted, sw::OK))
        } else {
            let encrypted =
                integrity(encrypt_cbc(key.as_bytes(), &ZERO_IV, &rotate_left(&rnd_a)))?;
            let session = self.session.as_mut().ok_or(sw::AUTHENTICATION_ERROR)?;
            integrity(session.rekey(&key, slot, &rnd_a, &rnd_b))?;
            Ok((encrypted, sw::OK))
        }
    }

    fn secure_command(&mut self, ins: u8, data: &[u8]) -> Answer {
        let (mode, header_len) = match ins {
            ins::CHANGE_KEY | ins::CHANGE_FILE_SETTINGS => (CommMode::Full, 1),
            ins::GET_KEY_VERSION | ins::GET_FILE_SETTINGS => (CommMode::Mac, 1),
            ins::GET_CARD_UID => (CommMode::Full, 0),
            ins::READ_DATA | ins::WRITE_DATA => (CommMode::Plain, 7),
            _ => return Err(sw::ILLEGAL_COMMAND),
        };
        if data.len() < header_len {
            return Err(sw::LENGTH_ERROR);
        }
        let (header, rest) = data.split_at(header_len);

        let body = match (&self.session, mode) {
            (_, CommMode::Plain) => rest.to_vec(),
            (None, _) => return Err(sw::PERMISSION_DENIED),
            (Some(session), mode) => {
                if rest.len() < 8 {
                    return Err(sw::LENGTH_ERROR);
                }
                let (body, mac) = rest.split_at(rest.len() - 8);
                if integrity(session.command_mac(ins, header, body))?[..] != *mac {
                    return Err(sw::INTEGRITY_ERROR);
                }
                if mode == CommMode::Full && !body.is_empty() {
                    let iv = integrity(session.command_iv())?;
                    let plain = integrity(decrypt_cbc(session.enc_key(), &iv, body))?;
                    integrity(unpad_m2(&plain))?.to_vec()
                } else {
                    body.to_vec()
                }
            }
        };

        let reply = match ins {
            ins::CHANGE_KEY => self.change_key(header, &body)?,
            ins::CHANGE_FILE_SETTINGS => self.change_file_settings(header, &body)?,
            ins::GET_KEY_VERSION => self.get_key_version(header)?,
            ins::GET_FILE_SETTINGS => self.get_file_settings(header)?,
            ins::GET_CARD_UID => Reply::Data(self.uid.to_vec()),
            ins::READ_DATA => self.read_data(header)?,
            _ => self.write_data(header, &body)?,
        };

        let data = match reply {
            Reply::EndSession => {
                self.session = None;
                return Ok((Vec::new(), sw::OK));
            }
            Reply::Data(data) => data,
        };
        let Some(session) = self.session.as_mut() else {
            return Ok((data, sw::OK));
        };

        let body = if mode == CommMode::Full && !data.is_empty() {
            let iv = integrity(session.response_iv())?;
            integrity(encrypt_cbc(session.enc_key(), &iv, &pad_m2(&data)))?
        } else {
            data
        };
        let mut out = body.clone();
        if mode != CommMode::Plain {
            out.extend_from_slice(&integrity(session.response_mac(sw::OK, &body))?);
        }
        integrity(session.advance())?;
        Ok((out, sw::OK))
    }

    fn check_access(&self, condition: AccessCondition) -> Result<(), u8> {
        match (condition, &self.session) {
            (AccessCondition::Free, _) => Ok(()),
            (AccessCondition::Key(slot), Some(session)) if session.slot() == slot => Ok(()),
            _ => Err(sw::PERMISSION_DENIED),
        }
    }

    fn change_key(&mut self, header: &[u8], body: &[u8]) -> Result<Reply, u8> {
        let slot = KeySlot::try_from(header[0]).map_err(|_| sw::NO_SUCH_KEY)?;
        let authenticated = self
            .session
            .as_ref()
            .map(CardSession::slot)
            .ok_or(sw::PERMISSION_DENIED)?;
        if authenticated != KeySlot::Master {
            return Err(sw::PERMISSION_DENIED);
        }

        if slot == authenticated {
            if body.len() != 17 {
                return Err(sw::LENGTH_ERROR);
            }
            let key = AesKey::from_slice(&body[..16]).map_err(|_| sw::LENGTH_ERROR)?;
            self.set_key(slot, key, KeyVersion(body[16]));
            Ok(Reply::EndSession)
        } else {
            if body.len() != 21 {
                return Err(sw::LENGTH_ERROR);
            }
            let new = xor(&body[..16], self.key(slot).as_bytes());
            if crc32_nk(&new) != body[17..21] {
                return Err(sw::INTEGRITY_ERROR);
            }
            let key = AesKey::from_slice(&new).map_err(|_| sw::LENGTH_ERROR)?;
            self.set_key(slot, key, KeyVersion(body[16]));
            Ok(Reply::Data(Vec::new()))
        }
    }

    fn change_file_settings(&mut self, header: &[u8], body: &[u8]) -> Result<Reply, u8> {
        if header[0] != NDEF_FILE_NO {
            return Err(sw::FILE_NOT_FOUND);
        }
        self.check_access(self.settings.access.change)?;
        if body.len() < 3 {
            return Err(sw::LENGTH_ERROR);
        }

        // Reuse the GetFileSettings layout: type, option, rights, size, SDM part
        let mut info = vec![0x00, body[0], body[1], body[2]];
        info.extend_from_slice(&(NDEF_FILE_SIZE as u32).to_le_bytes()[..3]);
        info.extend_from_slice(&body[3..]);
        let settings = FileSettings::parse_file_info(&info)
            .map_err(|_| sw::PARAMETER_ERROR)?
            .settings;
        settings.to_bytes().map_err(|_| sw::PARAMETER_ERROR)?;
        settings
            .validate(NDEF_FILE_SIZE)
            .map_err(|_| sw::PARAMETER_ERROR)?;

        self.settings = settings;
        Ok(Reply::Data(Vec::new()))
    }

    fn get_key_version(&self, header: &[u8]) -> Result<Reply, u8> {
        let slot = KeySlot::try_from(header[0]).map_err(|_| sw::NO_SUCH_KEY)?;
        Ok(Reply::Data(vec![self.key_version(slot).0]))
    }

    fn get_file_settings(&self, header: &[u8]) -> Result<Reply, u8> {
        if header[0] != NDEF_FILE_NO {
            return Err(sw::FILE_NOT_FOUND);
        }
        let encoded = self.settings.to_bytes().map_err(|_| sw::PARAMETER_ERROR)?;
        let mut out = vec![0x00];
        out.extend_from_slice(&encoded[..3]);
        out.extend_from_slice(&(NDEF_FILE_SIZE as u32).to_le_bytes()[..3]);
        out.extend_from_slice(&encoded[3..]);
        Ok(Reply::Data(out))
    }

    fn file_range(&self, header: &[u8]) -> Result<(usize, usize), u8> {
        if header[0] != NDEF_FILE_NO {
            return Err(sw::FILE_NOT_FOUND);
        }
        let offset = u24(&header[1..4]) as usize;
        let length = match u24(&header[4..7]) as usize {
            0 => NDEF_FILE_SIZE.saturating_sub(offset),
            n => n,
        };
        if offset + length > NDEF_FILE_SIZE {
            return Err(sw::BOUNDARY_ERROR);
        }
        Ok((offset, length))
    }

    fn read_data(&mut self, header: &[u8]) -> Result<Reply, u8> {
        let (offset, length) = self.file_range(header)?;
        let access = self.settings.access;
        self.check_access(access.read)
            .or_else(|_| self.check_access(access.read_write))?;

        let content = if self.settings.sdm.is_some() && self.session.is_none() {
            if offset == 0 {
                self.bump_sdm_counter();
            }
            self.mirrored()
        } else {
            self.ndef.clone()
        };
        Ok(Reply::Data(content[offset..offset + length].to_vec()))
    }

    fn write_data(&mut self, header: &[u8], body: &[u8]) -> Result<Reply, u8> {
        let (offset, length) = self.file_range(header)?;
        if body.len() != length {
            return Err(sw::LENGTH_ERROR);
        }
        let access = self.settings.access;
        self.check_access(access.write)
            .or_else(|_| self.check_access(access.read_write))?;

        self.ndef[offset..offset + length].copy_from_slice(body);
        Ok(Reply::Data(Vec::new()))
    }

    /// NDEF file as an unauthenticated reader sees it
    fn mirrored(&self) -> Vec<u8> {
        let mut file = self.ndef.clone();
        let Some(sdm) = self.settings.sdm else {
            return file;
        };
        let ascii = sdm.options.has(SdmOptions::ASCII_ENCODING);
        let put = |file: &mut Vec<u8>, offset: Option<u32>, bytes: &[u8]| {
            let Some(offset) = offset else { return };
            let text = if ascii {
                hex::encode_upper(bytes).into_bytes()
            } else {
                bytes.to_vec()
            };
            let start = offset as usize;
            if let Some(target) = file.get_mut(start..start + text.len()) {
                target.copy_from_slice(&text);
            }
        };
        let counter = self.sdm_read_counter;
        let counter_le = &counter.to_le_bytes()[..3];

        match sdm.access.meta_read {
            AccessCondition::Free => {
                if sdm.options.has(SdmOptions::UID_MIRROR) {
                    put(&mut file, sdm.uid_offset, &self.uid);
                }
                if sdm.options.has(SdmOptions::READ_COUNTER_MIRROR) {
                    let counter_be = [counter_le[2], counter_le[1], counter_le[0]];
                    put(&mut file, sdm.read_counter_offset, &counter_be);
                }
            }
            AccessCondition::Key(slot) => {
                let mut plain = vec![PICC_DATA_TAG];
                plain.extend_from_slice(&self.uid);
                plain.extend_from_slice(counter_le);
                plain.extend_from_slice(&random::<5>());
                if let Ok(encrypted) = encrypt_cbc(self.key(slot).as_bytes(), &ZERO_IV, &plain) {
                    put(&mut file, sdm.picc_data_offset, &encrypted);
                }
            }
            AccessCondition::Never => {}
        }

        if let (AccessCondition::Key(slot), Some(input), Some(mac_offset)) =
            (sdm.access.file_read, sdm.mac_input_offset, sdm.mac_offset)
        {
            let range = input as usize..mac_offset as usize;
            let tag = sdm_session_mac_key(self.key(slot), &self.uid, counter)
                .and_then(|key| cmac_truncated(&key, file.get(range).unwrap_or(&[])));
            if let Ok(tag) = tag {
                put(&mut file, Some(mac_offset), &tag);
            }
        }
        file
    }
}

fn status_bytes(data: &[u8], sw1: u8, sw2: u8) -> Bytes {
    let mut out = Vec::with_capacity(data.len() + 2);
    out.extend_from_slice(data);
    out.push(sw1);
    out.push(sw2);
    Bytes::from(out)
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::TagLost);
        }
        self.process(command)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.remove();
        self.connected = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::{SunMessage, SunTemplate};
    use crate::sun::test_p_and_c;
    use hex_literal::hex;

    const UID: Uid = hex!("048d58d2142290");

    #[test]
    fn test_native_commands_need_selection() {
        let mut sim = SimulatedCard::new(UID);
        let answer = sim.transmit_raw(&hex!("9071000002000000")).unwrap();
        assert_eq!(answer.as_ref(), &[0x91, 0x9D]);

        let answer = sim.transmit_raw(&hex!("00a4040c07d276000085010100")).unwrap();
        assert_eq!(answer.as_ref(), &[0x90, 0x00]);

        let answer = sim.transmit_raw(&hex!("9071000002000000")).unwrap();
        assert_eq!(answer.len(), 18);
        assert_eq!(&answer[16..], &[0x91, 0xAF]);
    }

    #[test]
    fn test_tap_mirrors_verifiable_sun() {
        let k1 = AesKey::new(hex!("1b53525189f66e2e88a3996ae5a87cf3"));
        let k2 = AesKey::new(hex!("e4dae5db65c91efdf74ef3eba21b36c3"));
        let template = SunTemplate::new("lnurlw://pay.example.com/ln");
        let file = template.to_file().unwrap();

        let mut sim = SimulatedCard::new(UID);
        sim.set_key(KeySlot::App1, k1.clone(), KeyVersion(1));
        sim.set_key(KeySlot::App2, k2.clone(), KeyVersion(1));
        sim.ndef[..file.len()].copy_from_slice(&file);
        sim.settings = FileSettings::boltcard(
            template.picc_data_offset().unwrap(),
            template.mac_offset().unwrap(),
        );

        for expected in 1..=3 {
            let url = sim.tap().unwrap();
            let message = SunMessage::from_url(&url).unwrap();
            let verified = test_p_and_c(&message.p, &message.c, &hex::encode(UID), &k1, &k2)
                .unwrap();
            assert_eq!(verified.counter, expected);
        }
        assert_eq!(sim.sdm_read_counter(), 3);
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let mut sim = SimulatedCard::new(UID);
        sim.inject_status(ins::ISO_SELECT_FILE, None, StatusWord::new(0x6A, 0x82));
        let select = hex!("00a4040c07d276000085010100");
        assert_eq!(sim.transmit_raw(&select).unwrap().as_ref(), &[0x6A, 0x82]);
        assert_eq!(sim.transmit_raw(&select).unwrap().as_ref(), &[0x90, 0x00]);

        sim.inject_disconnect(ins::ISO_SELECT_FILE, None);
        assert!(matches!(
            sim.transmit_raw(&select),
            Err(TransportError::TagLost)
        ));
        assert!(!sim.is_connected());
        sim.reset().unwrap();
        assert_eq!(sim.transmit_raw(&select).unwrap().as_ref(), &[0x90, 0x00]);
        assert_eq!(sim.received().len(), 4);
    }
}
