//! NTAG 424 DNA card handle
//!
//! This module provides [`Ntag424`], which owns the transport and the
//! optional authenticated session and exposes the chip operations needed to
//! personalize and inspect a card.

use std::time::Duration;

use boltcard_apdu_core::{ApduCommand, CardTransport, Command, Response};
use rand::RngCore;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroize;

use crate::commands::{
    AdditionalFrame, AuthenticateEv2First, AuthenticateEv2NonFirst, ChangeFileSettings,
    ChangeKey, GetCardUid, GetFileSettings, GetKeyVersion, NativeCommand, ReadData, SelectFile,
    WriteData, native_command,
};
use crate::constants::{BLOCK_SIZE, NDEF_FILE_NO, NDEF_FILE_SIZE, UID_SIZE};
use crate::crypto::Block;
use crate::file_settings::{FileInfo, FileSettings};
use crate::keys::{AesKey, KeySlot, KeyVersion};
use crate::ndef::{decode_uri_file, message_length};
use crate::secure_channel::{CommMode, Ev2Handshake};
use crate::session::CardSession;
use crate::sun::Uid;
use crate::{Error, Result};

/// Largest ReadData/WriteData chunk, keeps every frame inside a short APDU
pub const MAX_CHUNK: usize = 128;

/// Handle to an NTAG 424 DNA chip
///
/// At most one session exists at a time. It is dropped whenever the chip
/// could have left the authenticated state: on re-authentication, on any
/// error status, on any transport failure and after the session key itself
/// has been changed.
#[derive(Debug)]
pub struct Ntag424<T: CardTransport> {
    transport: T,
    session: Option<CardSession>,
    /// Length of the NDEF content written through this handle
    ndef_len: Option<usize>,
}

impl<T: CardTransport> Ntag424<T> {
    /// Wrap a connected transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            session: None,
            ndef_len: None,
        }
    }

    /// Current session, if authenticated
    pub const fn session(&self) -> Option<&CardSession> {
        self.session.as_ref()
    }

    /// Whether an authenticated session is active
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Forget the session and wipe its keys
    pub fn invalidate_session(&mut self) {
        if self.session.take().is_some() {
            debug!("Session invalidated");
        }
    }

    /// Bound the time of each exchange with the chip
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.transport.set_timeout(timeout);
    }

    /// Borrow the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transmit(&mut self, command: &Command) -> Result<Response> {
        match self.transport.transmit(command) {
            Ok(response) => Ok(response),
            Err(e) => {
                self.invalidate_session();
                Err(e.into())
            }
        }
    }

    /// Select the NDEF application by DF name
    ///
    /// Selecting ends any authenticated state on the chip.
    #[instrument(level = "debug", skip(self))]
    pub fn select_ndef_application(&mut self) -> Result<()> {
        self.invalidate_session();
        let command = SelectFile::ndef_application().to_command();
        let response = self.transmit(&command)?;
        if !response.is_success() {
            warn!(status = %response.status(), "NDEF application not selected");
            return Err(Error::Status(response.status()));
        }
        Ok(())
    }

    fn random_block() -> Block {
        let mut rnd_a = [0u8; BLOCK_SIZE];
        rand::rng().fill_bytes(&mut rnd_a);
        rnd_a
    }

    /// Run the second frame of an authentication and return the chip's answer
    fn authenticate_part2(&mut self, handshake: &Ev2Handshake<'_>) -> Result<Response> {
        let command = AdditionalFrame {
            data: handshake.challenge_response()?,
        }
        .to_command()?;
        let response = self.transmit(&command)?;
        if response.status().is_authentication_error() {
            return Err(Error::AuthenticationFailed("card rejected the key"));
        }
        if !response.is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(response)
    }

    /// Establish a new session with AuthenticateEV2First
    ///
    /// Any previous session is discarded first. A chip whose slot does not
    /// hold `key` answers the second frame with `91 AE`, reported as
    /// [`Error::AuthenticationFailed`].
    #[instrument(level = "debug", skip(self, key))]
    pub fn authenticate_ev2_first(&mut self, slot: KeySlot, key: &AesKey) -> Result<()> {
        self.invalidate_session();

        let command = AuthenticateEv2First { slot }.to_command()?;
        let response = self.transmit(&command)?;
        if !response.is_additional_frame() {
            warn!(status = %response.status(), "AuthenticateEV2First refused");
            return Err(Error::Status(response.status()));
        }

        let handshake = Ev2Handshake::new(key, slot, response.data(), Self::random_block())?;
        let answer = self.authenticate_part2(&handshake)?;
        let session = handshake.finish_first(answer.data())?;
        info!(%slot, ti = %hex::encode(session.ti()), "Authenticated");
        self.session = Some(session);
        Ok(())
    }

    /// Switch the active session to another key with AuthenticateEV2NonFirst
    ///
    /// The transaction identifier and command counter are kept.
    #[instrument(level = "debug", skip(self, key))]
    pub fn authenticate_ev2_non_first(&mut self, slot: KeySlot, key: &AesKey) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NoSession);
        }

        let result = self.switch_session_key(slot, key);
        if result.is_err() {
            self.invalidate_session();
        }
        result
    }

    fn switch_session_key(&mut self, slot: KeySlot, key: &AesKey) -> Result<()> {
        let command = AuthenticateEv2NonFirst { slot }.to_command()?;
        let response = self.transmit(&command)?;
        if !response.is_additional_frame() {
            return Err(Error::Status(response.status()));
        }
        let handshake = Ev2Handshake::new(key, slot, response.data(), Self::random_block())?;
        let answer = self.authenticate_part2(&handshake)?;
        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        handshake.finish_non_first(answer.data(), session)?;
        debug!(%slot, "Session switched to another key");
        Ok(())
    }

    /// Apply secure messaging, send and check the status
    fn exchange<C: NativeCommand>(&mut self, command: &C) -> Result<Response> {
        let header = command.header();
        let mut data = command.data();
        let payload = match (&self.session, C::MODE) {
            (Some(session), mode) => session.wrap_command(C::INS, &header, &data, mode),
            (None, CommMode::Plain) => Ok([header.as_slice(), data.as_slice()].concat()),
            (None, _) => Err(Error::NoSession),
        };
        data.zeroize();

        let apdu = native_command(C::INS, payload?)?;
        let response = self.transmit(&apdu)?;
        if !response.is_success() {
            warn!(
                ins = %hex::encode([C::INS]),
                status = %response.status(),
                "Command failed"
            );
            self.invalidate_session();
            return Err(Error::Status(response.status()));
        }
        Ok(response)
    }

    /// Run a native command and return its plaintext response data
    pub fn execute<C: NativeCommand>(&mut self, command: &C) -> Result<Vec<u8>> {
        let response = self.exchange(command)?;
        let Some(session) = self.session.as_mut() else {
            return Ok(response.data().to_vec());
        };
        match session.unwrap_response(&response, C::MODE) {
            Ok(data) => Ok(data),
            Err(e) => {
                self.invalidate_session();
                Err(e)
            }
        }
    }

    /// Replace the key in `slot`
    ///
    /// Changing the key the session was authenticated with ends the session.
    /// A rejected change, or an answer that fails verification, is reported
    /// as [`Error::KeyChangeRejected`].
    #[instrument(level = "debug", skip(self, old_key, new_key))]
    pub fn change_key(
        &mut self,
        slot: KeySlot,
        old_key: &AesKey,
        new_key: &AesKey,
        version: KeyVersion,
    ) -> Result<()> {
        let authenticated_slot = self.session.as_ref().ok_or(Error::NoSession)?.slot();
        let command = ChangeKey {
            slot,
            old_key,
            new_key,
            version,
            authenticated_slot,
        };

        let rejected = |e: Error| match e {
            Error::Status(status) => Error::KeyChangeRejected {
                slot,
                status: Some(status),
            },
            Error::IntegrityError => Error::KeyChangeRejected { slot, status: None },
            other => other,
        };

        if command.changes_session_key() {
            // The chip answers without a MAC and drops the session
            self.exchange(&command).map_err(rejected)?;
            self.invalidate_session();
        } else {
            self.execute(&command).map_err(rejected)?;
        }
        info!(%slot, %version, "Key changed");
        Ok(())
    }

    /// Read the version stored with a key
    pub fn get_key_version(&mut self, slot: KeySlot) -> Result<KeyVersion> {
        let data = self.execute(&GetKeyVersion { slot })?;
        match data.as_slice() {
            [version, ..] => Ok(KeyVersion(*version)),
            [] => Err(Error::InvalidData("empty key version")),
        }
    }

    /// Apply file settings
    ///
    /// SDM offsets are checked against the NDEF content written through this
    /// handle, or against the whole file when nothing was written yet.
    #[instrument(level = "debug", skip(self, settings))]
    pub fn change_file_settings(&mut self, file_no: u8, settings: &FileSettings) -> Result<()> {
        settings.validate(self.ndef_len.unwrap_or(NDEF_FILE_SIZE))?;
        let command = ChangeFileSettings {
            file_no,
            settings: settings.to_bytes()?,
        };
        self.execute(&command)?;
        info!(file_no, sdm = settings.sdm.is_some(), "File settings changed");
        Ok(())
    }

    /// Restore the factory settings of the NDEF file, disabling SDM
    pub fn reset_file_settings(&mut self) -> Result<()> {
        self.change_file_settings(NDEF_FILE_NO, &FileSettings::factory())
    }

    /// Read the settings of a file
    pub fn get_file_settings(&mut self, file_no: u8) -> Result<FileInfo> {
        let data = self.execute(&GetFileSettings { file_no })?;
        FileSettings::parse_file_info(&data)
    }

    /// Write `data` to a file starting at `offset`, in chunks
    pub fn write_file(&mut self, file_no: u8, offset: u32, data: &[u8]) -> Result<()> {
        for (i, chunk) in data.chunks(MAX_CHUNK).enumerate() {
            let command = WriteData {
                file_no,
                offset: offset + (i * MAX_CHUNK) as u32,
                data: chunk,
            };
            self.execute(&command)?;
        }
        Ok(())
    }

    /// Read `length` bytes of a file starting at `offset`, in chunks
    pub fn read_file(&mut self, file_no: u8, offset: u32, length: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            let chunk = (length - out.len()).min(MAX_CHUNK);
            let command = ReadData {
                file_no,
                offset: offset + out.len() as u32,
                length: chunk as u32,
            };
            let data = self.execute(&command)?;
            if data.len() != chunk {
                return Err(Error::InvalidData("short ReadData answer"));
            }
            out.extend_from_slice(&data);
        }
        Ok(out)
    }

    /// Write complete NDEF file content
    #[instrument(level = "debug", skip(self, content), fields(len = content.len()))]
    pub fn write_ndef(&mut self, content: &[u8]) -> Result<()> {
        if content.len() > NDEF_FILE_SIZE {
            return Err(Error::NdefTooLarge(content.len()));
        }
        self.write_file(NDEF_FILE_NO, 0, content)?;
        self.ndef_len = Some(content.len());
        Ok(())
    }

    /// Read NLEN and the NDEF message it announces
    ///
    /// The first chunk always starts at offset 0 and covers NLEN, so a chip
    /// with SDM enabled mirrors once per call.
    pub fn read_ndef(&mut self) -> Result<Vec<u8>> {
        let mut content = self.read_file(NDEF_FILE_NO, 0, MAX_CHUNK)?;
        let total = message_length(&content)? + 2;
        if total > NDEF_FILE_SIZE {
            return Err(Error::InvalidData("NLEN exceeds the NDEF file"));
        }
        if total > content.len() {
            let rest = self.read_file(NDEF_FILE_NO, MAX_CHUNK as u32, total - content.len())?;
            content.extend_from_slice(&rest);
        }
        content.truncate(total);
        Ok(content)
    }

    /// Read the NDEF file and decode its URI record
    pub fn read_uri(&mut self) -> Result<String> {
        let content = self.read_ndef()?;
        decode_uri_file(&content)
    }

    /// Read the real UID, which randomized-ID chips only reveal this way
    pub fn get_card_uid(&mut self) -> Result<Uid> {
        let data = self.execute(&GetCardUid)?;
        data.get(..UID_SIZE)
            .and_then(|uid| uid.try_into().ok())
            .ok_or(Error::InvalidData("UID must be 7 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::{SunMessage, SunTemplate, encode_uri_file};
    use crate::simulator::SimulatedCard;
    use crate::sun::test_p_and_c;
    use boltcard_apdu_core::{Bytes, MockTransport, StatusWord, TransportError};
    use hex_literal::hex;

    const UID: Uid = hex!("04958caa5c5e80");

    fn card() -> SimulatedCard {
        SimulatedCard::new(UID)
    }

    #[test]
    fn test_select_and_authenticate_factory() {
        let mut sim = card();
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        assert!(tag.is_authenticated());
        assert_eq!(tag.session().unwrap().cmd_counter(), 0);
        assert_eq!(tag.get_card_uid().unwrap(), UID);
        assert_eq!(tag.session().unwrap().cmd_counter(), 1);
    }

    #[test]
    fn test_wrong_key_is_written_card() {
        let mut sim = card();
        sim.set_key(KeySlot::Master, AesKey::new([0x11; 16]), KeyVersion(1));
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        let err = tag
            .authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap_err();
        assert!(err.is_written_card());
        assert!(!tag.is_authenticated());
    }

    #[test]
    fn test_select_failure_reports_status() {
        let mut transport = MockTransport::with_response(Bytes::from_static(&[0x6A, 0x82]));
        let mut tag = Ntag424::new(&mut transport);
        let err = tag.select_ndef_application().unwrap_err();
        assert_eq!(err.status(), Some(StatusWord::new(0x6A, 0x82)));
    }

    #[test]
    fn test_secure_command_needs_session() {
        let mut sim = card();
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        assert!(matches!(tag.get_card_uid(), Err(Error::NoSession)));
        assert!(matches!(
            tag.get_key_version(KeySlot::App1),
            Err(Error::NoSession)
        ));
    }

    #[test]
    fn test_change_application_key() {
        let mut sim = card();
        let new_key = AesKey::new([0x42; 16]);
        {
            let mut tag = Ntag424::new(&mut sim);
            tag.select_ndef_application().unwrap();
            tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
                .unwrap();
            tag.change_key(KeySlot::App1, &AesKey::FACTORY, &new_key, KeyVersion(1))
                .unwrap();
            assert!(tag.is_authenticated());
            assert_eq!(tag.get_key_version(KeySlot::App1).unwrap(), KeyVersion(1));

            tag.authenticate_ev2_non_first(KeySlot::App1, &new_key)
                .unwrap();
            assert_eq!(tag.session().unwrap().slot(), KeySlot::App1);
        }
        assert_eq!(sim.key(KeySlot::App1), &new_key);
    }

    #[test]
    fn test_change_master_key_ends_session() {
        let mut sim = card();
        let new_key = AesKey::new([0x24; 16]);
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        tag.change_key(KeySlot::Master, &AesKey::FACTORY, &new_key, KeyVersion(1))
            .unwrap();
        assert!(!tag.is_authenticated());

        assert!(
            tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
                .is_err()
        );
        tag.authenticate_ev2_first(KeySlot::Master, &new_key)
            .unwrap();
    }

    #[test]
    fn test_rejected_key_change_drops_session() {
        let mut sim = card();
        sim.inject_status(
            crate::constants::ins::CHANGE_KEY,
            Some(KeySlot::App2.number()),
            StatusWord::new(0x91, 0x1E),
        );
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        let err = tag
            .change_key(
                KeySlot::App2,
                &AesKey::FACTORY,
                &AesKey::new([0x01; 16]),
                KeyVersion(1),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::KeyChangeRejected {
                slot: KeySlot::App2,
                status: Some(_)
            }
        ));
        assert!(!tag.is_authenticated());
    }

    #[test]
    fn test_transport_failure_drops_session() {
        let mut sim = card();
        sim.inject_disconnect(crate::constants::ins::GET_KEY_VERSION, None);
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        let err = tag.get_key_version(KeySlot::Master).unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, Error::Transport(TransportError::TagLost)));
        assert!(!tag.is_authenticated());
    }

    #[test]
    fn test_ndef_write_and_read_back() {
        let mut sim = card();
        let content = encode_uri_file(&format!("https://example.com/{}", "a".repeat(150))).unwrap();
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.write_ndef(&content).unwrap();
        assert_eq!(tag.read_ndef().unwrap(), content);
        assert!(tag.read_uri().unwrap().ends_with(&"a".repeat(150)));
        assert!(tag.write_ndef(&[0u8; 300]).is_err());
    }

    #[test]
    fn test_file_settings_round_trip_and_sun() {
        let mut sim = card();
        let template = SunTemplate::new("lnurlw://card.example.com/ln");
        let settings = FileSettings::boltcard(
            template.picc_data_offset().unwrap(),
            template.mac_offset().unwrap(),
        );

        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        tag.write_ndef(&template.to_file().unwrap()).unwrap();
        tag.change_file_settings(NDEF_FILE_NO, &settings).unwrap();
        assert_eq!(
            tag.get_file_settings(NDEF_FILE_NO).unwrap().settings,
            settings
        );

        tag.select_ndef_application().unwrap();
        let url = tag.read_uri().unwrap();
        let message = SunMessage::from_url(&url).unwrap();
        let verified = test_p_and_c(
            &message.p,
            &message.c,
            &hex::encode(UID),
            &AesKey::FACTORY,
            &AesKey::FACTORY,
        )
        .unwrap();
        assert_eq!(verified.counter, 1);
    }

    #[test]
    fn test_change_file_settings_checks_written_record() {
        let mut sim = card();
        let mut tag = Ntag424::new(&mut sim);
        tag.select_ndef_application().unwrap();
        tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
            .unwrap();
        tag.write_ndef(&encode_uri_file("lnurlw://x").unwrap()).unwrap();
        assert!(matches!(
            tag.change_file_settings(NDEF_FILE_NO, &FileSettings::boltcard(20, 60)),
            Err(Error::InvalidOffset { .. })
        ));
        assert!(tag.is_authenticated());
    }
}
