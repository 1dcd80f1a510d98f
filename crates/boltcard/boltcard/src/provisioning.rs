//! Write and wipe flows
//!
//! The [`Provisioner`] drives an [`Ntag424`] through a fixed sequence of
//! stages and reports every transition to an optional observer. It never
//! retries: the first failure ends the flow with a [`ProvisionError`] naming
//! the stage that failed and the last one that completed.

use std::fmt;

use boltcard_apdu_core::CardTransport;
use boltcard_ntag424::constants::NDEF_FILE_NO;
use boltcard_ntag424::ndef::encode_uri_file;
use boltcard_ntag424::{
    FileSettings, KeySlot, KeyVersion, Ntag424, SunMessage, SunTemplate, Uid, test_p_and_c,
};
use derive_more::Display;
use tracing::{debug, info, warn};

use crate::config::{KeyVersionPolicy, ProvisioningConfig};
use crate::error::ProvisionError;
use crate::keyset::{BoltcardKeySet, CardDetails, ProvisionedCard};

/// Step of a write or wipe flow
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// No flow running
    Idle,
    /// Selecting the NDEF application and authenticating with key 0
    Authenticating,
    /// Writing the NDEF file
    WritingNdef,
    /// Enabling or disabling SDM
    ConfiguringSdm,
    /// Rotating keys 1 to 4, then key 0
    InstallingKeys,
    /// Reading the card back and checking the SUN message
    VerifyingSun,
    /// The flow finished
    Done,
    /// The flow stopped on an error
    Failed,
}

/// Callback receiving every stage transition
pub type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;

/// Slots in the order they are rotated; key 0 must come last
const ROTATION_ORDER: [KeySlot; 5] = [
    KeySlot::App1,
    KeySlot::App2,
    KeySlot::App3,
    KeySlot::App4,
    KeySlot::Master,
];

/// Sequencer for the Bolt Card write and wipe flows
pub struct Provisioner<T: CardTransport> {
    card: Ntag424<T>,
    config: ProvisioningConfig,
    observer: Option<StageObserver>,
    stage: Stage,
    last_completed: Option<Stage>,
}

impl<T: CardTransport> fmt::Debug for Provisioner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("card", &self.card)
            .field("config", &self.config)
            .field("stage", &self.stage)
            .field("last_completed", &self.last_completed)
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> Provisioner<T> {
    /// Wrap a transport connected to the card
    pub fn new(transport: T, config: ProvisioningConfig) -> Self {
        let mut card = Ntag424::new(transport);
        card.set_timeout(config.timeout());
        Self {
            card,
            config,
            observer: None,
            stage: Stage::Idle,
            last_completed: None,
        }
    }

    /// Report stage transitions to `observer`
    pub fn with_observer(mut self, observer: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Current stage
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Last stage that completed in the current or previous flow
    pub const fn last_completed(&self) -> Option<Stage> {
        self.last_completed
    }

    /// Configuration in use
    pub const fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Give back the card handle
    pub fn into_card(self) -> Ntag424<T> {
        self.card
    }

    fn enter(&mut self, stage: Stage) {
        info!(%stage, "Provisioning stage");
        self.stage = stage;
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    fn start(&mut self) {
        self.last_completed = None;
        self.enter(Stage::Idle);
    }

    fn run_stage<R>(
        &mut self,
        stage: Stage,
        step: impl FnOnce(&mut Ntag424<T>, &ProvisioningConfig) -> boltcard_ntag424::Result<R>,
    ) -> Result<R, ProvisionError> {
        self.enter(stage);
        match step(&mut self.card, &self.config) {
            Ok(value) => {
                self.last_completed = Some(stage);
                Ok(value)
            }
            Err(source) => {
                self.card.invalidate_session();
                warn!(%stage, error = %source, "Provisioning failed");
                self.enter(Stage::Failed);
                Err(ProvisionError {
                    stage,
                    last_completed: self.last_completed,
                    source,
                })
            }
        }
    }

    /// Personalize a factory card
    ///
    /// Writes `<lnurlw_base>?p=…&c=…`, enables SDM with the placeholders as
    /// mirror positions, installs k1 to k4 and then k0, and finally reads the
    /// card back without a session to obtain a live SUN message. The UID comes
    /// from GetCardUID under the new k0.
    pub fn write_card(&mut self, details: &CardDetails) -> Result<ProvisionedCard, ProvisionError> {
        self.start();
        let template = SunTemplate::new(&details.lnurlw_base);
        let factory_keys = BoltcardKeySet::uniform(&self.config.factory_key);

        self.run_stage(Stage::Authenticating, |card, config| {
            card.select_ndef_application()?;
            card.authenticate_ev2_first(KeySlot::Master, &config.factory_key)
        })?;

        self.run_stage(Stage::WritingNdef, |card, _| {
            card.write_ndef(&template.to_file()?)
        })?;

        self.run_stage(Stage::ConfiguringSdm, |card, _| {
            let settings =
                FileSettings::boltcard(template.picc_data_offset()?, template.mac_offset()?);
            card.change_file_settings(NDEF_FILE_NO, &settings)
        })?;

        let version = self.run_stage(Stage::InstallingKeys, |card, config| {
            install_keys(card, config.key_versions, &factory_keys, &details.keys)
        })?;

        let uid = self.run_stage(Stage::VerifyingSun, |card, config| {
            verify_written(card, details, config.verify_after_write)
        })?;

        self.enter(Stage::Done);
        Ok(ProvisionedCard {
            uid: hex::encode(uid),
            keys: details.keys.clone(),
            version,
        })
    }

    /// Return a written card to its factory state
    ///
    /// `keys` must be the keys currently on the card. SDM is disabled first,
    /// then every key is set back to the factory key and the NDEF file is
    /// left holding an empty URI record.
    pub fn wipe_card(&mut self, keys: &BoltcardKeySet) -> Result<(), ProvisionError> {
        self.start();
        let factory_keys = BoltcardKeySet::uniform(&self.config.factory_key);

        self.run_stage(Stage::Authenticating, |card, _| {
            card.select_ndef_application()?;
            card.authenticate_ev2_first(KeySlot::Master, &keys.k0)
        })?;

        self.run_stage(Stage::ConfiguringSdm, |card, _| card.reset_file_settings())?;

        self.run_stage(Stage::InstallingKeys, |card, config| {
            install_keys(card, config.key_versions, keys, &factory_keys)
        })?;

        // Factory settings allow a free write, so no session is needed
        self.run_stage(Stage::WritingNdef, |card, _| {
            card.select_ndef_application()?;
            card.write_ndef(&encode_uri_file("")?)
        })?;

        self.enter(Stage::Done);
        Ok(())
    }
}

/// Rotate every slot from `old` to `new`, key 0 last
///
/// Returns the version written with key 0.
fn install_keys<T: CardTransport>(
    card: &mut Ntag424<T>,
    policy: KeyVersionPolicy,
    old: &BoltcardKeySet,
    new: &BoltcardKeySet,
) -> boltcard_ntag424::Result<KeyVersion> {
    let mut written = KeyVersion::FACTORY;
    for slot in ROTATION_ORDER {
        let version = match policy {
            KeyVersionPolicy::Increment => card.get_key_version(slot)?.next(),
            KeyVersionPolicy::Fixed(version) => version,
        };
        card.change_key(slot, old.key(slot), new.key(slot), version)?;
        written = version;
    }
    Ok(written)
}

/// Read the live SUN message, re-authenticate with the new k0 and fetch the UID
fn verify_written<T: CardTransport>(
    card: &mut Ntag424<T>,
    details: &CardDetails,
    check_sun: bool,
) -> boltcard_ntag424::Result<Uid> {
    card.select_ndef_application()?;
    let url = card.read_uri()?;

    card.authenticate_ev2_first(KeySlot::Master, &details.keys.k0)?;
    let uid = card.get_card_uid()?;
    card.invalidate_session();

    if check_sun {
        let message = SunMessage::from_url(&url)?;
        let verified = test_p_and_c(
            &message.p,
            &message.c,
            &hex::encode(uid),
            &details.keys.k1,
            &details.keys.k2,
        )?;
        debug!(counter = verified.counter, "SUN self-check passed");
    }
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltcard_apdu_core::{Bytes, MockTransport};

    #[test]
    fn test_rotation_order_ends_with_master() {
        assert_eq!(ROTATION_ORDER.last(), Some(&KeySlot::Master));
        assert_eq!(&ROTATION_ORDER[..4], &KeySlot::APPLICATION);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::InstallingKeys.to_string(), "InstallingKeys");
    }

    #[test]
    fn test_select_failure_is_reported_at_authenticating() {
        let transport = MockTransport::with_response(Bytes::from_static(&[0x6A, 0x82]));
        let mut provisioner = Provisioner::new(transport, ProvisioningConfig::default());
        let details = CardDetails {
            lnurlw_base: "lnurlw://card.example.com/ln".into(),
            keys: BoltcardKeySet::factory(),
        };
        let err = provisioner.write_card(&details).unwrap_err();
        assert_eq!(err.stage, Stage::Authenticating);
        assert_eq!(err.last_completed, None);
        assert!(!err.is_written_card());
        assert_eq!(provisioner.stage(), Stage::Failed);
    }
}
