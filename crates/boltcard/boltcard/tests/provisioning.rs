use std::sync::{Arc, Mutex};

use boltcard::ntag424::constants::ins;
use boltcard::ntag424::simulator::SimulatedCard;
use boltcard::ntag424::{
    AesKey, Error as CardError, FileSettings, KeySlot, KeyVersion, Ntag424, SunMessage, Uid,
    ensure_fresh, test_p_and_c,
};
use boltcard::{
    BoltcardKeySet, CardDetails, KeyVersionPolicy, Provisioner, ProvisioningConfig, Stage,
};
use boltcard_apdu_core::StatusWord;
use hex_literal::hex;

const UID: Uid = hex!("04958caa5c5e80");
const BASE: &str = "lnurlw://card.example.com/ln";

fn details() -> CardDetails {
    CardDetails {
        lnurlw_base: BASE.to_owned(),
        keys: BoltcardKeySet::random(),
    }
}

fn observed(sim: &mut SimulatedCard) -> (Provisioner<&mut SimulatedCard>, Arc<Mutex<Vec<Stage>>>) {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let provisioner = Provisioner::new(sim, ProvisioningConfig::default())
        .with_observer(move |stage| sink.lock().unwrap().push(stage));
    (provisioner, stages)
}

fn verify_tap(sim: &mut SimulatedCard, keys: &BoltcardKeySet) -> u32 {
    let url = sim.tap().unwrap();
    assert!(url.starts_with(BASE));
    let message = SunMessage::from_url(&url).unwrap();
    test_p_and_c(&message.p, &message.c, &hex::encode(UID), &keys.k1, &keys.k2)
        .unwrap()
        .counter
}

#[test]
fn write_verify_and_wipe() {
    let mut sim = SimulatedCard::new(UID);
    let details = details();

    let (mut provisioner, stages) = observed(&mut sim);
    let card = provisioner.write_card(&details).unwrap();
    assert_eq!(card.uid, "04958caa5c5e80");
    assert_eq!(card.version, KeyVersion(1));
    assert_eq!(card.keys, details.keys);
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::Idle,
            Stage::Authenticating,
            Stage::WritingNdef,
            Stage::ConfiguringSdm,
            Stage::InstallingKeys,
            Stage::VerifyingSun,
            Stage::Done,
        ]
    );
    drop(provisioner);

    for slot in KeySlot::ALL {
        assert_eq!(sim.key(slot), details.keys.key(slot));
        assert_eq!(sim.key_version(slot), KeyVersion(1));
    }
    // The self-check consumed the first read
    assert_eq!(verify_tap(&mut sim, &details.keys), 2);

    let (mut provisioner, stages) = observed(&mut sim);
    provisioner.wipe_card(&details.keys).unwrap();
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::Idle,
            Stage::Authenticating,
            Stage::ConfiguringSdm,
            Stage::InstallingKeys,
            Stage::WritingNdef,
            Stage::Done,
        ]
    );
    drop(provisioner);

    assert_eq!(sim.file_settings(), &FileSettings::factory());
    assert_eq!(sim.key_version(KeySlot::Master), KeyVersion(2));

    let mut tag = Ntag424::new(&mut sim);
    tag.select_ndef_application().unwrap();
    let err = tag
        .authenticate_ev2_first(KeySlot::Master, &details.keys.k0)
        .unwrap_err();
    assert!(err.is_written_card());
    tag.authenticate_ev2_first(KeySlot::Master, &AesKey::FACTORY)
        .unwrap();
    assert_eq!(tag.read_uri().unwrap(), "");
}

#[test]
fn failure_before_master_change_can_be_wiped_with_factory_master() {
    let mut sim = SimulatedCard::new(UID);
    sim.inject_status(
        ins::CHANGE_KEY,
        Some(KeySlot::Master.number()),
        StatusWord::new(0x91, 0x1E),
    );
    let details = details();

    let (mut provisioner, stages) = observed(&mut sim);
    let err = provisioner.write_card(&details).unwrap_err();
    assert_eq!(err.stage, Stage::InstallingKeys);
    assert_eq!(err.last_completed, Some(Stage::ConfiguringSdm));
    assert!(matches!(
        err.source,
        CardError::KeyChangeRejected {
            slot: KeySlot::Master,
            ..
        }
    ));
    assert_eq!(stages.lock().unwrap().last(), Some(&Stage::Failed));
    drop(provisioner);

    assert!(sim.key(KeySlot::Master).is_factory());
    assert_eq!(sim.key(KeySlot::App4), &details.keys.k4);

    // Application keys were rotated, the master key was not
    let current = BoltcardKeySet {
        k0: AesKey::FACTORY,
        ..details.keys.clone()
    };
    let mut provisioner = Provisioner::new(&mut sim, ProvisioningConfig::default());
    provisioner.wipe_card(&current).unwrap();
    assert_eq!(provisioner.stage(), Stage::Done);
    drop(provisioner);

    for slot in KeySlot::ALL {
        assert!(sim.key(slot).is_factory());
    }
    assert_eq!(sim.file_settings(), &FileSettings::factory());
}

#[test]
fn written_card_is_reported_at_authentication() {
    let mut sim = SimulatedCard::new(UID);
    sim.set_key(KeySlot::Master, AesKey::random(), KeyVersion(1));

    let mut provisioner = Provisioner::new(&mut sim, ProvisioningConfig::default());
    let err = provisioner.write_card(&details()).unwrap_err();
    assert_eq!(err.stage, Stage::Authenticating);
    assert_eq!(err.last_completed, None);
    assert!(err.is_written_card());
    drop(provisioner);

    assert_eq!(sim.file_settings(), &FileSettings::factory());
}

#[test]
fn wipe_with_wrong_keys_fails_without_changes() {
    let mut sim = SimulatedCard::new(UID);
    let details = details();
    Provisioner::new(&mut sim, ProvisioningConfig::default())
        .write_card(&details)
        .unwrap();

    let mut provisioner = Provisioner::new(&mut sim, ProvisioningConfig::default());
    let err = provisioner.wipe_card(&BoltcardKeySet::random()).unwrap_err();
    assert_eq!(err.stage, Stage::Authenticating);
    drop(provisioner);

    assert_eq!(sim.key(KeySlot::Master), &details.keys.k0);
    assert!(sim.file_settings().sdm.is_some());
}

#[test]
fn lost_card_during_key_rotation_is_a_transport_failure() {
    let mut sim = SimulatedCard::new(UID);
    sim.inject_disconnect(ins::CHANGE_KEY, Some(KeySlot::App3.number()));

    let mut provisioner = Provisioner::new(&mut sim, ProvisioningConfig::default());
    let err = provisioner.write_card(&details()).unwrap_err();
    assert_eq!(err.stage, Stage::InstallingKeys);
    assert!(err.is_transport());
    assert!(!provisioner.into_card().is_authenticated());
}

#[test]
fn read_counter_increases_on_every_tap() {
    let mut sim = SimulatedCard::new(UID);
    let details = details();
    Provisioner::new(&mut sim, ProvisioningConfig::default())
        .write_card(&details)
        .unwrap();

    let mut last = None;
    for _ in 0..5 {
        let counter = verify_tap(&mut sim, &details.keys);
        ensure_fresh(last, counter).unwrap();
        last = Some(counter);
    }
    assert_eq!(last, Some(6));
    assert!(matches!(
        ensure_fresh(last, 6),
        Err(CardError::CounterNotFresh {
            previous: 6,
            current: 6
        })
    ));
}

// Wallet-compatible versions: 01 on write, back to 00 on wipe
#[test]
fn fixed_key_versions() {
    let mut sim = SimulatedCard::new(UID);
    let details = details();
    let config = ProvisioningConfig::default()
        .with_key_versions(KeyVersionPolicy::Fixed(KeyVersion(1)))
        .with_verify_after_write(false);

    let card = Provisioner::new(&mut sim, config.clone())
        .write_card(&details)
        .unwrap();
    assert_eq!(card.version, KeyVersion(1));

    Provisioner::new(
        &mut sim,
        config.with_key_versions(KeyVersionPolicy::Fixed(KeyVersion::FACTORY)),
    )
    .wipe_card(&details.keys)
    .unwrap();
    for slot in KeySlot::ALL {
        assert_eq!(sim.key_version(slot), KeyVersion::FACTORY);
    }
}
