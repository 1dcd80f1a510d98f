//! Key material exchanged with the card registry

use boltcard_ntag424::{AesKey, KeySlot, KeyVersion};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The five application keys of a Bolt Card
///
/// `k1` encrypts the mirrored UID and counter (`p`), `k2` keys the SUN MAC
/// (`c`). `k0` guards every configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoltcardKeySet {
    /// Application master key
    pub k0: AesKey,
    /// SDM meta read key
    pub k1: AesKey,
    /// SDM file read key
    pub k2: AesKey,
    /// Spare key
    pub k3: AesKey,
    /// Spare key
    pub k4: AesKey,
}

impl BoltcardKeySet {
    /// Five independent random keys
    pub fn random() -> Self {
        Self {
            k0: AesKey::random(),
            k1: AesKey::random(),
            k2: AesKey::random(),
            k3: AesKey::random(),
            k4: AesKey::random(),
        }
    }

    /// The same key in every slot
    pub fn uniform(key: &AesKey) -> Self {
        Self {
            k0: key.clone(),
            k1: key.clone(),
            k2: key.clone(),
            k3: key.clone(),
            k4: key.clone(),
        }
    }

    /// Keys of a factory chip
    pub fn factory() -> Self {
        Self::uniform(&AesKey::FACTORY)
    }

    /// Key for a slot
    pub const fn key(&self, slot: KeySlot) -> &AesKey {
        match slot {
            KeySlot::Master => &self.k0,
            KeySlot::App1 => &self.k1,
            KeySlot::App2 => &self.k2,
            KeySlot::App3 => &self.k3,
            KeySlot::App4 => &self.k4,
        }
    }

    /// Backup document that lets another device wipe the card
    pub fn to_wipe_backup(&self) -> WipeBackup {
        WipeBackup {
            action: WipeAction::Wipe,
            keys: self.clone(),
            version: WipeBackup::VERSION,
        }
    }
}

/// Input of the write flow, as issued by the card registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// LNURL-withdraw base URL, without the `p` and `c` parameters
    pub lnurlw_base: String,
    /// Keys to install
    #[serde(flatten)]
    pub keys: BoltcardKeySet,
}

/// Result of a successful write flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedCard {
    /// Card UID as lowercase hex, to be registered with the server
    pub uid: String,
    /// Keys now on the card
    #[serde(flatten)]
    pub keys: BoltcardKeySet,
    /// Version written with the master key
    pub version: KeyVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum WipeAction {
    #[serde(rename = "wipe")]
    Wipe,
}

/// Key backup in the Boltcard wipe format
///
/// `{"action":"wipe","k0":"..","k1":"..","k2":"..","k3":"..","k4":"..","version":1}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeBackup {
    action: WipeAction,
    #[serde(flatten)]
    keys: BoltcardKeySet,
    version: u8,
}

impl WipeBackup {
    /// Format version understood by this crate
    pub const VERSION: u8 = 1;

    /// Keys needed to wipe the card
    pub const fn keys(&self) -> &BoltcardKeySet {
        &self.keys
    }

    /// Take the keys out of the backup
    pub fn into_keys(self) -> BoltcardKeySet {
        self.keys
    }

    /// Parse and check a backup document
    pub fn from_json(json: &str) -> Result<Self> {
        let backup: Self = serde_json::from_str(json)?;
        if backup.version != Self::VERSION {
            return Err(Error::InvalidBackup("unsupported version"));
        }
        Ok(backup)
    }

    /// Render the backup document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BoltcardKeySet {
        BoltcardKeySet {
            k0: AesKey::new([0x00; 16]),
            k1: AesKey::new([0x11; 16]),
            k2: AesKey::new([0x22; 16]),
            k3: AesKey::new([0x33; 16]),
            k4: AesKey::new([0x44; 16]),
        }
    }

    #[test]
    fn test_key_lookup_by_slot() {
        let keys = sample();
        for slot in KeySlot::ALL {
            assert_eq!(keys.key(slot).as_bytes(), &[slot.number() * 0x11; 16]);
        }
        assert!(BoltcardKeySet::factory().k3.is_factory());
        assert_ne!(BoltcardKeySet::random().k1, BoltcardKeySet::random().k1);
    }

    #[test]
    fn test_wipe_backup_format() {
        let json = sample().to_wipe_backup().to_json().unwrap();
        assert_eq!(
            json,
            format!(
                r#"{{"action":"wipe","k0":"{}","k1":"{}","k2":"{}","k3":"{}","k4":"{}","version":1}}"#,
                "00".repeat(16),
                "11".repeat(16),
                "22".repeat(16),
                "33".repeat(16),
                "44".repeat(16),
            )
        );
        let back = WipeBackup::from_json(&json).unwrap();
        assert_eq!(back.into_keys(), sample());
    }

    #[test]
    fn test_wipe_backup_rejects_other_documents() {
        let json = sample().to_wipe_backup().to_json().unwrap();
        let other_action = json.replace("\"wipe\"", "\"write\"");
        assert!(matches!(
            WipeBackup::from_json(&other_action),
            Err(Error::Json(_))
        ));
        let other_version = json.replace("\"version\":1", "\"version\":2");
        assert!(matches!(
            WipeBackup::from_json(&other_version),
            Err(Error::InvalidBackup(_))
        ));
        let short_key = json.replace(&"11".repeat(16), "1111");
        assert!(WipeBackup::from_json(&short_key).is_err());
    }

    #[test]
    fn test_card_details_from_registry() {
        let json = format!(
            r#"{{"lnurlw_base":"lnurlw://card.example.com/ln","k0":"{k}","k1":"{k}","k2":"{k}","k3":"{k}","k4":"{k}"}}"#,
            k = "ab".repeat(16)
        );
        let details: CardDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(details.lnurlw_base, "lnurlw://card.example.com/ln");
        assert_eq!(details.keys, BoltcardKeySet::uniform(&AesKey::new([0xAB; 16])));
    }
}
