//! Key slots, key versions and AES key material

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// One of the five application key slots of the NDEF application
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeySlot {
    /// Application master key, guards configuration and key changes
    #[display("key 0 (master)")]
    Master = 0x00,
    /// SDM meta read key, encrypts the mirrored UID and counter
    #[display("key 1")]
    App1 = 0x01,
    /// SDM file read key, keys the SUN MAC
    #[display("key 2")]
    App2 = 0x02,
    /// Spare application key
    #[display("key 3")]
    App3 = 0x03,
    /// Spare application key
    #[display("key 4")]
    App4 = 0x04,
}

impl KeySlot {
    /// All slots in ascending order
    pub const ALL: [Self; 5] = [Self::Master, Self::App1, Self::App2, Self::App3, Self::App4];

    /// Non-master slots in the order they must be rotated (before the master key)
    pub const APPLICATION: [Self; 4] = [Self::App1, Self::App2, Self::App3, Self::App4];

    /// Key number as sent on the wire
    pub const fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for KeySlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Master),
            0x01 => Ok(Self::App1),
            0x02 => Ok(Self::App2),
            0x03 => Ok(Self::App3),
            0x04 => Ok(Self::App4),
            _ => Err(Error::InvalidData("key number out of range")),
        }
    }
}

/// Version byte stored alongside a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyVersion(pub u8);

impl KeyVersion {
    /// Version of every key on a factory chip
    pub const FACTORY: Self = Self(0x00);

    /// The version that follows this one, wrapping at 0xFF
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// A 16-byte AES-128 key
///
/// The bytes are wiped on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey([u8; 16]);

impl AesKey {
    /// The all-zero key every slot holds on a factory chip
    pub const FACTORY: Self = Self([0u8; 16]);

    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice, checking its length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Parse a key from 32 hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex_str.trim())?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// Generate a fresh random key
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex rendering, the wire format used by the card registry
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether this is the factory default key
    pub fn is_factory(&self) -> bool {
        self == &Self::FACTORY
    }
}

impl AsRef<[u8]> for AesKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for AesKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for AesKey {}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

impl FromStr for AesKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for AesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AesKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_version_wraps() {
        assert_eq!(KeyVersion(0x00).next(), KeyVersion(0x01));
        assert_eq!(KeyVersion(0xFE).next(), KeyVersion(0xFF));
        assert_eq!(KeyVersion(0xFF).next(), KeyVersion(0x00));
        assert_eq!(KeyVersion(0x0A).to_string(), "0a");
    }

    #[test]
    fn test_key_slot_numbers() {
        for (n, slot) in KeySlot::ALL.iter().enumerate() {
            assert_eq!(slot.number() as usize, n);
            assert_eq!(KeySlot::try_from(n as u8).unwrap(), *slot);
        }
        assert!(KeySlot::try_from(0x05).is_err());
        assert!(!KeySlot::APPLICATION.contains(&KeySlot::Master));
    }

    #[test]
    fn test_aes_key_hex() {
        let key = AesKey::from_hex("1B53525189F66E2E88A3996AE5A87CF3").unwrap();
        assert_eq!(key.to_hex(), "1b53525189f66e2e88a3996ae5a87cf3");
        assert_eq!("1b53525189f66e2e88a3996ae5a87cf3".parse::<AesKey>().unwrap(), key);

        assert!(matches!(
            AesKey::from_hex("00112233"),
            Err(Error::InvalidKeyLength(4))
        ));
        assert!(matches!(AesKey::from_hex("zz"), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn test_aes_key_factory_and_random() {
        assert!(AesKey::FACTORY.is_factory());
        let a = AesKey::random();
        let b = AesKey::random();
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), "AesKey(..)");
    }

    #[test]
    fn test_aes_key_serde() {
        let key = AesKey::new([0xAB; 16]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(16)));
        let back: AesKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<AesKey>("\"abcd\"").is_err());
    }
}
