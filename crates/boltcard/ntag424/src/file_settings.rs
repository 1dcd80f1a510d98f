//! File settings of the NDEF file, including Secure Dynamic Messaging (SDM)
//!
//! Access conditions are 4-bit values: `0x0..=0x4` name a key slot, `0xE`
//! grants free access and `0xF` denies access.

use crate::constants::{PICC_DATA_HEX_LEN, SDM_MAC_HEX_LEN};
use crate::keys::KeySlot;
use crate::secure_channel::CommMode;
use crate::{Error, Result};

/// Access condition for one operation on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCondition {
    /// Requires authentication with the given key
    Key(KeySlot),
    /// Always allowed
    Free,
    /// Never allowed
    Never,
}

impl AccessCondition {
    /// 4-bit encoding
    pub const fn nibble(self) -> u8 {
        match self {
            Self::Key(slot) => slot.number(),
            Self::Free => 0x0E,
            Self::Never => 0x0F,
        }
    }

    /// Decode a 4-bit access condition
    pub fn from_nibble(nibble: u8) -> Result<Self> {
        match nibble & 0x0F {
            0x0E => Ok(Self::Free),
            0x0F => Ok(Self::Never),
            n => KeySlot::try_from(n).map(Self::Key),
        }
    }
}

/// Access rights of a file, as two bytes `RW|Change` and `Read|Write`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    /// ReadData
    pub read: AccessCondition,
    /// WriteData
    pub write: AccessCondition,
    /// Read and write
    pub read_write: AccessCondition,
    /// ChangeFileSettings
    pub change: AccessCondition,
}

impl AccessRights {
    /// Factory rights of the NDEF file: free read and write, settings guarded by the master key
    pub const FACTORY: Self = Self {
        read: AccessCondition::Free,
        write: AccessCondition::Free,
        read_write: AccessCondition::Free,
        change: AccessCondition::Key(KeySlot::Master),
    };

    /// Bolt Card rights: free read, everything else guarded by the master key
    pub const BOLTCARD: Self = Self {
        read: AccessCondition::Free,
        write: AccessCondition::Key(KeySlot::Master),
        read_write: AccessCondition::Key(KeySlot::Master),
        change: AccessCondition::Key(KeySlot::Master),
    };

    /// Wire encoding
    pub const fn to_bytes(&self) -> [u8; 2] {
        [
            (self.read_write.nibble() << 4) | self.change.nibble(),
            (self.read.nibble() << 4) | self.write.nibble(),
        ]
    }

    /// Decode from the wire encoding
    pub fn from_bytes(bytes: [u8; 2]) -> Result<Self> {
        Ok(Self {
            read_write: AccessCondition::from_nibble(bytes[0] >> 4)?,
            change: AccessCondition::from_nibble(bytes[0])?,
            read: AccessCondition::from_nibble(bytes[1] >> 4)?,
            write: AccessCondition::from_nibble(bytes[1])?,
        })
    }
}

/// SDMOptions bit field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SdmOptions(pub u8);

impl SdmOptions {
    /// Mirror the UID
    pub const UID_MIRROR: u8 = 0x80;
    /// Mirror the SDM read counter
    pub const READ_COUNTER_MIRROR: u8 = 0x40;
    /// Enforce a read counter limit
    pub const READ_COUNTER_LIMIT: u8 = 0x20;
    /// Encrypt part of the file data
    pub const ENC_FILE_DATA: u8 = 0x10;
    /// Mirror as ASCII hex
    pub const ASCII_ENCODING: u8 = 0x01;

    /// UID and counter mirrored as ASCII
    pub const BOLTCARD: Self =
        Self(Self::UID_MIRROR | Self::READ_COUNTER_MIRROR | Self::ASCII_ENCODING);

    /// Whether a flag is set
    pub const fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// SDM access rights, as two bytes `RFU|CtrRet` and `MetaRead|FileRead`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdmAccessRights {
    /// Key that encrypts the mirrored PICC data, or `Free` for plain mirroring
    pub meta_read: AccessCondition,
    /// Key the SDM MAC is derived from
    pub file_read: AccessCondition,
    /// Key guarding GetFileCounters
    pub counter_read: AccessCondition,
}

impl SdmAccessRights {
    /// Wire encoding
    pub const fn to_bytes(&self) -> [u8; 2] {
        [
            0xF0 | self.counter_read.nibble(),
            (self.meta_read.nibble() << 4) | self.file_read.nibble(),
        ]
    }

    /// Decode from the wire encoding
    pub fn from_bytes(bytes: [u8; 2]) -> Result<Self> {
        Ok(Self {
            counter_read: AccessCondition::from_nibble(bytes[0])?,
            meta_read: AccessCondition::from_nibble(bytes[1] >> 4)?,
            file_read: AccessCondition::from_nibble(bytes[1])?,
        })
    }
}

/// Secure Dynamic Messaging configuration of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdmSettings {
    /// What gets mirrored and how
    pub options: SdmOptions,
    /// Keys used by the mirroring engine
    pub access: SdmAccessRights,
    /// Plain UID mirror position, when meta read is free
    pub uid_offset: Option<u32>,
    /// Plain counter mirror position, when meta read is free
    pub read_counter_offset: Option<u32>,
    /// Encrypted PICC data position, when meta read uses a key
    pub picc_data_offset: Option<u32>,
    /// Start of the data covered by the SDM MAC
    pub mac_input_offset: Option<u32>,
    /// SDM MAC position
    pub mac_offset: Option<u32>,
}

/// Settings of a standard data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSettings {
    /// Communication mode for data access
    pub comm_mode: CommMode,
    /// Access rights
    pub access: AccessRights,
    /// SDM configuration, `None` disables SDM
    pub sdm: Option<SdmSettings>,
}

/// Result of GetFileSettings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// File type, `0x00` for standard data files
    pub file_type: u8,
    /// Allocated file size
    pub file_size: u32,
    /// Current settings
    pub settings: FileSettings,
}

const FILE_OPTION_SDM: u8 = 0x40;

fn put_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

fn require(offset: Option<u32>) -> Result<u32> {
    offset.ok_or(Error::InvalidData("SDM offset missing for the configured options"))
}

impl FileSettings {
    /// Bolt Card profile: encrypted UID and counter at `picc_data_offset`,
    /// MAC over an empty input at `mac_offset`
    pub const fn boltcard(picc_data_offset: u32, mac_offset: u32) -> Self {
        Self {
            comm_mode: CommMode::Plain,
            access: AccessRights::BOLTCARD,
            sdm: Some(SdmSettings {
                options: SdmOptions::BOLTCARD,
                access: SdmAccessRights {
                    meta_read: AccessCondition::Key(KeySlot::App1),
                    file_read: AccessCondition::Key(KeySlot::App2),
                    counter_read: AccessCondition::Never,
                },
                uid_offset: None,
                read_counter_offset: None,
                picc_data_offset: Some(picc_data_offset),
                mac_input_offset: Some(mac_offset),
                mac_offset: Some(mac_offset),
            }),
        }
    }

    /// Factory settings: SDM off, plain communication, free read and write
    pub const fn factory() -> Self {
        Self {
            comm_mode: CommMode::Plain,
            access: AccessRights::FACTORY,
            sdm: None,
        }
    }

    const fn file_option(&self) -> u8 {
        let mode = match self.comm_mode {
            CommMode::Plain => 0x00,
            CommMode::Mac => 0x01,
            CommMode::Full => 0x03,
        };
        if self.sdm.is_some() {
            mode | FILE_OPTION_SDM
        } else {
            mode
        }
    }

    /// Data field of ChangeFileSettings
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        out.push(self.file_option());
        out.extend_from_slice(&self.access.to_bytes());

        let Some(sdm) = &self.sdm else {
            return Ok(out);
        };
        if sdm.options.has(SdmOptions::READ_COUNTER_LIMIT)
            || sdm.options.has(SdmOptions::ENC_FILE_DATA)
        {
            return Err(Error::InvalidData("unsupported SDM option"));
        }

        out.push(sdm.options.0);
        out.extend_from_slice(&sdm.access.to_bytes());
        match sdm.access.meta_read {
            AccessCondition::Free => {
                if sdm.options.has(SdmOptions::UID_MIRROR) {
                    put_u24(&mut out, require(sdm.uid_offset)?);
                }
                if sdm.options.has(SdmOptions::READ_COUNTER_MIRROR) {
                    put_u24(&mut out, require(sdm.read_counter_offset)?);
                }
            }
            AccessCondition::Key(_) => put_u24(&mut out, require(sdm.picc_data_offset)?),
            AccessCondition::Never => {}
        }
        if sdm.access.file_read != AccessCondition::Never {
            put_u24(&mut out, require(sdm.mac_input_offset)?);
            put_u24(&mut out, require(sdm.mac_offset)?);
        }
        Ok(out)
    }

    /// Parse the answer of GetFileSettings
    pub fn parse_file_info(data: &[u8]) -> Result<FileInfo> {
        let mut reader = Reader(data);
        let file_type = reader.u8()?;
        let file_option = reader.u8()?;
        let access = AccessRights::from_bytes([reader.u8()?, reader.u8()?])?;
        let file_size = reader.u24()?;

        let comm_mode = match file_option & 0x03 {
            0x00 | 0x02 => CommMode::Plain,
            0x01 => CommMode::Mac,
            _ => CommMode::Full,
        };

        let sdm = if file_option & FILE_OPTION_SDM != 0 {
            let options = SdmOptions(reader.u8()?);
            let sdm_access = SdmAccessRights::from_bytes([reader.u8()?, reader.u8()?])?;
            let mut sdm = SdmSettings {
                options,
                access: sdm_access,
                uid_offset: None,
                read_counter_offset: None,
                picc_data_offset: None,
                mac_input_offset: None,
                mac_offset: None,
            };
            match sdm_access.meta_read {
                AccessCondition::Free => {
                    if options.has(SdmOptions::UID_MIRROR) {
                        sdm.uid_offset = Some(reader.u24()?);
                    }
                    if options.has(SdmOptions::READ_COUNTER_MIRROR) {
                        sdm.read_counter_offset = Some(reader.u24()?);
                    }
                }
                AccessCondition::Key(_) => sdm.picc_data_offset = Some(reader.u24()?),
                AccessCondition::Never => {}
            }
            if sdm_access.file_read != AccessCondition::Never {
                sdm.mac_input_offset = Some(reader.u24()?);
                if options.has(SdmOptions::ENC_FILE_DATA) {
                    // SDMENCOffset and SDMENCLength
                    reader.u24()?;
                    reader.u24()?;
                }
                sdm.mac_offset = Some(reader.u24()?);
            }
            Some(sdm)
        } else {
            None
        };

        Ok(FileInfo {
            file_type,
            file_size,
            settings: Self {
                comm_mode,
                access,
                sdm,
            },
        })
    }

    /// Check that every mirror fits inside a record of `record_len` bytes
    /// and that no two mirrors overlap
    pub fn validate(&self, record_len: usize) -> Result<()> {
        let Some(sdm) = &self.sdm else {
            return Ok(());
        };

        let ascii = sdm.options.has(SdmOptions::ASCII_ENCODING);
        let width = |bytes: usize| if ascii { bytes * 2 } else { bytes };
        let regions = [
            (sdm.uid_offset, width(7)),
            (sdm.read_counter_offset, width(3)),
            (sdm.picc_data_offset, if ascii { PICC_DATA_HEX_LEN } else { 16 }),
            (sdm.mac_offset, if ascii { SDM_MAC_HEX_LEN } else { 8 }),
        ];
        let regions: Vec<(u32, usize)> = regions
            .into_iter()
            .filter_map(|(offset, len)| offset.map(|o| (o, len)))
            .collect();

        for &(offset, len) in &regions {
            if offset < 2 {
                return Err(Error::InvalidOffset {
                    offset,
                    reason: "overlaps the NDEF length field",
                });
            }
            if offset as usize + len > record_len {
                return Err(Error::InvalidOffset {
                    offset,
                    reason: "mirror does not fit in the NDEF record",
                });
            }
        }

        for (i, &(a, a_len)) in regions.iter().enumerate() {
            for &(b, b_len) in &regions[i + 1..] {
                let (a, b) = (a as usize, b as usize);
                if a < b + b_len && b < a + a_len {
                    return Err(Error::InvalidOffset {
                        offset: b as u32,
                        reason: "mirror overlaps another mirror",
                    });
                }
            }
        }

        if let (Some(input), Some(mac)) = (sdm.mac_input_offset, sdm.mac_offset) {
            if input > mac {
                return Err(Error::InvalidOffset {
                    offset: input,
                    reason: "MAC input starts after the MAC",
                });
            }
        }
        Ok(())
    }
}

struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.0.len() < n {
            return Err(Error::InvalidData("file settings truncated"));
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }
}
