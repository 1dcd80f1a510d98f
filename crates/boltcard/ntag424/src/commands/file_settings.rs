use super::NativeCommand;
use crate::constants::ins;
use crate::secure_channel::CommMode;

/// ChangeFileSettings with an already encoded settings block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFileSettings {
    /// File number
    pub file_no: u8,
    /// Encoded settings, see [`crate::FileSettings::to_bytes`]
    pub settings: Vec<u8>,
}

impl NativeCommand for ChangeFileSettings {
    const INS: u8 = ins::CHANGE_FILE_SETTINGS;
    const MODE: CommMode = CommMode::Full;

    fn header(&self) -> Vec<u8> {
        vec![self.file_no]
    }

    fn data(&self) -> Vec<u8> {
        self.settings.clone()
    }
}

/// GetFileSettings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetFileSettings {
    /// File number
    pub file_no: u8,
}

impl NativeCommand for GetFileSettings {
    const INS: u8 = ins::GET_FILE_SETTINGS;
    const MODE: CommMode = CommMode::Mac;

    fn header(&self) -> Vec<u8> {
        vec![self.file_no]
    }
}
