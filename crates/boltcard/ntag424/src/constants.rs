//! Protocol constants for the NTAG 424 DNA native instruction set

/// DF name of the NDEF application (ISO/IEC 7816-4 SelectFile by name)
pub const NDEF_APPLICATION_DF_NAME: &[u8] = b"\xD2\x76\x00\x00\x85\x01\x01";

/// CLA byte for ISO 7816-4 commands
pub const CLA_ISO: u8 = 0x00;
/// CLA byte for ISO-wrapped native commands
pub const CLA_NATIVE: u8 = 0x90;

/// Instruction codes
pub mod ins {
    /// ISOSelectFile
    pub const ISO_SELECT_FILE: u8 = 0xA4;
    /// AuthenticateEV2First, first part
    pub const AUTHENTICATE_EV2_FIRST: u8 = 0x71;
    /// AuthenticateEV2NonFirst, first part
    pub const AUTHENTICATE_EV2_NON_FIRST: u8 = 0x77;
    /// Continuation of a multi-frame exchange
    pub const ADDITIONAL_FRAME: u8 = 0xAF;
    /// ChangeKey
    pub const CHANGE_KEY: u8 = 0xC4;
    /// ChangeFileSettings
    pub const CHANGE_FILE_SETTINGS: u8 = 0x5F;
    /// GetFileSettings
    pub const GET_FILE_SETTINGS: u8 = 0xF5;
    /// GetKeyVersion
    pub const GET_KEY_VERSION: u8 = 0x64;
    /// GetCardUID
    pub const GET_CARD_UID: u8 = 0x51;
    /// ReadData
    pub const READ_DATA: u8 = 0xAD;
    /// WriteData
    pub const WRITE_DATA: u8 = 0x8D;
}

/// P1 for ISOSelectFile: select by DF name
pub const SELECT_BY_DF_NAME: u8 = 0x04;
/// P2 for ISOSelectFile: return no FCI
pub const SELECT_NO_FCI: u8 = 0x0C;

/// File number of the NDEF file inside the NDEF application
pub const NDEF_FILE_NO: u8 = 0x02;
/// Size of the NDEF file on a factory chip
pub const NDEF_FILE_SIZE: usize = 256;

/// AES block size
pub const BLOCK_SIZE: usize = 16;
/// Size of a truncated secure messaging MAC
pub const MAC_SIZE: usize = 8;
/// Size of the transaction identifier
pub const TI_SIZE: usize = 4;
/// Size of the chip UID
pub const UID_SIZE: usize = 7;
/// Size of the SDM read counter
pub const SDM_COUNTER_SIZE: usize = 3;

/// Label bytes mixed into the command IV
pub const IV_LABEL_COMMAND: [u8; 2] = [0xA5, 0x5A];
/// Label bytes mixed into the response IV
pub const IV_LABEL_RESPONSE: [u8; 2] = [0x5A, 0xA5];

/// Session vector header for the session encryption key
pub const SV1_HEADER: [u8; 6] = [0xA5, 0x5A, 0x00, 0x01, 0x00, 0x80];
/// Session vector header for the session MAC key
pub const SV2_HEADER: [u8; 6] = [0x5A, 0xA5, 0x00, 0x01, 0x00, 0x80];
/// Session vector header for the SDM file read MAC key
pub const SDM_SV2_HEADER: [u8; 6] = [0x3C, 0xC3, 0x00, 0x01, 0x00, 0x80];

/// PICCDataTag announcing a mirrored 7-byte UID and read counter
pub const PICC_DATA_TAG: u8 = 0xC7;

/// Length of the plaintext returned with the second authentication frame
pub const AUTH_FIRST_RESPONSE_SIZE: usize = 32;
/// Hex characters reserved for the encrypted PICC data in the NDEF URL
pub const PICC_DATA_HEX_LEN: usize = 32;
/// Hex characters reserved for the SDM MAC in the NDEF URL
pub const SDM_MAC_HEX_LEN: usize = 16;
