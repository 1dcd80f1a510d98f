use super::{NativeCommand, u24_le};
use crate::constants::ins;
use crate::secure_channel::CommMode;

/// ReadData from a plain-mode file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadData {
    /// File number
    pub file_no: u8,
    /// Byte offset to start at
    pub offset: u32,
    /// Bytes to read, `0` reads to the end of the file
    pub length: u32,
}

impl NativeCommand for ReadData {
    const INS: u8 = ins::READ_DATA;
    const MODE: CommMode = CommMode::Plain;

    fn header(&self) -> Vec<u8> {
        let mut out = vec![self.file_no];
        out.extend_from_slice(&u24_le(self.offset));
        out.extend_from_slice(&u24_le(self.length));
        out
    }
}

/// WriteData to a plain-mode file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteData<'a> {
    /// File number
    pub file_no: u8,
    /// Byte offset to start at
    pub offset: u32,
    /// Bytes to write
    pub data: &'a [u8],
}

impl NativeCommand for WriteData<'_> {
    const INS: u8 = ins::WRITE_DATA;
    const MODE: CommMode = CommMode::Plain;

    fn header(&self) -> Vec<u8> {
        let mut out = vec![self.file_no];
        out.extend_from_slice(&u24_le(self.offset));
        out.extend_from_slice(&u24_le(self.data.len() as u32));
        out
    }

    fn data(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}
