//! Short APDU commands
//!
//! Only the short form is supported: one byte of Lc and one byte of Le.
//! Every native NTAG 424 frame fits in it.

pub mod error;

use bytes::{BufMut, Bytes, BytesMut};

use error::CommandError;

/// Expected length type for APDU commands
pub type ExpectedLength = u8;

/// Maximum payload of a short APDU
pub const MAX_SHORT_DATA: usize = 255;

/// Anything that can be sent to a card as a command APDU
pub trait ApduCommand {
    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload, `None` leaves Lc out
    fn data(&self) -> Option<&[u8]>;

    /// Le byte, `None` leaves it out
    fn expected_length(&self) -> Option<ExpectedLength>;

    /// Encode as `CLA INS P1 P2 [Lc Data] [Le]`
    fn to_bytes(&self) -> Bytes {
        let data = self.data().unwrap_or_default();
        let mut buffer = BytesMut::with_capacity(4 + 1 + data.len() + 1);
        buffer.put_slice(&[self.class(), self.instruction(), self.p1(), self.p2()]);

        if let Some(data) = self.data() {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }
        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Copy into an owned [`Command`]
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }
}

/// Owned command APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data
    pub data: Option<Bytes>,
    /// Expected length
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Header-only command
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Set the data field
    ///
    /// An empty payload leaves the Lc field out entirely.
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Result<Self, CommandError> {
        let data = data.into();
        if data.len() > MAX_SHORT_DATA {
            return Err(CommandError::DataTooLong(data.len(), MAX_SHORT_DATA));
        }
        self.data = (!data.is_empty()).then_some(data);
        Ok(self)
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }
}

impl ApduCommand for Command {
    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }
}
