//! Status words
//!
//! Besides the ISO/IEC 7816-4 codes, cards speaking a native wrapped
//! instruction set answer with SW1 = `0x91` and a one-byte return code in SW2.

use std::fmt;

/// Status word (SW1-SW2) ending every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Create a status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// `90 00` or `91 00`
    pub const fn is_success(&self) -> bool {
        matches!((self.sw1, self.sw2), (0x90, 0x00) | (0x91, 0x00))
    }

    /// `91 AF`, the card holds back part of the exchange
    pub const fn is_additional_frame(&self) -> bool {
        matches!((self.sw1, self.sw2), (0x91, 0xAF))
    }

    /// `91 AE`
    pub const fn is_authentication_error(&self) -> bool {
        matches!((self.sw1, self.sw2), (0x91, 0xAE))
    }

    /// `69 82`
    pub const fn is_security_condition_not_satisfied(&self) -> bool {
        matches!((self.sw1, self.sw2), (0x69, 0x82))
    }

    /// Human readable meaning of the code
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x91, 0x00) => "Successful operation",
            (0x91, 0xAF) => "Additional frame expected",
            (0x91, 0x0C) => "No changes",
            (0x91, 0x0E) => "Out of EEPROM",
            (0x91, 0x1C) => "Illegal command code",
            (0x91, 0x1E) => "Integrity error",
            (0x91, 0x40) => "No such key",
            (0x91, 0x7E) => "Length error",
            (0x91, 0x9D) => "Permission denied",
            (0x91, 0x9E) => "Parameter error",
            (0x91, 0xAD) => "Authentication delay",
            (0x91, 0xAE) => "Authentication error",
            (0x91, 0xBE) => "Boundary error",
            (0x91, 0xCA) => "Command aborted",
            (0x91, 0xEE) => "Memory error",
            (0x91, 0xF0) => "File not found",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x82) => "Security status not satisfied",
            (0x6A, 0x82) => "File or application not found",
            (0x6A, 0x86) => "Incorrect P1-P2",
            (0x6D, 0x00) => "Instruction not supported",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}
