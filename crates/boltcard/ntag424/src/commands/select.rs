use boltcard_apdu_core::{ApduCommand, ExpectedLength};

use crate::constants::{
    CLA_ISO, NDEF_APPLICATION_DF_NAME, SELECT_BY_DF_NAME, SELECT_NO_FCI, ins,
};

/// ISOSelectFile by DF name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectFile {
    df_name: Vec<u8>,
}

impl SelectFile {
    /// Select an application by its DF name
    pub fn by_df_name(df_name: &[u8]) -> Self {
        Self {
            df_name: df_name.to_vec(),
        }
    }

    /// Select the NDEF application
    pub fn ndef_application() -> Self {
        Self::by_df_name(NDEF_APPLICATION_DF_NAME)
    }
}

impl ApduCommand for SelectFile {
    fn class(&self) -> u8 {
        CLA_ISO
    }

    fn instruction(&self) -> u8 {
        ins::ISO_SELECT_FILE
    }

    fn p1(&self) -> u8 {
        SELECT_BY_DF_NAME
    }

    fn p2(&self) -> u8 {
        SELECT_NO_FCI
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.df_name)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0x00)
    }
}
