//! NDEF template inspection

use boltcard::ntag424::{FileSettings, SunTemplate};
use std::error::Error;

use crate::utils::display;

/// Print the templated URL, SDM offsets and the bytes written to the card
pub fn template_command(lnurlw_base: &str) -> Result<(), Box<dyn Error>> {
    if !boltcard::is_withdraw_url(lnurlw_base) {
        println!("{}", display::warning("Base URL is not an lnurlw link"));
    }

    let template = SunTemplate::new(lnurlw_base);
    let file = template.to_file()?;
    let picc_offset = template.picc_data_offset()?;
    let mac_offset = template.mac_offset()?;
    let settings = FileSettings::boltcard(picc_offset, mac_offset);
    settings.validate(file.len())?;

    println!(
        "{}",
        display::key_value_box(
            "NDEF template",
            vec![
                ("URL", template.url().to_owned()),
                ("PICC data offset", picc_offset.to_string()),
                ("MAC offset", mac_offset.to_string()),
                ("NDEF file", hex::encode(&file)),
                ("File settings", hex::encode(settings.to_bytes()?)),
            ],
        )
    );
    Ok(())
}
