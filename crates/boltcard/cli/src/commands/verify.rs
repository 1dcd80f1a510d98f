//! Offline SUN verification

use boltcard::ntag424::{AesKey, SunMessage, ensure_fresh, test_p_and_c};
use std::error::Error;
use tracing::debug;

use crate::utils::display;

/// Build the SUN message from a URL or from explicit parameters
pub fn sun_message(
    url: Option<&str>,
    p: Option<String>,
    c: Option<String>,
) -> Result<SunMessage, Box<dyn Error>> {
    match (url, p, c) {
        (Some(url), _, _) => {
            if !boltcard::is_withdraw_url(url) {
                println!("{}", display::warning("URL is not an lnurlw link"));
            }
            Ok(SunMessage::from_url(url)?)
        }
        (None, Some(p), Some(c)) => Ok(SunMessage { p, c }),
        _ => Err("either --url or both --p and --c are required".into()),
    }
}

/// Verify a SUN message and print the card identity
pub fn verify_command(
    message: &SunMessage,
    uid: &str,
    k1: &str,
    k2: &str,
    last_counter: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let k1 = AesKey::from_hex(k1)?;
    let k2 = AesKey::from_hex(k2)?;
    debug!(p = %message.p, c = %message.c, "Verifying SUN message");

    let verified = test_p_and_c(&message.p, &message.c, uid, &k1, &k2)?;
    ensure_fresh(last_counter, verified.counter)?;

    println!("{}", display::success("SUN message is authentic"));
    println!(
        "{}",
        display::key_value_box(
            "Card",
            vec![
                ("UID", verified.uid_hex()),
                ("Read counter", verified.counter.to_string()),
            ],
        )
    );
    Ok(())
}
