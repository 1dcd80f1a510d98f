//! NDEF file encoding for a single URI record
//!
//! The NDEF file holds `NLEN(2, BE) ‖ D1 01 <len> 55 <prefix> ‖ uri`. URIs are
//! always written with prefix code `0x00` so that a character at index `i` of
//! the URI lands at file offset `7 + i`, which is what the SDM offsets are
//! computed against.

use crate::constants::{NDEF_FILE_SIZE, PICC_DATA_HEX_LEN, SDM_MAC_HEX_LEN};
use crate::{Error, Result};

/// Bytes in front of the first URI character: NLEN, record header, type, prefix
pub const URI_RECORD_PREFIX_LEN: usize = 7;

/// Short record, message begin and end, well-known type
const RECORD_HEADER: u8 = 0xD1;
const URI_TYPE: u8 = b'U';

/// URI identifier codes (NFC Forum URI RTD)
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Encode a URI as the full content of the NDEF file
pub fn encode_uri_file(uri: &str) -> Result<Vec<u8>> {
    let payload_len = uri.len() + 1;
    let record_len = 4 + payload_len;
    let total = 2 + record_len;
    if payload_len > u8::MAX as usize || total > NDEF_FILE_SIZE {
        return Err(Error::NdefTooLarge(total));
    }

    let mut file = Vec::with_capacity(total);
    file.extend_from_slice(&(record_len as u16).to_be_bytes());
    file.extend_from_slice(&[RECORD_HEADER, 0x01, payload_len as u8, URI_TYPE, 0x00]);
    file.extend_from_slice(uri.as_bytes());
    Ok(file)
}

/// Read NLEN from the first two bytes of the NDEF file
pub fn message_length(file: &[u8]) -> Result<usize> {
    match file {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo]) as usize),
        _ => Err(Error::InvalidData("NDEF file shorter than NLEN")),
    }
}

/// Decode the URI from NDEF file content
///
/// An empty message decodes to an empty string.
pub fn decode_uri_file(file: &[u8]) -> Result<String> {
    let nlen = message_length(file)?;
    if nlen == 0 {
        return Ok(String::new());
    }
    let message = file
        .get(2..2 + nlen)
        .ok_or(Error::InvalidData("NDEF message truncated"))?;
    decode_uri_record(message)
}

fn decode_uri_record(record: &[u8]) -> Result<String> {
    let [header, type_len, payload_len, rest @ ..] = record else {
        return Err(Error::InvalidData("NDEF record truncated"));
    };
    if header & 0x07 != 0x01 || header & 0x10 == 0 || *type_len != 1 {
        return Err(Error::InvalidData("not a short well-known NDEF record"));
    }
    // ID length byte follows the payload length when IL is set
    let rest = if header & 0x08 != 0 {
        let (id_len, tail) = rest
            .split_first()
            .ok_or(Error::InvalidData("NDEF record truncated"))?;
        tail.get(*id_len as usize..)
            .ok_or(Error::InvalidData("NDEF record truncated"))?
    } else {
        rest
    };
    let (record_type, payload) = rest
        .split_first()
        .ok_or(Error::InvalidData("NDEF record truncated"))?;
    if *record_type != URI_TYPE {
        return Err(Error::InvalidData("NDEF record is not a URI"));
    }
    let payload = payload
        .get(..*payload_len as usize)
        .ok_or(Error::InvalidData("NDEF payload truncated"))?;
    let (code, body) = payload
        .split_first()
        .ok_or(Error::InvalidData("empty URI payload"))?;
    let prefix = URI_PREFIXES
        .get(*code as usize)
        .ok_or(Error::InvalidData("unknown URI identifier code"))?;
    let body = std::str::from_utf8(body).map_err(|_| Error::InvalidData("URI is not UTF-8"))?;
    Ok(format!("{prefix}{body}"))
}

/// The LNURL-withdraw URL written to a card, with zeroed SUN placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SunTemplate {
    url: String,
}

impl SunTemplate {
    /// Build `<base>?p=<32 zeros>&c=<16 zeros>`
    pub fn new(lnurlw_base: &str) -> Self {
        let separator = if lnurlw_base.contains('?') { '&' } else { '?' };
        Self {
            url: format!(
                "{lnurlw_base}{separator}p={}&c={}",
                "0".repeat(PICC_DATA_HEX_LEN),
                "0".repeat(SDM_MAC_HEX_LEN)
            ),
        }
    }

    /// The templated URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn value_offset(&self, name: &str) -> Result<u32> {
        let index = self
            .url
            .rfind(name)
            .ok_or(Error::InvalidData("placeholder missing from template"))?;
        Ok((URI_RECORD_PREFIX_LEN + index + name.len()) as u32)
    }

    /// File offset of the encrypted PICC data placeholder
    pub fn picc_data_offset(&self) -> Result<u32> {
        self.value_offset("p=")
    }

    /// File offset of the SDM MAC placeholder
    pub fn mac_offset(&self) -> Result<u32> {
        self.value_offset("c=")
    }

    /// Encoded NDEF file content
    pub fn to_file(&self) -> Result<Vec<u8>> {
        encode_uri_file(&self.url)
    }
}

/// The `p` and `c` values a tapped card appended to its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SunMessage {
    /// Encrypted PICC data, 32 hex characters
    pub p: String,
    /// Truncated SDM MAC, 16 hex characters
    pub c: String,
}

impl SunMessage {
    /// Extract `p` and `c` from a tapped URL
    ///
    /// `c` is cut to its first 16 characters.
    pub fn from_url(url: &str) -> Result<Self> {
        let query = url
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or(Error::InvalidData("URL has no query"))?;

        let mut p: Option<String> = None;
        let mut c: Option<String> = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("p", value)) => p = Some(value.to_owned()),
                Some(("c", value)) => c = Some(value.chars().take(SDM_MAC_HEX_LEN).collect()),
                _ => {}
            }
        }

        match (p, c) {
            (Some(p), Some(c)) if !p.is_empty() && !c.is_empty() => Ok(Self { p, c }),
            _ => Err(Error::InvalidData("URL lacks p and c parameters")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const BASE: &str = "lnurlw://card.example.com/ln";

    #[test]
    fn test_encode_uri_file() {
        let file = encode_uri_file("lnurlw://a").unwrap();
        assert_eq!(&file[..7], &hex!("000f d101 0b55 00"));
        assert_eq!(&file[7..], b"lnurlw://a");
        assert_eq!(message_length(&file).unwrap(), file.len() - 2);
    }

    #[test]
    fn test_blank_record() {
        assert_eq!(encode_uri_file("").unwrap(), hex!("0005 d101 0155 00"));
        assert_eq!(decode_uri_file(&hex!("0005 d101 0155 00")).unwrap(), "");
        assert_eq!(decode_uri_file(&hex!("0000")).unwrap(), "");
    }

    #[test]
    fn test_decode_round_trip_and_prefixes() {
        let url = SunTemplate::new(BASE).url().to_owned();
        let mut file = encode_uri_file(&url).unwrap();
        file.resize(NDEF_FILE_SIZE, 0x00);
        assert_eq!(decode_uri_file(&file).unwrap(), url);

        // https:// abbreviated with identifier code 0x04
        let file = hex!("000d d101 0955 04 6578616d706c65 2f");
        assert_eq!(decode_uri_file(&file).unwrap(), "https://example/");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_uri_file(&[0x00]).is_err());
        assert!(decode_uri_file(&hex!("0010 d101")).is_err());
        assert!(decode_uri_file(&hex!("0005 d101 0154 00")).is_err());
        assert!(decode_uri_file(&hex!("0005 d101 0155 40")).is_err());
    }

    #[test]
    fn test_too_large() {
        let long = "x".repeat(250);
        assert!(matches!(encode_uri_file(&long), Err(Error::NdefTooLarge(_))));
    }

    #[test]
    fn test_template_offsets() {
        let template = SunTemplate::new(BASE);
        let url = template.url();
        assert!(url.ends_with("?p=00000000000000000000000000000000&c=0000000000000000"));

        let picc = template.picc_data_offset().unwrap() as usize;
        let mac = template.mac_offset().unwrap() as usize;
        assert_eq!(picc, url.find("p=").unwrap() + 9);
        assert_eq!(mac, url.find("c=").unwrap() + 9);

        let file = template.to_file().unwrap();
        assert_eq!(&file[picc..picc + 32], "0".repeat(32).as_bytes());
        assert_eq!(&file[mac..mac + 16], "0".repeat(16).as_bytes());
        assert_eq!(file[picc - 2..picc], *b"p=");
        assert_eq!(file[mac - 2..mac], *b"c=");
    }

    #[test]
    fn test_template_with_existing_query() {
        let template = SunTemplate::new("lnurlw://x.io/ln?id=7");
        assert!(template.url().starts_with("lnurlw://x.io/ln?id=7&p="));
    }

    #[test]
    fn test_sun_message_from_url() {
        let msg = SunMessage::from_url(
            "lnurlw://x.io/ln?p=4E2E289D945A66BB13377A728884E867&c=E19CCB1FED8892CE00",
        )
        .unwrap();
        assert_eq!(msg.p, "4E2E289D945A66BB13377A728884E867");
        assert_eq!(msg.c, "E19CCB1FED8892CE");

        assert!(SunMessage::from_url("lnurlw://x.io/ln").is_err());
        assert!(SunMessage::from_url("lnurlw://x.io/ln?p=00").is_err());
    }
}
