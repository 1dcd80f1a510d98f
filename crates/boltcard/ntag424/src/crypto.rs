//! Cryptographic primitives for NTAG 424 DNA secure messaging
//!
//! This module provides the AES-128 building blocks used by EV2 authentication,
//! secure messaging and SUN verification: raw ECB/CBC without padding, CMAC,
//! the NXP MAC truncation, ISO/IEC 9797-1 method 2 padding and the
//! CRC32 variant used by ChangeKey.

use aes::Aes128;
use cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
    block_padding::NoPadding, generic_array::GenericArray,
};
use cmac::{Cmac, Mac};

use crate::constants::BLOCK_SIZE;
use crate::{Error, Result};

/// One AES block
pub type Block = [u8; BLOCK_SIZE];
/// Untruncated CMAC tag
pub type FullMac = [u8; 16];
/// CMAC tag as transmitted by the chip
pub type TruncatedMac = [u8; 8];

/// All-zero IV used by authentication and SDM decryption
pub const ZERO_IV: Block = [0u8; BLOCK_SIZE];

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != 16 {
        return Err(Error::InvalidKeyLength(key.len()));
    }
    Ok(())
}

fn check_alignment(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::InvalidBlockAlignment(data.len()));
    }
    Ok(())
}

/// Encrypt whole blocks with AES-128 in ECB mode
///
/// # Arguments
///
/// * `key` - AES key (16 bytes)
/// * `data` - Plaintext, a multiple of 16 bytes
///
/// # Returns
///
/// The ciphertext, same length as the input
pub fn encrypt_ecb(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    check_alignment(data)?;

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut buf = data.to_vec();
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(buf)
}

/// Decrypt whole blocks with AES-128 in ECB mode
pub fn decrypt_ecb(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    check_alignment(data)?;

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut buf = data.to_vec();
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(buf)
}

/// Encrypt a single block, the IV derivation primitive of secure messaging
pub fn encrypt_block(key: &[u8], block: &Block) -> Result<Block> {
    let out = encrypt_ecb(key, block)?;
    let mut result = [0u8; BLOCK_SIZE];
    result.copy_from_slice(&out);
    Ok(result)
}

/// Encrypt with AES-128 in CBC mode without padding
///
/// # Arguments
///
/// * `key` - AES key (16 bytes)
/// * `iv` - Initial chaining value
/// * `data` - Plaintext, a multiple of 16 bytes
///
/// # Returns
///
/// The ciphertext, same length as the input
pub fn encrypt_cbc(key: &[u8], iv: &Block, data: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    check_alignment(data)?;

    let mut buf = data.to_vec();
    let len = buf.len();
    Aes128CbcEnc::new(GenericArray::from_slice(key), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| Error::InvalidBlockAlignment(len))?;
    Ok(buf)
}

/// Decrypt with AES-128 in CBC mode without padding
pub fn decrypt_cbc(key: &[u8], iv: &Block, data: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    check_alignment(data)?;

    let mut buf = data.to_vec();
    Aes128CbcDec::new(GenericArray::from_slice(key), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| Error::InvalidBlockAlignment(data.len()))?;
    Ok(buf)
}

/// Compute an AES-CMAC (NIST SP 800-38B) over a message
///
/// # Arguments
///
/// * `key` - AES key (16 bytes)
/// * `message` - Message of any length, including empty
///
/// # Returns
///
/// The full 16-byte tag
pub fn cmac(key: &[u8], message: &[u8]) -> Result<FullMac> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| Error::InvalidKeyLength(key.len()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Truncate a CMAC to the 8 bytes the chip transmits
///
/// NXP keeps the bytes at indices 1, 3, 5, 7, 9, 11, 13 and 15.
pub fn truncate_mac(full: &FullMac) -> TruncatedMac {
    let mut out = [0u8; 8];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = full[2 * i + 1];
    }
    out
}

/// CMAC followed by truncation
pub fn cmac_truncated(key: &[u8], message: &[u8]) -> Result<TruncatedMac> {
    Ok(truncate_mac(&cmac(key, message)?))
}

/// Pad with ISO/IEC 9797-1 method 2: `0x80` then zeros up to the next block
///
/// Padding is always added, so block-aligned input grows by a full block.
pub fn pad_m2(data: &[u8]) -> Vec<u8> {
    let padded_len = (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut out = Vec::with_capacity(padded_len);
    out.extend_from_slice(data);
    out.push(0x80);
    out.resize(padded_len, 0x00);
    out
}

/// Remove ISO/IEC 9797-1 method 2 padding
pub fn unpad_m2(data: &[u8]) -> Result<&[u8]> {
    let marker = data
        .iter()
        .rposition(|&b| b != 0x00)
        .ok_or(Error::IntegrityError)?;
    if data[marker] != 0x80 || data.len() - marker > BLOCK_SIZE {
        return Err(Error::IntegrityError);
    }
    Ok(&data[..marker])
}

/// CRC32 as used by ChangeKey: reflected polynomial `0xEDB88320`, initial value
/// `0xFFFFFFFF`, no final XOR, little-endian output
pub fn crc32_nk(data: &[u8]) -> [u8; 4] {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    crc.to_le_bytes()
}

/// Rotate a byte string left by one byte
pub fn rotate_left(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if !out.is_empty() {
        out.rotate_left(1);
    }
    out
}

/// XOR two equal-length byte strings
pub(crate) fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Build the 32-byte session vector for EV2 session key derivation
///
/// `header ‖ RndA[0..2] ‖ (RndA[2..8] ⊕ RndB[0..6]) ‖ RndB[6..16] ‖ RndA[8..16]`
pub fn session_vector(header: &[u8; 6], rnd_a: &Block, rnd_b: &Block) -> [u8; 32] {
    let mut sv = [0u8; 32];
    sv[0..6].copy_from_slice(header);
    sv[6..8].copy_from_slice(&rnd_a[0..2]);
    for i in 0..6 {
        sv[8 + i] = rnd_a[2 + i] ^ rnd_b[i];
    }
    sv[14..24].copy_from_slice(&rnd_b[6..16]);
    sv[24..32].copy_from_slice(&rnd_a[8..16]);
    sv
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const NIST_KEY: [u8; 16] = hex!("2b7e151628aed2a6abf7158809cf4f3c");

    #[test]
    fn test_ecb_fips197() {
        let key = hex!("000102030405060708090a0b0c0d0e0f");
        let pt = hex!("00112233445566778899aabbccddeeff");
        let ct = encrypt_ecb(&key, &pt).unwrap();
        assert_eq!(ct, hex!("69c4e0d86a7b0430d8cdb78070b4c55a"));
        assert_eq!(decrypt_ecb(&key, &ct).unwrap(), pt);
        assert_eq!(
            encrypt_block(&key, &pt).unwrap(),
            hex!("69c4e0d86a7b0430d8cdb78070b4c55a")
        );
    }

    #[test]
    fn test_cbc_sp800_38a() {
        let iv = hex!("000102030405060708090a0b0c0d0e0f");
        let pt = hex!(
            "6bc1bee22e409f96e93d7e117393172a"
            "ae2d8a571e03ac9c9eb76fac45af8e51"
        );
        let ct = encrypt_cbc(&NIST_KEY, &iv, &pt).unwrap();
        assert_eq!(
            ct,
            hex!(
                "7649abac8119b246cee98e9b12e9197d"
                "5086cb9b507219ee95db113a917678b2"
            )
        );
        assert_eq!(decrypt_cbc(&NIST_KEY, &iv, &ct).unwrap(), pt);
    }

    #[test]
    fn test_cmac_sp800_38b() {
        assert_eq!(
            cmac(&NIST_KEY, &[]).unwrap(),
            hex!("bb1d6929e95937287fa37d129b756746")
        );
        assert_eq!(
            cmac(&NIST_KEY, &hex!("6bc1bee22e409f96e93d7e117393172a")).unwrap(),
            hex!("070a16b46b4d4144f79bdd9dd04a287c")
        );
    }

    #[test]
    fn test_cmac_is_deterministic_and_avalanches() {
        let message = hex!("00112233445566778899aabbccddeeff");
        let base = cmac(&NIST_KEY, &message).unwrap();
        assert_eq!(cmac(&NIST_KEY, &message).unwrap(), base);

        let mut total_distance = 0u32;
        for bit in 0..128 {
            let mut flipped = message;
            flipped[bit / 8] ^= 1 << (bit % 8);
            let tag = cmac(&NIST_KEY, &flipped).unwrap();
            assert_ne!(tag, base);
            total_distance += base
                .iter()
                .zip(tag.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum::<u32>();
        }
        let average = total_distance as f64 / 128.0;
        assert!((48.0..80.0).contains(&average), "average distance {average}");
    }

    #[test]
    fn test_truncate_mac_takes_odd_indices() {
        let full: FullMac = core::array::from_fn(|i| i as u8);
        assert_eq!(truncate_mac(&full), [1, 3, 5, 7, 9, 11, 13, 15]);
        assert_eq!(
            cmac_truncated(&NIST_KEY, &[]).unwrap(),
            hex!("1d295928a3127546")
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            encrypt_ecb(&[0u8; 15], &[0u8; 16]),
            Err(Error::InvalidKeyLength(15))
        ));
        assert!(matches!(
            encrypt_cbc(&NIST_KEY, &ZERO_IV, &[0u8; 17]),
            Err(Error::InvalidBlockAlignment(17))
        ));
        assert!(matches!(
            decrypt_cbc(&NIST_KEY, &ZERO_IV, &[0u8; 8]),
            Err(Error::InvalidBlockAlignment(8))
        ));
        assert!(matches!(cmac(&[0u8; 32], b"x"), Err(Error::InvalidKeyLength(32))));
    }

    #[test]
    fn test_padding_method_2() {
        let padded = pad_m2(&[0x01, 0x02]);
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[..3], &[0x01, 0x02, 0x80]);
        assert!(padded[3..].iter().all(|&b| b == 0));
        assert_eq!(unpad_m2(&padded).unwrap(), &[0x01, 0x02]);

        let aligned = pad_m2(&[0xAA; 16]);
        assert_eq!(aligned.len(), 32);
        assert_eq!(aligned[16], 0x80);
        assert_eq!(unpad_m2(&aligned).unwrap(), &[0xAA; 16]);

        assert_eq!(pad_m2(&[]), {
            let mut block = [0u8; 16];
            block[0] = 0x80;
            block.to_vec()
        });
        assert!(unpad_m2(&[0u8; 16]).is_err());
        assert!(unpad_m2(&[0x01; 16]).is_err());
    }

    #[test]
    fn test_crc32_nk() {
        // CRC-32 of "123456789" is CBF43926; without the final XOR it is 340BC6D9
        assert_eq!(crc32_nk(b"123456789"), hex!("d9c60b34"));
        assert_eq!(crc32_nk(&[]), hex!("ffffffff"));
    }

    #[test]
    fn test_rotate_left() {
        assert_eq!(rotate_left(&[1, 2, 3]), vec![2, 3, 1]);
        assert!(rotate_left(&[]).is_empty());
    }

    #[test]
    fn test_session_vector_layout() {
        let rnd_a: Block = hex!("b04d0787c93ee0cc8cacc8e86f16c6fe");
        let rnd_b: Block = hex!("fa659ad0dcca738dd65dc7dc38128376");
        let sv = session_vector(&crate::constants::SV1_HEADER, &rnd_a, &rnd_b);
        assert_eq!(&sv[..6], &crate::constants::SV1_HEADER);
        assert_eq!(&sv[6..8], &rnd_a[..2]);
        assert_eq!(sv[8], rnd_a[2] ^ rnd_b[0]);
        assert_eq!(sv[13], rnd_a[7] ^ rnd_b[5]);
        assert_eq!(&sv[14..24], &rnd_b[6..]);
        assert_eq!(&sv[24..], &rnd_a[8..]);
    }
}
