//! AES-256-ECB transform for telemetry packets
//!
//! The meter encrypts every `getva` response with one static 32-byte key
//! (`constants::AES_KEY`). ECB mode: each 16-byte block is handled on its
//! own, no IV and no chaining.

use crate::error::{Result, TC66Error};
use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

fn new_cipher(key: &[u8]) -> Result<Aes256> {
    Aes256::new_from_slice(key)
        .map_err(|_| TC66Error::Cipher(format!("invalid key length: expected 32 bytes, got {}", key.len())))
}

fn check_block_aligned(data: &[u8]) -> Result<()> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(TC66Error::Cipher(format!(
            "data length {} is not a multiple of {}",
            data.len(),
            AES_BLOCK_SIZE
        )));
    }
    Ok(())
}

/// AES-256-ECB decrypt `ciphertext` with `key`
///
/// # Arguments
/// * `ciphertext` - Encrypted data (must be a multiple of 16 bytes)
/// * `key` - 32-byte AES key
pub fn decrypt_ecb<const N: usize>(ciphertext: &[u8; N], key: &[u8]) -> Result<[u8; N]> {
    check_block_aligned(ciphertext)?;
    let cipher = new_cipher(key)?;

    let mut output = *ciphertext;
    for chunk in output.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    Ok(output)
}

/// AES-256-ECB encrypt `plaintext` with `key`
///
/// The device never receives encrypted data; this is the inverse used to
/// build captures and simulated responses.
pub fn encrypt_ecb<const N: usize>(plaintext: &[u8; N], key: &[u8]) -> Result<[u8; N]> {
    check_block_aligned(plaintext)?;
    let cipher = new_cipher(key)?;

    let mut output = *plaintext;
    for chunk in output.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }

    Ok(output)
}
