//! Mint Account Decoding
//!
//! The update authority of a mint sits at a fixed offset of the raw
//! account payload: bytes 4..36 hold its 32-byte public key.

use thiserror::Error;

const AUTHORITY_OFFSET: usize = 4;
const PUBKEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MintDataError {
    #[error("Account data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
}

/// Base58 address stored at the authority offset of a mint account
pub fn authority_from_mint_data(data: &[u8]) -> Result<String, MintDataError> {
    let end = AUTHORITY_OFFSET + PUBKEY_LEN;
    let bytes = data.get(AUTHORITY_OFFSET..end).ok_or(MintDataError::TooShort {
        expected: end,
        actual: data.len(),
    })?;
    Ok(bs58::encode(bytes).into_string())
}
