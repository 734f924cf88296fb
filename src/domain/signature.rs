//! Signature Records
//!
//! A confirmed transaction reference belonging to one token's history.
//! Signatures are globally unique: the same signature string never belongs
//! to two tokens.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature: String,
    /// Ledger ordering key
    pub slot: u64,
    /// Unix seconds, absent for very old blocks
    pub block_time: Option<i64>,
    pub token_id: i64,
}

impl SignatureRecord {
    pub fn new(
        signature: impl Into<String>,
        slot: u64,
        block_time: Option<i64>,
        token_id: i64,
    ) -> Self {
        Self {
            signature: signature.into(),
            slot,
            block_time,
            token_id,
        }
    }
}

/// Order records oldest-first: slot ascending, then signature ascending.
///
/// Holder discovery requires this order so that "first buyer" means the
/// earliest buyer on the ledger rather than the earliest row persisted.
pub fn sort_chronologically(records: &mut [SignatureRecord]) {
    records.sort_by(|a, b| {
        a.slot
            .cmp(&b.slot)
            .then_with(|| a.signature.cmp(&b.signature))
    });
}
