//! Balance Delta Extraction
//!
//! Derives buy signals from a transaction's token balance change records.
//! A buy qualifies as self-funded when the owner whose balance grew is the
//! transaction's fee payer (account key 0). Relayed transfers and airdrops,
//! where someone else signs, never qualify.

use std::collections::HashMap;

use crate::ports::models::{TokenBalanceEntry, TransactionRecord};

/// Owners whose balance of `mint` increased in a transaction they signed,
/// paired with their post-transaction balance.
///
/// Owners missing from the pre-balances start at zero. When an owner has
/// several balance records for the mint in one transaction the last record
/// is used. Failed transactions yield nothing.
pub fn self_funded_buys(tx: &TransactionRecord, mint: &str) -> Vec<(String, u64)> {
    if tx.err.is_some() {
        return Vec::new();
    }
    let Some(signer) = tx.primary_signer() else {
        return Vec::new();
    };

    let pre: HashMap<String, u64> = owner_balances(&tx.pre_token_balances, mint)
        .into_iter()
        .collect();

    owner_balances(&tx.post_token_balances, mint)
        .into_iter()
        .filter(|(owner, post)| {
            let before = pre.get(owner).copied().unwrap_or(0);
            *post > before && owner == signer
        })
        .collect()
}

/// Owner -> amount for one mint, in first-seen order
fn owner_balances(entries: &[TokenBalanceEntry], mint: &str) -> Vec<(String, u64)> {
    let mut balances: Vec<(String, u64)> = Vec::new();
    for entry in entries.iter().filter(|e| e.mint == mint) {
        match balances.iter_mut().find(|(owner, _)| *owner == entry.owner) {
            Some(slot) => slot.1 = entry.amount,
            None => balances.push((entry.owner.clone(), entry.amount)),
        }
    }
    balances
}
