use serde::{Deserialize, Serialize};

/// A token registered for tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Storage-assigned identifier
    pub id: i64,
    /// Mint address (base58)
    pub address: String,
    /// Mint update authority, resolved after registration
    pub update_authority: Option<String>,
    /// Signature of the transaction that initialized the mint
    pub deploy_signature: Option<String>,
}

impl Token {
    pub fn new(id: i64, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            update_authority: None,
            deploy_signature: None,
        }
    }
}
