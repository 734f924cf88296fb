use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient};
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::{RpcError, TokenAccountsFilter};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::Signature,
};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{UiTransactionEncoding, UiTransactionTokenBalance};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{LedgerError, LedgerPort, SignatureInfo, TokenBalanceEntry, TransactionRecord};

/// JSON-RPC "invalid params", returned e.g. by getTokenSupply for non-mint accounts
const RPC_INVALID_PARAMS: i64 = -32602;
/// Node-side rate limiting codes used by common RPC providers
const RPC_RATE_LIMIT_CODES: [i64; 2] = [-32005, 429];
/// Slot skipped / block or transaction not available
const RPC_NOT_AVAILABLE_CODES: [i64; 2] = [-32007, -32009];

/// Wrapper around Solana RPC client with async-compatible methods
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl SolanaClient {
    /// Create a new Solana RPC client
    pub fn new(rpc_url: String, commitment: &str, timeout: Duration) -> Self {
        let commitment = parse_commitment(commitment);
        let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            rpc_url, timeout, commitment,
        ));
        Self { client, commitment }
    }

    /// Run a blocking RPC call off the async runtime
    async fn blocking<T, F>(&self, call: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&RpcClient) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || call(&client))
            .await
            .map_err(|e| LedgerError::Rpc(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl LedgerPort for SolanaClient {
    async fn signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        let address = parse_pubkey(address)?;
        let before = before.as_deref().map(parse_signature).transpose()?;
        let config = GetConfirmedSignaturesForAddress2Config {
            before,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };

        self.blocking(move |client| {
            client
                .get_signatures_for_address_with_config(&address, config)
                .map_err(classify_client_error)
                .map(|entries| {
                    entries
                        .into_iter()
                        .map(|entry| SignatureInfo {
                            signature: entry.signature,
                            slot: entry.slot,
                            block_time: entry.block_time,
                            err: entry.err.map(|e| e.to_string()),
                        })
                        .collect()
                })
        })
        .await
    }

    async fn transaction(&self, signature: &str) -> Result<TransactionRecord, LedgerError> {
        let parsed = parse_signature(signature)?;
        let signature = signature.to_string();
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        self.blocking(move |client| {
            let confirmed = client
                .get_transaction_with_config(&parsed, config)
                .map_err(classify_client_error)?;

            let account_keys = confirmed
                .transaction
                .transaction
                .decode()
                .map(|tx| {
                    tx.message
                        .static_account_keys()
                        .iter()
                        .map(|key| key.to_string())
                        .collect()
                })
                .ok_or_else(|| {
                    LedgerError::Parse(format!("undecodable transaction {}", signature))
                })?;

            let meta = confirmed
                .transaction
                .meta
                .ok_or_else(|| {
                    LedgerError::Parse(format!("transaction {} has no status meta", signature))
                })?;

            Ok(TransactionRecord {
                signature,
                slot: confirmed.slot,
                account_keys,
                err: meta.err.map(|e| e.to_string()),
                pre_token_balances: token_balances(meta.pre_token_balances)?,
                post_token_balances: token_balances(meta.post_token_balances)?,
                log_messages: match meta.log_messages {
                    OptionSerializer::Some(logs) => logs,
                    _ => Vec::new(),
                },
            })
        })
        .await
    }

    async fn account_data(&self, address: &str) -> Result<Vec<u8>, LedgerError> {
        let address = parse_pubkey(address)?;
        let account = self
            .blocking(move |client| client.get_account(&address).map_err(classify_client_error))
            .await?;

        // Mint layouts are only meaningful for accounts of the Token program
        if account.owner != spl_token::id() {
            return Err(LedgerError::InvalidParams(format!(
                "{} is owned by {}, not the Token program",
                address, account.owner
            )));
        }
        Ok(account.data)
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<String>, LedgerError> {
        let owner = parse_pubkey(owner)?;
        let mint = parse_pubkey(mint)?;

        self.blocking(move |client| {
            client
                .get_token_accounts_by_owner(&owner, TokenAccountsFilter::Mint(mint))
                .map(|accounts| accounts.into_iter().map(|keyed| keyed.pubkey).collect())
                .map_err(classify_client_error)
        })
        .await
    }

    async fn token_account_balance(&self, account: &str) -> Result<u64, LedgerError> {
        let account = parse_pubkey(account)?;
        self.blocking(move |client| {
            client
                .get_token_account_balance(&account)
                .map_err(classify_client_error)
                .and_then(|balance| parse_amount(&balance.amount))
        })
        .await
    }

    async fn token_supply(&self, mint: &str) -> Result<u64, LedgerError> {
        let mint = parse_pubkey(mint)?;
        self.blocking(move |client| {
            client
                .get_token_supply(&mint)
                .map_err(classify_client_error)
                .and_then(|supply| parse_amount(&supply.amount))
        })
        .await
    }
}

fn parse_commitment(level: &str) -> CommitmentConfig {
    match level.to_lowercase().as_str() {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

fn parse_pubkey(address: &str) -> Result<Pubkey, LedgerError> {
    Pubkey::from_str(address)
        .map_err(|e| LedgerError::InvalidParams(format!("invalid address {}: {}", address, e)))
}

fn parse_signature(signature: &str) -> Result<Signature, LedgerError> {
    Signature::from_str(signature)
        .map_err(|e| LedgerError::InvalidParams(format!("invalid signature {}: {}", signature, e)))
}

fn parse_amount(amount: &str) -> Result<u64, LedgerError> {
    amount
        .parse::<u64>()
        .map_err(|e| LedgerError::Parse(format!("token amount {:?}: {}", amount, e)))
}

/// Balance records that carry an owner; ownerless records cannot be attributed
fn token_balances(
    balances: OptionSerializer<Vec<UiTransactionTokenBalance>>,
) -> Result<Vec<TokenBalanceEntry>, LedgerError> {
    let OptionSerializer::Some(balances) = balances else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(balances.len());
    for balance in balances {
        if let OptionSerializer::Some(owner) = balance.owner {
            entries.push(TokenBalanceEntry {
                owner,
                mint: balance.mint,
                amount: parse_amount(&balance.ui_token_amount.amount)?,
            });
        }
    }
    Ok(entries)
}

/// Map a client error onto the transient/permanent split
fn classify_client_error(err: ClientError) -> LedgerError {
    match err.kind() {
        ClientErrorKind::Reqwest(e) => {
            if e.is_timeout() {
                LedgerError::Timeout
            } else if e.status().map(|s| s.as_u16()) == Some(429) {
                LedgerError::RateLimited
            } else {
                LedgerError::Network(e.to_string())
            }
        }
        ClientErrorKind::Io(e) => LedgerError::Network(e.to_string()),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
            classify_rpc_code(*code, message)
        }
        _ => classify_message(&err.to_string()),
    }
}

fn classify_rpc_code(code: i64, message: &str) -> LedgerError {
    if RPC_RATE_LIMIT_CODES.contains(&code) {
        LedgerError::RateLimited
    } else if code == RPC_INVALID_PARAMS {
        LedgerError::InvalidParams(message.to_string())
    } else if RPC_NOT_AVAILABLE_CODES.contains(&code) {
        LedgerError::NotFound(message.to_string())
    } else {
        classify_message(&format!("{} (code {})", message, code))
    }
}

fn classify_message(message: &str) -> LedgerError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("429")
        || lowered.contains("too many requests")
        || lowered.contains("rate limit")
    {
        LedgerError::RateLimited
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        LedgerError::Timeout
    } else if lowered.contains("connection") || lowered.contains("broken pipe") {
        LedgerError::Network(message.to_string())
    } else {
        LedgerError::Rpc(message.to_string())
    }
}
