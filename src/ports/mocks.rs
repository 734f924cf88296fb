//! In-memory ledger for tests
//!
//! Serves a static ledger from builder-supplied fixtures and replays
//! scripted failures, recording every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::ledger::{LedgerError, LedgerPort};
use super::models::{SignatureInfo, TransactionRecord};

pub const SIGNATURES: &str = "signatures";
pub const TRANSACTION: &str = "transaction";
pub const ACCOUNT_DATA: &str = "account_data";
pub const TOKEN_ACCOUNTS: &str = "token_accounts";
pub const BALANCE: &str = "balance";
pub const SUPPLY: &str = "supply";

/// Mock ledger port that records calls and allows controlled responses
#[derive(Debug, Default, Clone)]
pub struct MockLedger {
    calls: Arc<Mutex<Vec<String>>>,
    /// Address -> full signature history, newest first
    histories: Arc<Mutex<HashMap<String, Vec<SignatureInfo>>>>,
    transactions: Arc<Mutex<HashMap<String, TransactionRecord>>>,
    account_data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    token_accounts: Arc<Mutex<HashMap<(String, String), Vec<String>>>>,
    balances: Arc<Mutex<HashMap<String, u64>>>,
    supplies: Arc<Mutex<HashMap<String, u64>>>,
    /// "method:key" -> errors returned before the fixture is served
    failures: Arc<Mutex<HashMap<String, VecDeque<LedgerError>>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the signature history of an address (newest first)
    pub fn with_history(self, address: &str, history: Vec<SignatureInfo>) -> Self {
        self.histories.lock().unwrap().insert(address.to_string(), history);
        self
    }

    pub fn with_transaction(self, tx: TransactionRecord) -> Self {
        self.transactions.lock().unwrap().insert(tx.signature.clone(), tx);
        self
    }

    pub fn with_account_data(self, address: &str, data: Vec<u8>) -> Self {
        self.account_data.lock().unwrap().insert(address.to_string(), data);
        self
    }

    pub fn with_token_accounts(self, owner: &str, mint: &str, accounts: &[&str]) -> Self {
        self.token_accounts.lock().unwrap().insert(
            (owner.to_string(), mint.to_string()),
            accounts.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    pub fn with_balance(self, account: &str, amount: u64) -> Self {
        self.balances.lock().unwrap().insert(account.to_string(), amount);
        self
    }

    pub fn with_supply(self, mint: &str, supply: u64) -> Self {
        self.supplies.lock().unwrap().insert(mint.to_string(), supply);
        self
    }

    /// Builder method to make the next call of `method` for `key` fail with `error`.
    /// Calling it repeatedly queues several failures.
    pub fn with_failure(self, method: &str, key: &str, error: LedgerError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(format!("{}:{}", method, key))
            .or_default()
            .push_back(error);
        self
    }

    /// Get all recorded calls as "method:key"
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls of one method
    pub fn call_count(&self, method: &str) -> usize {
        let prefix = format!("{}:", method);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn record(&self, method: &str, key: &str) -> Result<(), LedgerError> {
        let id = format!("{}:{}", method, key);
        self.calls.lock().unwrap().push(id.clone());
        match self.failures.lock().unwrap().get_mut(&id).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerPort for MockLedger {
    async fn signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        self.record(SIGNATURES, address)?;
        let histories = self.histories.lock().unwrap();
        let Some(history) = histories.get(address) else {
            return Ok(Vec::new());
        };
        let start = match before {
            Some(cursor) => match history.iter().position(|s| s.signature == cursor) {
                Some(idx) => idx + 1,
                None => {
                    return Err(LedgerError::InvalidParams(format!("unknown cursor {}", cursor)))
                }
            },
            None => 0,
        };
        Ok(history.iter().skip(start).take(limit).cloned().collect())
    }

    async fn transaction(&self, signature: &str) -> Result<TransactionRecord, LedgerError> {
        self.record(TRANSACTION, signature)?;
        self.transactions
            .lock()
            .unwrap()
            .get(signature)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", signature)))
    }

    async fn account_data(&self, address: &str) -> Result<Vec<u8>, LedgerError> {
        self.record(ACCOUNT_DATA, address)?;
        self.account_data
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", address)))
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<String>, LedgerError> {
        self.record(TOKEN_ACCOUNTS, owner)?;
        Ok(self
            .token_accounts
            .lock()
            .unwrap()
            .get(&(owner.to_string(), mint.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn token_account_balance(&self, account: &str) -> Result<u64, LedgerError> {
        self.record(BALANCE, account)?;
        self.balances
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(format!("token account {}", account)))
    }

    async fn token_supply(&self, mint: &str) -> Result<u64, LedgerError> {
        self.record(SUPPLY, mint)?;
        self.supplies
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .ok_or_else(|| LedgerError::InvalidParams(format!("{} is not a Token mint", mint)))
    }
}
