use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::domain::{Holder, SignatureRecord, Token};
use crate::ports::{StorageError, StoragePort};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Balances are full-range u64 base units, kept as decimal TEXT
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS token (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    address          TEXT NOT NULL UNIQUE,
    update_authority TEXT,
    deploy_signature TEXT
);

CREATE TABLE IF NOT EXISTS signature (
    signature  TEXT PRIMARY KEY,
    slot       INTEGER NOT NULL,
    block_time INTEGER,
    token_id   INTEGER NOT NULL REFERENCES token(id)
);

CREATE INDEX IF NOT EXISTS idx_signature_token_slot
    ON signature(token_id, slot, signature);

CREATE TABLE IF NOT EXISTS holder (
    address         TEXT NOT NULL,
    token_id        INTEGER NOT NULL REFERENCES token(id),
    initial_balance TEXT NOT NULL,
    current_balance TEXT NOT NULL,
    last_checked    TEXT NOT NULL,
    stale           INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (address, token_id)
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Database(format!("create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }

    fn token_by_address(conn: &Connection, address: &str) -> Result<Option<Token>, StorageError> {
        conn.query_row(
            "SELECT id, address, update_authority, deploy_signature FROM token WHERE address = ?1",
            params![address],
            token_from_row,
        )
        .optional()
        .map_err(db_err)
    }
}

impl StoragePort for SqliteStore {
    fn get_or_create_token(&self, address: &str) -> Result<Token, StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO token (address) VALUES (?1) ON CONFLICT(address) DO NOTHING",
            params![address],
        )
        .map_err(db_err)?;
        Self::token_by_address(&conn, address)?
            .ok_or_else(|| StorageError::NotFound(format!("token {}", address)))
    }

    fn find_token(&self, address: &str) -> Result<Option<Token>, StorageError> {
        let conn = self.lock()?;
        Self::token_by_address(&conn, address)
    }

    fn list_tokens(&self) -> Result<Vec<Token>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, address, update_authority, deploy_signature FROM token ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map([], token_from_row).map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn set_update_authority(&self, token_id: i64, authority: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE token SET update_authority = ?1 WHERE id = ?2",
                params![authority, token_id],
            )
            .map_err(db_err)?;
        expect_row(changed, || format!("token #{}", token_id))
    }

    fn set_deploy_signature(&self, token_id: i64, signature: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE token SET deploy_signature = ?1 WHERE id = ?2",
                params![signature, token_id],
            )
            .map_err(db_err)?;
        expect_row(changed, || format!("token #{}", token_id))
    }

    fn insert_signatures(&self, batch: &[SignatureRecord]) -> Result<usize, StorageError> {
        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls the whole batch back
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO signature (signature, slot, block_time, token_id)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err)?;
            for record in batch {
                let slot = to_i64(record.slot, "slot")?;
                let row = params![record.signature, slot, record.block_time, record.token_id];
                match stmt.execute(row) {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => {
                        return Err(StorageError::Duplicate {
                            table: "signature",
                            key: record.signature.clone(),
                        })
                    }
                    Err(e) => return Err(db_err(e)),
                }
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(batch.len())
    }

    fn signatures_chronological(
        &self,
        token_id: i64,
    ) -> Result<Vec<SignatureRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT signature, slot, block_time, token_id FROM signature
                 WHERE token_id = ?1 ORDER BY slot ASC, signature ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![token_id], |row| {
                Ok(SignatureRecord {
                    signature: row.get(0)?,
                    slot: row.get::<_, i64>(1)? as u64,
                    block_time: row.get(2)?,
                    token_id: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn insert_holder(&self, holder: &Holder) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO holder
                 (address, token_id, initial_balance, current_balance, last_checked, stale)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                holder.address,
                holder.token_id,
                holder.initial_balance.to_string(),
                holder.current_balance.to_string(),
                holder.last_checked.to_rfc3339(),
                holder.stale,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Duplicate {
                table: "holder",
                key: format!("{}/{}", holder.address, holder.token_id),
            }),
            Err(e) => Err(db_err(e)),
        }
    }

    fn holders(&self, token_id: i64) -> Result<Vec<Holder>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT address, token_id, initial_balance, current_balance, last_checked, stale
                 FROM holder WHERE token_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![token_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            })
            .map_err(db_err)?;

        let mut holders = Vec::new();
        for row in rows {
            let (address, token_id, initial, current, checked, stale) = row.map_err(db_err)?;
            let last_checked = DateTime::parse_from_rfc3339(&checked)
                .map_err(|e| StorageError::Database(format!("last_checked {:?}: {}", checked, e)))?
                .with_timezone(&Utc);
            holders.push(Holder {
                address,
                token_id,
                initial_balance: parse_balance(&initial, "initial_balance")?,
                current_balance: parse_balance(&current, "current_balance")?,
                last_checked,
                stale,
            });
        }
        Ok(holders)
    }

    fn update_holder_balance(
        &self,
        address: &str,
        token_id: i64,
        balance: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE holder SET current_balance = ?1, last_checked = ?2, stale = 0
                 WHERE address = ?3 AND token_id = ?4",
                params![balance.to_string(), checked_at.to_rfc3339(), address, token_id],
            )
            .map_err(db_err)?;
        expect_row(changed, || format!("holder {}/{}", address, token_id))
    }

    fn mark_holder_stale(
        &self,
        address: &str,
        token_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE holder SET stale = 1, last_checked = ?1
                 WHERE address = ?2 AND token_id = ?3",
                params![checked_at.to_rfc3339(), address, token_id],
            )
            .map_err(db_err)?;
        expect_row(changed, || format!("holder {}/{}", address, token_id))
    }
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        address: row.get(1)?,
        update_authority: row.get(2)?,
        deploy_signature: row.get(3)?,
    })
}

fn db_err(err: rusqlite::Error) -> StorageError {
    StorageError::Database(err.to_string())
}

fn to_i64(value: u64, field: &str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::OutOfRange(format!("{} = {}", field, value)))
}

fn parse_balance(text: &str, field: &str) -> Result<u64, StorageError> {
    text.parse()
        .map_err(|e| StorageError::Database(format!("{} {:?}: {}", field, text, e)))
}

fn expect_row(changed: usize, what: impl FnOnce() -> String) -> Result<(), StorageError> {
    if changed == 0 {
        Err(StorageError::NotFound(what()))
    } else {
        Ok(())
    }
}

/// Primary key or UNIQUE violations; foreign key failures are not duplicates
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            code.code == ErrorCode::ConstraintViolation
                && matches!(
                    code.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}
