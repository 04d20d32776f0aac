use crate::error::{MintError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Sale configuration as stored in the database.
///
/// Immutable once registered; purchases snapshot `price` from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleConfig {
    pub contract_address: String,
    pub price: Decimal,
    pub min_amount_per_address: u64,
    pub max_amount_per_address: u64,
    pub global_cap: Option<u64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SaleConfig {
    /// Sale window is `[start_time, end_time)`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// Token metadata registered alongside a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: u64,
}

/// Append-only ledger entry, one per accepted purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: String,
    pub contract_address: String,
    pub buyer_address: String,
    pub amount: u64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn total_cost(&self) -> Decimal {
        self.price
            .checked_mul(Decimal::from(self.amount))
            .unwrap_or(Decimal::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Pending,
    Success,
    Failed,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Success => "success",
            ContractStatus::Failed => "failed",
        }
    }
}

impl FromStr for ContractStatus {
    type Err = MintError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(ContractStatus::Pending),
            "success" => Ok(ContractStatus::Success),
            "failed" => Ok(ContractStatus::Failed),
            other => Err(MintError::Internal(format!(
                "unknown contract status: {}",
                other
            ))),
        }
    }
}

/// Bookkeeping for one deployment attempt. Failed attempts are kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub id: String,
    pub wallet_address: String,
    pub contract_address: Option<String>,
    pub status: ContractStatus,
    pub signature: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the active sales listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSale {
    pub contract_address: String,
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub max_amount_per_address: u64,
    pub global_cap: Option<u64>,
    pub end_time: DateTime<Utc>,
    pub total_supply: u64,
}

/// Single sale projection including one buyer's consumed quota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: SaleConfig,
    #[serde(flatten)]
    pub token: TokenInfo,
    pub total_sold: u64,
    pub consumed_by_buyer: u64,
}

#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// How long a connection waits for the write lock before failing
    pub busy_timeout: Duration,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// What a write transaction closure wants done with its work.
#[derive(Debug)]
pub enum TxnDecision<T> {
    Commit(T),
    Rollback(T),
}

const SALE_COLUMNS: &str = "s.contract_address, s.price, s.min_amount_per_address, \
     s.max_amount_per_address, s.global_cap, s.start_time_ms, s.end_time_ms, s.created_at_ms";

const PURCHASE_COLUMNS: &str =
    "id, contract_address, buyer_address, amount, price, timestamp_ms";

const CONTRACT_COLUMNS: &str = "id, wallet_address, contract_address, status, signature, error, \
     created_at_ms, updated_at_ms";

pub struct LedgerStore {
    db_path: PathBuf,
    options: LedgerOptions,
}

impl LedgerStore {
    pub fn open(db_path: impl Into<PathBuf>, options: LedgerOptions) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path, options };
        store.init_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!(
            "Opened ledger {:?} (journal_mode={})",
            self.db_path,
            journal_mode
        );

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sale_configs (
                contract_address TEXT PRIMARY KEY,
                price TEXT NOT NULL,
                min_amount_per_address INTEGER NOT NULL,
                max_amount_per_address INTEGER NOT NULL,
                global_cap INTEGER,
                start_time_ms INTEGER NOT NULL,
                end_time_ms INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sale_configs_window
             ON sale_configs(start_time_ms, end_time_ms)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                contract_address TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                total_supply INTEGER NOT NULL,
                FOREIGN KEY (contract_address) REFERENCES sale_configs(contract_address)
            )",
            [],
        )?;

        // Append-only: rows are inserted by the purchase path and never updated
        conn.execute(
            "CREATE TABLE IF NOT EXISTS purchase_records (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                contract_address TEXT NOT NULL,
                buyer_address TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                price TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                FOREIGN KEY (contract_address) REFERENCES sale_configs(contract_address)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_purchase_records_buyer
             ON purchase_records(contract_address, buyer_address)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contracts (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                wallet_address TEXT NOT NULL,
                contract_address TEXT UNIQUE,
                status TEXT NOT NULL,
                signature TEXT,
                error TEXT,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contracts_wallet ON contracts(wallet_address)",
            [],
        )?;

        Ok(())
    }

    /// Run `f` inside a serializable write transaction.
    ///
    /// The transaction takes the database write lock up front (`BEGIN
    /// IMMEDIATE`), so reads performed by `f` cannot be invalidated by a
    /// concurrent writer before commit. Errors, [`TxnDecision::Rollback`] and
    /// an expired `deadline` all roll back; nothing becomes visible unless the
    /// commit succeeds.
    pub fn transact<T, F>(&self, deadline: Option<Instant>, f: F) -> Result<T>
    where
        F: FnOnce(&LedgerTxn<'_>) -> Result<TxnDecision<T>>,
    {
        let mut conn = self.get_conn()?;

        if let Some(deadline) = deadline {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|remaining| !remaining.is_zero())
                .ok_or(MintError::DeadlineExceeded)?;
            conn.busy_timeout(remaining.min(self.options.busy_timeout))?;
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|error| deadline_or(error, deadline))?;
        let txn = LedgerTxn { tx };

        match f(&txn)? {
            TxnDecision::Commit(value) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    // dropping txn rolls back
                    return Err(MintError::DeadlineExceeded);
                }
                txn.tx
                    .commit()
                    .map_err(|error| deadline_or(error, deadline))?;
                Ok(value)
            }
            TxnDecision::Rollback(value) => {
                txn.tx.rollback()?;
                Ok(value)
            }
        }
    }

    pub fn get_sale(&self, contract_address: &str) -> Result<Option<SaleConfig>> {
        let conn = self.get_conn()?;
        query_sale(&conn, contract_address)
    }

    pub fn get_token(&self, contract_address: &str) -> Result<Option<TokenInfo>> {
        let conn = self.get_conn()?;
        query_token(&conn, contract_address)
    }

    /// Sales whose window contains `now`, newest registration first
    pub fn list_active_sales(&self, now: DateTime<Utc>) -> Result<Vec<SaleConfig>> {
        let conn = self.get_conn()?;
        let now_ms = now.timestamp_millis();

        let mut stmt = conn.prepare(&format!(
            "SELECT {SALE_COLUMNS}
             FROM sale_configs s
             WHERE s.start_time_ms <= ?1 AND s.end_time_ms > ?1
             ORDER BY s.created_at_ms DESC, s.rowid DESC"
        ))?;

        let rows = stmt.query_map([now_ms], sale_from_row)?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(row?);
        }

        Ok(sales)
    }

    /// Active sales joined with their token metadata
    pub fn list_active_sale_views(&self, now: DateTime<Utc>) -> Result<Vec<ActiveSale>> {
        let conn = self.get_conn()?;
        let now_ms = now.timestamp_millis();

        let mut stmt = conn.prepare(
            "SELECT s.contract_address, t.name, t.symbol, s.price,
                    s.max_amount_per_address, s.global_cap, s.end_time_ms, t.total_supply
             FROM sale_configs s
             JOIN tokens t ON t.contract_address = s.contract_address
             WHERE s.start_time_ms <= ?1 AND s.end_time_ms > ?1
             ORDER BY s.created_at_ms DESC, s.rowid DESC",
        )?;

        let rows = stmt.query_map([now_ms], |row| {
            Ok(ActiveSale {
                contract_address: row.get(0)?,
                name: row.get(1)?,
                symbol: row.get(2)?,
                price: decimal_column(row, 3)?,
                max_amount_per_address: row.get(4)?,
                global_cap: row.get(5)?,
                end_time: time_column(row, 6)?,
                total_supply: row.get(7)?,
            })
        })?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(row?);
        }

        Ok(sales)
    }

    /// Sale, token and aggregates read from one snapshot.
    ///
    /// An empty `buyer_address` reports zero consumption.
    pub fn sale_detail(
        &self,
        contract_address: &str,
        buyer_address: &str,
    ) -> Result<Option<SaleDetail>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let Some(sale) = query_sale(&tx, contract_address)? else {
            return Ok(None);
        };

        let token = query_token(&tx, contract_address)?.ok_or_else(|| {
            MintError::Internal(format!(
                "token metadata missing for sale {}",
                contract_address
            ))
        })?;

        let total_sold = query_total_sold(&tx, contract_address)?;
        let consumed_by_buyer = if buyer_address.is_empty() {
            0
        } else {
            query_consumed(&tx, contract_address, buyer_address)?
        };

        tx.finish()?;

        Ok(Some(SaleDetail {
            sale,
            token,
            total_sold,
            consumed_by_buyer,
        }))
    }

    /// Ledger entries for a sale, newest first, optionally for one buyer
    pub fn list_purchases(
        &self,
        contract_address: &str,
        buyer_address: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let conn = self.get_conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut records = Vec::new();
        match buyer_address {
            Some(buyer) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PURCHASE_COLUMNS} FROM purchase_records
                     WHERE contract_address = ?1 AND buyer_address = ?2
                     ORDER BY pk DESC LIMIT ?3"
                ))?;
                let rows =
                    stmt.query_map(params![contract_address, buyer, limit], purchase_from_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PURCHASE_COLUMNS} FROM purchase_records
                     WHERE contract_address = ?1
                     ORDER BY pk DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![contract_address, limit], purchase_from_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
        }

        Ok(records)
    }

    pub fn count_purchases(&self, contract_address: &str) -> Result<u64> {
        let conn = self.get_conn()?;
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM purchase_records WHERE contract_address = ?1",
            [contract_address],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // === Contract records ===

    pub fn insert_contract(&self, record: &ContractRecord) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "INSERT INTO contracts (
                id, wallet_address, contract_address, status, signature, error,
                created_at_ms, updated_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.wallet_address,
                record.contract_address,
                record.status.as_str(),
                record.signature,
                record.error,
                record.created_at.timestamp_millis(),
                record.updated_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    pub fn mark_contract_deployed(
        &self,
        id: &str,
        contract_address: &str,
        signature: &str,
        at: DateTime<Utc>,
    ) -> Result<ContractRecord> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            "UPDATE contracts
             SET status = ?1, contract_address = ?2, signature = ?3, error = NULL,
                 updated_at_ms = ?4
             WHERE id = ?5",
            params![
                ContractStatus::Success.as_str(),
                contract_address,
                signature,
                at.timestamp_millis(),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(MintError::NotFound(format!("contract record {}", id)));
        }

        query_contract(&conn, "id", id)?
            .ok_or_else(|| MintError::NotFound(format!("contract record {}", id)))
    }

    pub fn mark_contract_failed(
        &self,
        id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<ContractRecord> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            "UPDATE contracts SET status = ?1, error = ?2, updated_at_ms = ?3 WHERE id = ?4",
            params![
                ContractStatus::Failed.as_str(),
                error,
                at.timestamp_millis(),
                id
            ],
        )?;

        if affected == 0 {
            return Err(MintError::NotFound(format!("contract record {}", id)));
        }

        query_contract(&conn, "id", id)?
            .ok_or_else(|| MintError::NotFound(format!("contract record {}", id)))
    }

    pub fn get_contract_by_address(&self, contract_address: &str) -> Result<Option<ContractRecord>> {
        let conn = self.get_conn()?;
        query_contract(&conn, "contract_address", contract_address)
    }

    pub fn list_contracts_by_wallet(&self, wallet_address: &str) -> Result<Vec<ContractRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts
             WHERE wallet_address = ?1
             ORDER BY created_at_ms DESC, pk DESC"
        ))?;

        let rows = stmt.query_map([wallet_address], contract_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }

        Ok(records)
    }
}

/// Write-transaction view handed to [`LedgerStore::transact`] closures.
///
/// Every aggregate is recomputed from the ledger on each call.
pub struct LedgerTxn<'conn> {
    tx: Transaction<'conn>,
}

impl LedgerTxn<'_> {
    pub fn get_sale(&self, contract_address: &str) -> Result<Option<SaleConfig>> {
        query_sale(&self.tx, contract_address)
    }

    pub fn sale_exists(&self, contract_address: &str) -> Result<bool> {
        let found: Option<i64> = self
            .tx
            .query_row(
                "SELECT 1 FROM sale_configs WHERE contract_address = ?1",
                [contract_address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn consumed_by(&self, contract_address: &str, buyer_address: &str) -> Result<u64> {
        query_consumed(&self.tx, contract_address, buyer_address)
    }

    pub fn total_sold(&self, contract_address: &str) -> Result<u64> {
        query_total_sold(&self.tx, contract_address)
    }

    pub fn insert_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        self.tx.execute(
            "INSERT INTO purchase_records (
                id, contract_address, buyer_address, amount, price, timestamp_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.contract_address,
                record.buyer_address,
                record.amount,
                record.price.to_string(),
                record.timestamp.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_sale(&self, sale: &SaleConfig, token: &TokenInfo) -> Result<()> {
        self.tx.execute(
            "INSERT INTO sale_configs (
                contract_address, price, min_amount_per_address, max_amount_per_address,
                global_cap, start_time_ms, end_time_ms, created_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                sale.contract_address,
                sale.price.to_string(),
                sale.min_amount_per_address,
                sale.max_amount_per_address,
                sale.global_cap,
                sale.start_time.timestamp_millis(),
                sale.end_time.timestamp_millis(),
                sale.created_at.timestamp_millis(),
            ],
        )?;

        self.tx.execute(
            "INSERT INTO tokens (contract_address, name, symbol, decimals, total_supply)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sale.contract_address,
                token.name,
                token.symbol,
                token.decimals,
                token.total_supply,
            ],
        )?;

        Ok(())
    }
}

fn deadline_or(error: rusqlite::Error, deadline: Option<Instant>) -> MintError {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => MintError::DeadlineExceeded,
        _ => MintError::Database(error),
    }
}

fn query_sale(conn: &Connection, contract_address: &str) -> Result<Option<SaleConfig>> {
    let sale = conn
        .query_row(
            &format!("SELECT {SALE_COLUMNS} FROM sale_configs s WHERE s.contract_address = ?1"),
            [contract_address],
            sale_from_row,
        )
        .optional()?;
    Ok(sale)
}

fn query_token(conn: &Connection, contract_address: &str) -> Result<Option<TokenInfo>> {
    let token = conn
        .query_row(
            "SELECT name, symbol, decimals, total_supply FROM tokens WHERE contract_address = ?1",
            [contract_address],
            |row| {
                Ok(TokenInfo {
                    name: row.get(0)?,
                    symbol: row.get(1)?,
                    decimals: row.get(2)?,
                    total_supply: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(token)
}

fn query_consumed(conn: &Connection, contract_address: &str, buyer_address: &str) -> Result<u64> {
    let consumed: u64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM purchase_records
         WHERE contract_address = ?1 AND buyer_address = ?2",
        [contract_address, buyer_address],
        |row| row.get(0),
    )?;
    Ok(consumed)
}

/// Sums per buyer in SQL and across buyers in Rust.
///
/// A buyer's sum is bounded by `max_amount_per_address`, which fits in an
/// SQLite integer; the sale-wide total of an uncapped sale may not, so it
/// saturates at `u64::MAX` instead of failing with "integer overflow".
fn query_total_sold(conn: &Connection, contract_address: &str) -> Result<u64> {
    let mut stmt = conn.prepare(
        "SELECT SUM(amount) FROM purchase_records
         WHERE contract_address = ?1
         GROUP BY buyer_address",
    )?;

    let rows = stmt.query_map([contract_address], |row| row.get::<_, u64>(0))?;

    let mut total: u64 = 0;
    for row in rows {
        total = total.saturating_add(row?);
    }

    Ok(total)
}

fn query_contract(conn: &Connection, key_column: &str, key: &str) -> Result<Option<ContractRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE {key_column} = ?1"),
            [key],
            contract_from_row,
        )
        .optional()?;
    record.transpose()
}

fn sale_from_row(row: &Row<'_>) -> rusqlite::Result<SaleConfig> {
    Ok(SaleConfig {
        contract_address: row.get(0)?,
        price: decimal_column(row, 1)?,
        min_amount_per_address: row.get(2)?,
        max_amount_per_address: row.get(3)?,
        global_cap: row.get(4)?,
        start_time: time_column(row, 5)?,
        end_time: time_column(row, 6)?,
        created_at: time_column(row, 7)?,
    })
}

fn purchase_from_row(row: &Row<'_>) -> rusqlite::Result<PurchaseRecord> {
    Ok(PurchaseRecord {
        id: row.get(0)?,
        contract_address: row.get(1)?,
        buyer_address: row.get(2)?,
        amount: row.get(3)?,
        price: decimal_column(row, 4)?,
        timestamp: time_column(row, 5)?,
    })
}

// Status parsing is a domain error, not a column conversion error.
fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<Result<ContractRecord>> {
    let status: String = row.get(3)?;
    let id: String = row.get(0)?;
    let wallet_address: String = row.get(1)?;
    let contract_address: Option<String> = row.get(2)?;
    let signature: Option<String> = row.get(4)?;
    let error: Option<String> = row.get(5)?;
    let created_at = time_column(row, 6)?;
    let updated_at = time_column(row, 7)?;

    Ok(status.parse::<ContractStatus>().map(|status| ContractRecord {
        id,
        wallet_address,
        contract_address,
        status,
        signature,
        error,
        created_at,
        updated_at,
    }))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(
        idx, millis,
    ))
}

/// Drop sub-millisecond precision so values survive a store round trip.
pub fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn open_store() -> (tempfile::TempDir, LedgerStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store =
            LedgerStore::open(temp_dir.path().join("ledger.db"), LedgerOptions::default()).unwrap();
        (temp_dir, store)
    }

    fn sample_sale(address: &str, created_at: DateTime<Utc>) -> SaleConfig {
        let now = truncate_to_millis(Utc::now());
        SaleConfig {
            contract_address: address.to_string(),
            price: Decimal::from_str("0.25").unwrap(),
            min_amount_per_address: 1,
            max_amount_per_address: 100,
            global_cap: Some(150),
            start_time: now - ChronoDuration::hours(1),
            end_time: now + ChronoDuration::hours(1),
            created_at: truncate_to_millis(created_at),
        }
    }

    fn sample_token() -> TokenInfo {
        TokenInfo {
            name: "Pump".to_string(),
            symbol: "PMP".to_string(),
            decimals: 9,
            total_supply: 1_000_000,
        }
    }

    fn insert_sale(store: &LedgerStore, sale: &SaleConfig) {
        store
            .transact(None, |txn| {
                txn.insert_sale(sale, &sample_token())?;
                Ok(TxnDecision::Commit(()))
            })
            .unwrap();
    }

    fn purchase(address: &str, buyer: &str, amount: u64) -> PurchaseRecord {
        PurchaseRecord {
            id: ulid::Ulid::new().to_string(),
            contract_address: address.to_string(),
            buyer_address: buyer.to_string(),
            amount,
            price: Decimal::from_str("0.25").unwrap(),
            timestamp: truncate_to_millis(Utc::now()),
        }
    }

    #[test]
    fn test_sale_round_trip() {
        let (_dir, store) = open_store();
        let sale = sample_sale("sale-1", Utc::now());
        insert_sale(&store, &sale);

        let loaded = store.get_sale("sale-1").unwrap().unwrap();
        assert_eq!(loaded, sale);
        assert_eq!(store.get_token("sale-1").unwrap().unwrap(), sample_token());
        assert!(store.get_sale("missing").unwrap().is_none());
    }

    #[test]
    fn test_rollback_leaves_no_rows() {
        let (_dir, store) = open_store();
        insert_sale(&store, &sample_sale("sale-1", Utc::now()));

        let result = store
            .transact(None, |txn| {
                txn.insert_purchase(&purchase("sale-1", "buyer", 10))?;
                Ok(TxnDecision::Rollback("rejected"))
            })
            .unwrap();
        assert_eq!(result, "rejected");
        assert_eq!(store.count_purchases("sale-1").unwrap(), 0);

        let failed: Result<()> = store.transact(None, |txn| {
            txn.insert_purchase(&purchase("sale-1", "buyer", 10))?;
            Err(MintError::Internal("boom".to_string()))
        });
        assert!(failed.is_err());
        assert_eq!(store.count_purchases("sale-1").unwrap(), 0);
    }

    #[test]
    fn test_expired_deadline_rolls_back() {
        let (_dir, store) = open_store();
        insert_sale(&store, &sample_sale("sale-1", Utc::now()));

        let expired = Instant::now();
        let result = store.transact(Some(expired), |txn| {
            txn.insert_purchase(&purchase("sale-1", "buyer", 10))?;
            Ok(TxnDecision::Commit(()))
        });
        assert!(matches!(result, Err(MintError::DeadlineExceeded)));

        // deadline passes while the closure runs
        let deadline = Instant::now() + Duration::from_millis(50);
        let result = store.transact(Some(deadline), |txn| {
            txn.insert_purchase(&purchase("sale-1", "buyer", 10))?;
            std::thread::sleep(Duration::from_millis(80));
            Ok(TxnDecision::Commit(()))
        });
        assert!(matches!(result, Err(MintError::DeadlineExceeded)));
        assert_eq!(store.count_purchases("sale-1").unwrap(), 0);
    }

    #[test]
    fn test_aggregates_and_detail() {
        let (_dir, store) = open_store();
        insert_sale(&store, &sample_sale("sale-1", Utc::now()));

        store
            .transact(None, |txn| {
                txn.insert_purchase(&purchase("sale-1", "alice", 10))?;
                txn.insert_purchase(&purchase("sale-1", "alice", 5))?;
                txn.insert_purchase(&purchase("sale-1", "bob", 7))?;
                assert_eq!(txn.consumed_by("sale-1", "alice")?, 15);
                assert_eq!(txn.total_sold("sale-1")?, 22);
                Ok(TxnDecision::Commit(()))
            })
            .unwrap();

        let detail = store.sale_detail("sale-1", "alice").unwrap().unwrap();
        assert_eq!(detail.consumed_by_buyer, 15);
        assert_eq!(detail.total_sold, 22);

        let anonymous = store.sale_detail("sale-1", "").unwrap().unwrap();
        assert_eq!(anonymous.consumed_by_buyer, 0);

        assert!(store.sale_detail("missing", "alice").unwrap().is_none());

        let history = store.list_purchases("sale-1", Some("alice"), 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, 5);
        assert_eq!(history[0].total_cost(), Decimal::from_str("1.25").unwrap());
    }

    #[test]
    fn test_total_sold_beyond_sqlite_integer_range() {
        let (_dir, store) = open_store();
        let mut sale = sample_sale("sale-1", Utc::now());
        sale.max_amount_per_address = i64::MAX as u64;
        sale.global_cap = None;
        insert_sale(&store, &sale);

        store
            .transact(None, |txn| {
                txn.insert_purchase(&purchase("sale-1", "alice", i64::MAX as u64))?;
                txn.insert_purchase(&purchase("sale-1", "bob", 2))?;
                assert_eq!(txn.total_sold("sale-1")?, i64::MAX as u64 + 2);
                Ok(TxnDecision::Commit(()))
            })
            .unwrap();

        let detail = store.sale_detail("sale-1", "bob").unwrap().unwrap();
        assert_eq!(detail.total_sold, i64::MAX as u64 + 2);
        assert_eq!(detail.consumed_by_buyer, 2);
    }

    #[test]
    fn test_active_listing_window_and_order() {
        let (_dir, store) = open_store();
        let now = Utc::now();

        insert_sale(&store, &sample_sale("older", now - ChronoDuration::minutes(5)));
        insert_sale(&store, &sample_sale("newer", now));

        let mut ended = sample_sale("ended", now);
        ended.start_time = truncate_to_millis(now - ChronoDuration::hours(3));
        ended.end_time = truncate_to_millis(now - ChronoDuration::hours(1));
        insert_sale(&store, &ended);

        let active = store.list_active_sales(now).unwrap();
        let addresses: Vec<&str> = active.iter().map(|s| s.contract_address.as_str()).collect();
        assert_eq!(addresses, vec!["newer", "older"]);

        let views = store.list_active_sale_views(now).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].symbol, "PMP");
        assert_eq!(views[0].global_cap, Some(150));
    }

    #[test]
    fn test_contract_lifecycle() {
        let (_dir, store) = open_store();
        let now = truncate_to_millis(Utc::now());
        let record = ContractRecord {
            id: "c1".to_string(),
            wallet_address: "wallet".to_string(),
            contract_address: None,
            status: ContractStatus::Pending,
            signature: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_contract(&record).unwrap();

        let deployed = store
            .mark_contract_deployed("c1", "addr-1", "sig-1", now)
            .unwrap();
        assert_eq!(deployed.status, ContractStatus::Success);
        assert_eq!(deployed.contract_address.as_deref(), Some("addr-1"));

        let by_address = store.get_contract_by_address("addr-1").unwrap().unwrap();
        assert_eq!(by_address.id, "c1");

        let failed = ContractRecord {
            id: "c2".to_string(),
            ..record
        };
        store.insert_contract(&failed).unwrap();
        let failed = store.mark_contract_failed("c2", "rpc down", now).unwrap();
        assert_eq!(failed.status, ContractStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("rpc down"));

        assert_eq!(store.list_contracts_by_wallet("wallet").unwrap().len(), 2);
        assert!(matches!(
            store.mark_contract_failed("missing", "x", now),
            Err(MintError::NotFound(_))
        ));
    }
}
