// ABOUTME: Database module exports for points-probe
// ABOUTME: Defines the PointsStore seam every command talks to, plus its PostgreSQL implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    BalanceSummary, ColumnInfo, ColumnPatch, LedgerRow, NewPointsTransaction, Notification,
    RecentChallenge, RecentTransaction, TableRef,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result of the transactional ledger backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillCommit {
    pub inserted_id: i64,
    /// False when update_user_points_balance failed and was rolled back to its savepoint
    pub ledger_synced: bool,
}

/// Every query the commands issue against the points database.
#[async_trait]
pub trait PointsStore: Send {
    /// Tables whose name contains `pattern`, ordered by schema then name
    async fn tables_like(&mut self, pattern: &str) -> Result<Vec<TableRef>, DbError>;

    /// Columns of one schema-qualified table in ordinal order
    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>, DbError>;

    /// Columns of `table` in the current schema, the one unqualified DDL resolves to
    async fn columns_named(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError>;

    /// Issue a single `ALTER TABLE .. ADD COLUMN` in autocommit mode
    async fn add_column(&mut self, table: &str, column: &ColumnPatch) -> Result<(), DbError>;

    async fn recent_challenges(&mut self, limit: u32) -> Result<Vec<RecentChallenge>, DbError>;

    async fn recent_transactions(&mut self, limit: u32)
        -> Result<Vec<RecentTransaction>, DbError>;

    async fn recent_points_transactions(
        &mut self,
        limit: u32,
    ) -> Result<Vec<RecentTransaction>, DbError>;

    /// Whether a table exists; unqualified names resolve through the search path
    async fn table_exists(&mut self, qualified: &str) -> Result<bool, DbError>;

    /// Create points_transactions and its indexes
    async fn create_points_table(&mut self) -> Result<(), DbError>;

    /// Add transaction_type, backfill NULLs, set NOT NULL and index it, all in one transaction
    async fn add_transaction_type_column(&mut self) -> Result<(), DbError>;

    async fn count_rows(&mut self, table: &str) -> Result<i64, DbError>;

    async fn ledger(&mut self, user_id: &str) -> Result<Option<LedgerRow>, DbError>;

    async fn count_user_transactions(&mut self, user_id: &str) -> Result<i64, DbError>;

    /// Insert the row and sync the ledger inside one transaction
    async fn apply_backfill(&mut self, tx: &NewPointsTransaction)
        -> Result<BackfillCommit, DbError>;

    async fn notifications(&mut self, user_id: &str) -> Result<Vec<Notification>, DbError>;

    async fn transaction_exists_on(
        &mut self,
        user_id: &str,
        amount: i64,
        day: NaiveDate,
    ) -> Result<bool, DbError>;

    async fn insert_points_transaction(&mut self, tx: &NewPointsTransaction)
        -> Result<i64, DbError>;

    /// Call the update_user_points_balance stored function
    async fn sync_ledger(&mut self, user_id: &str) -> Result<(), DbError>;

    async fn compute_balance(&mut self, user_id: &str) -> Result<BalanceSummary, DbError>;

    async fn upsert_ledger(&mut self, user_id: &str, summary: &BalanceSummary)
        -> Result<(), DbError>;
}

/// Quote an identifier for interpolation into DDL.
///
/// Only plain `[A-Za-z_][A-Za-z0-9_]*` names are accepted.
pub fn quote_ident(name: &str) -> Result<String, DbError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}
