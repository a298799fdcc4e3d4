// ABOUTME: In-memory PointsStore used by the command tests
// ABOUTME: Keeps tables as plain vectors and records every DDL statement it is asked to run

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::{BackfillCommit, DbError, PointsStore};
use crate::models::{
    BalanceSummary, ColumnInfo, ColumnPatch, LedgerRow, NewPointsTransaction, Notification,
    RecentChallenge, RecentTransaction, TableRef,
};

/// A stored points_transactions row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: i64,
    pub user_id: String,
    pub legacy_type: Option<String>,
    pub transaction_type: String,
    pub amount: i64,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Column lists keyed by table, in ordinal order
    pub tables: Vec<(TableRef, Vec<ColumnInfo>)>,
    pub challenges: Vec<(NaiveDateTime, RecentChallenge)>,
    pub transactions: Vec<(NaiveDateTime, RecentTransaction)>,
    pub points: Vec<StoredTransaction>,
    pub ledgers: HashMap<String, LedgerRow>,
    pub notifications: Vec<(String, Notification)>,
    /// Every DDL statement issued, in order
    pub ddl_log: Vec<String>,
    /// Column name whose ALTER should fail
    pub fail_alter_on: Option<String>,
    /// Whether update_user_points_balance exists
    pub ledger_function: bool,
    pub sync_calls: u32,
}

/// Schema unqualified table names resolve to
pub const CURRENT_SCHEMA: &str = "public";

pub fn column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable: true,
    }
}

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            ledger_function: true,
            ..Default::default()
        }
    }

    pub fn with_table(mut self, schema: &str, name: &str, columns: &[(&str, &str)]) -> Self {
        let table = TableRef {
            schema: schema.to_string(),
            name: name.to_string(),
        };
        let columns = columns.iter().map(|(n, t)| column(n, t)).collect();
        self.tables.push((table, columns));
        self
    }

    pub fn alter_count(&self) -> usize {
        self.ddl_log
            .iter()
            .filter(|s| s.starts_with("ALTER TABLE"))
            .count()
    }

    fn now(&self) -> NaiveDateTime {
        ts("2025-01-01 00:00:00")
    }

    fn columns_mut(&mut self, table: &str) -> Option<&mut Vec<ColumnInfo>> {
        self.tables
            .iter_mut()
            .find(|(t, _)| t.schema == CURRENT_SCHEMA && t.name == table)
            .map(|(_, cols)| cols)
    }

    fn insert(&mut self, tx: &NewPointsTransaction) -> i64 {
        let id = self.points.len() as i64 + 1;
        let created_at = tx.created_at.unwrap_or_else(|| self.now());
        self.points.push(StoredTransaction {
            id,
            user_id: tx.user_id.clone(),
            legacy_type: tx.legacy_type.map(str::to_string),
            transaction_type: tx.transaction_type.to_string(),
            amount: tx.amount,
            reason: tx.reason.clone(),
            created_at,
        });
        id
    }

    fn balance_of(&self, user_id: &str) -> BalanceSummary {
        let mut summary = BalanceSummary::default();
        for tx in self.points.iter().filter(|t| t.user_id == user_id) {
            match tx.transaction_type.as_str() {
                "earned_challenge" => {
                    summary.points_balance += tx.amount;
                    summary.total_earned += tx.amount;
                }
                "released_escrow" | "transferred_escrow" | "transferred_user" => {
                    summary.points_balance += tx.amount;
                }
                "burned_usage" => {
                    summary.points_balance -= tx.amount;
                    summary.total_burned += tx.amount;
                }
                "locked_escrow" => summary.points_balance -= tx.amount,
                _ => {}
            }
        }
        summary
    }

    fn store_ledger(&mut self, user_id: &str, summary: &BalanceSummary) {
        let now = self.now().to_string();
        self.ledgers.insert(
            user_id.to_string(),
            LedgerRow {
                user_id: user_id.to_string(),
                points_balance: summary.points_balance,
                total_points_earned: summary.total_earned,
                total_points_burned: summary.total_burned,
                last_updated_at: Some(now),
            },
        );
    }
}

fn newest_first<T: Clone>(rows: &[(NaiveDateTime, T)], limit: u32) -> Vec<T> {
    let mut sorted: Vec<_> = rows.iter().collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0));
    sorted
        .into_iter()
        .take(limit as usize)
        .map(|(_, row)| row.clone())
        .collect()
}

#[async_trait]
impl PointsStore for MemoryStore {
    async fn tables_like(&mut self, pattern: &str) -> Result<Vec<TableRef>, DbError> {
        let mut found: Vec<TableRef> = self
            .tables
            .iter()
            .filter(|(t, _)| t.name.contains(pattern))
            .map(|(t, _)| t.clone())
            .collect();
        found.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
        Ok(found)
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>, DbError> {
        Ok(self
            .tables
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, cols)| cols.clone())
            .unwrap_or_default())
    }

    async fn columns_named(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        Ok(self
            .tables
            .iter()
            .find(|(t, _)| t.schema == CURRENT_SCHEMA && t.name == table)
            .map(|(_, cols)| cols.clone())
            .unwrap_or_default())
    }

    async fn add_column(&mut self, table: &str, column_patch: &ColumnPatch) -> Result<(), DbError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column_patch.name, column_patch.sql_type
        );
        if self.fail_alter_on.as_deref() == Some(column_patch.name) {
            return Err(DbError::QueryFailed(format!("{}: permission denied", sql)));
        }
        let cols = self
            .columns_mut(table)
            .ok_or_else(|| DbError::QueryFailed(format!("relation \"{}\" does not exist", table)))?;
        if cols.iter().any(|c| c.name == column_patch.name) {
            return Err(DbError::QueryFailed(format!(
                "column \"{}\" already exists",
                column_patch.name
            )));
        }
        cols.push(column(column_patch.name, &column_patch.sql_type.to_lowercase()));
        self.ddl_log.push(sql);
        Ok(())
    }

    async fn recent_challenges(&mut self, limit: u32) -> Result<Vec<RecentChallenge>, DbError> {
        Ok(newest_first(&self.challenges, limit))
    }

    async fn recent_transactions(
        &mut self,
        limit: u32,
    ) -> Result<Vec<RecentTransaction>, DbError> {
        Ok(newest_first(&self.transactions, limit))
    }

    async fn recent_points_transactions(
        &mut self,
        limit: u32,
    ) -> Result<Vec<RecentTransaction>, DbError> {
        let rows: Vec<(NaiveDateTime, RecentTransaction)> = self
            .points
            .iter()
            .map(|t| {
                (
                    t.created_at,
                    RecentTransaction {
                        id: t.id.to_string(),
                        user_id: Some(t.user_id.clone()),
                        kind: Some(t.transaction_type.clone()),
                        amount: Some(t.amount.to_string()),
                        created_at: Some(t.created_at.to_string()),
                    },
                )
            })
            .collect();
        Ok(newest_first(&rows, limit))
    }

    async fn table_exists(&mut self, qualified: &str) -> Result<bool, DbError> {
        Ok(self.tables.iter().any(|(t, _)| match qualified.split_once('.') {
            Some(_) => t.qualified() == qualified,
            None => t.schema == CURRENT_SCHEMA && t.name == qualified,
        }))
    }

    async fn create_points_table(&mut self) -> Result<(), DbError> {
        self.ddl_log
            .push("CREATE TABLE IF NOT EXISTS points_transactions".to_string());
        *self = std::mem::take(self).with_table(
            "public",
            "points_transactions",
            &[
                ("id", "integer"),
                ("user_id", "character varying"),
                ("challenge_id", "integer"),
                ("transaction_type", "character varying"),
                ("amount", "bigint"),
                ("reason", "text"),
                ("blockchain_tx_hash", "character varying"),
                ("block_number", "integer"),
                ("chain_id", "integer"),
                ("metadata", "text"),
                ("created_at", "timestamp without time zone"),
            ],
        );
        Ok(())
    }

    async fn add_transaction_type_column(&mut self) -> Result<(), DbError> {
        let cols = self
            .columns_mut("points_transactions")
            .ok_or_else(|| DbError::QueryFailed("points_transactions missing".to_string()))?;
        let mut added = column("transaction_type", "character varying");
        added.nullable = false;
        cols.push(added);
        for tx in self.points.iter_mut().filter(|t| t.transaction_type.is_empty()) {
            tx.transaction_type = "unknown".to_string();
        }
        self.ddl_log
            .push("ALTER TABLE points_transactions ADD COLUMN transaction_type VARCHAR".to_string());
        Ok(())
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64, DbError> {
        match table {
            "points_transactions" => Ok(self.points.len() as i64),
            "challenges" => Ok(self.challenges.len() as i64),
            "transactions" => Ok(self.transactions.len() as i64),
            other => Err(DbError::QueryFailed(format!("relation \"{}\" does not exist", other))),
        }
    }

    async fn ledger(&mut self, user_id: &str) -> Result<Option<LedgerRow>, DbError> {
        Ok(self.ledgers.get(user_id).cloned())
    }

    async fn count_user_transactions(&mut self, user_id: &str) -> Result<i64, DbError> {
        Ok(self.points.iter().filter(|t| t.user_id == user_id).count() as i64)
    }

    async fn apply_backfill(
        &mut self,
        tx: &NewPointsTransaction,
    ) -> Result<BackfillCommit, DbError> {
        let inserted_id = self.insert(tx);
        let ledger_synced = self.sync_ledger(&tx.user_id).await.is_ok();
        Ok(BackfillCommit {
            inserted_id,
            ledger_synced,
        })
    }

    async fn notifications(&mut self, user_id: &str) -> Result<Vec<Notification>, DbError> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, n)| n.clone())
            .collect();
        found.sort_by_key(|n| n.created_at);
        Ok(found)
    }

    async fn transaction_exists_on(
        &mut self,
        user_id: &str,
        amount: i64,
        day: NaiveDate,
    ) -> Result<bool, DbError> {
        Ok(self
            .points
            .iter()
            .any(|t| t.user_id == user_id && t.amount == amount && t.created_at.date() == day))
    }

    async fn insert_points_transaction(
        &mut self,
        tx: &NewPointsTransaction,
    ) -> Result<i64, DbError> {
        Ok(self.insert(tx))
    }

    async fn sync_ledger(&mut self, user_id: &str) -> Result<(), DbError> {
        if !self.ledger_function {
            return Err(DbError::QueryFailed(
                "function update_user_points_balance(unknown) does not exist".to_string(),
            ));
        }
        self.sync_calls += 1;
        let summary = self.balance_of(user_id);
        self.store_ledger(user_id, &summary);
        Ok(())
    }

    async fn compute_balance(&mut self, user_id: &str) -> Result<BalanceSummary, DbError> {
        Ok(self.balance_of(user_id))
    }

    async fn upsert_ledger(
        &mut self,
        user_id: &str,
        summary: &BalanceSummary,
    ) -> Result<(), DbError> {
        self.store_ledger(user_id, summary);
        Ok(())
    }
}
