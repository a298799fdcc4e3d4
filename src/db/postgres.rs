// ABOUTME: PostgreSQL connection management using sqlx
// ABOUTME: Runs the information_schema, listing, DDL and ledger queries over a single connection

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Connection, PgConnection};

use super::{quote_ident, BackfillCommit, DbError, PointsStore};
use crate::models::{
    BalanceSummary, ColumnInfo, ColumnPatch, LedgerRow, NewPointsTransaction, Notification,
    RecentChallenge, RecentTransaction, TableRef,
};

const CREATE_POINTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS points_transactions (
        id SERIAL PRIMARY KEY,
        user_id VARCHAR NOT NULL,
        challenge_id INTEGER,
        transaction_type VARCHAR,
        amount BIGINT NOT NULL,
        reason TEXT,
        blockchain_tx_hash VARCHAR,
        block_number INTEGER,
        chain_id INTEGER DEFAULT 84532,
        metadata TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const POINTS_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_points_user_id ON points_transactions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_points_challenge_id ON points_transactions(challenge_id)",
    "CREATE INDEX IF NOT EXISTS idx_points_tx_hash ON points_transactions(blockchain_tx_hash)",
    "CREATE INDEX IF NOT EXISTS idx_points_created_at ON points_transactions(created_at)",
];

const ADD_TRANSACTION_TYPE: [&str; 4] = [
    "ALTER TABLE points_transactions ADD COLUMN transaction_type VARCHAR",
    "UPDATE points_transactions SET transaction_type = 'unknown' WHERE transaction_type IS NULL",
    "ALTER TABLE points_transactions ALTER COLUMN transaction_type SET NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_points_tx_type ON points_transactions(transaction_type)",
];

const COMPUTE_BALANCE: &str = r#"
    SELECT
        COALESCE(SUM(CASE
            WHEN transaction_type IN ('earned_challenge', 'released_escrow', 'transferred_escrow', 'transferred_user')
            THEN amount
            WHEN transaction_type IN ('burned_usage', 'locked_escrow')
            THEN -amount
            ELSE 0
        END), 0)::bigint AS points_balance,
        COALESCE(SUM(CASE WHEN transaction_type = 'earned_challenge' THEN amount ELSE 0 END), 0)::bigint AS total_earned,
        COALESCE(SUM(CASE WHEN transaction_type = 'burned_usage' THEN amount ELSE 0 END), 0)::bigint AS total_burned
    FROM points_transactions
    WHERE user_id = $1
"#;

const UPSERT_LEDGER: &str = r#"
    INSERT INTO user_points_ledgers (user_id, points_balance, total_points_earned, total_points_burned, last_updated_at)
    VALUES ($1, $2, $3, $4, CURRENT_TIMESTAMP)
    ON CONFLICT (user_id) DO UPDATE SET
        points_balance = EXCLUDED.points_balance,
        total_points_earned = EXCLUDED.total_points_earned,
        total_points_burned = EXCLUDED.total_points_burned,
        last_updated_at = CURRENT_TIMESTAMP
"#;

type ColumnRow = (String, String, String);
type TransactionRow = (String, Option<String>, Option<String>, Option<String>, Option<String>);
type NotificationRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<NaiveDateTime>,
);

pub struct PgStore {
    conn: PgConnection,
}

impl PgStore {
    /// Open a single connection from a postgres:// URL
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Server version string, logged after connecting
    pub async fn server_version(&mut self) -> Result<String, DbError> {
        let (version,): (String,) = sqlx::query_as("SELECT version()")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(version)
    }

    /// Close the connection gracefully
    pub async fn close(self) -> Result<(), DbError> {
        self.conn.close().await?;
        Ok(())
    }
}

fn to_columns(rows: Vec<ColumnRow>) -> Vec<ColumnInfo> {
    rows.into_iter()
        .map(|(name, data_type, nullable)| ColumnInfo {
            name,
            data_type,
            nullable: nullable.eq_ignore_ascii_case("YES"),
        })
        .collect()
}

fn to_transactions(rows: Vec<TransactionRow>) -> Vec<RecentTransaction> {
    rows.into_iter()
        .map(|(id, user_id, kind, amount, created_at)| RecentTransaction {
            id,
            user_id,
            kind,
            amount,
            created_at,
        })
        .collect()
}

/// Notifications without a timestamp cannot be matched to a day, so they are dropped
fn to_notifications(rows: Vec<NotificationRow>) -> Vec<Notification> {
    rows.into_iter()
        .filter_map(|(id, kind, title, message, created_at)| {
            let Some(created_at) = created_at else {
                log::warn!("Skipping notification {} with no created_at", id);
                return None;
            };
            Some(Notification {
                id,
                kind,
                title,
                message,
                created_at,
            })
        })
        .collect()
}

async fn call_update_balance(conn: &mut PgConnection, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT update_user_points_balance($1)")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_transaction(
    conn: &mut PgConnection,
    tx: &NewPointsTransaction,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = match tx.legacy_type {
        Some(legacy) => {
            sqlx::query_as(
                "INSERT INTO points_transactions (user_id, challenge_id, type, transaction_type, amount, reason, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, LOCALTIMESTAMP)) RETURNING id::bigint",
            )
            .bind(&tx.user_id)
            .bind(tx.challenge_id)
            .bind(legacy)
            .bind(tx.transaction_type)
            .bind(tx.amount)
            .bind(&tx.reason)
            .bind(tx.created_at)
            .fetch_one(conn)
            .await?
        }
        None => {
            sqlx::query_as(
                "INSERT INTO points_transactions (user_id, challenge_id, transaction_type, amount, reason, created_at) \
                 VALUES ($1, $2, $3, $4, $5, COALESCE($6, LOCALTIMESTAMP)) RETURNING id::bigint",
            )
            .bind(&tx.user_id)
            .bind(tx.challenge_id)
            .bind(tx.transaction_type)
            .bind(tx.amount)
            .bind(&tx.reason)
            .bind(tx.created_at)
            .fetch_one(conn)
            .await?
        }
    };
    Ok(id)
}

#[async_trait]
impl PointsStore for PgStore {
    async fn tables_like(&mut self, pattern: &str) -> Result<Vec<TableRef>, DbError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT table_schema::text, table_name::text
            FROM information_schema.tables
            WHERE strpos(table_name::text, $1) > 0
            ORDER BY table_schema, table_name
            "#,
        )
        .bind(pattern)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(schema, name)| TableRef { schema, name })
            .collect())
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>, DbError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(
            r#"
            SELECT column_name::text, data_type::text, is_nullable::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(to_columns(rows))
    }

    async fn columns_named(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(
            r#"
            SELECT column_name::text, data_type::text, is_nullable::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(to_columns(rows))
    }

    async fn add_column(&mut self, table: &str, column: &ColumnPatch) -> Result<(), DbError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table)?,
            quote_ident(column.name)?,
            column.sql_type
        );
        log::debug!("{}", sql);

        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| DbError::QueryFailed(format!("{}: {}", sql, e)))?;
        Ok(())
    }

    async fn recent_challenges(&mut self, limit: u32) -> Result<Vec<RecentChallenge>, DbError> {
        let rows: Vec<(String, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id::text, challenger::text, title::text, created_at::text
            FROM challenges
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&mut self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, challenger, title, created_at)| RecentChallenge {
                id,
                challenger,
                title,
                created_at,
            })
            .collect())
    }

    async fn recent_transactions(
        &mut self,
        limit: u32,
    ) -> Result<Vec<RecentTransaction>, DbError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id::text, user_id::text, type::text, amount::text, created_at::text
            FROM transactions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&mut self.conn)
        .await?;

        Ok(to_transactions(rows))
    }

    async fn recent_points_transactions(
        &mut self,
        limit: u32,
    ) -> Result<Vec<RecentTransaction>, DbError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id::text, user_id::text, transaction_type::text, amount::text, created_at::text
            FROM points_transactions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&mut self.conn)
        .await?;

        Ok(to_transactions(rows))
    }

    async fn table_exists(&mut self, qualified: &str) -> Result<bool, DbError> {
        let (found,): (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::text")
            .bind(qualified)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(found.is_some())
    }

    async fn create_points_table(&mut self) -> Result<(), DbError> {
        sqlx::query(CREATE_POINTS_TABLE)
            .execute(&mut self.conn)
            .await?;
        for index in POINTS_INDEXES {
            sqlx::query(index).execute(&mut self.conn).await?;
        }
        Ok(())
    }

    async fn add_transaction_type_column(&mut self) -> Result<(), DbError> {
        let mut tx = self.conn.begin().await?;
        for statement in ADD_TRANSACTION_TYPE {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                tx.rollback().await?;
                return Err(DbError::QueryFailed(format!("{}: {}", statement, e)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64, DbError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&mut self.conn).await?;
        Ok(count)
    }

    async fn ledger(&mut self, user_id: &str) -> Result<Option<LedgerRow>, DbError> {
        let row: Option<(String, i64, i64, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT user_id::text,
                   COALESCE(points_balance, 0)::bigint,
                   COALESCE(total_points_earned, 0)::bigint,
                   COALESCE(total_points_burned, 0)::bigint,
                   last_updated_at::text
            FROM user_points_ledgers
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut self.conn)
        .await?;

        Ok(row.map(
            |(user_id, points_balance, total_points_earned, total_points_burned, last_updated_at)| {
                LedgerRow {
                    user_id,
                    points_balance,
                    total_points_earned,
                    total_points_burned,
                    last_updated_at,
                }
            },
        ))
    }

    async fn count_user_transactions(&mut self, user_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM points_transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut self.conn)
                .await?;
        Ok(count)
    }

    async fn apply_backfill(
        &mut self,
        new_tx: &NewPointsTransaction,
    ) -> Result<BackfillCommit, DbError> {
        let mut tx = self.conn.begin().await?;

        let inserted_id = match insert_transaction(&mut *tx, new_tx).await {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await?;
                return Err(DbError::QueryFailed(format!("insert backfill row: {}", e)));
            }
        };

        // A failed statement aborts the whole transaction, so the ledger call gets a savepoint
        let mut savepoint = Connection::begin(&mut *tx).await?;
        let ledger_synced = match call_update_balance(&mut *savepoint, &new_tx.user_id).await {
            Ok(()) => {
                savepoint.commit().await?;
                true
            }
            Err(e) => {
                log::warn!("update_user_points_balance failed: {}", e);
                savepoint.rollback().await?;
                false
            }
        };

        tx.commit().await?;
        Ok(BackfillCommit {
            inserted_id,
            ledger_synced,
        })
    }

    async fn notifications(&mut self, user_id: &str) -> Result<Vec<Notification>, DbError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id::text, type::text, title::text, message::text, created_at::timestamp
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(to_notifications(rows))
    }

    async fn transaction_exists_on(
        &mut self,
        user_id: &str,
        amount: i64,
        day: NaiveDate,
    ) -> Result<bool, DbError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM points_transactions
                WHERE user_id = $1 AND amount = $2 AND created_at::date = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(day)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    async fn insert_points_transaction(
        &mut self,
        tx: &NewPointsTransaction,
    ) -> Result<i64, DbError> {
        Ok(insert_transaction(&mut self.conn, tx).await?)
    }

    async fn sync_ledger(&mut self, user_id: &str) -> Result<(), DbError> {
        call_update_balance(&mut self.conn, user_id)
            .await
            .map_err(|e| DbError::QueryFailed(format!("update_user_points_balance: {}", e)))
    }

    async fn compute_balance(&mut self, user_id: &str) -> Result<BalanceSummary, DbError> {
        let (points_balance, total_earned, total_burned): (i64, i64, i64) =
            sqlx::query_as(COMPUTE_BALANCE)
                .bind(user_id)
                .fetch_one(&mut self.conn)
                .await?;

        Ok(BalanceSummary {
            points_balance,
            total_earned,
            total_burned,
        })
    }

    async fn upsert_ledger(
        &mut self,
        user_id: &str,
        summary: &BalanceSummary,
    ) -> Result<(), DbError> {
        sqlx::query(UPSERT_LEDGER)
            .bind(user_id)
            .bind(summary.points_balance)
            .bind(summary.total_earned)
            .bind(summary.total_burned)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }
}
