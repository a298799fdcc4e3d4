// ABOUTME: Shared data models for points-probe
// ABOUTME: Row types read from the points tables and the reports each command produces

use chrono::NaiveDateTime;
use serde::Serialize;

/// A table found through information_schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// A column as reported by information_schema.columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
    pub nullable: bool,
}

/// A column to add when it is absent from a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnPatch {
    pub name: &'static str,
    #[serde(rename = "sqlType")]
    pub sql_type: &'static str,
}

/// Row from the challenges table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentChallenge {
    pub id: String,
    pub challenger: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Row from either the transactions or the points_transactions table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTransaction {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Per-user aggregate from user_points_ledgers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "pointsBalance")]
    pub points_balance: i64,
    #[serde(rename = "totalPointsEarned")]
    pub total_points_earned: i64,
    #[serde(rename = "totalPointsBurned")]
    pub total_points_burned: i64,
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: Option<String>,
}

/// Balance recomputed from points_transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BalanceSummary {
    #[serde(rename = "pointsBalance")]
    pub points_balance: i64,
    #[serde(rename = "totalEarned")]
    pub total_earned: i64,
    #[serde(rename = "totalBurned")]
    pub total_burned: i64,
}

/// A notification sent to a user, used to infer missing point awards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: NaiveDateTime,
}

/// A points_transactions row about to be inserted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPointsTransaction {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "challengeId")]
    pub challenge_id: Option<i32>,
    /// Legacy `type` column, only written by notification backfills
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<&'static str>,
    #[serde(rename = "transactionType")]
    pub transaction_type: &'static str,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// None means "now" on the server
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

/// A point award inferred from a notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillCandidate {
    #[serde(rename = "notificationId")]
    pub notification_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: NaiveDateTime,
    pub amount: i64,
    pub reason: String,
    #[serde(rename = "inferredType")]
    pub inferred_type: String,
}

/// Result of the inspect command
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub pattern: String,
    pub tables: Vec<TableColumns>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableColumns {
    pub table: TableRef,
    pub columns: Vec<ColumnInfo>,
}

/// Result of the describe command
#[derive(Debug, Clone, Serialize)]
pub struct DescribeReport {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// Result of the recent command
#[derive(Debug, Clone, Serialize)]
pub struct RecentReport {
    pub limit: u32,
    pub challenges: Vec<RecentChallenge>,
    pub transactions: Vec<RecentTransaction>,
    #[serde(rename = "pointsTransactions")]
    pub points_transactions: Vec<RecentTransaction>,
}

/// What happened to one patched column during migrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAction {
    Present,
    Added,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnOutcome {
    pub column: ColumnPatch,
    pub action: ColumnAction,
}

/// Result of the migrate command
#[derive(Debug, Clone, Serialize)]
pub struct MigrateReport {
    pub table: String,
    #[serde(rename = "initialColumns")]
    pub initial_columns: Vec<ColumnInfo>,
    pub outcomes: Vec<ColumnOutcome>,
    #[serde(rename = "missingColumns")]
    pub missing_columns: Vec<String>,
    #[serde(rename = "finalColumns")]
    pub final_columns: Vec<ColumnInfo>,
}

impl MigrateReport {
    pub fn alters_issued(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == ColumnAction::Added)
            .count()
    }
}

/// What ensure-schema had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaAction {
    CreatedTable,
    AddedTransactionType,
    AlreadyPresent,
}

/// Result of the ensure-schema command
#[derive(Debug, Clone, Serialize)]
pub struct EnsureSchemaReport {
    pub action: SchemaAction,
    #[serde(rename = "rowCount")]
    pub row_count: i64,
}

/// Outcome of a ledger backfill
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackfillStatus {
    /// Transactions already exist and --force was not given
    Aborted,
    /// Ledger balance is zero or negative
    NothingToDo,
    DryRun,
    Applied {
        #[serde(rename = "insertedId")]
        inserted_id: i64,
        #[serde(rename = "ledgerSynced")]
        ledger_synced: bool,
    },
}

/// Result of the backfill command
#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "ledgerBalance")]
    pub ledger_balance: i64,
    #[serde(rename = "existingTransactions")]
    pub existing_transactions: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared: Option<NewPointsTransaction>,
    pub status: BackfillStatus,
}

/// Result of the backfill-notifications command
#[derive(Debug, Clone, Serialize)]
pub struct NotificationBackfillReport {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "notificationsScanned")]
    pub notifications_scanned: usize,
    pub candidates: Vec<BackfillCandidate>,
    pub applied: bool,
    #[serde(rename = "insertedIds")]
    pub inserted_ids: Vec<i64>,
    pub skipped: Vec<BackfillCandidate>,
    #[serde(rename = "ledgerSynced")]
    pub ledger_synced: Option<bool>,
}

/// Result of the sync-ledger command
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub computed: BalanceSummary,
    pub stored: Option<LedgerRow>,
}
