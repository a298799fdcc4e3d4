// ABOUTME: Command module exports
// ABOUTME: Each operation runs against a PointsStore, returns a report, and renders it as text

use thiserror::Error;

use crate::db::DbError;

pub mod backfill;
pub mod backfill_notifications;
pub mod describe;
pub mod ensure_schema;
pub mod inspect;
pub mod ledger;
pub mod migrate;
pub mod recent;

/// The ledger table every maintenance command targets
pub const POINTS_TABLE: &str = "points_transactions";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("No ledger row found for user: {0}")]
    LedgerNotFound(String),
    #[error("Failed to add column '{column}': {source}")]
    AlterFailed {
        column: &'static str,
        #[source]
        source: DbError,
    },
}
