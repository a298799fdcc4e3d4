// ABOUTME: Makes sure points_transactions exists and carries a transaction_type column
// ABOUTME: Creates the table with indexes when absent, otherwise adds the column transactionally

use std::io::{self, Write};

use super::{CommandError, POINTS_TABLE};
use crate::db::PointsStore;
use crate::models::{EnsureSchemaReport, SchemaAction};

pub async fn run(store: &mut dyn PointsStore) -> Result<EnsureSchemaReport, CommandError> {
    let action = if !store.table_exists(POINTS_TABLE).await? {
        log::info!("{} not found, creating it", POINTS_TABLE);
        store.create_points_table().await?;
        SchemaAction::CreatedTable
    } else {
        let columns = store.columns_named(POINTS_TABLE).await?;
        if columns.iter().any(|c| c.name == "transaction_type") {
            SchemaAction::AlreadyPresent
        } else {
            log::info!("transaction_type missing from {}, adding it", POINTS_TABLE);
            store.add_transaction_type_column().await?;
            SchemaAction::AddedTransactionType
        }
    };

    let row_count = store.count_rows(POINTS_TABLE).await?;
    Ok(EnsureSchemaReport { action, row_count })
}

pub fn render(report: &EnsureSchemaReport, out: &mut dyn Write) -> io::Result<()> {
    match report.action {
        SchemaAction::CreatedTable => {
            writeln!(out, "{} table not found - creating table (safe create)...", POINTS_TABLE)?;
            writeln!(out, "✅ Created {} table and indexes.", POINTS_TABLE)?;
        }
        SchemaAction::AddedTransactionType => {
            writeln!(out, "{} table exists.", POINTS_TABLE)?;
            writeln!(out, "⚠️  transaction_type column missing - adding column safely...")?;
            writeln!(
                out,
                "✅ Added transaction_type column, backfilled, set NOT NULL, and created index."
            )?;
        }
        SchemaAction::AlreadyPresent => {
            writeln!(out, "{} table exists.", POINTS_TABLE)?;
            writeln!(out, "✅ transaction_type column already present.")?;
        }
    }
    writeln!(out, "{} row count: {}", POINTS_TABLE, report.row_count)
}
