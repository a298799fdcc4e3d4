// ABOUTME: Adds the reason and blockchain_tx_hash columns to points_transactions when absent
// ABOUTME: Each ALTER runs on its own in autocommit mode, so a failure keeps earlier additions

use std::io::{self, Write};

use super::{CommandError, POINTS_TABLE};
use crate::db::PointsStore;
use crate::models::{ColumnAction, ColumnInfo, ColumnOutcome, ColumnPatch, MigrateReport};
use crate::output::NAME_WIDTH;

/// Columns added when missing, in the order they are checked
pub const COLUMN_PATCHES: [ColumnPatch; 2] = [
    ColumnPatch {
        name: "reason",
        sql_type: "TEXT",
    },
    ColumnPatch {
        name: "blockchain_tx_hash",
        sql_type: "VARCHAR",
    },
];

/// Columns a complete points_transactions table has
pub const EXPECTED_COLUMNS: [&str; 11] = [
    "id",
    "user_id",
    "challenge_id",
    "transaction_type",
    "amount",
    "reason",
    "blockchain_tx_hash",
    "block_number",
    "chain_id",
    "metadata",
    "created_at",
];

/// Expected names absent from `columns`, in expected order
pub fn missing_columns(columns: &[ColumnInfo], expected: &[&str]) -> Vec<String> {
    expected
        .iter()
        .filter(|name| !columns.iter().any(|c| c.name == **name))
        .map(|name| name.to_string())
        .collect()
}

pub async fn run(store: &mut dyn PointsStore) -> Result<MigrateReport, CommandError> {
    ensure_columns(store, POINTS_TABLE, &COLUMN_PATCHES, &EXPECTED_COLUMNS).await
}

/// Add each patch column that `table` lacks, then report which expected columns are still missing
pub async fn ensure_columns(
    store: &mut dyn PointsStore,
    table: &str,
    patches: &[ColumnPatch],
    expected: &[&str],
) -> Result<MigrateReport, CommandError> {
    let initial_columns = store.columns_named(table).await?;

    let mut outcomes = Vec::with_capacity(patches.len());
    for patch in patches {
        if initial_columns.iter().any(|c| c.name == patch.name) {
            outcomes.push(ColumnOutcome {
                column: *patch,
                action: ColumnAction::Present,
            });
            continue;
        }

        log::info!("Adding column {}.{} {}", table, patch.name, patch.sql_type);
        if let Err(source) = store.add_column(table, patch).await {
            let applied: Vec<&str> = outcomes
                .iter()
                .filter(|o| o.action == ColumnAction::Added)
                .map(|o| o.column.name)
                .collect();
            if !applied.is_empty() {
                log::warn!("Columns already added before the failure: {:?}", applied);
            }
            return Err(CommandError::AlterFailed {
                column: patch.name,
                source,
            });
        }
        outcomes.push(ColumnOutcome {
            column: *patch,
            action: ColumnAction::Added,
        });
    }

    let final_columns = store.columns_named(table).await?;
    let missing_columns = missing_columns(&final_columns, expected);

    Ok(MigrateReport {
        table: table.to_string(),
        initial_columns,
        outcomes,
        missing_columns,
        final_columns,
    })
}

fn write_columns(out: &mut dyn Write, columns: &[ColumnInfo]) -> io::Result<()> {
    for column in columns {
        writeln!(
            out,
            "   ✓ {:width$} {}",
            column.name,
            column.data_type,
            width = NAME_WIDTH
        )?;
    }
    Ok(())
}

pub fn render(report: &MigrateReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\n📊 Checking {} table structure...\n", report.table)?;
    writeln!(out, "📋 Current columns in {}:", report.table)?;
    write_columns(out, &report.initial_columns)?;
    writeln!(out)?;

    for outcome in &report.outcomes {
        let name = outcome.column.name;
        match outcome.action {
            ColumnAction::Present => writeln!(out, "✅ '{}' column already exists", name)?,
            ColumnAction::Added => {
                writeln!(out, "⚠️  '{}' column is MISSING - adding it now...", name)?;
                writeln!(out, "✅ Added '{}' column to {}", name, report.table)?;
            }
        }
    }

    if report.missing_columns.is_empty() {
        writeln!(out, "\n✅ All expected columns exist!")?;
    } else {
        writeln!(out, "\n⚠️  Missing columns: {:?}", report.missing_columns)?;
        for name in &report.missing_columns {
            writeln!(out, "   - {}", name)?;
        }
    }

    writeln!(out, "\n📋 Final {} structure:", report.table)?;
    write_columns(out, &report.final_columns)?;
    writeln!(out, "\n✅ Migration complete!\n")
}
