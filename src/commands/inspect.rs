// ABOUTME: Schema inspection for tables whose name matches a pattern
// ABOUTME: Lists every matching table and its columns from information_schema

use std::io::{self, Write};

use super::CommandError;
use crate::db::PointsStore;
use crate::models::{InspectReport, TableColumns};
use crate::output::NAME_WIDTH;

pub const DEFAULT_PATTERN: &str = "points";

/// Collect every table containing `pattern` together with its columns
pub async fn run(store: &mut dyn PointsStore, pattern: &str) -> Result<InspectReport, CommandError> {
    let tables = store.tables_like(pattern).await?;
    log::info!("Found {} tables matching '{}'", tables.len(), pattern);

    let mut report = InspectReport {
        pattern: pattern.to_string(),
        tables: Vec::with_capacity(tables.len()),
    };
    for table in tables {
        let columns = store.table_columns(&table).await?;
        report.tables.push(TableColumns { table, columns });
    }
    Ok(report)
}

pub fn render(report: &InspectReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "📋 All tables with '{}':", report.pattern)?;
    for entry in &report.tables {
        writeln!(out, "   {}", entry.table.qualified())?;
        for column in &entry.columns {
            writeln!(
                out,
                "       - {:width$} {}",
                column.name,
                column.data_type,
                width = NAME_WIDTH
            )?;
        }
    }
    Ok(())
}
