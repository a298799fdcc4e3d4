// ABOUTME: Column listing for a single table
// ABOUTME: Shows type and nullability so operators can check a table before migrating it

use std::io::{self, Write};

use super::CommandError;
use crate::db::PointsStore;
use crate::models::DescribeReport;
use crate::output::NAME_WIDTH;

pub async fn run(store: &mut dyn PointsStore, table: &str) -> Result<DescribeReport, CommandError> {
    let columns = store.columns_named(table).await?;
    Ok(DescribeReport {
        table: table.to_string(),
        columns,
    })
}

pub fn render(report: &DescribeReport, out: &mut dyn Write) -> io::Result<()> {
    if report.columns.is_empty() {
        return writeln!(
            out,
            "No columns found for {} (table may not exist)",
            report.table
        );
    }

    writeln!(out, "Columns for {}:", report.table)?;
    for column in &report.columns {
        writeln!(
            out,
            "- {:width$} {:15} nullable={}",
            column.name,
            column.data_type,
            if column.nullable { "YES" } else { "NO" },
            width = NAME_WIDTH
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_describe_missing_table() {
        let mut store = MemoryStore::new();
        let report = run(&mut store, "points_transactions").await.unwrap();

        let mut buf = Vec::new();
        render(&report, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "No columns found for points_transactions (table may not exist)\n"
        );
    }

    #[tokio::test]
    async fn test_describe_shows_nullability() {
        let mut store = MemoryStore::new().with_table(
            "public",
            "points_transactions",
            &[("id", "integer"), ("reason", "text")],
        );
        store.tables[0].1[0].nullable = false;

        let report = run(&mut store, "points_transactions").await.unwrap();
        let mut buf = Vec::new();
        render(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("Columns for points_transactions:\n"));
        assert!(text.contains("- id                        integer         nullable=NO\n"));
        assert!(text.contains("- reason                    text            nullable=YES\n"));
    }
}
