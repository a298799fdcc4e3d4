// ABOUTME: Recent row listings for challenges, transactions and points_transactions
// ABOUTME: Newest first, capped at the configured row limit

use std::io::{self, Write};

use super::CommandError;
use crate::db::PointsStore;
use crate::models::{RecentReport, RecentTransaction};
use crate::output::{or_dash, preview, ID_PREVIEW};

pub async fn run(store: &mut dyn PointsStore, limit: u32) -> Result<RecentReport, CommandError> {
    let challenges = store.recent_challenges(limit).await?;
    let transactions = store.recent_transactions(limit).await?;
    let points_transactions = store.recent_points_transactions(limit).await?;

    Ok(RecentReport {
        limit,
        challenges,
        transactions,
        points_transactions,
    })
}

fn write_transactions(out: &mut dyn Write, rows: &[RecentTransaction]) -> io::Result<()> {
    for row in rows {
        writeln!(
            out,
            "  ID: {}, User: {}, Type: {}, Amount: {}, Created: {}",
            row.id,
            preview(row.user_id.as_deref(), ID_PREVIEW),
            or_dash(row.kind.as_deref()),
            or_dash(row.amount.as_deref()),
            or_dash(row.created_at.as_deref())
        )?;
    }
    Ok(())
}

pub fn render(report: &RecentReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "Recent challenges:")?;
    for row in &report.challenges {
        writeln!(
            out,
            "  ID: {}, Challenger: {}, Title: {}, Created: {}",
            row.id,
            preview(row.challenger.as_deref(), ID_PREVIEW),
            or_dash(row.title.as_deref()),
            or_dash(row.created_at.as_deref())
        )?;
    }

    writeln!(out, "\nRecent transactions (transactions table):")?;
    write_transactions(out, &report.transactions)?;

    writeln!(out, "\nRecent points_transactions:")?;
    write_transactions(out, &report.points_transactions)
}
