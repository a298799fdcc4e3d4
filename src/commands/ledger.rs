// ABOUTME: Recomputes a user's ledger row from their points transactions
// ABOUTME: Upserts user_points_ledgers and reads the stored row back for verification

use std::io::{self, Write};

use super::CommandError;
use crate::db::PointsStore;
use crate::models::LedgerReport;

pub async fn run(store: &mut dyn PointsStore, user_id: &str) -> Result<LedgerReport, CommandError> {
    let computed = store.compute_balance(user_id).await?;
    log::debug!("Computed balance for {}: {:?}", user_id, computed);

    store.upsert_ledger(user_id, &computed).await?;
    let stored = store.ledger(user_id).await?;

    Ok(LedgerReport {
        user_id: user_id.to_string(),
        computed,
        stored,
    })
}

pub fn render(report: &LedgerReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "Calculated balance: {}", report.computed.points_balance)?;
    writeln!(out, "Total earned: {}", report.computed.total_earned)?;
    writeln!(out, "Total burned: {}", report.computed.total_burned)?;
    writeln!(out, "✅ Updated ledger for user {}", report.user_id)?;

    if let Some(row) = &report.stored {
        writeln!(
            out,
            "Verification - ledger now: balance={} earned={} burned={} updated={}",
            row.points_balance,
            row.total_points_earned,
            row.total_points_burned,
            row.last_updated_at.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}
