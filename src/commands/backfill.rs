// ABOUTME: Reconciles a user's points_transactions with their ledger balance
// ABOUTME: Dry run by default; with --force inserts one backfill row and syncs the ledger in a transaction

use std::io::{self, Write};

use super::CommandError;
use crate::db::PointsStore;
use crate::models::{BackfillReport, BackfillStatus, NewPointsTransaction};

pub const BACKFILL_TYPE: &str = "backfill";
pub const BACKFILL_REASON: &str = "Backfill created to reconcile ledger (script)";

pub async fn run(
    store: &mut dyn PointsStore,
    user_id: &str,
    force: bool,
) -> Result<BackfillReport, CommandError> {
    let ledger = store
        .ledger(user_id)
        .await?
        .ok_or_else(|| CommandError::LedgerNotFound(user_id.to_string()))?;
    let existing = store.count_user_transactions(user_id).await?;

    let mut report = BackfillReport {
        user_id: user_id.to_string(),
        ledger_balance: ledger.points_balance,
        existing_transactions: existing,
        prepared: None,
        status: BackfillStatus::Aborted,
    };

    if existing > 0 && !force {
        return Ok(report);
    }
    if ledger.points_balance <= 0 {
        report.status = BackfillStatus::NothingToDo;
        return Ok(report);
    }

    let prepared = NewPointsTransaction {
        user_id: user_id.to_string(),
        challenge_id: None,
        legacy_type: None,
        transaction_type: BACKFILL_TYPE,
        amount: ledger.points_balance,
        reason: Some(BACKFILL_REASON.to_string()),
        created_at: None,
    };

    if !force {
        report.prepared = Some(prepared);
        report.status = BackfillStatus::DryRun;
        return Ok(report);
    }

    let commit = store.apply_backfill(&prepared).await?;
    log::info!(
        "Inserted backfill row {} for {} (ledger synced: {})",
        commit.inserted_id,
        user_id,
        commit.ledger_synced
    );
    report.prepared = Some(prepared);
    report.status = BackfillStatus::Applied {
        inserted_id: commit.inserted_id,
        ledger_synced: commit.ledger_synced,
    };
    Ok(report)
}

fn write_prepared(out: &mut dyn Write, tx: &NewPointsTransaction) -> io::Result<()> {
    writeln!(out, "\nPrepared backfill transaction:")?;
    writeln!(out, "   user_id          {}", tx.user_id)?;
    writeln!(out, "   challenge_id     null")?;
    writeln!(out, "   transaction_type {}", tx.transaction_type)?;
    writeln!(out, "   amount           {}", tx.amount)?;
    writeln!(out, "   reason           {}", tx.reason.as_deref().unwrap_or(""))
}

pub fn render(report: &BackfillReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "User: {}", report.user_id)?;
    writeln!(out, "Ledger points_balance: {}", report.ledger_balance)?;
    writeln!(
        out,
        "Existing points_transactions rows for user: {}",
        report.existing_transactions
    )?;

    if let Some(prepared) = &report.prepared {
        write_prepared(out, prepared)?;
    }

    match &report.status {
        BackfillStatus::Aborted => {
            writeln!(out, "\nAborting: transactions already exist for this user.")?;
            writeln!(
                out,
                "If you really want to insert a backfill, re-run with FORCE=1 to proceed."
            )
        }
        BackfillStatus::NothingToDo => {
            writeln!(out, "Ledger balance is zero or missing; nothing to backfill.")
        }
        BackfillStatus::DryRun => writeln!(
            out,
            "\nDRY RUN (no changes). To apply the backfill set FORCE=1 and re-run."
        ),
        BackfillStatus::Applied {
            inserted_id,
            ledger_synced,
        } => {
            writeln!(out, "Inserted points_transactions id: {}", inserted_id)?;
            if *ledger_synced {
                writeln!(out, "Called update_user_points_balance for user")?;
            } else {
                writeln!(out, "⚠️  Warning: failed to call update_user_points_balance")?;
            }
            writeln!(out, "✅ Backfill applied successfully.")
        }
    }
}
