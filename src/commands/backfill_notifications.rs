// ABOUTME: Recreates missing point awards from the "you earned N points" notifications a user received
// ABOUTME: Dry run by default; with --force inserts one row per award not already recorded that day

use std::io::{self, Write};
use std::sync::OnceLock;

use regex::Regex;

use super::CommandError;
use crate::db::PointsStore;
use crate::models::{BackfillCandidate, NewPointsTransaction, Notification, NotificationBackfillReport};
use crate::output::clip;

const LEGACY_TYPE: &str = "challenge_creation";
const TRANSACTION_TYPE: &str = "earned_challenge";
const REASON_MAX: usize = 200;

fn earned_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)earned\s+([\d,]+)\s*(?:Bantah\s*)?Points").expect("valid earned regex")
    })
}

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d,]{1,6})").expect("valid number regex"))
}

fn parse_digits(raw: &str) -> Option<i64> {
    raw.replace(',', "").parse().ok()
}

/// Point amount mentioned in a notification text.
///
/// Prefers "earned 60 Bantah Points"; otherwise takes the first short run of digits.
pub fn parse_amount(text: &str) -> Option<i64> {
    if let Some(caps) = earned_pattern().captures(text) {
        return parse_digits(&caps[1]);
    }
    number_pattern()
        .captures(text)
        .and_then(|caps| parse_digits(&caps[1]))
}

/// Turn a notification into a candidate award when it mentions a positive amount
pub fn candidate_from(notification: &Notification) -> Option<BackfillCandidate> {
    let text = format!(
        "{} {}",
        notification.title.as_deref().unwrap_or(""),
        notification.message.as_deref().unwrap_or("")
    );
    let amount = parse_amount(&text).filter(|a| *a > 0)?;

    Some(BackfillCandidate {
        notification_id: notification.id.clone(),
        created_at: notification.created_at,
        amount,
        reason: clip(text.trim(), REASON_MAX),
        inferred_type: notification.kind.clone().unwrap_or_default(),
    })
}

pub async fn run(
    store: &mut dyn PointsStore,
    user_id: &str,
    force: bool,
) -> Result<NotificationBackfillReport, CommandError> {
    let notifications = store.notifications(user_id).await?;
    let candidates: Vec<BackfillCandidate> =
        notifications.iter().filter_map(candidate_from).collect();
    log::info!(
        "Parsed {} point-earning notifications out of {}",
        candidates.len(),
        notifications.len()
    );

    let mut report = NotificationBackfillReport {
        user_id: user_id.to_string(),
        notifications_scanned: notifications.len(),
        candidates,
        applied: false,
        inserted_ids: Vec::new(),
        skipped: Vec::new(),
        ledger_synced: None,
    };

    if !force || report.candidates.is_empty() {
        return Ok(report);
    }

    for candidate in &report.candidates {
        let day = candidate.created_at.date();
        if store
            .transaction_exists_on(user_id, candidate.amount, day)
            .await?
        {
            log::debug!("Skipping existing {} points on {}", candidate.amount, day);
            report.skipped.push(candidate.clone());
            continue;
        }

        let id = store
            .insert_points_transaction(&NewPointsTransaction {
                user_id: user_id.to_string(),
                challenge_id: None,
                legacy_type: Some(LEGACY_TYPE),
                transaction_type: TRANSACTION_TYPE,
                amount: candidate.amount,
                reason: None,
                created_at: Some(candidate.created_at),
            })
            .await?;
        report.inserted_ids.push(id);
    }

    let synced = match store.sync_ledger(user_id).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to call update_user_points_balance: {}", e);
            false
        }
    };
    report.ledger_synced = Some(synced);
    report.applied = true;
    Ok(report)
}

pub fn render(report: &NotificationBackfillReport, out: &mut dyn Write) -> io::Result<()> {
    if report.notifications_scanned == 0 {
        return writeln!(out, "No notifications found for user: {}", report.user_id);
    }
    if report.candidates.is_empty() {
        return writeln!(out, "No point-earning notifications parsed for user.");
    }

    writeln!(
        out,
        "Parsed {} point-earning notifications:",
        report.candidates.len()
    )?;
    for candidate in &report.candidates {
        writeln!(
            out,
            "   {:>6}  {}  {}",
            candidate.amount, candidate.created_at, candidate.reason
        )?;
    }

    if !report.applied {
        return writeln!(out, "\nDRY RUN: no changes made. Set FORCE=1 to apply inserts.");
    }

    for skipped in &report.skipped {
        writeln!(
            out,
            "Skipping existing transaction for amount {} on {}",
            skipped.amount, skipped.created_at
        )?;
    }
    for id in &report.inserted_ids {
        writeln!(out, "Inserted tx id {}", id)?;
    }
    match report.ledger_synced {
        Some(true) => writeln!(out, "Called update_user_points_balance for user")?,
        Some(false) => writeln!(out, "⚠️  Failed to call update_user_points_balance")?,
        None => {}
    }
    writeln!(
        out,
        "✅ Backfill applied for {} items",
        report.inserted_ids.len()
    )
}
