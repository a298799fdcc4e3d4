// ABOUTME: Main library for points-probe
// ABOUTME: Module declarations, command dispatch and the mapping from failures to exit codes

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod output;

use cli::{Cli, Command, OutputFormat};
use commands::CommandError;
use config::{ConfigError, Settings};
use db::{DbError, PgStore, PointsStore};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    /// 2 when the tool could not get a connection, 1 when work against the database failed
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Db(DbError::ConnectionFailed(_)) => 2,
            AppError::Command(CommandError::Db(DbError::ConnectionFailed(_))) => 2,
            _ => 1,
        }
    }
}

/// Load settings, open the connection and run one command against it
pub async fn run(cli: &Cli) -> Result<(), AppError> {
    let settings = Settings::load(cli.env_file.as_deref())?;
    log::debug!("Connecting to {}", settings.redacted_url());

    let mut store = PgStore::connect(&settings.database_url).await?;
    match store.server_version().await {
        Ok(version) => log::info!("Connected: {}", version),
        Err(e) => log::warn!("Could not read server version: {}", e),
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = execute(&cli.command, &settings, cli.format, &mut store, &mut out).await;

    if let Err(e) = store.close().await {
        log::warn!("Failed to close connection cleanly: {}", e);
    }
    result
}

fn emit<T: Serialize>(
    out: &mut dyn Write,
    format: OutputFormat,
    report: &T,
    render: fn(&T, &mut dyn Write) -> io::Result<()>,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Text => render(report, out)?,
        OutputFormat::Json => output::write_json(out, report)?,
    }
    out.flush()?;
    Ok(())
}

/// Run `command` against an open store and write its report to `out`
pub async fn execute(
    command: &Command,
    settings: &Settings,
    format: OutputFormat,
    store: &mut dyn PointsStore,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    match command {
        Command::Inspect { pattern } => {
            let report = commands::inspect::run(store, pattern).await?;
            emit(out, format, &report, commands::inspect::render)
        }
        Command::Describe { table } => {
            let report = commands::describe::run(store, table).await?;
            emit(out, format, &report, commands::describe::render)
        }
        Command::Recent { limit } => {
            let limit = limit.unwrap_or(settings.row_limit);
            let report = commands::recent::run(store, limit).await?;
            emit(out, format, &report, commands::recent::render)
        }
        Command::Migrate => {
            let report = commands::migrate::run(store).await?;
            emit(out, format, &report, commands::migrate::render)
        }
        Command::EnsureSchema => {
            let report = commands::ensure_schema::run(store).await?;
            emit(out, format, &report, commands::ensure_schema::render)
        }
        Command::Backfill { user_id, force } => {
            let report = commands::backfill::run(store, user_id, *force).await?;
            emit(out, format, &report, commands::backfill::render)
        }
        Command::BackfillNotifications { user_id, force } => {
            let report = commands::backfill_notifications::run(store, user_id, *force).await?;
            emit(out, format, &report, commands::backfill_notifications::render)
        }
        Command::SyncLedger { user_id } => {
            let report = commands::ledger::run(store, user_id).await?;
            emit(out, format, &report, commands::ledger::render)
        }
    }
}
