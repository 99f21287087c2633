//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `companion_core` linkage.
//! - Print stored collections, preferences and rate limits for local checks.
//! - Keep output deterministic for quick local sanity checks.

use clap::{Parser, Subcommand};
use companion_core::db::open_db;
use companion_core::settings::PushId;
use companion_core::{
    CollectionKey, CoreConfig, EntityStore, RateLimitSection, RateLimitsClient, SectionState,
    SettingsService, SqliteEntityStore, SqliteSettingsStore,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "companion", version, about = "Companion settings core inspector")]
struct Cli {
    /// Database file; overrides COMPANION_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core ping and version.
    Ping,
    /// List one collection in display order.
    List {
        /// One of actions|notification_categories|watch_complications|zones.
        collection: String,
    },
    /// Print every stored preference.
    Settings,
    /// Fetch push rate limits for the stored push identifier.
    RateLimits,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let result = match cli.command.unwrap_or(Command::Ping) {
        Command::Ping => {
            println!("companion_core ping={}", companion_core::ping());
            println!("companion_core version={}", companion_core::core_version());
            Ok(())
        }
        Command::List { collection } => list(&config, &collection),
        Command::Settings => settings(&config),
        Command::RateLimits => rate_limits(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn list(config: &CoreConfig, collection: &str) -> Result<(), String> {
    let key = collection
        .parse::<CollectionKey>()
        .map_err(|err| err.to_string())?;
    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let store = SqliteEntityStore::try_new(&conn).map_err(|err| err.to_string())?;
    let entities = store.list(key).map_err(|err| err.to_string())?;
    for entity in &entities {
        println!("{}\t{}\t{}\t{}", entity.position, entity.id, entity.name, entity.payload);
    }
    println!("{key} count={}", entities.len());
    Ok(())
}

fn settings(config: &CoreConfig) -> Result<(), String> {
    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let store = SqliteSettingsStore::try_new(&conn).map_err(|err| err.to_string())?;
    let snapshot = SettingsService::new(store)
        .snapshot()
        .map_err(|err| err.to_string())?;
    println!("{snapshot:#?}");
    Ok(())
}

fn rate_limits(config: &CoreConfig) -> Result<(), String> {
    let push_id = {
        let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
        let store = SqliteSettingsStore::try_new(&conn).map_err(|err| err.to_string())?;
        SettingsService::new(store)
            .get::<PushId>()
            .map_err(|err| err.to_string())?
    };
    let client = RateLimitsClient::new(&config.rate_limits_url, config.http_timeout)
        .map_err(|err| err.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to start runtime: {err}"))?;
    let mut section = RateLimitSection::new();
    runtime.block_on(section.refresh(&client, push_id.as_deref()));

    match section.state() {
        SectionState::Idle => println!("no push identifier registered"),
        SectionState::Failed { message, .. } => return Err(message.clone()),
        SectionState::Loading | SectionState::Loaded(_) => {
            for row in section.rows() {
                println!("{}: {}", row.label, row.value);
            }
            if let Some(footer) = section.footer() {
                println!("{footer}");
            }
        }
    }
    Ok(())
}
