//! Core domain logic for the companion app settings screens.
//! This crate owns persisted collections, preferences and rate-limit lookups.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod service;
pub mod settings;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::entity::{CollectionKey, Entity, EntityId, UnknownCollection};
pub use model::payload::{
    complication_for_family, validate_payload, ActionPayload, CategoryPayload, ComplicationFamily,
    ComplicationPayload, EntityPayload, ZonePayload,
};
pub use remote::{
    resets_in, DisplayRow, RateLimitSection, RateLimits, RateLimitsClient, RateLimitsResponse,
    RemoteError, SectionState,
};
pub use repo::entity_repo::{
    EntityRepoError, EntityRepoResult, EntityStore, SqliteEntityStore, WriteBatch, WriteOp,
};
pub use service::change_feed::{ChangeFeed, CollectionChange, Subscription};
pub use service::ordered_sync::{OrderedEntitySync, RowHandle, RowUpdate, SyncError, SyncResult};
pub use settings::{
    SettingKey, SettingsError, SettingsService, SettingsSnapshot, SettingsStore,
    SqliteSettingsStore,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
