//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose collection editing, preferences and rate-limit lookups to Dart
//!   via FRB.
//! - Keep per-collection edit state (row handles, active drags) alive
//!   between calls.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported inside envelopes, never as panics or exceptions.
//! - Every call opens its own connection; no SQLite handle is held between
//!   calls.

use companion_core::db::open_db;
use companion_core::settings::{OpenInBrowserChoice, PageZoom, PushId};
use companion_core::{
    complication_for_family, core_version as core_version_inner,
    init_logging as init_logging_inner, ping as ping_inner, validate_payload, ChangeFeed,
    CollectionKey, ComplicationPayload, CoreConfig, Entity, EntityPayload, EntityRepoResult,
    EntityStore, OrderedEntitySync, RateLimitSection, RateLimitsClient, RowHandle, SectionState,
    SettingsError, SettingsService, SettingsSnapshot, SqliteEntityStore, SqliteSettingsStore,
    SyncError, WriteBatch,
};
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

static CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static RUNTIME: OnceLock<Mutex<CollectionRuntime>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Entity row as rendered by a settings list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityItem {
    pub id: String,
    pub name: String,
    pub position: i64,
    /// Collection-specific attributes as a JSON object.
    pub payload_json: String,
}

/// Response envelope for collection loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionListResponse {
    pub ok: bool,
    /// Whether the list should offer a retry control.
    pub retry: bool,
    /// Entities ascending by position (empty on failure).
    pub items: Vec<EntityItem>,
    pub message: String,
}

/// Response envelope for starting an edit flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBeginResponse {
    pub ok: bool,
    /// Token to pass back to `collection_complete_edit`.
    pub handle: Option<u64>,
    /// Values the edit form starts from.
    pub draft: Option<EntityItem>,
    pub message: String,
}

/// Response envelope for finishing an edit flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCompleteResponse {
    pub ok: bool,
    /// Row identifier to display after a save.
    pub identifier: Option<String>,
    /// Row title to display after a save.
    pub title: Option<String>,
    pub message: String,
}

/// Response envelope for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResponse {
    pub ok: bool,
    /// Ids that were actually removed.
    pub deleted: Vec<String>,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

impl ActionResponse {
    fn from_result(result: Result<(), ApiError>, success: &str) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                message: success.to_string(),
            },
            Err(err) => Self {
                ok: false,
                message: err.message(),
            },
        }
    }
}

/// Flat preference view exchanged with the settings screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsView {
    pub override_device_name: Option<String>,
    /// One of `chrome|firefox|safari|safari_in_app`.
    pub open_in_browser: String,
    pub restore_last_url: bool,
    /// Percent, 50..=300.
    pub page_zoom: u16,
    pub location_update_on_zone: bool,
    pub location_update_on_background_fetch: bool,
    pub location_update_on_significant: bool,
    pub location_update_on_notification: bool,
    pub messaging_enabled: bool,
    pub analytics_enabled: bool,
    pub push_id: Option<String>,
    pub confirm_before_opening_url: bool,
    /// Local notification toggles for sent location updates.
    pub enter_notifications: bool,
    pub exit_notifications: bool,
    pub beacon_enter_notifications: bool,
    pub beacon_exit_notifications: bool,
    pub significant_location_change_notifications: bool,
    pub background_fetch_location_change_notifications: bool,
    pub push_location_request_notifications: bool,
    pub url_scheme_location_request_notifications: bool,
    pub x_callback_url_location_request_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsResponse {
    pub ok: bool,
    pub settings: Option<SettingsView>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRow {
    pub label: String,
    pub value: String,
}

/// Rate-limit section as the presentation layer renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitsView {
    /// One of `idle|loading|loaded|failed`.
    pub state: String,
    pub rows: Vec<RateLimitRow>,
    pub footer: Option<String>,
    pub retry: bool,
    pub message: String,
}

/// Loads one collection in display order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Storage failures return `ok=false, retry=true` with no items.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_list(collection: String) -> CollectionListResponse {
    match with_sync(&collection, |sync| sync.load_initial().map_err(ApiError::Sync)) {
        Ok(entities) => CollectionListResponse {
            ok: true,
            retry: false,
            message: format!("Loaded {} item(s).", entities.len()),
            items: entities.into_iter().map(to_entity_item).collect(),
        },
        Err(err) => CollectionListResponse {
            ok: false,
            retry: err.retryable(),
            items: Vec::new(),
            message: format!("collection_list failed: {}", err.message()),
        },
    }
}

/// Starts an edit flow for a new row at `at_index` or for `existing_id`.
///
/// # FFI contract
/// - Sync call; reads the store only for re-edits.
/// - Never panics.
/// - No entity is persisted until `collection_complete_edit` saves.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_insert(
    collection: String,
    existing_id: Option<String>,
    at_index: u32,
) -> EditBeginResponse {
    let result = with_sync(&collection, |sync| {
        let existing = match existing_id.as_deref().map(str::trim) {
            None => None,
            Some(id) => {
                let found = sync
                    .store()
                    .get(sync.key(), id)
                    .map_err(|err| ApiError::Sync(SyncError::StorageUnavailable(err)))?;
                match found {
                    Some(entity) => Some(entity),
                    None => return Err(ApiError::Input(format!("entity `{id}` not found"))),
                }
            }
        };
        let handle = sync
            .apply_insert(existing, at_index as usize)
            .map_err(ApiError::Sync)?;
        let draft = sync.draft(handle).cloned().map(to_entity_item);
        Ok((handle, draft))
    });

    match result {
        Ok((handle, draft)) => EditBeginResponse {
            ok: true,
            handle: Some(handle.as_raw()),
            draft,
            message: "Edit started.".to_string(),
        },
        Err(err) => EditBeginResponse {
            ok: false,
            handle: None,
            draft: None,
            message: format!("collection_insert failed: {}", err.message()),
        },
    }
}

/// Finishes the edit flow bound to `handle`.
///
/// Input semantics:
/// - `saved=false`: discards the edit; `name` and `payload_json` are ignored.
/// - `saved=true`: persists the draft with `name` and `payload_json` applied
///   (absent values keep the draft's). `payload_json` must decode as the
///   collection's payload shape; a watch complication family may only be
///   configured once.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - A failed save keeps the handle valid for a retry.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_complete_edit(
    collection: String,
    handle: u64,
    saved: bool,
    name: Option<String>,
    payload_json: Option<String>,
) -> EditCompleteResponse {
    let handle = RowHandle::from_raw(handle);
    let result = with_sync(&collection, |sync| {
        let edited = match sync.draft(handle).cloned() {
            Some(draft) if saved => Some(apply_edit(sync, draft, name, payload_json)?),
            _ => None,
        };
        sync.complete_edit(handle, saved, edited)
            .map_err(ApiError::Sync)
    });

    match result {
        Ok(Some(update)) => EditCompleteResponse {
            ok: true,
            identifier: Some(update.identifier),
            title: Some(update.title),
            message: "Saved.".to_string(),
        },
        Ok(None) => EditCompleteResponse {
            ok: true,
            identifier: None,
            title: None,
            message: "Edit cancelled.".to_string(),
        },
        Err(err) => EditCompleteResponse {
            ok: false,
            identifier: None,
            title: None,
            message: format!("collection_complete_edit failed: {}", err.message()),
        },
    }
}

/// Deletes the listed rows, skipping rows that are being dragged.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - All deletions land in one transaction or none do.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_delete(collection: String, ids: Vec<String>) -> DeleteResponse {
    match with_sync(&collection, |sync| sync.apply_delete(ids).map_err(ApiError::Sync)) {
        Ok(deleted) => DeleteResponse {
            ok: true,
            message: format!("Deleted {} item(s).", deleted.len()),
            deleted,
        },
        Err(err) => DeleteResponse {
            ok: false,
            deleted: Vec::new(),
            message: format!("collection_delete failed: {}", err.message()),
        },
    }
}

/// Marks `id` as being dragged.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_reorder_begin(collection: String, id: String) -> ActionResponse {
    let result = with_sync(&collection, |sync| sync.begin_reorder(id).map_err(ApiError::Sync));
    ActionResponse::from_result(result, "Reorder started.")
}

/// Persists the dropped order of `new_order_ids`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Clears every active drag, even when the write fails.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_reorder_commit(collection: String, new_order_ids: Vec<String>) -> ActionResponse {
    let result = with_sync(&collection, |sync| {
        sync.commit_reorder(new_order_ids.as_slice())
            .map_err(ApiError::Sync)
    });
    ActionResponse::from_result(result, "Order saved.")
}

/// Ends a drag without persisting anything.
#[flutter_rust_bridge::frb(sync)]
pub fn collection_reorder_cancel(collection: String, id: String) -> ActionResponse {
    let result = with_sync(&collection, |sync| {
        sync.cancel_reorder(&id);
        Ok(())
    });
    ActionResponse::from_result(result, "Reorder cancelled.")
}

/// Loads every preference, defaults included.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_load() -> SettingsResponse {
    match with_settings_service(|service| service.snapshot()) {
        Ok(snapshot) => SettingsResponse {
            ok: true,
            settings: Some(to_settings_view(snapshot)),
            message: "Settings loaded.".to_string(),
        },
        Err(err) => SettingsResponse {
            ok: false,
            settings: None,
            message: format!("settings_load failed: {}", err.message()),
        },
    }
}

/// Saves every preference in one transaction.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - An invalid field rejects the whole save.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_apply(settings: SettingsView) -> ActionResponse {
    let result = from_settings_view(settings)
        .and_then(|snapshot| with_settings_service(|service| service.apply_snapshot(&snapshot)));
    ActionResponse::from_result(result, "Settings saved.")
}

/// Fetches push rate limits for the stored push identifier.
///
/// # FFI contract
/// - Async call; performs one HTTP request at most.
/// - Never panics.
/// - Without a stored push identifier no request is sent (`state=idle`).
pub async fn rate_limits_fetch() -> RateLimitsView {
    let push_id = match load_push_id() {
        Ok(push_id) => push_id,
        Err(err) => {
            return RateLimitsView {
                state: "failed".to_string(),
                rows: Vec::new(),
                footer: None,
                retry: true,
                message: format!("rate_limits_fetch failed: {}", err.message()),
            };
        }
    };
    let config = config();
    refresh_rate_limits(&config.rate_limits_url, config.http_timeout, push_id.as_deref()).await
}

async fn refresh_rate_limits(
    endpoint: &str,
    timeout: Duration,
    push_id: Option<&str>,
) -> RateLimitsView {
    let mut section = RateLimitSection::new();
    match RateLimitsClient::new(endpoint, timeout) {
        Ok(client) => section.refresh(&client, push_id).await,
        Err(err) => section.complete(Err(err)),
    }
    to_rate_limits_view(&section)
}

/// Failure of one FFI call before it is flattened into an envelope.
#[derive(Debug)]
enum ApiError {
    Input(String),
    Sync(SyncError),
    Settings(SettingsError),
}

impl ApiError {
    fn message(&self) -> String {
        match self {
            Self::Input(message) => message.clone(),
            Self::Sync(err) => err.to_string(),
            Self::Settings(err) => err.to_string(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Sync(SyncError::StorageUnavailable(_)))
    }
}

/// Entity store that opens a migrated connection per operation.
struct PathStore {
    db_path: PathBuf,
}

impl PathStore {
    fn with_store<T>(
        &self,
        f: impl FnOnce(&SqliteEntityStore<'_>) -> EntityRepoResult<T>,
    ) -> EntityRepoResult<T> {
        let conn = open_db(&self.db_path)?;
        let store = SqliteEntityStore::try_new(&conn)?;
        f(&store)
    }
}

impl EntityStore for PathStore {
    fn list(&self, key: CollectionKey) -> EntityRepoResult<Vec<Entity>> {
        self.with_store(|store| store.list(key))
    }

    fn get(&self, key: CollectionKey, id: &str) -> EntityRepoResult<Option<Entity>> {
        self.with_store(|store| store.get(key, id))
    }

    fn is_retired(&self, key: CollectionKey, id: &str) -> EntityRepoResult<bool> {
        self.with_store(|store| store.is_retired(key, id))
    }

    fn apply(&self, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()> {
        self.with_store(|store| store.apply(key, batch))
    }
}

struct CollectionRuntime {
    syncs: HashMap<CollectionKey, OrderedEntitySync<PathStore>>,
    feed: ChangeFeed,
}

fn config() -> &'static CoreConfig {
    CONFIG.get_or_init(CoreConfig::from_env)
}

fn runtime() -> MutexGuard<'static, CollectionRuntime> {
    RUNTIME
        .get_or_init(|| {
            Mutex::new(CollectionRuntime {
                syncs: HashMap::new(),
                feed: ChangeFeed::new(),
            })
        })
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn with_sync<T>(
    collection: &str,
    f: impl FnOnce(&mut OrderedEntitySync<PathStore>) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let key = collection
        .parse::<CollectionKey>()
        .map_err(|err| ApiError::Input(err.to_string()))?;
    let mut runtime = runtime();
    let runtime = &mut *runtime;
    let feed = runtime.feed.clone();
    let sync = runtime.syncs.entry(key).or_insert_with(|| {
        let store = PathStore {
            db_path: config().db_path.clone(),
        };
        OrderedEntitySync::with_feed(store, key, feed)
    });
    f(sync).inspect_err(|err| {
        warn!(
            "event=ffi_call module=ffi status=error collection={} retry={}",
            key,
            err.retryable()
        );
    })
}

fn with_settings_service<T>(
    f: impl FnOnce(&SettingsService<SqliteSettingsStore<'_>>) -> Result<T, SettingsError>,
) -> Result<T, ApiError> {
    let conn = open_settings_db(&config().db_path)?;
    let store = SqliteSettingsStore::try_new(&conn)
        .map_err(|err| ApiError::Settings(SettingsError::from(err)))?;
    let service = SettingsService::new(store);
    f(&service).map_err(ApiError::Settings)
}

fn open_settings_db(path: &Path) -> Result<rusqlite::Connection, ApiError> {
    open_db(path).map_err(|err| ApiError::Settings(SettingsError::from(err)))
}

fn load_push_id() -> Result<Option<String>, ApiError> {
    with_settings_service(|service| service.get::<PushId>())
}

fn apply_edit(
    sync: &OrderedEntitySync<PathStore>,
    mut draft: Entity,
    name: Option<String>,
    payload_json: Option<String>,
) -> Result<Entity, ApiError> {
    if let Some(name) = name {
        let name = name.trim();
        if !name.is_empty() {
            draft.name = name.to_string();
        }
    }
    if let Some(raw) = payload_json {
        let payload = serde_json::from_str::<serde_json::Value>(&raw)
            .map_err(|err| ApiError::Input(format!("payload_json is not valid JSON: {err}")))?;
        if !payload.is_object() {
            return Err(ApiError::Input(
                "payload_json must be a JSON object".to_string(),
            ));
        }
        validate_payload(sync.key(), &payload).map_err(|err| {
            ApiError::Input(format!("payload_json does not match {}: {err}", sync.key()))
        })?;
        draft.payload = payload;
        if sync.key() == CollectionKey::WatchComplications {
            ensure_family_unclaimed(sync, &draft)?;
        }
    }
    Ok(draft)
}

fn ensure_family_unclaimed(
    sync: &OrderedEntitySync<PathStore>,
    draft: &Entity,
) -> Result<(), ApiError> {
    let family = ComplicationPayload::from_entity(draft)
        .map_err(|err| ApiError::Input(err.to_string()))?
        .family;
    let others = sync
        .store()
        .list(sync.key())
        .map_err(|err| ApiError::Sync(SyncError::StorageUnavailable(err)))?
        .into_iter()
        .filter(|entity| entity.id != draft.id)
        .collect::<Vec<_>>();
    match complication_for_family(&others, family) {
        Some(owner) => Err(ApiError::Input(format!(
            "complication family already configured by `{}`",
            owner.id
        ))),
        None => Ok(()),
    }
}

fn to_entity_item(entity: Entity) -> EntityItem {
    EntityItem {
        payload_json: entity.payload.to_string(),
        id: entity.id,
        name: entity.name,
        position: entity.position,
    }
}

fn to_settings_view(snapshot: SettingsSnapshot) -> SettingsView {
    SettingsView {
        override_device_name: snapshot.override_device_name,
        open_in_browser: snapshot.open_in_browser.as_str().to_string(),
        restore_last_url: snapshot.restore_last_url,
        page_zoom: snapshot.page_zoom.0,
        location_update_on_zone: snapshot.location_update_on_zone,
        location_update_on_background_fetch: snapshot.location_update_on_background_fetch,
        location_update_on_significant: snapshot.location_update_on_significant,
        location_update_on_notification: snapshot.location_update_on_notification,
        messaging_enabled: snapshot.messaging_enabled,
        analytics_enabled: snapshot.analytics_enabled,
        push_id: snapshot.push_id,
        confirm_before_opening_url: snapshot.confirm_before_opening_url,
        enter_notifications: snapshot.enter_notifications,
        exit_notifications: snapshot.exit_notifications,
        beacon_enter_notifications: snapshot.beacon_enter_notifications,
        beacon_exit_notifications: snapshot.beacon_exit_notifications,
        significant_location_change_notifications: snapshot.significant_location_change_notifications,
        background_fetch_location_change_notifications: snapshot.background_fetch_location_change_notifications,
        push_location_request_notifications: snapshot.push_location_request_notifications,
        url_scheme_location_request_notifications: snapshot.url_scheme_location_request_notifications,
        x_callback_url_location_request_notifications: snapshot.x_callback_url_location_request_notifications,
    }
}

fn from_settings_view(view: SettingsView) -> Result<SettingsSnapshot, ApiError> {
    let open_in_browser = OpenInBrowserChoice::parse(&view.open_in_browser).ok_or_else(|| {
        ApiError::Input(format!(
            "unsupported browser `{}`; expected chrome|firefox|safari|safari_in_app",
            view.open_in_browser
        ))
    })?;
    Ok(SettingsSnapshot {
        override_device_name: view.override_device_name,
        open_in_browser,
        restore_last_url: view.restore_last_url,
        page_zoom: PageZoom(view.page_zoom),
        location_update_on_zone: view.location_update_on_zone,
        location_update_on_background_fetch: view.location_update_on_background_fetch,
        location_update_on_significant: view.location_update_on_significant,
        location_update_on_notification: view.location_update_on_notification,
        messaging_enabled: view.messaging_enabled,
        analytics_enabled: view.analytics_enabled,
        push_id: view.push_id,
        confirm_before_opening_url: view.confirm_before_opening_url,
        enter_notifications: view.enter_notifications,
        exit_notifications: view.exit_notifications,
        beacon_enter_notifications: view.beacon_enter_notifications,
        beacon_exit_notifications: view.beacon_exit_notifications,
        significant_location_change_notifications: view.significant_location_change_notifications,
        background_fetch_location_change_notifications: view.background_fetch_location_change_notifications,
        push_location_request_notifications: view.push_location_request_notifications,
        url_scheme_location_request_notifications: view.url_scheme_location_request_notifications,
        x_callback_url_location_request_notifications: view.x_callback_url_location_request_notifications,
    })
}

fn to_rate_limits_view(section: &RateLimitSection) -> RateLimitsView {
    let (state, message) = match section.state() {
        SectionState::Idle => ("idle", "No push identifier registered.".to_string()),
        SectionState::Loading => ("loading", String::new()),
        SectionState::Loaded(_) => ("loaded", "Rate limits loaded.".to_string()),
        SectionState::Failed { message, .. } => ("failed", message.clone()),
    };
    RateLimitsView {
        state: state.to_string(),
        rows: section
            .rows()
            .into_iter()
            .map(|row| RateLimitRow {
                label: row.label.to_string(),
                value: row.value,
            })
            .collect(),
        footer: section.footer(),
        retry: section.retry_available(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        collection_complete_edit, collection_delete, collection_insert, collection_list,
        collection_reorder_begin, collection_reorder_cancel, collection_reorder_commit,
        core_version, init_logging, ping, refresh_rate_limits, settings_apply, settings_load,
    };
    use std::time::Duration;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn unknown_collection_is_rejected_without_retry() {
        let response = collection_list("bookmarks".to_string());
        assert!(!response.ok);
        assert!(!response.retry);
        assert!(response.items.is_empty());
        assert!(response.message.contains("bookmarks"));
    }

    #[test]
    fn saved_insert_appears_in_list_and_cancelled_insert_does_not() {
        let saved = collection_insert("actions".to_string(), None, 0);
        assert!(saved.ok, "{}", saved.message);
        let handle = saved.handle.expect("insert should return a handle");
        let draft_id = saved.draft.expect("insert should return a draft").id;

        let done = collection_complete_edit(
            "actions".to_string(),
            handle,
            true,
            Some("Lights off".to_string()),
            Some(
                r##"{"text":"Lights off","iconName":"lightbulb","iconColor":"#000000","backgroundColor":"#FFFFFF","textColor":"#000000"}"##
                    .to_string(),
            ),
        );
        assert!(done.ok, "{}", done.message);
        assert_eq!(done.identifier.as_deref(), Some(draft_id.as_str()));
        assert_eq!(done.title.as_deref(), Some("Lights off"));

        let cancelled = collection_insert("actions".to_string(), None, 0);
        let cancelled_id = cancelled.draft.expect("draft").id;
        let undone = collection_complete_edit(
            "actions".to_string(),
            cancelled.handle.expect("handle"),
            false,
            None,
            None,
        );
        assert!(undone.ok);
        assert!(undone.identifier.is_none());

        let listed = collection_list("actions".to_string());
        assert!(listed.ok, "{}", listed.message);
        let item = listed
            .items
            .iter()
            .find(|item| item.id == draft_id)
            .expect("saved entity should be listed");
        assert_eq!(item.name, "Lights off");
        assert!(item.payload_json.contains("lightbulb"));
        assert!(listed.items.iter().all(|item| item.id != cancelled_id));
    }

    #[test]
    fn completing_unknown_handle_fails() {
        let response =
            collection_complete_edit("actions".to_string(), u64::MAX, true, None, None);
        assert!(!response.ok);
        assert!(response.message.contains("unknown row handle"));
    }

    #[test]
    fn invalid_payload_keeps_handle_for_retry() {
        let begun = collection_insert("actions".to_string(), None, 0);
        let handle = begun.handle.expect("handle");

        let rejected = collection_complete_edit(
            "actions".to_string(),
            handle,
            true,
            None,
            Some("[1, 2]".to_string()),
        );
        assert!(!rejected.ok);

        let mistyped = collection_complete_edit(
            "actions".to_string(),
            handle,
            true,
            None,
            Some(r#"{"icon":"lightbulb"}"#.to_string()),
        );
        assert!(!mistyped.ok);
        assert!(mistyped.message.contains("does not match actions"), "{}", mistyped.message);

        let retried = collection_complete_edit(
            "actions".to_string(),
            handle,
            true,
            Some("Garage".to_string()),
            None,
        );
        assert!(retried.ok, "{}", retried.message);
    }

    #[test]
    fn zones_reject_insert_delete_and_drag() {
        let inserted = collection_insert("zones".to_string(), None, 0);
        assert!(!inserted.ok);
        assert!(inserted.handle.is_none());
        assert!(inserted.message.contains("read-only"), "{}", inserted.message);

        let deleted = collection_delete("zones".to_string(), vec!["zone.home".to_string()]);
        assert!(!deleted.ok);
        assert!(deleted.message.contains("read-only"), "{}", deleted.message);

        assert!(!collection_reorder_begin("zones".to_string(), "zone.home".to_string()).ok);
        assert!(!collection_reorder_commit("zones".to_string(), vec!["zone.home".to_string()]).ok);
        assert!(collection_list("zones".to_string()).ok);
    }

    #[test]
    fn complication_family_can_only_be_configured_once() {
        let bezel = r#"{"family":"graphicBezel","template":null}"#;
        let stale = collection_list("watch_complications".to_string())
            .items
            .into_iter()
            .filter(|item| item.payload_json.contains("graphicBezel"))
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert!(collection_delete("watch_complications".to_string(), stale).ok);

        let first = collection_insert("watch_complications".to_string(), None, 0);
        let first_id = first.draft.expect("draft").id;
        let saved = collection_complete_edit(
            "watch_complications".to_string(),
            first.handle.expect("handle"),
            true,
            None,
            Some(bezel.to_string()),
        );
        assert!(saved.ok, "{}", saved.message);

        let second = collection_insert("watch_complications".to_string(), None, 0)
            .handle
            .expect("handle");
        let clash = collection_complete_edit(
            "watch_complications".to_string(),
            second,
            true,
            None,
            Some(bezel.to_string()),
        );
        assert!(!clash.ok);
        assert!(clash.message.contains(&first_id), "{}", clash.message);
        let dropped =
            collection_complete_edit("watch_complications".to_string(), second, false, None, None);
        assert!(dropped.ok);

        let re_edit =
            collection_insert("watch_complications".to_string(), Some(first_id.clone()), 0);
        let kept = collection_complete_edit(
            "watch_complications".to_string(),
            re_edit.handle.expect("handle"),
            true,
            Some("Bezel".to_string()),
            Some(bezel.to_string()),
        );
        assert!(kept.ok, "{}", kept.message);

        assert!(collection_delete("watch_complications".to_string(), vec![first_id]).ok);
    }

    #[test]
    fn delete_during_drag_is_suppressed_until_cancelled() {
        let begun = collection_insert("watch_complications".to_string(), None, 0);
        let id = begun.draft.expect("draft").id;
        let saved = collection_complete_edit(
            "watch_complications".to_string(),
            begun.handle.expect("handle"),
            true,
            None,
            None,
        );
        assert!(saved.ok, "{}", saved.message);

        assert!(collection_reorder_begin("watch_complications".to_string(), id.clone()).ok);
        let suppressed = collection_delete("watch_complications".to_string(), vec![id.clone()]);
        assert!(suppressed.ok);
        assert!(suppressed.deleted.is_empty());

        assert!(collection_reorder_cancel("watch_complications".to_string(), id.clone()).ok);
        let deleted = collection_delete("watch_complications".to_string(), vec![id.clone()]);
        assert_eq!(deleted.deleted, vec![id.clone()]);

        let listed = collection_list("watch_complications".to_string());
        assert!(listed.items.iter().all(|item| item.id != id));
    }

    #[test]
    fn reorder_commit_moves_referenced_entities_to_front() {
        let mut ids = Vec::new();
        for _ in 0..2 {
            let begun = collection_insert("notification_categories".to_string(), None, 0);
            let id = begun.draft.expect("draft").id;
            let saved = collection_complete_edit(
                "notification_categories".to_string(),
                begun.handle.expect("handle"),
                true,
                None,
                None,
            );
            assert!(saved.ok, "{}", saved.message);
            ids.push(id);
        }

        let reversed = ids.iter().rev().cloned().collect::<Vec<_>>();
        let committed =
            collection_reorder_commit("notification_categories".to_string(), reversed.clone());
        assert!(committed.ok, "{}", committed.message);

        let listed = collection_list("notification_categories".to_string());
        let position = |id: &str| {
            listed
                .items
                .iter()
                .find(|item| item.id == id)
                .map(|item| item.position)
                .expect("entity listed")
        };
        assert_eq!(position(&reversed[0]), 0);
        assert_eq!(position(&reversed[1]), 1);
    }

    #[test]
    fn settings_apply_rejects_unknown_browser_and_round_trips_valid_view() {
        let loaded = settings_load();
        assert!(loaded.ok, "{}", loaded.message);
        let mut view = loaded.settings.expect("settings view");

        let mut bad = view.clone();
        bad.open_in_browser = "netscape".to_string();
        assert!(!settings_apply(bad).ok);

        let mut zoom = view.clone();
        zoom.page_zoom = 10;
        assert!(!settings_apply(zoom).ok);

        view.open_in_browser = "firefox".to_string();
        view.page_zoom = 150;
        view.confirm_before_opening_url = true;
        view.beacon_enter_notifications = true;
        let applied = settings_apply(view.clone());
        assert!(applied.ok, "{}", applied.message);

        let reloaded = settings_load().settings.expect("settings view");
        assert_eq!(reloaded.open_in_browser, "firefox");
        assert_eq!(reloaded.page_zoom, 150);
        assert!(reloaded.confirm_before_opening_url);
        assert!(reloaded.beacon_enter_notifications);
    }

    #[tokio::test]
    async fn rate_limits_without_push_id_stay_idle() {
        let view = refresh_rate_limits("http://127.0.0.1:9", Duration::from_secs(1), None).await;
        assert_eq!(view.state, "idle");
        assert!(view.rows.is_empty());
        assert!(!view.retry);
    }

    #[tokio::test]
    async fn rate_limits_transport_failure_offers_retry() {
        let view = refresh_rate_limits(
            "http://127.0.0.1:9/api/checkRateLimits",
            Duration::from_secs(1),
            Some("push-token"),
        )
        .await;
        assert_eq!(view.state, "failed");
        assert!(view.retry);
        assert!(view.footer.is_none());
    }
}
