//! Typed preference access over a `SettingsStore`.

use super::keys::{
    AnalyticsEnabled, BackgroundFetchLocationChangeNotifications, BeaconEnterNotifications,
    BeaconExitNotifications, ConfirmBeforeOpeningUrl, EnterNotifications, ExitNotifications,
    LocationUpdateOnBackgroundFetch, LocationUpdateOnNotification, LocationUpdateOnSignificant,
    LocationUpdateOnZone, MessagingEnabled, OpenInBrowser, OpenInBrowserChoice,
    OverrideDeviceName, PageZoom, PageZoomSetting, PushId, PushLocationRequestNotifications,
    RestoreLastUrl, SettingKey, SignificantLocationChangeNotifications,
    UrlSchemeLocationRequestNotifications, XCallbackUrlLocationRequestNotifications,
};
use super::store::SettingsStore;
use crate::db::DbError;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from preference reads/writes.
#[derive(Debug)]
pub enum SettingsError {
    /// Backing store failed.
    Store(DbError),
    /// Value failed key validation; nothing was written.
    InvalidValue { key: &'static str, reason: String },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidValue { key, reason } => write!(f, "invalid value for `{key}`: {reason}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<DbError> for SettingsError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

/// Every recognized preference in one value; used by whole-screen load/save.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    pub override_device_name: Option<String>,
    pub open_in_browser: OpenInBrowserChoice,
    pub restore_last_url: bool,
    pub page_zoom: PageZoom,
    pub location_update_on_zone: bool,
    pub location_update_on_background_fetch: bool,
    pub location_update_on_significant: bool,
    pub location_update_on_notification: bool,
    pub messaging_enabled: bool,
    pub analytics_enabled: bool,
    pub push_id: Option<String>,
    pub confirm_before_opening_url: bool,
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

/// Preference service injected into whichever component needs settings.
pub struct SettingsService<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads one preference, falling back to its default.
    pub fn get<K: SettingKey>(&self) -> Result<K::Value, SettingsError> {
        let Some(raw) = self.store.get_raw(K::KEY)? else {
            return Ok(K::default_value());
        };
        match serde_json::from_str::<K::Value>(&raw) {
            Ok(value) if K::validate(&value).is_ok() => Ok(value),
            Ok(_) | Err(_) => {
                warn!(
                    "event=settings_read module=settings status=fallback key={} reason=undecodable_value",
                    K::KEY
                );
                Ok(K::default_value())
            }
        }
    }

    /// Validates and writes one preference.
    pub fn set<K: SettingKey>(&self, value: K::Value) -> Result<(), SettingsError> {
        let encoded = encode::<K>(&value)?;
        self.store.set_raw(K::KEY, encoded)?;
        Ok(())
    }

    /// Removes the stored value so reads return the default again.
    pub fn reset<K: SettingKey>(&self) -> Result<(), SettingsError> {
        self.store.remove(K::KEY)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        Ok(SettingsSnapshot {
            override_device_name: self.get::<OverrideDeviceName>()?,
            open_in_browser: self.get::<OpenInBrowser>()?,
            restore_last_url: self.get::<RestoreLastUrl>()?,
            page_zoom: self.get::<PageZoomSetting>()?,
            location_update_on_zone: self.get::<LocationUpdateOnZone>()?,
            location_update_on_background_fetch: self.get::<LocationUpdateOnBackgroundFetch>()?,
            location_update_on_significant: self.get::<LocationUpdateOnSignificant>()?,
            location_update_on_notification: self.get::<LocationUpdateOnNotification>()?,
            messaging_enabled: self.get::<MessagingEnabled>()?,
            analytics_enabled: self.get::<AnalyticsEnabled>()?,
            push_id: self.get::<PushId>()?,
            confirm_before_opening_url: self.get::<ConfirmBeforeOpeningUrl>()?,
            enter_notifications: self.get::<EnterNotifications>()?,
            exit_notifications: self.get::<ExitNotifications>()?,
            beacon_enter_notifications: self.get::<BeaconEnterNotifications>()?,
            beacon_exit_notifications: self.get::<BeaconExitNotifications>()?,
            significant_location_change_notifications: self
                .get::<SignificantLocationChangeNotifications>()?,
            background_fetch_location_change_notifications: self
                .get::<BackgroundFetchLocationChangeNotifications>()?,
            push_location_request_notifications: self.get::<PushLocationRequestNotifications>()?,
            url_scheme_location_request_notifications: self
                .get::<UrlSchemeLocationRequestNotifications>()?,
            x_callback_url_location_request_notifications: self
                .get::<XCallbackUrlLocationRequestNotifications>()?,
        })
    }

    /// Writes a full snapshot atomically; any invalid field aborts the save.
    pub fn apply_snapshot(&self, snapshot: &SettingsSnapshot) -> Result<(), SettingsError> {
        let entries = vec![
            entry::<OverrideDeviceName>(&snapshot.override_device_name)?,
            entry::<OpenInBrowser>(&snapshot.open_in_browser)?,
            entry::<RestoreLastUrl>(&snapshot.restore_last_url)?,
            entry::<PageZoomSetting>(&snapshot.page_zoom)?,
            entry::<LocationUpdateOnZone>(&snapshot.location_update_on_zone)?,
            entry::<LocationUpdateOnBackgroundFetch>(&snapshot.location_update_on_background_fetch)?,
            entry::<LocationUpdateOnSignificant>(&snapshot.location_update_on_significant)?,
            entry::<LocationUpdateOnNotification>(&snapshot.location_update_on_notification)?,
            entry::<MessagingEnabled>(&snapshot.messaging_enabled)?,
            entry::<AnalyticsEnabled>(&snapshot.analytics_enabled)?,
            entry::<PushId>(&snapshot.push_id)?,
            entry::<ConfirmBeforeOpeningUrl>(&snapshot.confirm_before_opening_url)?,
            entry::<EnterNotifications>(&snapshot.enter_notifications)?,
            entry::<ExitNotifications>(&snapshot.exit_notifications)?,
            entry::<BeaconEnterNotifications>(&snapshot.beacon_enter_notifications)?,
            entry::<BeaconExitNotifications>(&snapshot.beacon_exit_notifications)?,
            entry::<SignificantLocationChangeNotifications>(
                &snapshot.significant_location_change_notifications,
            )?,
            entry::<BackgroundFetchLocationChangeNotifications>(
                &snapshot.background_fetch_location_change_notifications,
            )?,
            entry::<PushLocationRequestNotifications>(
                &snapshot.push_location_request_notifications,
            )?,
            entry::<UrlSchemeLocationRequestNotifications>(
                &snapshot.url_scheme_location_request_notifications,
            )?,
            entry::<XCallbackUrlLocationRequestNotifications>(
                &snapshot.x_callback_url_location_request_notifications,
            )?,
        ];
        self.store.set_raw_many(&entries)?;
        Ok(())
    }
}

fn entry<K: SettingKey>(value: &K::Value) -> Result<(&'static str, String), SettingsError> {
    Ok((K::KEY, encode::<K>(value)?))
}

fn encode<K: SettingKey>(value: &K::Value) -> Result<String, SettingsError> {
    K::validate(value).map_err(|reason| SettingsError::InvalidValue { key: K::KEY, reason })?;
    serde_json::to_string(value).map_err(|err| SettingsError::InvalidValue {
        key: K::KEY,
        reason: err.to_string(),
    })
}
