//! Typed user preferences.
//!
//! # Responsibility
//! - Name every preference the settings screens read or write.
//! - Persist values through an injected `SettingsStore`.
//!
//! # Invariants
//! - Only keys declared in `keys` can be read or written.
//! - A missing or undecodable stored value reads as the key default.

pub mod keys;
mod service;
mod store;

pub use keys::{
    AnalyticsEnabled, BackgroundFetchLocationChangeNotifications, BeaconEnterNotifications,
    BeaconExitNotifications, ConfirmBeforeOpeningUrl, EnterNotifications, ExitNotifications,
    LocationUpdateOnBackgroundFetch, LocationUpdateOnNotification, LocationUpdateOnSignificant,
    LocationUpdateOnZone, MessagingEnabled, OpenInBrowser, OpenInBrowserChoice,
    OverrideDeviceName, PageZoom, PageZoomSetting, PushId, PushLocationRequestNotifications,
    RestoreLastUrl, SettingKey, SignificantLocationChangeNotifications,
    UrlSchemeLocationRequestNotifications, XCallbackUrlLocationRequestNotifications,
};
pub use service::{SettingsError, SettingsService, SettingsSnapshot};
pub use store::{SettingsStore, SqliteSettingsStore};
