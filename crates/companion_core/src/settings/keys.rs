//! Recognized preference keys and their value types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One typed preference.
pub trait SettingKey {
    /// Storage key; stable across releases.
    const KEY: &'static str;
    type Value: Serialize + DeserializeOwned + Clone + PartialEq;

    fn default_value() -> Self::Value;

    /// Rejects values that decode but are out of range.
    fn validate(_value: &Self::Value) -> Result<(), String> {
        Ok(())
    }
}

macro_rules! bool_setting {
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SettingKey for $name {
            const KEY: &'static str = $key;
            type Value = bool;

            fn default_value() -> bool {
                false
            }
        }
    };
}

bool_setting!(
    /// Reopen the last visited page on launch.
    RestoreLastUrl,
    "restore_last_url"
);
bool_setting!(
    /// Send a location update when a zone is entered or exited.
    LocationUpdateOnZone,
    "location_update_on_zone"
);
bool_setting!(
    /// Send a location update on background refresh.
    LocationUpdateOnBackgroundFetch,
    "location_update_on_background_fetch"
);
bool_setting!(
    /// Send a location update on significant location change.
    LocationUpdateOnSignificant,
    "location_update_on_significant"
);
bool_setting!(
    /// Send a location update when a push notification requests one.
    LocationUpdateOnNotification,
    "location_update_on_notification"
);
bool_setting!(MessagingEnabled, "messaging_enabled");
bool_setting!(AnalyticsEnabled, "analytics_enabled");
bool_setting!(
    /// Ask before opening a URL carried by a notification.
    ConfirmBeforeOpeningUrl,
    "confirm_before_opening_url"
);

// Local notifications posted when a location update is sent.
bool_setting!(EnterNotifications, "enter_notifications");
bool_setting!(ExitNotifications, "exit_notifications");
bool_setting!(BeaconEnterNotifications, "beacon_enter_notifications");
bool_setting!(BeaconExitNotifications, "beacon_exit_notifications");
bool_setting!(
    SignificantLocationChangeNotifications,
    "significant_location_change_notifications"
);
bool_setting!(
    BackgroundFetchLocationChangeNotifications,
    "background_fetch_location_change_notifications"
);
bool_setting!(
    /// Update triggered by a push notification.
    PushLocationRequestNotifications,
    "push_location_request_notifications"
);
bool_setting!(
    UrlSchemeLocationRequestNotifications,
    "url_scheme_location_request_notifications"
);
bool_setting!(
    /// Update triggered through an x-callback-url.
    XCallbackUrlLocationRequestNotifications,
    "x_callback_url_location_request_notifications"
);

/// Device name reported to the server instead of the OS name.
#[derive(Debug, Clone, Copy)]
pub struct OverrideDeviceName;

impl SettingKey for OverrideDeviceName {
    const KEY: &'static str = "override_device_name";
    type Value = Option<String>;

    fn default_value() -> Self::Value {
        None
    }

    fn validate(value: &Self::Value) -> Result<(), String> {
        match value {
            Some(name) if name.trim().is_empty() => {
                Err("device name override must not be blank".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Push identifier registered for this device.
#[derive(Debug, Clone, Copy)]
pub struct PushId;

impl SettingKey for PushId {
    const KEY: &'static str = "push_id";
    type Value = Option<String>;

    fn default_value() -> Self::Value {
        None
    }
}

/// Browser used for external links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenInBrowserChoice {
    Chrome,
    Firefox,
    Safari,
    SafariInApp,
}

impl OpenInBrowserChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::SafariInApp => "safari_in_app",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chrome" => Some(Self::Chrome),
            "firefox" => Some(Self::Firefox),
            "safari" => Some(Self::Safari),
            "safari_in_app" => Some(Self::SafariInApp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpenInBrowser;

impl SettingKey for OpenInBrowser {
    const KEY: &'static str = "open_in_browser";
    type Value = OpenInBrowserChoice;

    fn default_value() -> Self::Value {
        OpenInBrowserChoice::Safari
    }
}

/// Web view zoom in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageZoom(pub u16);

impl PageZoom {
    pub const MIN: u16 = 50;
    pub const MAX: u16 = 300;
    pub const DEFAULT: PageZoom = PageZoom(100);
}

impl Display for PageZoom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageZoomSetting;

impl SettingKey for PageZoomSetting {
    const KEY: &'static str = "page_zoom";
    type Value = PageZoom;

    fn default_value() -> Self::Value {
        PageZoom::DEFAULT
    }

    fn validate(value: &Self::Value) -> Result<(), String> {
        if (PageZoom::MIN..=PageZoom::MAX).contains(&value.0) {
            Ok(())
        } else {
            Err(format!(
                "page zoom {value} outside {}..={}",
                PageZoom::MIN,
                PageZoom::MAX
            ))
        }
    }
}
