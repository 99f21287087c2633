//! Orderable entity domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by every user-reorderable collection
//!   (actions, notification categories, watch complications, zones).
//! - Name the collections and how fresh identifiers are minted for each.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused for another entity.
//! - `position` is a zero-based dense ordering key within one collection.
//! - `payload` is opaque to ordering/synchronization code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of one persisted entity.
pub type EntityId = String;

/// Closed set of persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKey {
    /// Automation actions shown in the widget and on the watch.
    Actions,
    /// Actionable push notification categories.
    NotificationCategories,
    /// One configuration per watch complication family.
    WatchComplications,
    /// Monitored location zones (read-only in settings).
    Zones,
}

impl CollectionKey {
    pub const ALL: [CollectionKey; 4] = [
        Self::Actions,
        Self::NotificationCategories,
        Self::WatchComplications,
        Self::Zones,
    ];

    /// Storage tag persisted in `entities.collection`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actions => "actions",
            Self::NotificationCategories => "notification_categories",
            Self::WatchComplications => "watch_complications",
            Self::Zones => "zones",
        }
    }

    /// Mints a fresh, never-before-seen identifier for this collection.
    pub fn new_entity_id(self) -> EntityId {
        let uuid = Uuid::new_v4();
        match self {
            Self::NotificationCategories => format!("new_category_{uuid}"),
            _ => uuid.to_string(),
        }
    }

    /// Zones are synchronized from the server and only listed in settings.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Zones)
    }

    /// Label for rows created but not yet named by the user.
    pub fn draft_title(self) -> &'static str {
        match self {
            Self::Actions => "New Action",
            Self::NotificationCategories => "New Category",
            Self::WatchComplications => "New Complication",
            Self::Zones => "New Zone",
        }
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a collection tag is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollection(pub String);

impl Display for UnknownCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown collection `{}`", self.0)
    }
}

impl std::error::Error for UnknownCollection {}

impl FromStr for CollectionKey {
    type Err = UnknownCollection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or(UnknownCollection(normalized))
    }
}

/// Canonical persisted record for one orderable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// User-facing display label.
    pub name: String,
    /// Dense zero-based order key inside the owning collection.
    pub position: i64,
    /// Kind-specific fields; see `model::payload` for typed views.
    pub payload: Value,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            payload: Value::Object(Default::default()),
        }
    }

    /// Creates an unsaved draft bound to a freshly minted id.
    pub fn draft(key: CollectionKey, position: i64) -> Self {
        Self::new(key.new_entity_id(), key.draft_title(), position)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
