//! Typed views over entity payloads.
//!
//! The ordering layer stores payloads as opaque JSON documents. These structs
//! are the shapes written by the settings screens for each collection.

use crate::model::entity::{CollectionKey, Entity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Payload conversion helpers shared by every typed payload.
pub trait EntityPayload: Serialize + DeserializeOwned {
    /// Serializes into an entity payload document.
    fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Reads a typed payload back from an entity.
    fn from_entity(entity: &Entity) -> serde_json::Result<Self> {
        serde_json::from_value(entity.payload.clone())
    }
}

/// Automation action shown on widgets and the watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub text: String,
    pub icon_name: String,
    pub icon_color: String,
    pub background_color: String,
    pub text_color: String,
}

impl Default for ActionPayload {
    fn default() -> Self {
        Self {
            text: String::new(),
            icon_name: "upload".to_string(),
            icon_color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            text_color: "#000000".to_string(),
        }
    }
}

impl EntityPayload for ActionPayload {}

/// Actionable notification category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    /// Uppercased identifier the push payload refers to.
    pub identifier: String,
    pub hidden_preview_placeholder: Option<String>,
    pub summary_format: Option<String>,
    #[serde(default)]
    pub action_identifiers: Vec<String>,
}

impl EntityPayload for CategoryPayload {}

/// Watch complication families grouped the way the watch face picker shows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplicationFamily {
    ModularSmall,
    ModularLarge,
    UtilitarianSmall,
    UtilitarianSmallFlat,
    UtilitarianLarge,
    CircularSmall,
    ExtraLarge,
    GraphicCorner,
    GraphicBezel,
    GraphicCircular,
    GraphicRectangular,
}

/// Configuration of one complication family; at most one per family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplicationPayload {
    pub family: ComplicationFamily,
    pub template: Option<String>,
}

impl EntityPayload for ComplicationPayload {}

/// Monitored region synchronized from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonePayload {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub radius: f64,
    pub tracking_enabled: bool,
    pub beacon_uuid: Option<String>,
    pub beacon_major: Option<u16>,
    pub beacon_minor: Option<u16>,
}

impl EntityPayload for ZonePayload {}

/// Checks that `payload` decodes as the typed payload of `key`.
pub fn validate_payload(key: CollectionKey, payload: &serde_json::Value) -> serde_json::Result<()> {
    fn decode<P: EntityPayload>(payload: &serde_json::Value) -> serde_json::Result<()> {
        P::deserialize(payload).map(drop)
    }

    match key {
        CollectionKey::Actions => decode::<ActionPayload>(payload),
        CollectionKey::NotificationCategories => decode::<CategoryPayload>(payload),
        CollectionKey::WatchComplications => decode::<ComplicationPayload>(payload),
        CollectionKey::Zones => decode::<ZonePayload>(payload),
    }
}

/// Finds the configuration bound to `family` among complication entities.
///
/// Entities whose payload does not decode are skipped.
pub fn complication_for_family(
    entities: &[Entity],
    family: ComplicationFamily,
) -> Option<&Entity> {
    entities.iter().find(|entity| {
        ComplicationPayload::from_entity(entity)
            .map(|payload| payload.family == family)
            .unwrap_or(false)
    })
}
