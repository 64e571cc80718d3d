// ── Hierarchy node records ──
//
// Flat, UUID-keyed projections of the relational store. Three
// structurally identical levels (connector → device → channel) plus
// controls and device attributes. Records carry no behavior — the
// read cache stores them raw and traversal is done by chaining
// parent-UUID lookups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub id: Uuid,
    pub identifier: String,
    /// Type discriminator the factory registry resolves implementations by.
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub identifier: String,
    pub category: String,
    pub connector: Uuid,
    /// Set for sub-devices exposed through a bridge/parent device.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub identifier: String,
    pub category: String,
    pub device: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

/// Free-form device metadata (manufacturer, model, MAC, firmware).
/// Not part of runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttributeRecord {
    pub id: Uuid,
    pub identifier: String,
    pub device: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceControlRecord {
    pub id: Uuid,
    pub name: String,
    pub device: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelControlRecord {
    pub id: Uuid,
    pub name: String,
    pub channel: Uuid,
}
