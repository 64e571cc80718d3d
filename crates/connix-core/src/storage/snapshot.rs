// ── Snapshot writer / reader ──
//
// One JSON document holds the whole hierarchy: nested maps keyed by
// UUID string at every level, each leaf the flattened attribute map of
// the entity. `write()` walks the relational source and then triggers
// `read()` so in-process caches observe the update without a restart.
//
// The reader stages every valid record before touching the cache and
// installs the staged load through the repositories' atomic `replace`,
// so a concurrent reader never observes a partial hierarchy and a bad
// root document leaves prior contents intact. Malformed individual
// records degrade to missing cache entries, never to an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::source::HierarchySource;
use crate::error::CoreError;
use crate::model::{
    ChannelControlRecord, ChannelPropertyRecord, ChannelRecord, ConnectorPropertyRecord,
    ConnectorRecord, DeviceAttributeRecord, DeviceControlRecord, DevicePropertyRecord,
    DeviceRecord,
};
use crate::store::{ReadCache, Record};

/// Writer/reader pair over the single well-known snapshot file.
pub struct SnapshotStorage {
    path: PathBuf,
    cache: Arc<ReadCache>,
}

impl SnapshotStorage {
    pub fn new(path: impl Into<PathBuf>, cache: Arc<ReadCache>) -> Self {
        Self {
            path: path.into(),
            cache,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    // ── Writer ───────────────────────────────────────────────────────

    /// Walk the relational source connector-by-connector and serialize
    /// the whole hierarchy to the snapshot file, then reload the read
    /// cache from what was written.
    pub fn write(&self, source: &dyn HierarchySource) -> Result<(), CoreError> {
        let mut document = IndexMap::new();

        let mut connectors = source.connectors();
        connectors.sort_by(|a, b| a.identifier.cmp(&b.identifier));

        for connector in connectors {
            let mut node = flatten(&connector)?;

            node.insert(
                "properties".to_owned(),
                keyed_map(source.connector_properties(&connector.id))?,
            );

            let mut devices = source.devices(&connector.id);
            devices.sort_by(|a, b| a.identifier.cmp(&b.identifier));
            let mut device_nodes = serde_json::Map::new();
            for device in devices {
                let mut device_node = flatten(&device)?;
                device_node.insert(
                    "properties".to_owned(),
                    keyed_map(source.device_properties(&device.id))?,
                );
                device_node.insert(
                    "controls".to_owned(),
                    keyed_map(source.device_controls(&device.id))?,
                );
                device_node.insert(
                    "attributes".to_owned(),
                    keyed_map(source.device_attributes(&device.id))?,
                );

                let mut channels = source.channels(&device.id);
                channels.sort_by(|a, b| a.identifier.cmp(&b.identifier));
                let mut channel_nodes = serde_json::Map::new();
                for channel in channels {
                    let mut channel_node = flatten(&channel)?;
                    channel_node.insert(
                        "properties".to_owned(),
                        keyed_map(source.channel_properties(&channel.id))?,
                    );
                    channel_node.insert(
                        "controls".to_owned(),
                        keyed_map(source.channel_controls(&channel.id))?,
                    );
                    channel_nodes.insert(channel.id.to_string(), Value::Object(channel_node));
                }
                device_node.insert("channels".to_owned(), Value::Object(channel_nodes));

                device_nodes.insert(device.id.to_string(), Value::Object(device_node));
            }
            node.insert("devices".to_owned(), Value::Object(device_nodes));

            document.insert(connector.id.to_string(), Value::Object(node));
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let payload = serde_json::to_vec_pretty(&document)?;
        std::fs::write(&self.path, payload)?;
        info!(path = %self.path.display(), connectors = document.len(), "snapshot written");

        self.read();
        Ok(())
    }

    // ── Reader ───────────────────────────────────────────────────────

    /// Load the snapshot file into the read cache.
    ///
    /// Missing file: no-op (fresh install). Unparseable or non-map
    /// root: the whole read is aborted and prior cache contents stay
    /// visible. Anything else is staged first and swapped in per
    /// repository as one atomic generation, which makes `read()`
    /// idempotent and partial loads unobservable.
    pub fn read(&self) {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file, nothing cached yet");
                return;
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot read failed, keeping prior cache"
                );
                return;
            }
        };

        let root: Value = match serde_json::from_str(&raw) {
            Ok(root) => root,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot unparseable, keeping prior cache"
                );
                return;
            }
        };
        let Some(connectors) = root.as_object() else {
            warn!(path = %self.path.display(), "snapshot root is not a map, keeping prior cache");
            return;
        };

        let mut staged = StagedLoad::default();
        for (key, node) in connectors {
            if stage_connector(key, node, &mut staged).is_none() {
                debug!(key, "skipping malformed connector record");
            }
        }

        // Last-step swap: prior contents stay visible until here.
        staged.swap_into(&self.cache);
        info!(records = self.cache.len(), "snapshot loaded into read cache");
    }
}

// ── Write helpers ───────────────────────────────────────────────────

fn flatten<T: serde::Serialize>(record: &T) -> Result<serde_json::Map<String, Value>, CoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::Storage {
            path: String::new(),
            reason: format!("record serialized to non-map JSON: {other}"),
        }),
    }
}

fn keyed_map<T>(mut items: Vec<T>) -> Result<Value, CoreError>
where
    T: Record + serde::Serialize,
{
    items.sort_by_key(Record::id);
    let mut map = serde_json::Map::new();
    for item in &items {
        map.insert(item.id().to_string(), Value::Object(flatten(item)?));
    }
    Ok(Value::Object(map))
}

// ── Read staging ────────────────────────────────────────────────────

#[derive(Default)]
struct StagedLoad {
    connectors: Vec<ConnectorRecord>,
    connector_properties: Vec<ConnectorPropertyRecord>,
    devices: Vec<DeviceRecord>,
    device_properties: Vec<DevicePropertyRecord>,
    device_controls: Vec<DeviceControlRecord>,
    device_attributes: Vec<DeviceAttributeRecord>,
    channels: Vec<ChannelRecord>,
    channel_properties: Vec<ChannelPropertyRecord>,
    channel_controls: Vec<ChannelControlRecord>,
}

impl StagedLoad {
    /// Install the staged records, each repository in one atomic
    /// `replace`. A reader racing this sees each repository either
    /// wholly old or wholly new — never cleared, never partial.
    fn swap_into(self, cache: &ReadCache) {
        cache.connectors.replace(self.connectors);
        cache.connector_properties.replace(self.connector_properties);
        cache.devices.replace(self.devices);
        cache.device_properties.replace(self.device_properties);
        cache.device_controls.replace(self.device_controls);
        cache.device_attributes.replace(self.device_attributes);
        cache.channels.replace(self.channels);
        cache.channel_properties.replace(self.channel_properties);
        cache.channel_controls.replace(self.channel_controls);
    }
}

/// Structural sub-key lookup: present and map-typed, or `None`.
fn sub_map<'a>(
    node: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Option<&'a serde_json::Map<String, Value>> {
    node.get(key)?.as_object()
}

/// Deserialize the flattened attribute map under a UUID key. A
/// non-UUID key, a malformed body, or a key disagreeing with the
/// record's own id all disqualify the record.
fn leaf<T: serde::de::DeserializeOwned + Record>(key: &str, node: &Value) -> Option<T> {
    let key_id = Uuid::parse_str(key).ok()?;
    let record: T = serde_json::from_value(node.clone()).ok()?;
    (record.id() == key_id).then_some(record)
}

fn stage_leaves<T: serde::de::DeserializeOwned + Record>(
    entries: &serde_json::Map<String, Value>,
    out: &mut Vec<T>,
) {
    for (key, node) in entries {
        match leaf(key, node) {
            Some(record) => out.push(record),
            None => debug!(key, "skipping malformed record"),
        }
    }
}

fn stage_connector(key: &str, node: &Value, staged: &mut StagedLoad) -> Option<()> {
    let obj = node.as_object()?;
    let properties = sub_map(obj, "properties")?;
    let devices = sub_map(obj, "devices")?;
    let record: ConnectorRecord = leaf(key, node)?;

    stage_leaves(properties, &mut staged.connector_properties);
    for (device_key, device_node) in devices {
        if stage_device(device_key, device_node, staged).is_none() {
            debug!(key = device_key, "skipping malformed device record");
        }
    }

    staged.connectors.push(record);
    Some(())
}

fn stage_device(key: &str, node: &Value, staged: &mut StagedLoad) -> Option<()> {
    let obj = node.as_object()?;
    let properties = sub_map(obj, "properties")?;
    let controls = sub_map(obj, "controls")?;
    let attributes = sub_map(obj, "attributes")?;
    let channels = sub_map(obj, "channels")?;
    let record: DeviceRecord = leaf(key, node)?;

    stage_leaves(properties, &mut staged.device_properties);
    stage_leaves(controls, &mut staged.device_controls);
    stage_leaves(attributes, &mut staged.device_attributes);
    for (channel_key, channel_node) in channels {
        if stage_channel(channel_key, channel_node, staged).is_none() {
            debug!(key = channel_key, "skipping malformed channel record");
        }
    }

    staged.devices.push(record);
    Some(())
}

fn stage_channel(key: &str, node: &Value, staged: &mut StagedLoad) -> Option<()> {
    let obj = node.as_object()?;
    let properties = sub_map(obj, "properties")?;
    let controls = sub_map(obj, "controls")?;
    let record: ChannelRecord = leaf(key, node)?;

    stage_leaves(properties, &mut staged.channel_properties);
    stage_leaves(controls, &mut staged.channel_controls);

    staged.channels.push(record);
    Some(())
}
