//! Read-cache repositories: the runtime's fast-path view of the
//! connector→device→channel→property/control hierarchy.
//!
//! One repository per entity kind, aggregated in [`ReadCache`].
//! Contents are always a projection of the last successfully loaded
//! snapshot — only the snapshot reader mutates them, installing each
//! load as one atomic `replace()` generation per repository.

pub mod changes;
pub mod repository;

use uuid::Uuid;

pub use changes::{ChangeSet, ChangeStream};
pub use repository::{Record, Repository};

use crate::model::{
    ChannelControlRecord, ChannelPropertyRecord, ChannelRecord, ConnectorPropertyRecord,
    ConnectorRecord, DeviceAttributeRecord, DeviceControlRecord, DevicePropertyRecord,
    DeviceRecord,
};

// ── Record impls for the nine entity kinds ──────────────────────────

impl Record for ConnectorRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        None
    }
}

impl Record for DeviceRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.connector)
    }
}

impl Record for ChannelRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.device)
    }
}

impl Record for ConnectorPropertyRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.connector)
    }
}

impl Record for DevicePropertyRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.device)
    }
}

impl Record for ChannelPropertyRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.channel)
    }
}

impl Record for DeviceAttributeRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.device)
    }
}

impl Record for DeviceControlRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.name
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.device)
    }
}

impl Record for ChannelControlRecord {
    fn id(&self) -> Uuid {
        self.id
    }
    fn identifier(&self) -> &str {
        &self.name
    }
    fn parent(&self) -> Option<Uuid> {
        Some(self.channel)
    }
}

// ── ReadCache ───────────────────────────────────────────────────────

/// Aggregate of the nine per-kind repositories.
pub struct ReadCache {
    pub connectors: Repository<ConnectorRecord>,
    pub devices: Repository<DeviceRecord>,
    pub channels: Repository<ChannelRecord>,
    pub connector_properties: Repository<ConnectorPropertyRecord>,
    pub device_properties: Repository<DevicePropertyRecord>,
    pub device_controls: Repository<DeviceControlRecord>,
    pub device_attributes: Repository<DeviceAttributeRecord>,
    pub channel_properties: Repository<ChannelPropertyRecord>,
    pub channel_controls: Repository<ChannelControlRecord>,
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            connectors: Repository::new(),
            devices: Repository::new(),
            channels: Repository::new(),
            connector_properties: Repository::new(),
            device_properties: Repository::new(),
            device_controls: Repository::new(),
            device_attributes: Repository::new(),
            channel_properties: Repository::new(),
            channel_controls: Repository::new(),
        }
    }

    /// Empty every repository.
    pub fn clear(&self) {
        self.connectors.clear();
        self.devices.clear();
        self.channels.clear();
        self.connector_properties.clear();
        self.device_properties.clear();
        self.device_controls.clear();
        self.device_attributes.clear();
        self.channel_properties.clear();
        self.channel_controls.clear();
    }

    /// Total record count across all repositories.
    pub fn len(&self) -> usize {
        self.connectors.len()
            + self.devices.len()
            + self.channels.len()
            + self.connector_properties.len()
            + self.device_properties.len()
            + self.device_controls.len()
            + self.device_attributes.len()
            + self.channel_properties.len()
            + self.channel_controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Hierarchy traversal helpers ──────────────────────────────────
    //
    // Chained parent-UUID lookups; no joins.

    /// All devices under a connector, including sub-devices of bridges.
    pub fn devices_for_connector(&self, connector: &Uuid) -> Vec<std::sync::Arc<DeviceRecord>> {
        self.devices.find_by_parent(connector)
    }

    pub fn channels_for_device(&self, device: &Uuid) -> Vec<std::sync::Arc<ChannelRecord>> {
        self.channels.find_by_parent(device)
    }

    /// Resolve the connector that owns a channel, walking channel →
    /// device → connector.
    pub fn connector_for_channel(&self, channel: &Uuid) -> Option<std::sync::Arc<ConnectorRecord>> {
        let channel = self.channels.get(channel)?;
        let device = self.devices.get(&channel.device)?;
        self.connectors.get(&device.connector)
    }

    /// Resolve the connector that owns a device.
    pub fn connector_for_device(&self, device: &Uuid) -> Option<std::sync::Arc<ConnectorRecord>> {
        let device = self.devices.get(device)?;
        self.connectors.get(&device.connector)
    }
}
