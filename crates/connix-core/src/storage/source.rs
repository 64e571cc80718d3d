// ── Relational-store seam ──
//
// The relational store is an external collaborator; the snapshot
// writer only needs repository-style finder queries scoped by parent.
// Hosts implement this trait over their persistence layer; the
// in-memory implementation below backs tests and embedded setups.

use dashmap::DashMap;
use uuid::Uuid;

use crate::model::{
    ChannelControlRecord, ChannelPropertyRecord, ChannelRecord, ConnectorPropertyRecord,
    ConnectorRecord, DeviceAttributeRecord, DeviceControlRecord, DevicePropertyRecord,
    DeviceRecord,
};

/// Finder queries the snapshot writer walks, scoped by parent entity.
pub trait HierarchySource: Send + Sync {
    fn connectors(&self) -> Vec<ConnectorRecord>;
    fn connector_properties(&self, connector: &Uuid) -> Vec<ConnectorPropertyRecord>;
    fn devices(&self, connector: &Uuid) -> Vec<DeviceRecord>;
    fn device_properties(&self, device: &Uuid) -> Vec<DevicePropertyRecord>;
    fn device_controls(&self, device: &Uuid) -> Vec<DeviceControlRecord>;
    fn device_attributes(&self, device: &Uuid) -> Vec<DeviceAttributeRecord>;
    fn channels(&self, device: &Uuid) -> Vec<ChannelRecord>;
    fn channel_properties(&self, channel: &Uuid) -> Vec<ChannelPropertyRecord>;
    fn channel_controls(&self, channel: &Uuid) -> Vec<ChannelControlRecord>;
}

/// In-memory `HierarchySource` for tests and embedded use.
#[derive(Default)]
pub struct InMemoryHierarchy {
    connectors: DashMap<Uuid, ConnectorRecord>,
    connector_properties: DashMap<Uuid, ConnectorPropertyRecord>,
    devices: DashMap<Uuid, DeviceRecord>,
    device_properties: DashMap<Uuid, DevicePropertyRecord>,
    device_controls: DashMap<Uuid, DeviceControlRecord>,
    device_attributes: DashMap<Uuid, DeviceAttributeRecord>,
    channels: DashMap<Uuid, ChannelRecord>,
    channel_properties: DashMap<Uuid, ChannelPropertyRecord>,
    channel_controls: DashMap<Uuid, ChannelControlRecord>,
}

impl InMemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connector(&self, record: ConnectorRecord) {
        self.connectors.insert(record.id, record);
    }

    pub fn insert_connector_property(&self, record: ConnectorPropertyRecord) {
        self.connector_properties.insert(record.id, record);
    }

    pub fn insert_device(&self, record: DeviceRecord) {
        self.devices.insert(record.id, record);
    }

    pub fn insert_device_property(&self, record: DevicePropertyRecord) {
        self.device_properties.insert(record.id, record);
    }

    pub fn insert_device_control(&self, record: DeviceControlRecord) {
        self.device_controls.insert(record.id, record);
    }

    pub fn insert_device_attribute(&self, record: DeviceAttributeRecord) {
        self.device_attributes.insert(record.id, record);
    }

    pub fn insert_channel(&self, record: ChannelRecord) {
        self.channels.insert(record.id, record);
    }

    pub fn insert_channel_property(&self, record: ChannelPropertyRecord) {
        self.channel_properties.insert(record.id, record);
    }

    pub fn insert_channel_control(&self, record: ChannelControlRecord) {
        self.channel_controls.insert(record.id, record);
    }
}

impl HierarchySource for InMemoryHierarchy {
    fn connectors(&self) -> Vec<ConnectorRecord> {
        self.connectors.iter().map(|r| r.value().clone()).collect()
    }

    fn connector_properties(&self, connector: &Uuid) -> Vec<ConnectorPropertyRecord> {
        self.connector_properties
            .iter()
            .filter(|r| r.connector == *connector)
            .map(|r| r.value().clone())
            .collect()
    }

    fn devices(&self, connector: &Uuid) -> Vec<DeviceRecord> {
        self.devices
            .iter()
            .filter(|r| r.connector == *connector)
            .map(|r| r.value().clone())
            .collect()
    }

    fn device_properties(&self, device: &Uuid) -> Vec<DevicePropertyRecord> {
        self.device_properties
            .iter()
            .filter(|r| r.device == *device)
            .map(|r| r.value().clone())
            .collect()
    }

    fn device_controls(&self, device: &Uuid) -> Vec<DeviceControlRecord> {
        self.device_controls
            .iter()
            .filter(|r| r.device == *device)
            .map(|r| r.value().clone())
            .collect()
    }

    fn device_attributes(&self, device: &Uuid) -> Vec<DeviceAttributeRecord> {
        self.device_attributes
            .iter()
            .filter(|r| r.device == *device)
            .map(|r| r.value().clone())
            .collect()
    }

    fn channels(&self, device: &Uuid) -> Vec<ChannelRecord> {
        self.channels
            .iter()
            .filter(|r| r.device == *device)
            .map(|r| r.value().clone())
            .collect()
    }

    fn channel_properties(&self, channel: &Uuid) -> Vec<ChannelPropertyRecord> {
        self.channel_properties
            .iter()
            .filter(|r| r.channel == *channel)
            .map(|r| r.value().clone())
            .collect()
    }

    fn channel_controls(&self, channel: &Uuid) -> Vec<ChannelControlRecord> {
        self.channel_controls
            .iter()
            .filter(|r| r.channel == *channel)
            .map(|r| r.value().clone())
            .collect()
    }
}
