//! Snapshot write/read cycle against a real temp file.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use connix_core::model::{DynamicSource, PropertyDef, PropertySource, VariableSource};
use connix_core::{
    ChannelControlRecord, ChannelPropertyRecord, ChannelRecord, ConnectorPropertyRecord,
    ConnectorRecord, DataType, DeviceAttributeRecord, DeviceControlRecord, DevicePropertyRecord,
    DeviceRecord, InMemoryHierarchy, PropertyFormat, PropertyValue, ReadCache, SnapshotStorage,
};

fn dynamic_def(data_type: DataType) -> PropertyDef {
    PropertyDef {
        data_type,
        unit: None,
        format: PropertyFormat::None,
        invalid: None,
        scale: None,
        step: None,
        transformer: None,
        source: PropertySource::Dynamic(DynamicSource {
            settable: true,
            queryable: true,
        }),
    }
}

fn variable_def(value: PropertyValue) -> PropertyDef {
    PropertyDef {
        data_type: DataType::String,
        unit: None,
        format: PropertyFormat::None,
        invalid: None,
        scale: None,
        step: None,
        transformer: None,
        source: PropertySource::Variable(VariableSource {
            value: Some(value),
            default: None,
        }),
    }
}

/// One connector, one device with a channel, fully decorated.
struct Fixture {
    source: InMemoryHierarchy,
    connector: Uuid,
    device: Uuid,
    channel: Uuid,
    channel_property: Uuid,
}

fn fixture() -> Fixture {
    let source = InMemoryHierarchy::new();

    let connector = Uuid::new_v4();
    source.insert_connector(ConnectorRecord {
        id: connector,
        identifier: "virtual-bridge".into(),
        category: "virtual".into(),
        name: Some("Virtual bridge".into()),
        enabled: true,
    });
    source.insert_connector_property(ConnectorPropertyRecord {
        id: Uuid::new_v4(),
        identifier: "address".into(),
        name: None,
        connector,
        def: variable_def(PropertyValue::Text("10.0.0.2".into())),
    });

    let device = Uuid::new_v4();
    source.insert_device(DeviceRecord {
        id: device,
        identifier: "thermostat-1".into(),
        category: "generic".into(),
        connector,
        parent: None,
        name: Some("Hallway thermostat".into()),
    });
    source.insert_device_property(DevicePropertyRecord {
        id: Uuid::new_v4(),
        identifier: "battery".into(),
        name: None,
        device,
        def: dynamic_def(DataType::UChar),
    });
    source.insert_device_control(DeviceControlRecord {
        id: Uuid::new_v4(),
        name: "reboot".into(),
        device,
    });
    source.insert_device_attribute(DeviceAttributeRecord {
        id: Uuid::new_v4(),
        identifier: "hardware_model".into(),
        device,
        name: None,
        content: json!("TH-200"),
    });

    let channel = Uuid::new_v4();
    source.insert_channel(ChannelRecord {
        id: channel,
        identifier: "climate".into(),
        category: "generic".into(),
        device,
        name: None,
    });
    let channel_property = Uuid::new_v4();
    source.insert_channel_property(ChannelPropertyRecord {
        id: channel_property,
        identifier: "target-temperature".into(),
        name: None,
        channel,
        def: dynamic_def(DataType::Float),
    });
    source.insert_channel_control(ChannelControlRecord {
        id: Uuid::new_v4(),
        name: "calibrate".into(),
        channel,
    });

    Fixture {
        source,
        connector,
        device,
        channel,
        channel_property,
    }
}

#[test]
fn write_then_read_round_trips_the_hierarchy() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(dir.path().join("devices.json"), Arc::clone(&cache));
    let fx = fixture();

    storage.write(&fx.source).unwrap();

    assert_eq!(cache.connectors.len(), 1);
    assert_eq!(cache.connector_properties.len(), 1);
    assert_eq!(cache.devices.len(), 1);
    assert_eq!(cache.device_properties.len(), 1);
    assert_eq!(cache.device_controls.len(), 1);
    assert_eq!(cache.device_attributes.len(), 1);
    assert_eq!(cache.channels.len(), 1);
    assert_eq!(cache.channel_properties.len(), 1);
    assert_eq!(cache.channel_controls.len(), 1);

    let connector = cache.connectors.get(&fx.connector).unwrap();
    assert_eq!(connector.identifier, "virtual-bridge");
    assert_eq!(connector.name.as_deref(), Some("Virtual bridge"));

    let property = cache.channel_properties.get(&fx.channel_property).unwrap();
    assert_eq!(property.identifier, "target-temperature");
    assert_eq!(property.def.data_type, DataType::Float);
    assert_eq!(property.channel, fx.channel);

    // Traversal works on the loaded cache.
    assert_eq!(
        cache.connector_for_channel(&fx.channel).unwrap().id,
        fx.connector
    );
}

#[test]
fn reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(dir.path().join("devices.json"), Arc::clone(&cache));

    storage.write(&fixture().source).unwrap();
    let first = cache.len();

    storage.read();
    storage.read();

    assert_eq!(cache.len(), first);
}

#[test]
fn missing_file_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(dir.path().join("missing.json"), Arc::clone(&cache));

    storage.read();
    assert!(cache.is_empty());
}

#[test]
fn malformed_leaf_is_skipped_without_losing_siblings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("devices.json");
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(&path, Arc::clone(&cache));
    let fx = fixture();

    storage.write(&fx.source).unwrap();

    // Corrupt the single channel property node in place.
    let raw = std::fs::read_to_string(&path).unwrap();
    let mut root: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let node = root
        .get_mut(fx.connector.to_string())
        .and_then(|c| c.get_mut("devices"))
        .and_then(|d| d.get_mut(fx.device.to_string()))
        .and_then(|d| d.get_mut("channels"))
        .and_then(|c| c.get_mut(fx.channel.to_string()))
        .and_then(|c| c.get_mut("properties"))
        .and_then(|p| p.get_mut(fx.channel_property.to_string()))
        .unwrap();
    *node = json!("garbage");
    std::fs::write(&path, serde_json::to_vec(&root).unwrap()).unwrap();

    storage.read();

    assert!(cache.channel_properties.get(&fx.channel_property).is_none());
    assert_eq!(cache.channels.len(), 1);
    assert_eq!(cache.channel_controls.len(), 1);
    assert_eq!(cache.devices.len(), 1);
}

#[test]
fn mismatched_key_and_embedded_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("devices.json");
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(&path, Arc::clone(&cache));
    let fx = fixture();

    storage.write(&fx.source).unwrap();

    // Re-key the channel property under a foreign UUID; the embedded
    // id stays the same, so key and record now disagree.
    let raw = std::fs::read_to_string(&path).unwrap();
    let mut root: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let properties = root
        .get_mut(fx.connector.to_string())
        .and_then(|c| c.get_mut("devices"))
        .and_then(|d| d.get_mut(fx.device.to_string()))
        .and_then(|d| d.get_mut("channels"))
        .and_then(|c| c.get_mut(fx.channel.to_string()))
        .and_then(|c| c.get_mut("properties"))
        .and_then(|p| p.as_object_mut())
        .unwrap();
    let node = properties.remove(&fx.channel_property.to_string()).unwrap();
    properties.insert(Uuid::new_v4().to_string(), node);
    std::fs::write(&path, serde_json::to_vec(&root).unwrap()).unwrap();

    storage.read();

    assert!(cache.channel_properties.is_empty());
    assert_eq!(cache.channels.len(), 1);
    assert_eq!(cache.channel_controls.len(), 1);
}

#[test]
fn reload_swaps_generations_without_clearing() {
    tokio_test::block_on(async {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ReadCache::new());
        let storage = SnapshotStorage::new(dir.path().join("devices.json"), Arc::clone(&cache));
        let fx = fixture();

        storage.write(&fx.source).unwrap();
        let mut device_changes = cache.devices.changes();

        storage.read();

        // One generation step per repository: the same device is
        // present throughout, no emptied intermediate is published.
        let delta = device_changes.next_change().await.unwrap();
        assert!(delta.is_membership_unchanged());
        assert_eq!(delta.snapshot.len(), 1);
        assert!(cache.devices.get(&fx.device).is_some());
    });
}

#[test]
fn unparseable_root_keeps_prior_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("devices.json");
    let cache = Arc::new(ReadCache::new());
    let storage = SnapshotStorage::new(&path, Arc::clone(&cache));

    storage.write(&fixture().source).unwrap();
    let before = cache.len();

    std::fs::write(&path, b"{ not json").unwrap();
    storage.read();
    assert_eq!(cache.len(), before);

    std::fs::write(&path, b"[1, 2, 3]").unwrap();
    storage.read();
    assert_eq!(cache.len(), before);
}
