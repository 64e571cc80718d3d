//! Connector capability contract and plugin resolution.
//!
//! A [`Connector`] owns communication with one family of physical
//! devices. Implementations are resolved through a
//! [`FactoryRegistry`] assembled by the hosting application and bound
//! to a [`ConnectorContainer`](container::ConnectorContainer) for the
//! lifetime of the connector process.

pub mod container;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{
    ChannelControlRecord, ChannelPropertyRecord, ChannelRecord, ConnectorPropertyRecord,
    ConnectorRecord, DeviceAttributeRecord, DeviceControlRecord, DevicePropertyRecord,
    DeviceRecord, PropertyValue,
};

pub use container::{ConnectorContainer, ConnectorEvent, EventContext};

// ── Write instructions ──────────────────────────────────────────────

/// Resolved property entity a write is aimed at.
#[derive(Debug, Clone)]
pub enum PropertyTarget {
    Connector(Arc<ConnectorPropertyRecord>),
    Device(Arc<DevicePropertyRecord>),
    Channel(Arc<ChannelPropertyRecord>),
}

impl PropertyTarget {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Connector(p) => p.id,
            Self::Device(p) => p.id,
            Self::Channel(p) => p.id,
        }
    }
}

/// Instruction for a device-facing property write.
#[derive(Debug, Clone)]
pub struct PropertyWrite {
    pub target: PropertyTarget,
    pub value: PropertyValue,
}

/// Resolved control entity an action is aimed at.
#[derive(Debug, Clone)]
pub enum ControlTarget {
    /// Connector-level controls are not cached as records; the action
    /// names the control directly.
    Connector {
        connector: Arc<ConnectorRecord>,
        name: String,
    },
    Device(Arc<DeviceControlRecord>),
    Channel(Arc<ChannelControlRecord>),
}

/// Instruction for a control action (reboot, factory-reset, …).
#[derive(Debug, Clone)]
pub struct ControlWrite {
    pub target: ControlTarget,
    /// Optional single argument some controls accept.
    pub params: Option<PropertyValue>,
}

// ── Connector ───────────────────────────────────────────────────────

/// Capability contract every connector plugin implements.
///
/// `execute` and `discover` are the only long-lived operations: they
/// resolve when their loop ends, not when it starts. Everything else
/// returns promptly. The notification hooks are fire-and-forget hints
/// the connector may use to refresh internal device caches; all have
/// no-op defaults.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Enter the run loop; resolves when the loop ends.
    async fn execute(&self) -> Result<(), CoreError>;

    /// Vendor-specific device discovery pass; also long-lived.
    async fn discover(&self) -> Result<(), CoreError>;

    /// Request graceful shutdown of the run loop. Advisory and
    /// non-blocking — it does not wait.
    fn terminate(&self);

    /// Whether termination should be deferred because in-flight device
    /// I/O would be lost.
    fn has_unfinished_tasks(&self) -> bool;

    // ── Entity notifications (fire-and-forget) ───────────────────────

    fn initialize_device(&self, _device: &DeviceRecord) {}
    fn notify_device(&self, _device: &DeviceRecord) {}
    fn remove_device(&self, _device: Uuid) {}

    fn initialize_channel(&self, _channel: &ChannelRecord) {}
    fn notify_channel(&self, _channel: &ChannelRecord) {}
    fn remove_channel(&self, _channel: Uuid) {}

    fn initialize_device_property(&self, _property: &DevicePropertyRecord) {}
    fn notify_device_property(&self, _property: &DevicePropertyRecord) {}
    fn remove_device_property(&self, _property: Uuid) {}

    fn initialize_channel_property(&self, _property: &ChannelPropertyRecord) {}
    fn notify_channel_property(&self, _property: &ChannelPropertyRecord) {}
    fn remove_channel_property(&self, _property: Uuid) {}

    fn initialize_device_attribute(&self, _attribute: &DeviceAttributeRecord) {}
    fn notify_device_attribute(&self, _attribute: &DeviceAttributeRecord) {}
    fn remove_device_attribute(&self, _attribute: Uuid) {}

    fn initialize_device_control(&self, _control: &DeviceControlRecord) {}
    fn notify_device_control(&self, _control: &DeviceControlRecord) {}
    fn remove_device_control(&self, _control: Uuid) {}

    fn initialize_channel_control(&self, _control: &ChannelControlRecord) {}
    fn notify_channel_control(&self, _control: &ChannelControlRecord) {}
    fn remove_channel_control(&self, _control: Uuid) {}

    // ── Hardware write path ──────────────────────────────────────────

    /// Forward a property value change to the physical device. The
    /// only path by which a property write reaches hardware.
    async fn write_property(&self, write: &PropertyWrite) -> Result<(), CoreError>;

    /// Forward a control action to the physical device.
    async fn write_control(&self, write: &ControlWrite) -> Result<(), CoreError>;
}

// ── Factory registry ────────────────────────────────────────────────

/// Builds a connector implementation for a persisted connector record.
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, record: &ConnectorRecord) -> Result<Arc<dyn Connector>, CoreError>;
}

/// `category -> factory` table, assembled at process start by the
/// hosting application. The container only consumes it.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn ConnectorFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, category: impl Into<String>, factory: Arc<dyn ConnectorFactory>) {
        self.factories.insert(category.into(), factory);
    }

    pub fn get(&self, category: &str) -> Option<Arc<dyn ConnectorFactory>> {
        self.factories.get(category).map(Arc::clone)
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
