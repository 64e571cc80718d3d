//! Runtime core for device connector processes.
//!
//! This crate owns the business logic, domain model, and reactive data
//! infrastructure a connector process runs on:
//!
//! - **[`ConnectorContainer`]** — Binds a persisted connector record to
//!   exactly one live [`Connector`] instance, resolved through a
//!   [`FactoryRegistry`] and memoized for the container's lifetime.
//!   Also the event seam: terminate/restart events dispatched into it
//!   are re-broadcast to subscribers.
//!
//! - **[`ConnectorSupervisor`]** — Drives a container through its
//!   lifecycle: spawns the connector run loop, the stale-write
//!   watchdog, and an orderly-shutdown listener.
//!
//! - **[`ReadCache`]** — Lock-free repositories (`DashMap` +
//!   `tokio::sync::watch` snapshot channels) over the device hierarchy:
//!   connectors, devices, channels, and their properties, controls and
//!   attributes.
//!
//! - **[`SnapshotStorage`]** — Writer/reader pair over the single JSON
//!   snapshot file that synchronizes the relational source of truth
//!   with the in-process read cache.
//!
//! - **[`PropertyStateStore`]** — Expected-vs-actual reconciliation for
//!   property values, with pending-write tracking and validity flags.
//!
//! - **[`CommandRouter`]** — Pure dispatch of inbound property and
//!   control writes to the bound container.

pub mod command;
pub mod config;
pub mod connector;
pub mod error;
pub mod model;
pub mod state;
pub mod storage;
pub mod store;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{
    CommandRouter, ControlKind, ControlWriteRequest, PropertyKind, PropertyWriteRequest,
};
pub use config::RuntimeConfig;
pub use connector::{
    Connector, ConnectorContainer, ConnectorEvent, ConnectorFactory, ControlTarget, ControlWrite,
    EventContext, FactoryRegistry, PropertyTarget, PropertyWrite,
};
pub use error::CoreError;
pub use state::{PropertyState, PropertyStateStore, SharedStateStore, ValuePair};
pub use storage::{HierarchySource, InMemoryHierarchy, SnapshotStorage};
pub use store::{ChangeSet, ChangeStream, ReadCache};
pub use supervisor::{ConnectorSupervisor, SupervisorState};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ChannelControlRecord,
    ChannelPropertyRecord,
    // Core entities
    ChannelRecord,
    ConnectorPropertyRecord,
    ConnectorRecord,
    DataType,
    DeviceAttributeRecord,
    DeviceControlRecord,
    DevicePropertyRecord,
    DeviceRecord,
    // Property typing
    PropertyFormat,
    PropertySource,
    PropertyValue,
};
