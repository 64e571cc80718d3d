//! Domain model: hierarchy node records and the property union.

pub mod entity;
pub mod property;
pub mod value;

pub use entity::{
    ChannelControlRecord, ChannelRecord, ConnectorRecord, DeviceAttributeRecord,
    DeviceControlRecord, DeviceRecord,
};
pub use property::{
    ChannelPropertyRecord, ConnectorPropertyRecord, DevicePropertyRecord, DynamicSource,
    MappedSource, PropertyAccessError, PropertyDef, PropertySource, SourceKind, VariableSource,
};
pub use value::{DataType, PropertyFormat, PropertyValue};
