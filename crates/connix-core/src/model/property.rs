// ── Property definitions ──
//
// A property is one descriptor (data type, unit, format, scale, step,
// transformer) plus a source variant that says where its value lives:
//
//   Dynamic  — value supplied at runtime by hardware; only the
//              settable/queryable flags are legal accessors.
//   Variable — literal value stored with the definition; only
//              value()/default() are legal accessors.
//   Mapped   — re-exposes a parent property under another identity;
//              every accessor delegates, and the parent must be of the
//              kind that accessor requires.
//
// Accessor legality is checked at the variant boundary — calling the
// wrong accessor is a contract violation, not a soft failure.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use uuid::Uuid;

use super::value::{DataType, PropertyFormat, PropertyValue};

// ── Errors ──────────────────────────────────────────────────────────

/// Contract violations on the property union.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyAccessError {
    #[error("accessor `{accessor}` is not legal on a {kind} property")]
    IllegalAccessor {
        accessor: &'static str,
        kind: SourceKind,
    },

    #[error(
        "mapped property delegates `{accessor}` to a {required} parent, \
         but parent {parent} is {actual}"
    )]
    ParentMismatch {
        accessor: &'static str,
        parent: Uuid,
        required: SourceKind,
        actual: SourceKind,
    },

    #[error("setter is only allowed on the parent property {parent}")]
    SetterOnMapped { parent: Uuid },
}

/// Discriminant of the property source union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Dynamic,
    Variable,
    Mapped,
}

// ── Source variants ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSource {
    pub settable: bool,
    pub queryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSource {
    pub value: Option<PropertyValue>,
    pub default: Option<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedSource {
    /// Parent Dynamic or Variable property this one re-exposes.
    pub parent: Uuid,
}

/// Closed union over the three property variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PropertySource {
    Dynamic(DynamicSource),
    Variable(VariableSource),
    Mapped(MappedSource),
}

impl PropertySource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Dynamic(_) => SourceKind::Dynamic,
            Self::Variable(_) => SourceKind::Variable,
            Self::Mapped(_) => SourceKind::Mapped,
        }
    }

    /// Whether a runtime write may target this property. Legal on
    /// Dynamic only.
    pub fn settable(&self) -> Result<bool, PropertyAccessError> {
        match self {
            Self::Dynamic(d) => Ok(d.settable),
            other => Err(PropertyAccessError::IllegalAccessor {
                accessor: "settable",
                kind: other.kind(),
            }),
        }
    }

    /// Whether the device can be asked for a fresh value. Legal on
    /// Dynamic only.
    pub fn queryable(&self) -> Result<bool, PropertyAccessError> {
        match self {
            Self::Dynamic(d) => Ok(d.queryable),
            other => Err(PropertyAccessError::IllegalAccessor {
                accessor: "queryable",
                kind: other.kind(),
            }),
        }
    }

    /// Literal stored value. Legal on Variable only.
    pub fn value(&self) -> Result<Option<&PropertyValue>, PropertyAccessError> {
        match self {
            Self::Variable(v) => Ok(v.value.as_ref()),
            other => Err(PropertyAccessError::IllegalAccessor {
                accessor: "value",
                kind: other.kind(),
            }),
        }
    }

    /// Literal stored default. Legal on Variable only.
    pub fn default_value(&self) -> Result<Option<&PropertyValue>, PropertyAccessError> {
        match self {
            Self::Variable(v) => Ok(v.default.as_ref()),
            other => Err(PropertyAccessError::IllegalAccessor {
                accessor: "default",
                kind: other.kind(),
            }),
        }
    }
}

impl MappedSource {
    /// Delegated literal value — requires a Variable parent.
    pub fn value<'a>(
        &self,
        parent: &'a PropertySource,
    ) -> Result<Option<&'a PropertyValue>, PropertyAccessError> {
        match parent {
            PropertySource::Variable(v) => Ok(v.value.as_ref()),
            other => Err(PropertyAccessError::ParentMismatch {
                accessor: "value",
                parent: self.parent,
                required: SourceKind::Variable,
                actual: other.kind(),
            }),
        }
    }

    /// Delegated literal default — requires a Variable parent.
    pub fn default_value<'a>(
        &self,
        parent: &'a PropertySource,
    ) -> Result<Option<&'a PropertyValue>, PropertyAccessError> {
        match parent {
            PropertySource::Variable(v) => Ok(v.default.as_ref()),
            other => Err(PropertyAccessError::ParentMismatch {
                accessor: "default",
                parent: self.parent,
                required: SourceKind::Variable,
                actual: other.kind(),
            }),
        }
    }

    /// Delegated settable flag — requires a Dynamic parent.
    pub fn settable(&self, parent: &PropertySource) -> Result<bool, PropertyAccessError> {
        match parent {
            PropertySource::Dynamic(d) => Ok(d.settable),
            other => Err(PropertyAccessError::ParentMismatch {
                accessor: "settable",
                parent: self.parent,
                required: SourceKind::Dynamic,
                actual: other.kind(),
            }),
        }
    }

    /// Delegated queryable flag — requires a Dynamic parent.
    pub fn queryable(&self, parent: &PropertySource) -> Result<bool, PropertyAccessError> {
        match parent {
            PropertySource::Dynamic(d) => Ok(d.queryable),
            other => Err(PropertyAccessError::ParentMismatch {
                accessor: "queryable",
                parent: self.parent,
                required: SourceKind::Dynamic,
                actual: other.kind(),
            }),
        }
    }

    /// Direct mutation of a mapped property is forbidden regardless of
    /// parent kind — writes go through the parent.
    pub fn set_value(&self) -> Result<(), PropertyAccessError> {
        Err(PropertyAccessError::SetterOnMapped {
            parent: self.parent,
        })
    }
}

// ── Shared descriptor ───────────────────────────────────────────────

/// Descriptor fields shared by every property variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub data_type: DataType,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub format: PropertyFormat,

    /// Sentinel the hardware uses to signal "no reading".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub invalid: Option<PropertyValue>,

    /// Number of decimal places reported values are scaled to.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scale: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<f64>,

    /// Optional value-transformer equation applied between device and
    /// consumer representation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transformer: Option<String>,

    #[serde(flatten)]
    pub source: PropertySource,
}

// ── Property records per owner kind ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPropertyRecord {
    pub id: Uuid,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub connector: Uuid,
    #[serde(flatten)]
    pub def: PropertyDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePropertyRecord {
    pub id: Uuid,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub device: Uuid,
    #[serde(flatten)]
    pub def: PropertyDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPropertyRecord {
    pub id: Uuid,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub channel: Uuid,
    #[serde(flatten)]
    pub def: PropertyDef,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dynamic() -> PropertySource {
        PropertySource::Dynamic(DynamicSource {
            settable: true,
            queryable: false,
        })
    }

    fn variable() -> PropertySource {
        PropertySource::Variable(VariableSource {
            value: Some(PropertyValue::Int(7)),
            default: Some(PropertyValue::Int(0)),
        })
    }

    #[test]
    fn dynamic_exposes_flags_only() {
        let source = dynamic();
        assert!(source.settable().unwrap());
        assert!(!source.queryable().unwrap());
        assert!(matches!(
            source.value(),
            Err(PropertyAccessError::IllegalAccessor {
                accessor: "value",
                kind: SourceKind::Dynamic,
            })
        ));
    }

    #[test]
    fn variable_exposes_values_only() {
        let source = variable();
        assert_eq!(source.value().unwrap(), Some(&PropertyValue::Int(7)));
        assert_eq!(
            source.default_value().unwrap(),
            Some(&PropertyValue::Int(0))
        );
        assert!(matches!(
            source.settable(),
            Err(PropertyAccessError::IllegalAccessor {
                accessor: "settable",
                kind: SourceKind::Variable,
            })
        ));
    }

    #[test]
    fn mapped_over_variable_delegates_value_and_rejects_setter() {
        let mapped = MappedSource {
            parent: Uuid::new_v4(),
        };
        let parent = variable();

        assert_eq!(mapped.value(&parent).unwrap(), Some(&PropertyValue::Int(7)));
        assert_eq!(
            mapped.default_value(&parent).unwrap(),
            Some(&PropertyValue::Int(0))
        );
        assert!(matches!(
            mapped.set_value(),
            Err(PropertyAccessError::SetterOnMapped { .. })
        ));
    }

    #[test]
    fn mapped_over_dynamic_rejects_value_accessors() {
        let mapped = MappedSource {
            parent: Uuid::new_v4(),
        };
        let parent = dynamic();

        assert!(mapped.settable(&parent).unwrap());
        assert!(matches!(
            mapped.value(&parent),
            Err(PropertyAccessError::ParentMismatch {
                accessor: "value",
                required: SourceKind::Variable,
                actual: SourceKind::Dynamic,
                ..
            })
        ));
        assert!(matches!(
            mapped.default_value(&parent),
            Err(PropertyAccessError::ParentMismatch { .. })
        ));
    }

    #[test]
    fn mapped_over_variable_rejects_flag_accessors() {
        let mapped = MappedSource {
            parent: Uuid::new_v4(),
        };
        let parent = variable();

        assert!(matches!(
            mapped.settable(&parent),
            Err(PropertyAccessError::ParentMismatch {
                accessor: "settable",
                required: SourceKind::Dynamic,
                actual: SourceKind::Variable,
                ..
            })
        ));
    }

    #[test]
    fn source_round_trips_through_json() {
        let record = ChannelPropertyRecord {
            id: Uuid::new_v4(),
            identifier: "temperature".into(),
            name: Some("Temperature".into()),
            channel: Uuid::new_v4(),
            def: PropertyDef {
                data_type: DataType::Float,
                unit: Some("°C".into()),
                format: PropertyFormat::Range { min: -40.0, max: 85.0 },
                invalid: Some(PropertyValue::Int(-127)),
                scale: Some(1),
                step: Some(0.5),
                transformer: None,
                source: dynamic(),
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "dynamic");
        let back: ChannelPropertyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
