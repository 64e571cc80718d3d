//! Command routing: inbound write requests dispatched to the active
//! connector.
//!
//! The router is a pure dispatch table keyed on entity kind. It loads
//! the target entity from the read cache and makes exactly one call
//! into the bound container — no state mutation of its own. Writes
//! against an unbound container are dropped silently: requests may
//! legitimately arrive before a connector has finished starting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connector::{
    ConnectorContainer, ControlTarget, ControlWrite, PropertyTarget, PropertyWrite,
};
use crate::error::CoreError;
use crate::model::PropertyValue;
use crate::store::ReadCache;

// ── Requests ────────────────────────────────────────────────────────

/// Which property repository a write resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Connector,
    Device,
    Channel,
}

/// Which control kind an action resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Connector,
    Device,
    Channel,
}

/// Inbound property value change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyWriteRequest {
    pub kind: PropertyKind,
    /// Property UUID (the read-cache key for the given kind).
    pub id: Uuid,
    pub value: PropertyValue,
}

/// Inbound control action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlWriteRequest {
    pub kind: ControlKind,
    /// Control UUID for device/channel controls; the owning connector
    /// UUID for connector controls (which are not cached as records).
    pub id: Uuid,
    /// Control name, required for connector-level controls.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub params: Option<PropertyValue>,
}

// ── Router ──────────────────────────────────────────────────────────

/// Dispatches write requests to the active connector.
pub struct CommandRouter {
    cache: Arc<ReadCache>,
    container: RwLock<Option<Arc<ConnectorContainer>>>,
}

impl CommandRouter {
    pub fn new(cache: Arc<ReadCache>) -> Self {
        Self {
            cache,
            container: RwLock::new(None),
        }
    }

    /// Bind the live container commands are forwarded to.
    pub async fn bind(&self, container: Arc<ConnectorContainer>) {
        *self.container.write().await = Some(container);
    }

    /// Unbind the container; subsequent writes fall into the void.
    pub async fn unbind(&self) {
        *self.container.write().await = None;
    }

    pub async fn is_bound(&self) -> bool {
        self.container.read().await.is_some()
    }

    /// Route a property value change to `connector.write_property`.
    ///
    /// No-op when no container is bound or the target entity is not in
    /// the read cache.
    pub async fn write_property(&self, request: PropertyWriteRequest) -> Result<(), CoreError> {
        let container = {
            let guard = self.container.read().await;
            match guard.as_ref() {
                Some(container) => Arc::clone(container),
                None => {
                    debug!(property = %request.id, "no connector bound, write dropped");
                    return Ok(());
                }
            }
        };

        let target = match request.kind {
            PropertyKind::Connector => self
                .cache
                .connector_properties
                .get(&request.id)
                .map(PropertyTarget::Connector),
            PropertyKind::Device => self
                .cache
                .device_properties
                .get(&request.id)
                .map(PropertyTarget::Device),
            PropertyKind::Channel => self
                .cache
                .channel_properties
                .get(&request.id)
                .map(PropertyTarget::Channel),
        };
        let Some(target) = target else {
            warn!(
                property = %request.id,
                kind = ?request.kind,
                "property not cached, write dropped"
            );
            return Ok(());
        };

        container
            .write_property(&PropertyWrite {
                target,
                value: request.value,
            })
            .await
    }

    /// Route a control action to `connector.write_control`.
    ///
    /// Same fire-into-the-void policy as property writes.
    pub async fn write_control(&self, request: ControlWriteRequest) -> Result<(), CoreError> {
        let container = {
            let guard = self.container.read().await;
            match guard.as_ref() {
                Some(container) => Arc::clone(container),
                None => {
                    debug!(control = %request.id, "no connector bound, control dropped");
                    return Ok(());
                }
            }
        };

        let target = match request.kind {
            ControlKind::Connector => {
                let Some(name) = request.name.clone() else {
                    warn!(connector = %request.id, "connector control without a name, dropped");
                    return Ok(());
                };
                self.cache
                    .connectors
                    .get(&request.id)
                    .map(|connector| ControlTarget::Connector { connector, name })
            }
            ControlKind::Device => self
                .cache
                .device_controls
                .get(&request.id)
                .map(ControlTarget::Device),
            ControlKind::Channel => self
                .cache
                .channel_controls
                .get(&request.id)
                .map(ControlTarget::Channel),
        };
        let Some(target) = target else {
            warn!(
                control = %request.id,
                kind = ?request.kind,
                "control not cached, action dropped"
            );
            return Ok(());
        };

        container
            .write_control(&ControlWrite {
                target,
                params: request.params,
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbound_router_drops_writes_without_error() {
        let router = CommandRouter::new(Arc::new(ReadCache::new()));

        let result = router
            .write_property(PropertyWriteRequest {
                kind: PropertyKind::Channel,
                id: Uuid::new_v4(),
                value: PropertyValue::Bool(true),
            })
            .await;
        assert!(result.is_ok());

        let result = router
            .write_control(ControlWriteRequest {
                kind: ControlKind::Device,
                id: Uuid::new_v4(),
                name: None,
                params: None,
            })
            .await;
        assert!(result.is_ok());
        assert!(!router.is_bound().await);
    }
}
