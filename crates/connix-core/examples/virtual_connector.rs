//! Minimal connector process: a virtual connector that settles every
//! property write immediately.
//!
//! Run with `cargo run --example virtual_connector`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use connix_core::{
    CommandRouter, Connector, ConnectorContainer, ConnectorFactory, ConnectorRecord,
    ConnectorSupervisor, ControlWrite, CoreError, FactoryRegistry, PropertyStateStore,
    PropertyWrite, ReadCache, RuntimeConfig, SharedStateStore,
};

struct VirtualConnector {
    states: SharedStateStore,
    cancel: CancellationToken,
}

#[async_trait]
impl Connector for VirtualConnector {
    async fn execute(&self) -> Result<(), CoreError> {
        info!("virtual connector running");
        self.cancel.cancelled().await;
        Ok(())
    }

    async fn discover(&self) -> Result<(), CoreError> {
        Ok(())
    }

    fn terminate(&self) {
        self.cancel.cancel();
    }

    fn has_unfinished_tasks(&self) -> bool {
        false
    }

    async fn write_property(&self, write: &PropertyWrite) -> Result<(), CoreError> {
        // No hardware behind this connector: echo the write back as
        // the confirmed value.
        self.states.confirm(write.target.id(), &write.value);
        info!(property = %write.target.id(), value = %write.value, "virtual write settled");
        Ok(())
    }

    async fn write_control(&self, _write: &ControlWrite) -> Result<(), CoreError> {
        Ok(())
    }
}

struct VirtualFactory {
    states: SharedStateStore,
}

impl ConnectorFactory for VirtualFactory {
    fn create(&self, _record: &ConnectorRecord) -> Result<Arc<dyn Connector>, CoreError> {
        Ok(Arc::new(VirtualConnector {
            states: Arc::clone(&self.states),
            cancel: CancellationToken::new(),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let states: SharedStateStore = Arc::new(PropertyStateStore::new());
    let cache = Arc::new(ReadCache::new());

    let record = ConnectorRecord {
        id: Uuid::new_v4(),
        identifier: "virtual-demo".into(),
        category: "virtual".into(),
        name: Some("Virtual demo connector".into()),
        enabled: true,
    };

    let mut registry = FactoryRegistry::new();
    registry.register(
        "virtual",
        Arc::new(VirtualFactory {
            states: Arc::clone(&states),
        }),
    );

    let config = RuntimeConfig::default();
    let container = Arc::new(ConnectorContainer::new(
        record,
        Arc::new(registry),
        config.event_channel_capacity,
    ));

    let router = CommandRouter::new(Arc::clone(&cache));
    router.bind(Arc::clone(&container)).await;

    let supervisor = ConnectorSupervisor::new(container, states, config);
    supervisor.start().await?;

    tokio::time::sleep(Duration::from_secs(1)).await;

    supervisor.stop().await;
    info!("done");
    Ok(())
}
