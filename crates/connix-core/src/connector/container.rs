// ── Connector container ──
//
// Binds a persisted connector record to exactly one live Connector
// instance. Two states only: unresolved (no instance yet) and resolved
// (a singleton bound for the container's lifetime). A changed
// connector category requires a new container.
//
// The container is also the event seam: TerminateConnector /
// RestartConnector events dispatched into it are re-broadcast on
// per-kind channels, so a supervisor can react uniformly no matter
// which concrete connector raised them.

use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Connector, ControlWrite, FactoryRegistry, PropertyWrite};
use crate::error::CoreError;
use crate::model::ConnectorRecord;

/// Context attached to terminate/restart events: who raised it, a
/// human-readable reason, and an optional underlying error.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub source: String,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl EventContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: None,
            error: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_error(mut self, error: &dyn std::error::Error) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Lifecycle events a connector (or its surroundings) can raise.
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    Terminate(EventContext),
    Restart(EventContext),
}

/// Owns the singleton Connector instance for one connector record.
pub struct ConnectorContainer {
    record: ConnectorRecord,
    registry: Arc<FactoryRegistry>,
    /// Written exactly once on first resolution, read thereafter.
    /// Concurrent first resolutions are a caller-serialized race.
    service: OnceLock<Arc<dyn Connector>>,
    terminate_tx: broadcast::Sender<EventContext>,
    restart_tx: broadcast::Sender<EventContext>,
}

impl ConnectorContainer {
    pub fn new(
        record: ConnectorRecord,
        registry: Arc<FactoryRegistry>,
        event_capacity: usize,
    ) -> Self {
        let (terminate_tx, _) = broadcast::channel(event_capacity);
        let (restart_tx, _) = broadcast::channel(event_capacity);
        Self {
            record,
            registry,
            service: OnceLock::new(),
            terminate_tx,
            restart_tx,
        }
    }

    pub fn record(&self) -> &ConnectorRecord {
        &self.record
    }

    pub fn is_resolved(&self) -> bool {
        self.service.get().is_some()
    }

    /// Look up the factory for this record's category.
    ///
    /// A missing factory is a fatal configuration error — running
    /// without a backing implementation would mask itself as a
    /// permanently idle connector.
    pub fn factory(&self) -> Result<Arc<dyn super::ConnectorFactory>, CoreError> {
        self.registry
            .get(&self.record.category)
            .ok_or_else(|| CoreError::InvalidState {
                connector: self.record.id,
                category: self.record.category.clone(),
            })
    }

    /// Resolve the backing Connector, memoizing exactly one instance
    /// for the container's lifetime. The factory is invoked at most
    /// once; the record is never re-read after resolution.
    pub fn service(&self) -> Result<Arc<dyn Connector>, CoreError> {
        if let Some(service) = self.service.get() {
            return Ok(Arc::clone(service));
        }
        let service = self.factory()?.create(&self.record)?;
        debug!(
            connector = %self.record.id,
            category = %self.record.category,
            "connector service resolved"
        );
        // A concurrent first resolution may have won the set; return
        // whatever is bound so every caller sees the same instance.
        let _ = self.service.set(Arc::clone(&service));
        Ok(self.service.get().map_or(service, Arc::clone))
    }

    // ── Delegations ──────────────────────────────────────────────────

    pub async fn execute(&self) -> Result<(), CoreError> {
        self.service()?.execute().await
    }

    pub async fn discover(&self) -> Result<(), CoreError> {
        self.service()?.discover().await
    }

    pub fn terminate(&self) -> Result<(), CoreError> {
        self.service()?.terminate();
        Ok(())
    }

    pub fn has_unfinished_tasks(&self) -> Result<bool, CoreError> {
        Ok(self.service()?.has_unfinished_tasks())
    }

    pub async fn write_property(&self, write: &PropertyWrite) -> Result<(), CoreError> {
        self.service()?.write_property(write).await
    }

    pub async fn write_control(&self, write: &ControlWrite) -> Result<(), CoreError> {
        self.service()?.write_control(write).await
    }

    // ── Event channel ────────────────────────────────────────────────

    /// Consume a lifecycle event and re-broadcast it on the matching
    /// subscription channel. Lagging or absent subscribers are not an
    /// error.
    pub fn dispatch(&self, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Terminate(ctx) => {
                debug!(connector = %self.record.id, source = %ctx.source, "terminate requested");
                let _ = self.terminate_tx.send(ctx);
            }
            ConnectorEvent::Restart(ctx) => {
                debug!(connector = %self.record.id, source = %ctx.source, "restart requested");
                let _ = self.restart_tx.send(ctx);
            }
        }
    }

    /// Subscribe to re-broadcast terminate requests.
    pub fn on_terminate(&self) -> broadcast::Receiver<EventContext> {
        self.terminate_tx.subscribe()
    }

    /// Subscribe to re-broadcast restart requests.
    pub fn on_restart(&self) -> broadcast::Receiver<EventContext> {
        self.restart_tx.subscribe()
    }

    /// Bridge an inbound event stream into [`dispatch`](Self::dispatch)
    /// until the stream closes or `cancel` fires.
    pub fn spawn_event_forwarder(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ConnectorEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let container = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = events.recv() => {
                        match result {
                            Ok(event) => container.dispatch(event),
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "event forwarder lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        })
    }
}
