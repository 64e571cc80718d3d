// ── Connector supervisor ──
//
// Drives one ConnectorContainer through its lifecycle: runs the
// connector loop as a background task, sweeps stale pending writes,
// and turns terminate events into an orderly shutdown. The supervisor
// owns the CancellationToken; the container stays a passive holder.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::connector::{ConnectorContainer, ConnectorEvent, EventContext};
use crate::error::CoreError;
use crate::state::SharedStateStore;

const UNFINISHED_POLL_PERIOD: Duration = Duration::from_millis(250);

/// Lifecycle phase observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Runs one connector and its housekeeping tasks.
pub struct ConnectorSupervisor {
    container: Arc<ConnectorContainer>,
    states: SharedStateStore,
    config: RuntimeConfig,
    state: watch::Sender<SupervisorState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectorSupervisor {
    pub fn new(
        container: Arc<ConnectorContainer>,
        states: SharedStateStore,
        config: RuntimeConfig,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            container,
            states,
            config,
            state,
            cancel: CancellationToken::new(),
            task_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn container(&self) -> &Arc<ConnectorContainer> {
        &self.container
    }

    /// Subscribe to lifecycle phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Resolve the connector and spawn the run loop, the stale-write
    /// watchdog, and the terminate listener. Resolution failure (an
    /// unregistered category) surfaces here, before anything spawns.
    ///
    /// A supervisor runs at most once: anything but `Idle` makes this
    /// a no-op, so a repeated call cannot spawn a second task set
    /// against the same container.
    pub async fn start(&self) -> Result<(), CoreError> {
        // Serializes concurrent start attempts.
        let mut handles = self.task_handles.lock().await;
        if *self.state.borrow() != SupervisorState::Idle {
            debug!(
                connector = %self.container.record().id,
                state = ?*self.state.borrow(),
                "start ignored, supervisor not idle"
            );
            return Ok(());
        }

        // Resolve eagerly so a misconfigured container fails fast.
        self.container.service()?;

        let connector = self.container.record().id;
        info!(%connector, "starting connector");

        {
            let container = Arc::clone(&self.container);
            let state = self.state.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(execute_task(container, state, cancel)));
        }

        if let Some(timeout) = self.config.pending_stale_timeout {
            let states = Arc::clone(&self.states);
            let interval = self.config.watchdog_interval;
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(watchdog_task(
                states, timeout, interval, cancel,
            )));
        }

        {
            let events = self.container.on_terminate();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(terminate_listener(events, cancel)));
        }

        self.state.send_replace(SupervisorState::Running);
        Ok(())
    }

    /// Graceful shutdown: advise the connector to stop, wait for
    /// in-flight device I/O up to the configured grace period, then
    /// cancel and join every background task.
    pub async fn stop(&self) {
        self.state.send_replace(SupervisorState::Stopping);
        self.container.dispatch(ConnectorEvent::Terminate(
            EventContext::new("supervisor").with_reason("shutdown requested"),
        ));

        if self.container.is_resolved() {
            if let Err(e) = self.container.terminate() {
                warn!(error = %e, "terminate request failed");
            }
            self.await_unfinished_tasks().await;
        }

        self.cancel.cancel();
        let mut handles = self.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        if *self.state.borrow() != SupervisorState::Failed {
            self.state.send_replace(SupervisorState::Stopped);
        }
        debug!(connector = %self.container.record().id, "connector stopped");
    }

    async fn await_unfinished_tasks(&self) {
        let deadline = tokio::time::Instant::now() + self.config.termination_grace;
        loop {
            match self.container.has_unfinished_tasks() {
                Ok(false) | Err(_) => return,
                Ok(true) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    connector = %self.container.record().id,
                    "termination grace elapsed with unfinished tasks, cancelling anyway"
                );
                return;
            }
            tokio::time::sleep(UNFINISHED_POLL_PERIOD).await;
        }
    }
}

// ── Background tasks ────────────────────────────────────────────────

async fn execute_task(
    container: Arc<ConnectorContainer>,
    state: watch::Sender<SupervisorState>,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        result = container.execute() => match result {
            Ok(()) => {
                debug!(connector = %container.record().id, "connector loop ended");
            }
            Err(e) => {
                warn!(connector = %container.record().id, error = %e, "connector loop failed");
                state.send_replace(SupervisorState::Failed);
                container.dispatch(ConnectorEvent::Terminate(
                    EventContext::new("execute").with_error(&e),
                ));
            }
        },
    }
}

/// Periodically invalidates property state whose pending writes sat
/// unconfirmed past the timeout.
async fn watchdog_task(
    states: SharedStateStore,
    timeout: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    let Ok(timeout) = chrono::Duration::from_std(timeout) else {
        warn!("stale timeout out of range, watchdog disabled");
        return;
    };
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let stale = states.sweep_stale(timeout, chrono::Utc::now());
                for property in &stale {
                    warn!(%property, "pending write went stale, state invalidated");
                }
            }
        }
    }
}

/// Turns a terminate event raised anywhere (connector, watchdog,
/// operator) into task cancellation.
async fn terminate_listener(
    mut events: tokio::sync::broadcast::Receiver<EventContext>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = events.recv() => match result {
                Ok(ctx) => {
                    info!(
                        source = %ctx.source,
                        reason = ?ctx.reason,
                        "terminate event, cancelling tasks"
                    );
                    cancel.cancel();
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "terminate listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::connector::{
        Connector, ConnectorFactory, ControlWrite, FactoryRegistry, PropertyWrite,
    };
    use crate::model::ConnectorRecord;
    use crate::state::PropertyStateStore;

    struct BlockingConnector {
        terminated: Arc<AtomicBool>,
        executions: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for BlockingConnector {
        async fn execute(&self) -> Result<(), CoreError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            // Run until cancelled from outside.
            std::future::pending::<()>().await;
            Ok(())
        }
        async fn discover(&self) -> Result<(), CoreError> {
            Ok(())
        }
        fn terminate(&self) {
            self.terminated.store(true, Ordering::SeqCst);
        }
        fn has_unfinished_tasks(&self) -> bool {
            false
        }
        async fn write_property(&self, _write: &PropertyWrite) -> Result<(), CoreError> {
            Ok(())
        }
        async fn write_control(&self, _write: &ControlWrite) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct BlockingFactory {
        terminated: Arc<AtomicBool>,
        executions: Arc<AtomicUsize>,
    }

    impl ConnectorFactory for BlockingFactory {
        fn create(&self, _record: &ConnectorRecord) -> Result<Arc<dyn Connector>, CoreError> {
            Ok(Arc::new(BlockingConnector {
                terminated: Arc::clone(&self.terminated),
                executions: Arc::clone(&self.executions),
            }))
        }
    }

    struct Counters {
        terminated: Arc<AtomicBool>,
        executions: Arc<AtomicUsize>,
    }

    fn supervisor() -> (ConnectorSupervisor, Counters) {
        let terminated = Arc::new(AtomicBool::new(false));
        let executions = Arc::new(AtomicUsize::new(0));
        let record = ConnectorRecord {
            id: Uuid::new_v4(),
            identifier: "virtual-1".into(),
            category: "virtual".into(),
            name: None,
            enabled: true,
        };
        let mut registry = FactoryRegistry::new();
        registry.register(
            "virtual",
            Arc::new(BlockingFactory {
                terminated: Arc::clone(&terminated),
                executions: Arc::clone(&executions),
            }),
        );
        let container = Arc::new(ConnectorContainer::new(record, Arc::new(registry), 8));
        let sup = ConnectorSupervisor::new(
            container,
            Arc::new(PropertyStateStore::new()),
            RuntimeConfig {
                termination_grace: Duration::from_millis(50),
                ..RuntimeConfig::default()
            },
        );
        (
            sup,
            Counters {
                terminated,
                executions,
            },
        )
    }

    #[tokio::test]
    async fn start_then_stop_terminates_the_connector() {
        let (sup, counters) = supervisor();

        sup.start().await.unwrap();
        assert_eq!(sup.current_state(), SupervisorState::Running);

        sup.stop().await;
        assert!(counters.terminated.load(Ordering::SeqCst));
        assert_eq!(sup.current_state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn repeated_start_spawns_no_second_run_loop() {
        let (sup, counters) = supervisor();

        sup.start().await.unwrap();
        sup.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counters.executions.load(Ordering::SeqCst), 1);
        assert_eq!(sup.current_state(), SupervisorState::Running);

        sup.stop().await;
        // Stopped supervisors stay stopped; start() after stop() is
        // also a no-op.
        sup.start().await.unwrap();
        assert_eq!(sup.current_state(), SupervisorState::Stopped);
        assert_eq!(counters.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_category_fails_start() {
        let record = ConnectorRecord {
            id: Uuid::new_v4(),
            identifier: "virtual-1".into(),
            category: "modbus".into(),
            name: None,
            enabled: true,
        };
        let container = Arc::new(ConnectorContainer::new(
            record,
            Arc::new(FactoryRegistry::new()),
            8,
        ));
        let sup = ConnectorSupervisor::new(
            container,
            Arc::new(PropertyStateStore::new()),
            RuntimeConfig::default(),
        );

        assert!(matches!(
            sup.start().await,
            Err(CoreError::InvalidState { .. })
        ));
        assert_eq!(sup.current_state(), SupervisorState::Idle);
    }
}
