// ── Runtime configuration ──
//
// These types describe *how* a connector process runs. They carry
// tuning knobs only and never touch disk — the hosting binary builds a
// `RuntimeConfig` (usually through `connix-config`) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

/// Tuning for a single connector process.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Snapshot file the read cache is loaded from and written to.
    pub snapshot_path: PathBuf,
    /// How long a property write may sit unconfirmed before the
    /// watchdog marks its state invalid. `None` disables the sweep.
    pub pending_stale_timeout: Option<Duration>,
    /// How often the watchdog sweeps for stale pending writes.
    pub watchdog_interval: Duration,
    /// How long termination waits for `has_unfinished_tasks()` to
    /// clear before cancelling outstanding work.
    pub termination_grace: Duration,
    /// Capacity of the lifecycle event broadcast channels.
    pub event_channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("devices.json"),
            pending_stale_timeout: Some(Duration::from_secs(30)),
            watchdog_interval: Duration::from_secs(5),
            termination_grace: Duration::from_secs(10),
            event_channel_capacity: 64,
        }
    }
}
