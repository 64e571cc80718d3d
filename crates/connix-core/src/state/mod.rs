//! Property state reconciliation.
//!
//! A write against a Dynamic property never blocks for a device
//! acknowledgment. The store tracks two independent actual/expected
//! pairs per property (`read` for hardware reports, `get` for explicit
//! queries), a `pending` timestamp marking an in-flight write, and a
//! `valid` flag saying whether the current actual should be trusted.
//! Consumers observe outcomes by polling state, never by catching
//! errors.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::model::PropertyValue;

// ── State shapes ────────────────────────────────────────────────────

/// One actual/expected value pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValuePair {
    /// Last value confirmed by the device.
    pub actual: Option<PropertyValue>,
    /// Value a caller asked the device to take.
    pub expected: Option<PropertyValue>,
}

/// Runtime state of one Dynamic (or Mapped-over-Dynamic) property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyState {
    /// Pair last reported by hardware/polling.
    pub read: ValuePair,
    /// Pair last returned by an explicit query.
    pub get: ValuePair,
    /// When set, a write was issued at this instant and is awaiting
    /// hardware confirmation.
    pub pending: Option<DateTime<Utc>>,
    /// Whether the current actual value should be trusted. Flips to
    /// false on communication failure.
    pub valid: bool,
}

impl PropertyState {
    /// A property is settled when nothing is in flight and the actual
    /// value is trustworthy.
    pub fn is_settled(&self) -> bool {
        self.pending.is_none() && self.valid
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Concurrent store of per-property runtime state.
///
/// `DashMap` keyed by property UUID; every mutation bumps a `watch`
/// version counter so consumers can poll-on-change instead of spinning.
pub struct PropertyStateStore {
    states: DashMap<Uuid, PropertyState>,
    version: watch::Sender<u64>,
}

impl Default for PropertyStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            states: DashMap::new(),
            version,
        }
    }

    /// Record an explicit write request: marks the property pending as
    /// of now and stores the requested value as `get.expected`. Both
    /// actuals stay untouched until the device confirms.
    ///
    /// A second write before the first confirms overwrites `expected`
    /// (last write wins); the earlier write's confirmation will then be
    /// discarded by [`confirm`](Self::confirm).
    pub fn set_expected(&self, id: Uuid, value: PropertyValue) {
        self.set_expected_at(id, value, Utc::now());
    }

    /// [`set_expected`](Self::set_expected) with an explicit timestamp.
    pub fn set_expected_at(&self, id: Uuid, value: PropertyValue, now: DateTime<Utc>) {
        {
            let mut entry = self.states.entry(id).or_default();
            entry.get.expected = Some(value);
            entry.pending = Some(now);
        }
        self.bump_version();
    }

    /// Record a passive write expectation (`read.expected`), used when
    /// the new value is anticipated from the report path rather than an
    /// explicit query.
    pub fn set_read_expected(&self, id: Uuid, value: PropertyValue) {
        {
            let mut entry = self.states.entry(id).or_default();
            entry.read.expected = Some(value);
            entry.pending = Some(Utc::now());
        }
        self.bump_version();
    }

    /// Device confirmation for an explicit write.
    ///
    /// Clears `pending` and commits `get.actual` only when the confirmed
    /// value matches the *current* `get.expected` — a confirmation for a
    /// value that has since been overwritten is discarded.
    ///
    /// Returns whether the confirmation was accepted.
    pub fn confirm(&self, id: Uuid, value: &PropertyValue) -> bool {
        let accepted = {
            let Some(mut entry) = self.states.get_mut(&id) else {
                return false;
            };
            if entry.get.expected.as_ref() == Some(value) {
                entry.get.actual = Some(value.clone());
                entry.get.expected = None;
                entry.pending = None;
                entry.valid = true;
                true
            } else {
                debug!(property = %id, confirmed = %value, "stale confirmation discarded");
                false
            }
        };
        if accepted {
            self.bump_version();
        }
        accepted
    }

    /// Hardware/polling report of the current value.
    ///
    /// Updates `read.actual` and restores `valid`. `pending` is cleared
    /// only when the report matches an outstanding expected value —
    /// receipt of just any report never settles an in-flight write.
    pub fn report(&self, id: Uuid, value: PropertyValue) {
        {
            let mut entry = self.states.entry(id).or_default();
            let matches_expected = entry.read.expected.as_ref() == Some(&value)
                || entry.get.expected.as_ref() == Some(&value);
            if matches_expected {
                entry.read.expected = None;
                entry.get.expected = None;
                entry.pending = None;
            }
            entry.read.actual = Some(value);
            entry.valid = true;
        }
        self.bump_version();
    }

    /// Mark the property's actual value as untrustworthy after a
    /// communication failure. Pending state is left as-is.
    pub fn invalidate(&self, id: Uuid) {
        let known = if let Some(mut entry) = self.states.get_mut(&id) {
            entry.valid = false;
            true
        } else {
            false
        };
        if known {
            self.bump_version();
        }
    }

    /// Watchdog pass: any entry pending longer than `timeout` (as of
    /// `now`) gets `valid = false`. The pending marker stays so callers
    /// can still observe the unconfirmed write. Returns the affected
    /// property ids.
    pub fn sweep_stale(&self, timeout: Duration, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut stale = Vec::new();
        for mut entry in self.states.iter_mut() {
            if let Some(since) = entry.pending {
                if now - since > timeout && entry.valid {
                    entry.valid = false;
                    stale.push(*entry.key());
                }
            }
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "stale pending writes invalidated");
            self.bump_version();
        }
        stale
    }

    pub fn get(&self, id: &Uuid) -> Option<PropertyState> {
        self.states.get(id).map(|r| r.value().clone())
    }

    /// Whether `pending` is clear and `valid` is set. Unknown
    /// properties are not settled.
    pub fn is_settled(&self, id: &Uuid) -> bool {
        self.states.get(id).is_some_and(|s| s.is_settled())
    }

    pub fn remove(&self, id: &Uuid) -> Option<PropertyState> {
        let removed = self.states.remove(id).map(|(_, s)| s);
        if removed.is_some() {
            self.bump_version();
        }
        removed
    }

    pub fn clear(&self) {
        self.states.clear();
        self.bump_version();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Subscribe to the mutation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

/// Shared handle alias used across the container and router.
pub type SharedStateStore = Arc<PropertyStateStore>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_marks_pending_and_leaves_actual() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.report(id, PropertyValue::Int(10));

        store.set_expected(id, PropertyValue::Int(25));

        let state = store.get(&id).unwrap();
        assert!(state.pending.is_some());
        assert_eq!(state.get.expected, Some(PropertyValue::Int(25)));
        assert_eq!(state.read.actual, Some(PropertyValue::Int(10)));
        assert!(state.get.actual.is_none());
        assert!(!store.is_settled(&id));
    }

    #[test]
    fn confirmation_settles_matching_write() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.set_expected(id, PropertyValue::Int(25));

        assert!(store.confirm(id, &PropertyValue::Int(25)));

        let state = store.get(&id).unwrap();
        assert!(state.pending.is_none());
        assert_eq!(state.get.actual, Some(PropertyValue::Int(25)));
        assert!(state.get.expected.is_none());
        assert!(store.is_settled(&id));
    }

    #[test]
    fn mismatched_confirmation_is_discarded() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.set_expected(id, PropertyValue::Int(25));
        // Caller changes its mind before the device confirms.
        store.set_expected(id, PropertyValue::Int(30));

        assert!(!store.confirm(id, &PropertyValue::Int(25)));

        let state = store.get(&id).unwrap();
        assert!(state.pending.is_some());
        assert_eq!(state.get.expected, Some(PropertyValue::Int(30)));
        assert!(state.get.actual.is_none());
    }

    #[test]
    fn any_report_does_not_settle_pending() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.set_expected(id, PropertyValue::Int(25));

        store.report(id, PropertyValue::Int(10));

        let state = store.get(&id).unwrap();
        assert!(state.pending.is_some());
        assert_eq!(state.read.actual, Some(PropertyValue::Int(10)));
        assert_eq!(state.get.expected, Some(PropertyValue::Int(25)));
    }

    #[test]
    fn matching_report_settles_pending() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.set_read_expected(id, PropertyValue::Bool(true));

        store.report(id, PropertyValue::Bool(true));

        let state = store.get(&id).unwrap();
        assert!(state.pending.is_none());
        assert_eq!(state.read.actual, Some(PropertyValue::Bool(true)));
        assert!(store.is_settled(&id));
    }

    #[test]
    fn invalidate_keeps_pending_but_unsettles() {
        let store = PropertyStateStore::new();
        let id = Uuid::new_v4();
        store.set_expected(id, PropertyValue::Int(1));
        store.invalidate(id);

        let state = store.get(&id).unwrap();
        assert!(!state.valid);
        assert!(state.pending.is_some());
        assert!(!store.is_settled(&id));
    }

    #[test]
    fn sweep_invalidates_only_overdue_entries() {
        let store = PropertyStateStore::new();
        let fresh = Uuid::new_v4();
        let overdue = Uuid::new_v4();
        let now = Utc::now();

        store.report(fresh, PropertyValue::Int(0));
        store.report(overdue, PropertyValue::Int(0));
        store.set_expected_at(fresh, PropertyValue::Int(1), now);
        store.set_expected_at(overdue, PropertyValue::Int(2), now - Duration::seconds(120));

        let stale = store.sweep_stale(Duration::seconds(60), now);

        assert_eq!(stale, vec![overdue]);
        assert!(store.get(&fresh).unwrap().valid);
        let state = store.get(&overdue).unwrap();
        assert!(!state.valid);
        assert!(state.pending.is_some());
    }

    #[test]
    fn version_bumps_on_mutation() {
        let store = PropertyStateStore::new();
        let mut rx = store.subscribe();
        let before = *rx.borrow_and_update();

        store.set_expected(Uuid::new_v4(), PropertyValue::Bool(true));

        assert!(*rx.borrow_and_update() > before);
    }
}
