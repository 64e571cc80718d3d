// ── Core error types ──
//
// Almost all user-visible failure in this system is reflected in
// property state (pending/valid flags), not in errors. What remains:
// fatal configuration problems (no factory for a connector category),
// contract violations on the property union, and writer-side I/O.
// Reader-side record corruption is deliberately NOT an error — it
// degrades to missing cache entries.

use thiserror::Error;
use uuid::Uuid;

use crate::model::PropertyAccessError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors (fatal, never retried) ──────────────────
    #[error("no connector factory registered for category '{category}' (connector {connector})")]
    InvalidState { connector: Uuid, category: String },

    // ── Contract violations ──────────────────────────────────────────
    #[error(transparent)]
    PropertyAccess(#[from] PropertyAccessError),

    // ── Snapshot writer errors ───────────────────────────────────────
    #[error("snapshot storage failed at {path}: {reason}")]
    Storage { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Connector-reported failures ──────────────────────────────────
    #[error("connector {connector} failed: {reason}")]
    ConnectorFailure { connector: Uuid, reason: String },
}
