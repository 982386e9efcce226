// ── Core error types ──
//
// Nothing here is user-facing beyond logs: the engine recovers from bad
// records locally and reports task failures through the task's failure
// hook. The store seam has its own `StoreError` so alternative datastore
// implementations don't need to know about the rest of the engine.

use thiserror::Error;

use crate::store::StorePath;

/// Errors raised by a [`Datastore`](crate::store::Datastore) implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("commit failed: {reason}")]
    CommitFailed { reason: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("invalid {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("unsupported path: {path}")]
    UnsupportedPath { path: StorePath },

    #[error("unexpected entity at {path}: expected {expected}")]
    UnexpectedEntity {
        path: StorePath,
        expected: &'static str,
    },

    // ── Transactional errors ─────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transaction queue is closed")]
    QueueClosed,

    #[error("task {task} panicked: {message}")]
    TaskPanicked { task: String, message: String },

    // ── Static topology persistence ──────────────────────────────────
    #[error("static topology persistence failed: {message}")]
    Persistence { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}
