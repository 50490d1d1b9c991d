//! Structured error types for callscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! `TraceError` is `Clone` so a fatal condition captured once by the dispatch
//! worker can be re-raised to every caller awaiting the trace.

use super::types::ThreadId;
use thiserror::Error;

/// Fatal conditions that abort reconstruction of a trace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A gap in a thread's event numbering: at least one event was lost in
    /// transit. Reconstruction cannot continue because the tree shape is no
    /// longer trustworthy.
    #[error("{thread_id}: expected sequence {expected} but received {actual} (event stream lost data)")]
    SequenceGap {
        thread_id: ThreadId,
        expected: i64,
        actual: i64,
    },

    /// A leave/tail-call named a method that does not match the frame the
    /// cursor is sitting on. The reconstructor has desynchronized from the
    /// event stream.
    #[error("{thread_id}: leave reported for {reported} but the current frame is {current}")]
    FrameMismatch {
        thread_id: ThreadId,
        reported: String,
        current: String,
    },

    /// A leave arrived with no open frame to pop.
    #[error("{thread_id}: leave with no open frame")]
    CursorUnderflow { thread_id: ThreadId },

    /// The transport reported a hard condition on an event.
    #[error("transport reported a hard failure: {0}")]
    Transport(String),

    /// The dispatch worker terminated without producing a result.
    #[error("trace session terminated unexpectedly")]
    WorkerLost,
}

/// Errors raised while exporting or importing a forest.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("forest document is malformed: {0}")]
    InvalidForest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
