//! Exception lifecycle tracking.
//!
//! One record per thrown exception, keyed by the throwing event's sequence
//! number. The state machine is `Thrown → {Caught, Superseded,
//! UnmanagedCaught, UnhandledInFilter}` and every transition is driven by
//! the single `ExceptionCompleted` event's reason code; nothing is
//! re-derived on this side.

use crate::domain::{NodeId, ThreadId};
use callscope_common::ExceptionReason;
use log::warn;

/// Where an exception is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionStatus {
    /// Thrown, completion not yet observed.
    Thrown,
    Caught,
    Superseded,
    UnmanagedCaught,
    UnhandledInFilter,
}

impl ExceptionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExceptionStatus::Thrown)
    }
}

impl From<ExceptionReason> for ExceptionStatus {
    fn from(reason: ExceptionReason) -> Self {
        match reason {
            ExceptionReason::Caught => ExceptionStatus::Caught,
            ExceptionReason::Superseded => ExceptionStatus::Superseded,
            ExceptionReason::UnmanagedCaught => ExceptionStatus::UnmanagedCaught,
            ExceptionReason::UnhandledInFilter => ExceptionStatus::UnhandledInFilter,
        }
    }
}

/// One exception observed on one thread.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    /// Exception type name as reported by the agent.
    pub exception_type: String,
    /// Sequence number of the throwing event; the exception's key.
    pub sequence: i64,
    pub thread_id: ThreadId,
    pub status: ExceptionStatus,
    /// Frame the cursor was on when the exception was thrown.
    pub thrown_frame: NodeId,
    /// Frame the cursor was on when the completion event arrived.
    pub handled_frame: Option<NodeId>,
}

impl ExceptionInfo {
    #[must_use]
    pub fn thrown(
        exception_type: String,
        sequence: i64,
        thread_id: ThreadId,
        thrown_frame: NodeId,
    ) -> Self {
        Self {
            exception_type,
            sequence,
            thread_id,
            status: ExceptionStatus::Thrown,
            thrown_frame,
            handled_frame: None,
        }
    }

    /// Apply the terminal status from a completion event. The status is
    /// mutated once; a second completion for the same exception is dropped.
    pub fn complete(&mut self, reason: ExceptionReason, handled_frame: NodeId) {
        if self.status.is_terminal() {
            warn!(
                "{}: duplicate completion for exception {} ({}), keeping {:?}",
                self.thread_id, self.sequence, self.exception_type, self.status
            );
            return;
        }
        self.status = ExceptionStatus::from(reason);
        self.handled_frame = Some(handled_frame);
    }
}
