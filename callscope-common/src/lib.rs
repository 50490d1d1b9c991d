//! # Shared Event Definitions (agent ↔ userspace)
//!
//! Defines the event vocabulary shared between the in-process instrumentation
//! agent and the `callscope` consumer. The agent (out of scope for this crate)
//! observes method boundaries inside the target process and emits one event
//! per boundary crossing; `callscope` reconstructs per-thread call trees from
//! the resulting stream.
//!
//! All types are `serde` Serialize/Deserialize so a recorded stream can be
//! written to a JSON Lines file and replayed offline.
//!
//! ## Ordering Contract
//!
//! Events are ordered *per thread*: every call-shaped event carries a
//! per-thread monotonically increasing [`CallInfo::sequence`]. A gap in the
//! sequence means the transport dropped an event, which the consumer treats
//! as fatal for that trace. Events for different threads may interleave
//! arbitrarily.

use serde::{Deserialize, Serialize};

/// Payload carried by every call-shaped event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Thread that crossed the method boundary.
    pub thread_id: u32,

    /// Per-thread monotonic event index.
    ///
    /// Starts at 1 for the first event the agent emits on a thread. Used by
    /// the consumer to detect lost events and to order frames
    /// deterministically.
    pub sequence: i64,

    /// Opaque function identity, unique for the lifetime of the trace.
    ///
    /// Resolved to a name by a separate [`ProfilerEvent::MethodInfo`] event,
    /// which may arrive *after* the first call event that references it.
    pub function_id: u64,

    /// Monotonic timestamp in nanoseconds.
    pub timestamp_ns: u64,

    /// Transport-reported status for this event.
    pub status: EventStatus,
}

/// Status code attached to each call-shaped event by the transport.
///
/// Soft conditions degrade the fidelity of a single frame or value and are
/// logged by the consumer; hard conditions abort the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventStatus {
    /// Event was captured completely.
    #[default]
    Ok,
    /// The agent's capture buffer was full; captured values were truncated.
    BufferFull,
    /// A generic class instantiation could not be resolved for value capture.
    UnresolvableGeneric,
    /// An array element type was ambiguous; element values were not captured.
    AmbiguousArrayElement,
    /// The agent lost track of the current stack frame. Fatal.
    UnknownStackFrame,
}

impl EventStatus {
    /// True for conditions that must abort the whole trace.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, EventStatus::UnknownStackFrame)
    }

    /// True for soft conditions that degrade a single frame or value.
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            EventStatus::BufferFull
                | EventStatus::UnresolvableGeneric
                | EventStatus::AmbiguousArrayElement
        )
    }
}

/// Direction of an unmanaged-transition pseudo-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Managed code called into unmanaged (native) code.
    ManagedToUnmanaged,
    /// Unmanaged code called back into managed code.
    UnmanagedToManaged,
}

/// Terminal outcome reported by an `ExceptionCompleted` event.
///
/// The agent computes the outcome; the consumer records it verbatim and
/// performs no inference of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionReason {
    /// A managed handler caught the exception.
    Caught,
    /// A newer exception replaced this one while it was unwinding.
    Superseded,
    /// The exception escaped into unmanaged code and was handled there.
    UnmanagedCaught,
    /// A filter clause itself threw, leaving the exception unhandled there.
    UnhandledInFilter,
}

/// One event observed at a method boundary of the instrumented process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfilerEvent {
    /// Resolves a function identity to module/type/method names.
    ///
    /// May arrive after call events that already referenced `function_id`;
    /// the consumer resolves the identity in place when it does.
    MethodInfo {
        function_id: u64,
        module_id: u64,
        type_name: String,
        method_name: String,
    },

    /// Like [`ProfilerEvent::MethodInfo`], for methods whose argument and
    /// return values are captured. Carries the metadata token the agent
    /// uses to decode capture payloads.
    MethodInfoDetailed {
        function_id: u64,
        module_id: u64,
        type_name: String,
        method_name: String,
        token: u32,
    },

    /// A module was loaded in the target; names the module's path.
    ModuleLoaded { module_id: u64, path: String },

    /// A method was entered.
    CallEnter(CallInfo),

    /// A method returned normally.
    CallLeave(CallInfo),

    /// A method performed a tail-call. From the caller's perspective this
    /// is a return; the callee's frame is reused by the runtime.
    Tailcall(CallInfo),

    /// A method was entered, with its arguments captured.
    ///
    /// `parameters` is an opaque value-graph payload decoded on demand by
    /// the consumer's decoder collaborator.
    CallEnterDetailed { info: CallInfo, parameters: Vec<u8> },

    /// A method returned normally, with its return value captured.
    CallLeaveDetailed { info: CallInfo, return_value: Vec<u8> },

    /// A tail-call from a method whose values were being captured.
    TailcallDetailed(CallInfo),

    /// Execution crossed from managed into unmanaged code.
    ManagedToUnmanaged(CallInfo),

    /// Execution crossed from unmanaged back into managed code.
    UnmanagedToManaged(CallInfo),

    /// An exception was thrown. `sequence` doubles as the exception's key;
    /// a later `ExceptionCompleted` refers back to it.
    Exception {
        thread_id: u32,
        sequence: i64,
        exception_type: String,
    },

    /// The runtime unwound one frame because an exception is propagating
    /// through it. `is_managed_frame` is false when the unwind happened in
    /// a frame the agent never reported an enter for.
    ExceptionFrameUnwind { info: CallInfo, is_managed_frame: bool },

    /// An exception reached its terminal state.
    ExceptionCompleted {
        thread_id: u32,
        sequence: i64,
        exception_sequence: i64,
        reason: ExceptionReason,
    },

    /// A thread started in the target process.
    ThreadCreate { thread_id: u32 },

    /// A thread exited in the target process.
    ThreadDestroy { thread_id: u32 },

    /// A thread was named. May arrive well after `ThreadCreate`.
    ThreadName { thread_id: u32, name: String },

    /// The target process is shutting down; no more events will follow.
    Shutdown,
}
