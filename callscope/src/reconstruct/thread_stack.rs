//! Per-thread trace reconstruction.
//!
//! One [`ThreadStack`] per observed thread: a call tree plus a cursor
//! (`current`) that tracks the frame execution is currently inside. Enter
//! events push a child under the cursor and move it down; leave, tail-call,
//! and exception-unwind events move it back up. The tree itself is
//! append-only.
//!
//! Every operation validates the event's per-thread sequence number *before*
//! mutating any state; a gap means the transport lost an event and the trace
//! can no longer be trusted.

use crate::domain::{FunctionId, NodeId, ThreadId, TraceError};
use crate::frame::{CallTree, DetailedFrame, FrameKind, MethodFrame, MethodRef};
use crate::reconstruct::exceptions::ExceptionInfo;
use callscope_common::{CallInfo, ExceptionReason, TransitionKind};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Reconstruction state machine for one thread.
#[derive(Debug)]
pub struct ThreadStack {
    tree: CallTree,
    current: NodeId,
    last_sequence: i64,
    exceptions: HashMap<i64, ExceptionInfo>,
    /// Record transitions into functions whose identity never resolved.
    /// Off by default; unknown transitions are usually unresolvable noise.
    record_unknown_transitions: bool,
    /// Drop decision per transition enter, in push order. Transitions
    /// unwind LIFO, so the matching leave consumes the last entry.
    transition_drops: Vec<bool>,
}

impl ThreadStack {
    #[must_use]
    pub fn new(thread_id: ThreadId, record_unknown_transitions: bool) -> Self {
        let tree = CallTree::new(thread_id);
        let current = tree.root();
        Self {
            tree,
            current,
            last_sequence: 0,
            exceptions: HashMap::new(),
            record_unknown_transitions,
            transition_drops: Vec::new(),
        }
    }

    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.tree.thread_id()
    }

    #[must_use]
    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    /// The frame the cursor is currently inside.
    #[must_use]
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// Depth of the cursor below the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree.depth(self.current)
    }

    pub fn set_thread_name(&mut self, name: String) {
        self.tree.set_thread_name(name);
    }

    /// Consume the stack, yielding the finished tree and every exception
    /// observed on this thread.
    #[must_use]
    pub fn finish(self) -> (CallTree, Vec<ExceptionInfo>) {
        let mut exceptions: Vec<ExceptionInfo> = self.exceptions.into_values().collect();
        exceptions.sort_by_key(|exc| exc.sequence);
        (self.tree, exceptions)
    }

    /// A method was entered: push a child under the cursor.
    pub fn enter(
        &mut self,
        info: &CallInfo,
        method: Arc<MethodRef>,
    ) -> Result<NodeId, TraceError> {
        self.check_sequence(info.sequence)?;
        Ok(self.push(FrameKind::Method(MethodFrame {
            method,
            sequence: info.sequence,
        })))
    }

    /// A method was entered with its arguments captured.
    pub fn enter_detailed(
        &mut self,
        info: &CallInfo,
        method: Arc<MethodRef>,
        parameters: Vec<u8>,
    ) -> Result<NodeId, TraceError> {
        self.check_sequence(info.sequence)?;
        Ok(self.push(FrameKind::MethodDetailed(DetailedFrame {
            call: MethodFrame {
                method,
                sequence: info.sequence,
            },
            enter_payload: parameters,
            exit_payload: None,
        })))
    }

    /// A method returned: validate the cursor's identity and pop.
    pub fn leave(&mut self, info: &CallInfo) -> Result<(), TraceError> {
        self.check_sequence(info.sequence)?;
        self.check_current_method(FunctionId(info.function_id))?;
        self.pop()
    }

    /// A method returned with its return value captured: attach the exit
    /// payload to the cursor before popping.
    pub fn leave_detailed(
        &mut self,
        info: &CallInfo,
        return_value: Vec<u8>,
    ) -> Result<(), TraceError> {
        self.check_sequence(info.sequence)?;
        self.check_current_method(FunctionId(info.function_id))?;
        if !self.tree.set_exit_payload(self.current, return_value) {
            // Degraded capture (e.g. enter was recorded plain after a soft
            // transport condition); the value is lost but the pop is fine.
            debug!(
                "{}: exit payload dropped for frame at sequence {}",
                self.thread_id(),
                self.tree.node(self.current).kind().sequence()
            );
        }
        self.pop()
    }

    /// A tail-call is a return from the caller's perspective; the callee's
    /// frame is reused by the runtime. Treated exactly like a leave.
    pub fn tailcall(&mut self, info: &CallInfo) -> Result<(), TraceError> {
        self.leave(info)
    }

    /// Execution crossed the managed/unmanaged boundary: push a transition
    /// pseudo-frame. Transitions into unknown identities are dropped
    /// entirely (the sequence number is still consumed) unless the session
    /// opted in to recording them.
    pub fn enter_transition(
        &mut self,
        info: &CallInfo,
        method: Arc<MethodRef>,
        kind: TransitionKind,
    ) -> Result<Option<NodeId>, TraceError> {
        self.check_sequence(info.sequence)?;
        // The decision is made once, here: the identity can resolve in
        // place before the matching leave arrives, and the leave must be
        // dropped iff the enter was.
        let drop_frame = method.is_unknown() && !self.record_unknown_transitions;
        self.transition_drops.push(drop_frame);
        if drop_frame {
            debug!(
                "{}: dropping {kind:?} transition into unresolved {}",
                self.thread_id(),
                method.function_id()
            );
            return Ok(None);
        }
        Ok(Some(self.push(FrameKind::Transition(
            MethodFrame {
                method,
                sequence: info.sequence,
            },
            kind,
        ))))
    }

    /// The matching pop for [`ThreadStack::enter_transition`]; consumes
    /// the enter's recorded drop decision so the leave is dropped exactly
    /// when its enter was.
    pub fn leave_transition(
        &mut self,
        info: &CallInfo,
        method: &MethodRef,
    ) -> Result<(), TraceError> {
        self.check_sequence(info.sequence)?;
        let dropped = match self.transition_drops.pop() {
            Some(dropped) => dropped,
            // No enter was observed (attached mid-run); fall back to the
            // identity the leave itself reports.
            None => method.is_unknown() && !self.record_unknown_transitions,
        };
        if dropped {
            return Ok(());
        }
        self.check_current_method(FunctionId(info.function_id))?;
        self.pop()
    }

    /// The runtime unwound a frame because an exception is propagating
    /// through it. Pops like a leave; the identity check is skipped when
    /// the unwind happened in a frame no enter was ever reported for.
    pub fn exception_unwind(
        &mut self,
        info: &CallInfo,
        is_managed_frame: bool,
    ) -> Result<(), TraceError> {
        self.check_sequence(info.sequence)?;
        if is_managed_frame {
            self.check_current_method(FunctionId(info.function_id))?;
        }
        // An unwound transition frame never sees its leave; retire its
        // drop marker here so later leaves match their own enters.
        if self.tree.node(self.current).kind().is_transition() {
            self.transition_drops.pop();
        }
        self.pop()
    }

    /// An exception was thrown while the cursor was on `current`.
    pub fn exception(
        &mut self,
        sequence: i64,
        exception_type: String,
    ) -> Result<(), TraceError> {
        self.check_sequence(sequence)?;
        let record = ExceptionInfo::thrown(exception_type, sequence, self.thread_id(), self.current);
        if self.exceptions.insert(sequence, record).is_some() {
            warn!(
                "{}: exception {sequence} was thrown twice, keeping the newer record",
                self.thread_id()
            );
        }
        Ok(())
    }

    /// Terminal outcome for an exception. A completion whose throw event was
    /// never seen is silently ignored: expected when attaching to an
    /// already-running process.
    pub fn exception_completed(
        &mut self,
        sequence: i64,
        exception_sequence: i64,
        reason: ExceptionReason,
    ) -> Result<(), TraceError> {
        self.check_sequence(sequence)?;
        if let Some(record) = self.exceptions.get_mut(&exception_sequence) {
            record.complete(reason, self.current);
        } else {
            debug!(
                "{}: completion for unknown exception {exception_sequence}, ignored",
                self.thread_id()
            );
        }
        Ok(())
    }

    /// Exceptions observed so far (reconstruction-order, keyed by throw
    /// sequence).
    #[must_use]
    pub fn exceptions(&self) -> &HashMap<i64, ExceptionInfo> {
        &self.exceptions
    }

    // The only mechanism that detects event loss. Must run before any
    // state mutation for the event.
    fn check_sequence(&mut self, actual: i64) -> Result<(), TraceError> {
        let expected = self.last_sequence + 1;
        if self.last_sequence != 0 && actual != expected {
            return Err(TraceError::SequenceGap {
                thread_id: self.thread_id(),
                expected,
                actual,
            });
        }
        self.last_sequence = actual;
        Ok(())
    }

    fn check_current_method(&self, reported: FunctionId) -> Result<(), TraceError> {
        match self.tree.node(self.current).kind().method() {
            Some(method) if method.function_id() == reported => Ok(()),
            Some(method) => Err(TraceError::FrameMismatch {
                thread_id: self.thread_id(),
                reported: reported.to_string(),
                current: method.display_name(),
            }),
            None => Err(TraceError::CursorUnderflow {
                thread_id: self.thread_id(),
            }),
        }
    }

    fn push(&mut self, kind: FrameKind) -> NodeId {
        let id = self.tree.add_child(self.current, kind);
        self.current = id;
        id
    }

    fn pop(&mut self) -> Result<(), TraceError> {
        match self.tree.node(self.current).parent() {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(TraceError::CursorUnderflow {
                thread_id: self.thread_id(),
            }),
        }
    }
}
