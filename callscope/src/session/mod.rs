//! Trace session: event routing, lifecycle, and the live watch queue.
//!
//! A [`TraceSession`] owns two threads:
//!
//! - the **dispatch worker** drains the transport channel and routes each
//!   event to the right per-thread [`ThreadStack`]; it is the only writer
//!   for any stack, so reconstruction needs no locking;
//! - the **watchdog** cancels the session after a grace period with no
//!   events (target process gone, transport wedged).
//!
//! Fatal conditions are captured once by the worker, which stops pulling
//! events, trips the cancellation token so every blocked caller unblocks,
//! and re-raises the error from [`TraceSession::wait`]. On any exit path the
//! last completed forest is captured as a stable snapshot first.

use crate::domain::{FunctionId, ModuleId, NodeId, ThreadId, TraceError};
use crate::frame::{CallTree, MethodInfo, MethodRef};
use crate::reconstruct::{ThreadStack, TraceResult};
use callscope_common::{CallInfo, ProfilerEvent, TransitionKind};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often blocked loops wake up to check the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Record transition frames whose function identity never resolved.
    pub record_unknown_transitions: bool,
    /// Capacity of the watch queue; frames are dropped (not blocked on)
    /// when a slow watcher lets it fill up.
    pub watch_capacity: usize,
    /// Cancel the session after this long with no events. `None` disables
    /// the watchdog.
    pub idle_grace: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_unknown_transitions: false,
            watch_capacity: 1024,
            idle_grace: Some(Duration::from_secs(30)),
        }
    }
}

/// Cooperative cancellation signal shared by the session's threads and any
/// watch iterators.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Lightweight notification for one newly created frame, pushed to watchers
/// while the trace is still being reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNotice {
    pub thread_id: ThreadId,
    pub sequence: i64,
    pub depth: usize,
    pub name: String,
}

/// Blocking, cancellable iterator over live frame notifications.
///
/// Ends (returns `None`) when the session is cancelled, fails, or finishes.
/// Non-restartable: it can be taken from a session exactly once.
pub struct WatchIter {
    rx: Receiver<FrameNotice>,
    cancel: CancelToken,
}

impl Iterator for WatchIter {
    type Item = FrameNotice;

    fn next(&mut self) -> Option<FrameNotice> {
        loop {
            // Drain anything already queued before honoring cancellation,
            // then check the token both before blocking and to unblock the
            // wait.
            if let Ok(notice) = self.rx.try_recv() {
                return Some(notice);
            }
            if self.cancel.is_cancelled() {
                return None;
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(notice) => return Some(notice),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

enum Routed {
    Continue,
    Shutdown,
}

/// Dispatches decoded events to the correct per-thread reconstructor and
/// maintains the session-wide identity caches.
struct EventRouter {
    threads: HashMap<ThreadId, ThreadStack>,
    /// Append-only: a function identity is never re-keyed, only resolved.
    methods: HashMap<FunctionId, Arc<MethodRef>>,
    modules: HashMap<ModuleId, String>,
    record_unknown_transitions: bool,
    watch_tx: Option<Sender<FrameNotice>>,
    /// Notices the watch queue had no room for; reported once at the end
    /// so a watcher knows its sequence is incomplete.
    dropped_notices: u64,
}

impl EventRouter {
    fn new(config: &SessionConfig, watch_tx: Option<Sender<FrameNotice>>) -> Self {
        Self {
            threads: HashMap::new(),
            methods: HashMap::new(),
            modules: HashMap::new(),
            record_unknown_transitions: config.record_unknown_transitions,
            watch_tx,
            dropped_notices: 0,
        }
    }

    fn route(&mut self, event: ProfilerEvent) -> Result<Routed, TraceError> {
        match event {
            ProfilerEvent::MethodInfo {
                function_id,
                module_id,
                type_name,
                method_name,
            }
            | ProfilerEvent::MethodInfoDetailed {
                function_id,
                module_id,
                type_name,
                method_name,
                ..
            } => {
                self.resolve_method(FunctionId(function_id), ModuleId(module_id), type_name, method_name);
            }

            ProfilerEvent::ModuleLoaded { module_id, path } => {
                debug!("{} loaded from {path}", ModuleId(module_id));
                self.modules.insert(ModuleId(module_id), path);
            }

            ProfilerEvent::CallEnter(info) => {
                Self::check_status(&info)?;
                let method = self.method(FunctionId(info.function_id));
                let watch_tx = self.watch_tx.clone();
                let stack = self.stack(ThreadId(info.thread_id));
                let node = stack.enter(&info, method)?;
                if Self::notify(watch_tx.as_ref(), stack.tree(), node) {
                    self.dropped_notices += 1;
                }
            }

            ProfilerEvent::CallEnterDetailed { info, parameters } => {
                let degraded = Self::check_status(&info)?;
                let method = self.method(FunctionId(info.function_id));
                let watch_tx = self.watch_tx.clone();
                let stack = self.stack(ThreadId(info.thread_id));
                // A degraded capture still yields a correct frame, just
                // without trustworthy values.
                let node = if degraded {
                    stack.enter(&info, method)?
                } else {
                    stack.enter_detailed(&info, method, parameters)?
                };
                if Self::notify(watch_tx.as_ref(), stack.tree(), node) {
                    self.dropped_notices += 1;
                }
            }

            ProfilerEvent::CallLeave(info) | ProfilerEvent::Tailcall(info) => {
                Self::check_status(&info)?;
                self.stack(ThreadId(info.thread_id)).leave(&info)?;
            }

            ProfilerEvent::TailcallDetailed(info) => {
                Self::check_status(&info)?;
                self.stack(ThreadId(info.thread_id)).tailcall(&info)?;
            }

            ProfilerEvent::CallLeaveDetailed { info, return_value } => {
                let degraded = Self::check_status(&info)?;
                let stack = self.stack(ThreadId(info.thread_id));
                if degraded {
                    stack.leave(&info)?;
                } else {
                    stack.leave_detailed(&info, return_value)?;
                }
            }

            ProfilerEvent::ManagedToUnmanaged(info) => {
                self.transition(&info, TransitionKind::ManagedToUnmanaged)?;
            }

            ProfilerEvent::UnmanagedToManaged(info) => {
                self.transition(&info, TransitionKind::UnmanagedToManaged)?;
            }

            ProfilerEvent::Exception {
                thread_id,
                sequence,
                exception_type,
            } => {
                self.stack(ThreadId(thread_id)).exception(sequence, exception_type)?;
            }

            ProfilerEvent::ExceptionFrameUnwind { info, is_managed_frame } => {
                Self::check_status(&info)?;
                self.stack(ThreadId(info.thread_id))
                    .exception_unwind(&info, is_managed_frame)?;
            }

            ProfilerEvent::ExceptionCompleted {
                thread_id,
                sequence,
                exception_sequence,
                reason,
            } => {
                self.stack(ThreadId(thread_id))
                    .exception_completed(sequence, exception_sequence, reason)?;
            }

            ProfilerEvent::ThreadCreate { thread_id } => {
                self.stack(ThreadId(thread_id));
            }

            ProfilerEvent::ThreadDestroy { thread_id } => {
                // The tree outlives its thread; nothing to tear down.
                debug!("{} destroyed", ThreadId(thread_id));
            }

            ProfilerEvent::ThreadName { thread_id, name } => {
                self.stack(ThreadId(thread_id)).set_thread_name(name);
            }

            ProfilerEvent::Shutdown => return Ok(Routed::Shutdown),
        }
        Ok(Routed::Continue)
    }

    /// Soft conditions degrade one frame and are logged; hard conditions
    /// abort the trace with the same propagation as a sequence gap.
    fn check_status(info: &CallInfo) -> Result<bool, TraceError> {
        if info.status.is_fatal() {
            return Err(TraceError::Transport(format!(
                "{:?} at thread {} sequence {}",
                info.status, info.thread_id, info.sequence
            )));
        }
        if info.status.is_degraded() {
            warn!(
                "thread {} sequence {}: degraded capture ({:?})",
                info.thread_id, info.sequence, info.status
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn transition(&mut self, info: &CallInfo, kind: TransitionKind) -> Result<(), TraceError> {
        Self::check_status(info)?;
        let method = self.method(FunctionId(info.function_id));
        match kind {
            TransitionKind::ManagedToUnmanaged => {
                let watch_tx = self.watch_tx.clone();
                let stack = self.stack(ThreadId(info.thread_id));
                if let Some(node) = stack.enter_transition(info, method, kind)? {
                    if Self::notify(watch_tx.as_ref(), stack.tree(), node) {
                        self.dropped_notices += 1;
                    }
                }
            }
            TransitionKind::UnmanagedToManaged => {
                self.stack(ThreadId(info.thread_id)).leave_transition(info, &method)?;
            }
        }
        Ok(())
    }

    /// Get-or-synthesize the shared identity for a function. An identity
    /// referenced before its metadata event stays an unresolved sentinel
    /// until (and unless) that event arrives.
    fn method(&mut self, function_id: FunctionId) -> Arc<MethodRef> {
        Arc::clone(
            self.methods
                .entry(function_id)
                .or_insert_with(|| Arc::new(MethodRef::unknown(function_id))),
        )
    }

    fn resolve_method(
        &mut self,
        function_id: FunctionId,
        module_id: ModuleId,
        type_name: String,
        method_name: String,
    ) {
        let module_path = self.modules.get(&module_id).cloned().unwrap_or_default();
        if module_path.is_empty() {
            debug!("metadata for {function_id} references unloaded {module_id}");
        }
        let entry = self
            .methods
            .entry(function_id)
            .or_insert_with(|| Arc::new(MethodRef::unknown(function_id)));
        if !entry.resolve(MethodInfo {
            module_path,
            type_name,
            method_name,
        }) {
            debug!("duplicate metadata for {function_id}, ignored");
        }
    }

    fn stack(&mut self, thread_id: ThreadId) -> &mut ThreadStack {
        let record_unknown = self.record_unknown_transitions;
        self.threads
            .entry(thread_id)
            .or_insert_with(|| ThreadStack::new(thread_id, record_unknown))
    }

    /// Returns `true` when the notice was dropped because the queue is
    /// full. Non-blocking: a slow watcher loses frames, never stalls the
    /// dispatch worker.
    fn notify(watch_tx: Option<&Sender<FrameNotice>>, tree: &CallTree, node: NodeId) -> bool {
        let Some(tx) = watch_tx else {
            return false;
        };
        tx.try_send(FrameNotice {
            thread_id: tree.thread_id(),
            sequence: tree.node(node).kind().sequence(),
            depth: tree.depth(node),
            name: tree.frame_name(node),
        })
        .is_err()
    }

    fn finish(self) -> TraceResult {
        if self.dropped_notices > 0 {
            warn!(
                "watch queue overflowed, {} frame notices were dropped",
                self.dropped_notices
            );
        }
        let mut stacks: Vec<ThreadStack> = self.threads.into_values().collect();
        stacks.sort_by_key(ThreadStack::thread_id);

        let mut trees = Vec::with_capacity(stacks.len());
        let mut exceptions = Vec::new();
        for stack in stacks {
            let (tree, mut thread_exceptions) = stack.finish();
            trees.push(tree);
            exceptions.append(&mut thread_exceptions);
        }
        TraceResult { trees, exceptions }
    }
}

/// A running trace collection.
pub struct TraceSession {
    cancel: CancelToken,
    worker: Option<JoinHandle<Result<TraceResult, TraceError>>>,
    watchdog: Option<JoinHandle<()>>,
    watch_rx: Option<Receiver<FrameNotice>>,
    last_trace: Arc<Mutex<Option<TraceResult>>>,
}

impl TraceSession {
    /// Start reconstructing from `events`. The receiver side of the
    /// transport is owned by the dispatch worker from here on.
    #[must_use]
    pub fn start(config: SessionConfig, events: Receiver<ProfilerEvent>) -> Self {
        let cancel = CancelToken::default();
        let (watch_tx, watch_rx) = bounded(config.watch_capacity.max(1));
        let last_trace: Arc<Mutex<Option<TraceResult>>> = Arc::new(Mutex::new(None));
        let last_event = Arc::new(Mutex::new(Instant::now()));

        let router = EventRouter::new(&config, Some(watch_tx));
        let worker = {
            let cancel = cancel.clone();
            let last_event = Arc::clone(&last_event);
            let last_trace = Arc::clone(&last_trace);
            std::thread::spawn(move || {
                run_dispatch(router, &events, &cancel, &last_event, &last_trace)
            })
        };

        let watchdog = config.idle_grace.map(|grace| {
            let cancel = cancel.clone();
            std::thread::spawn(move || run_watchdog(grace, &cancel, &last_event))
        });

        Self {
            cancel,
            worker: Some(worker),
            watchdog,
            watch_rx: Some(watch_rx),
            last_trace,
        }
    }

    /// Token for cancelling this session from anywhere.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation. The dispatch worker finalizes in-flight state
    /// and captures a snapshot before exiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take the live frame iterator. Yields `Some` exactly once per
    /// session; the watch sequence cannot be restarted.
    pub fn watch(&mut self) -> Option<WatchIter> {
        self.watch_rx.take().map(|rx| WatchIter {
            rx,
            cancel: self.cancel.clone(),
        })
    }

    /// The snapshot captured the last time the dispatch worker stopped.
    #[must_use]
    pub fn last_trace(&self) -> Option<TraceResult> {
        self.last_trace.lock().ok().and_then(|slot| slot.clone())
    }

    /// Block until the session ends and return the reconstructed forest,
    /// or the fatal condition that stopped it.
    pub fn wait(mut self) -> Result<TraceResult, TraceError> {
        let worker = self.worker.take().ok_or(TraceError::WorkerLost)?;
        let result = worker.join().map_err(|_| TraceError::WorkerLost)?;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.join().ok();
        }
        result
    }
}

impl Drop for TraceSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.join().ok();
        }
    }
}

fn run_dispatch(
    mut router: EventRouter,
    events: &Receiver<ProfilerEvent>,
    cancel: &CancelToken,
    last_event: &Mutex<Instant>,
    last_trace: &Mutex<Option<TraceResult>>,
) -> Result<TraceResult, TraceError> {
    let mut failure: Option<TraceError> = None;

    loop {
        if cancel.is_cancelled() {
            info!("trace collection cancelled");
            break;
        }
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if let Ok(mut stamp) = last_event.lock() {
                    *stamp = Instant::now();
                }
                match router.route(event) {
                    Ok(Routed::Continue) => {}
                    Ok(Routed::Shutdown) => {
                        info!("target process shut down, finishing trace");
                        break;
                    }
                    Err(err) => {
                        // Captured once; no fatal condition is retried.
                        error!("trace aborted: {err}");
                        failure = Some(err);
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("event transport closed, finishing trace");
                break;
            }
        }
    }

    // Unblock watch iterators and the watchdog before snapshotting.
    cancel.cancel();

    let result = router.finish();
    if let Ok(mut slot) = last_trace.lock() {
        *slot = Some(result.clone());
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(result),
    }
}

fn run_watchdog(grace: Duration, cancel: &CancelToken, last_event: &Mutex<Instant>) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
        let idle = last_event.lock().map(|stamp| stamp.elapsed());
        if let Ok(idle) = idle {
            if idle >= grace {
                info!("no events for {idle:?}, cancelling trace");
                cancel.cancel();
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;
    use callscope_common::{EventStatus, ExceptionReason};
    use crossbeam_channel::unbounded;

    fn call(thread_id: u32, sequence: i64, function_id: u64) -> CallInfo {
        CallInfo {
            thread_id,
            sequence,
            function_id,
            timestamp_ns: sequence as u64,
            status: EventStatus::Ok,
        }
    }

    fn method_info(function_id: u64, type_name: &str, method_name: &str) -> ProfilerEvent {
        ProfilerEvent::MethodInfo {
            function_id,
            module_id: 1,
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
        }
    }

    #[test]
    fn session_reconstructs_two_threads() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        tx.send(method_info(10, "Program", "Main")).unwrap();
        tx.send(method_info(20, "Worker", "Run")).unwrap();
        tx.send(ProfilerEvent::ThreadName { thread_id: 1, name: "Main".into() }).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(2, 1, 20))).unwrap();
        tx.send(ProfilerEvent::CallLeave(call(2, 2, 20))).unwrap();
        tx.send(ProfilerEvent::CallLeave(call(1, 2, 10))).unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let result = session.wait().unwrap();
        assert_eq!(result.trees.len(), 2);
        assert_eq!(result.trees[0].thread_id(), ThreadId(1));
        assert_eq!(result.trees[0].thread_name(), Some("Main"));
        assert_eq!(result.trees[1].thread_id(), ThreadId(2));
        assert_eq!(result.trees[0].len(), 2);
    }

    #[test]
    fn sequence_gap_propagates_to_wait() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(1, 2, 20))).unwrap();
        // Gap: sequence 3 lost.
        tx.send(ProfilerEvent::CallEnter(call(1, 4, 30))).unwrap();
        drop(tx);

        let err = session.wait().unwrap_err();
        assert_eq!(
            err,
            TraceError::SequenceGap {
                thread_id: ThreadId(1),
                expected: 3,
                actual: 4,
            }
        );
    }

    #[test]
    fn late_metadata_resolves_existing_frames() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(method_info(10, "Late", "Resolved")).unwrap();
        drop(tx);

        let result = session.wait().unwrap();
        let tree = &result.trees[0];
        let child = tree.node(tree.root()).children()[0];
        assert_eq!(tree.frame_name(child), "Late.Resolved");
    }

    #[test]
    fn hard_transport_condition_is_fatal() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        let mut info = call(1, 1, 10);
        info.status = EventStatus::UnknownStackFrame;
        tx.send(ProfilerEvent::CallEnter(info)).unwrap();
        drop(tx);

        let err = session.wait().unwrap_err();
        assert!(matches!(err, TraceError::Transport(_)));
    }

    #[test]
    fn degraded_detailed_capture_keeps_the_frame_and_drops_the_values() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        tx.send(method_info(10, "Program", "Main")).unwrap();
        let mut enter = call(1, 1, 10);
        enter.status = EventStatus::BufferFull;
        tx.send(ProfilerEvent::CallEnterDetailed {
            info: enter,
            parameters: vec![1, 2, 3],
        })
        .unwrap();
        tx.send(ProfilerEvent::CallLeaveDetailed {
            info: call(1, 2, 10),
            return_value: vec![4],
        })
        .unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let result = session.wait().unwrap();
        let tree = &result.trees[0];
        assert_eq!(tree.len(), 2);
        let frame = tree.node(tree.root()).children()[0];
        // The frame survived as a plain method frame; neither the captured
        // parameters nor the return value were kept.
        assert!(matches!(tree.node(frame).kind(), FrameKind::Method(_)));
        assert_eq!(tree.frame_name(frame), "Program.Main");
    }

    #[test]
    fn full_watch_queue_drops_notices_without_blocking() {
        let (tx, rx) = unbounded();
        let config = SessionConfig {
            watch_capacity: 1,
            ..SessionConfig::default()
        };
        let mut session = TraceSession::start(config, rx);
        let watch = session.watch().expect("first take succeeds");

        // Nothing drains the queue while these arrive, so only the first
        // notice fits.
        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(1, 2, 20))).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(1, 3, 30))).unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let result = session.wait().unwrap();
        // Reconstruction saw every frame even though the watcher did not.
        assert_eq!(result.trees[0].len(), 4);

        let notices: Vec<FrameNotice> = watch.collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].sequence, 1);
    }

    #[test]
    fn watch_streams_frames_and_ends_on_shutdown() {
        let (tx, rx) = unbounded();
        let mut session = TraceSession::start(SessionConfig::default(), rx);
        let watch = session.watch().expect("first take succeeds");
        assert!(session.watch().is_none(), "watch is non-restartable");

        tx.send(method_info(10, "Program", "Main")).unwrap();
        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::CallLeave(call(1, 2, 10))).unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let notices: Vec<FrameNotice> = watch.collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].name, "Program.Main");
        assert_eq!(notices[0].depth, 1);
        session.wait().unwrap();
    }

    #[test]
    fn watchdog_cancels_idle_session() {
        let (tx, rx) = unbounded::<ProfilerEvent>();
        let config = SessionConfig {
            idle_grace: Some(Duration::from_millis(150)),
            ..SessionConfig::default()
        };
        let session = TraceSession::start(config, rx);

        // Keep the sender alive so only the watchdog can end the session.
        let result = session.wait().unwrap();
        assert!(result.trees.is_empty());
        drop(tx);
    }

    #[test]
    fn snapshot_available_after_cancel() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);
        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let result = session.wait().unwrap();
        assert_eq!(result.trees.len(), 1);
    }

    #[test]
    fn exception_records_survive_into_result() {
        let (tx, rx) = unbounded();
        let session = TraceSession::start(SessionConfig::default(), rx);

        tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
        tx.send(ProfilerEvent::Exception {
            thread_id: 1,
            sequence: 2,
            exception_type: "System.Exception".into(),
        })
        .unwrap();
        tx.send(ProfilerEvent::ExceptionFrameUnwind {
            info: call(1, 3, 10),
            is_managed_frame: true,
        })
        .unwrap();
        tx.send(ProfilerEvent::ExceptionCompleted {
            thread_id: 1,
            sequence: 4,
            exception_sequence: 2,
            reason: ExceptionReason::Caught,
        })
        .unwrap();
        tx.send(ProfilerEvent::Shutdown).unwrap();

        let result = session.wait().unwrap();
        assert_eq!(result.exceptions.len(), 1);
        assert_eq!(result.exceptions[0].exception_type, "System.Exception");
        assert!(result.exceptions[0].status.is_terminal());
    }
}
