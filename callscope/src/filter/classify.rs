//! Classification pass: decide, per frame, whether the filter matches.
//!
//! Frames are independent classification units, so the forest is drained
//! breadth-first through a shared work queue by a fixed pool of workers.
//! Each worker accumulates its matches locally and the sets are merged once
//! the pool finishes; the decoded-value cache is the only state shared
//! during the pass.
//!
//! Every visited frame has its children enqueued whether or not it matched:
//! classification marks frames for extraction, it never prunes descendants
//! structurally.

use crate::domain::{FrameRef, NodeId};
use crate::filter::{value_match, wildcard, DecodedCache, FrameFilter, MatchedValue};
use crate::frame::{CallTree, MethodRef, ValueDecoder};
use crate::reconstruct::TraceResult;
use crossbeam_channel::{unbounded, RecvTimeoutError};
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How long an idle worker waits before re-checking the pending counter.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Everything the rebuild pass needs to know about one matched frame.
pub(crate) struct FrameMatch {
    /// The ancestor that satisfied `called_from`, when that filter is set.
    pub anchor: Option<FrameRef>,
    /// Values that satisfied the deep value filter, for highlighting.
    pub values: Vec<MatchedValue>,
}

/// Merged result of one classification pass.
pub(crate) struct ClassifyOutcome {
    /// Matched frames in deterministic forest order.
    pub matched: Vec<FrameRef>,
    pub anchors: HashMap<FrameRef, FrameRef>,
    pub matched_values: HashMap<FrameRef, Vec<MatchedValue>>,
}

/// Classify every frame in the forest on a pool of `workers` threads.
pub(crate) fn classify_forest(
    result: &TraceResult,
    filter: &FrameFilter,
    decoder: &dyn ValueDecoder,
    cache: &DecodedCache,
    workers: usize,
) -> ClassifyOutcome {
    let (tx, rx) = unbounded::<FrameRef>();
    let pending = AtomicUsize::new(0);
    for root in result.roots() {
        pending.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(root);
    }

    let workers = workers.max(1);
    let locals: Vec<Vec<(FrameRef, FrameMatch)>> = std::thread::scope(|scope| {
        let pending = &pending;
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                let tx = tx.clone();
                scope.spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        match rx.recv_timeout(IDLE_POLL) {
                            Ok(frame) => {
                                // Children go on the queue before this frame
                                // is retired, so the pending count cannot hit
                                // zero while work remains.
                                let node = result.node(frame);
                                pending.fetch_add(node.children().len(), Ordering::SeqCst);
                                for &child in node.children() {
                                    let _ = tx.send(FrameRef::new(frame.tree, child));
                                }
                                if let Some(outcome) =
                                    classify_frame(result, frame, filter, decoder, cache)
                                {
                                    local.push((frame, outcome));
                                }
                                pending.fetch_sub(1, Ordering::SeqCst);
                            }
                            Err(RecvTimeoutError::Timeout) => {
                                if pending.load(Ordering::SeqCst) == 0 {
                                    break;
                                }
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    local
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(local) => local,
                Err(_) => {
                    warn!("classification worker panicked, its matches are lost");
                    Vec::new()
                }
            })
            .collect()
    });

    let mut matched = Vec::new();
    let mut anchors = HashMap::new();
    let mut matched_values = HashMap::new();
    for local in locals {
        for (frame, outcome) in local {
            matched.push(frame);
            if let Some(anchor) = outcome.anchor {
                anchors.insert(frame, anchor);
            }
            if !outcome.values.is_empty() {
                matched_values.insert(frame, outcome.values);
            }
        }
    }
    // Within a tree, node index order is creation (sequence) order.
    matched.sort_unstable();

    ClassifyOutcome {
        matched,
        anchors,
        matched_values,
    }
}

/// Pure per-frame classification. `None` means the frame does not match.
pub(crate) fn classify_frame(
    result: &TraceResult,
    frame: FrameRef,
    filter: &FrameFilter,
    decoder: &dyn ValueDecoder,
    cache: &DecodedCache,
) -> Option<FrameMatch> {
    let tree = result.tree(frame.tree);
    let node = tree.node(frame.node);

    if filter.unmanaged && !node.kind().is_transition() {
        return None;
    }

    if !identity_matches(
        node.kind().method(),
        filter.method_module_name.as_deref(),
        filter.method_type_name.as_deref(),
        filter.method_name.as_deref(),
    ) {
        return None;
    }
    if has_parent_identity_filter(filter) {
        let parent = node.parent()?;
        if !identity_matches(
            tree.node(parent).kind().method(),
            filter.parent_module_name.as_deref(),
            filter.parent_type_name.as_deref(),
            filter.parent_name.as_deref(),
        ) {
            return None;
        }
    }

    let anchor = if filter.called_from.is_empty() {
        None
    } else if wildcard::all_match_all(&filter.called_from) {
        // Literal all-wildcard anchors at the thread root.
        Some(FrameRef::new(frame.tree, NodeId::ROOT))
    } else {
        Some(FrameRef::new(
            frame.tree,
            nearest_matching_ancestor(tree, frame.node, &filter.called_from)?,
        ))
    };

    if !filter.include.is_empty() {
        // A nameless root cannot be included by name.
        if node.kind().method().is_none() && tree.thread_name().is_none() {
            return None;
        }
        if !wildcard::any_match(&filter.include, &tree.frame_name(frame.node)) {
            return None;
        }
    }

    let mut values = Vec::new();
    if filter.has_value_filter() {
        let decoded = cache.decode(&result.trees, frame, decoder)?;
        values = value_match::find_matches(&decoded, filter);
        if values.is_empty() {
            return None;
        }
    }

    if wildcard::any_match(&filter.exclude, &tree.frame_name(frame.node)) {
        return None;
    }

    Some(FrameMatch { anchor, values })
}

fn has_parent_identity_filter(filter: &FrameFilter) -> bool {
    filter.parent_module_name.is_some()
        || filter.parent_type_name.is_some()
        || filter.parent_name.is_some()
}

/// An unresolved method has no names to compare, so it fails any identity
/// filter; a frame without a method (the root) does too.
fn identity_matches(
    method: Option<&std::sync::Arc<MethodRef>>,
    module: Option<&str>,
    type_name: Option<&str>,
    method_name: Option<&str>,
) -> bool {
    if module.is_none() && type_name.is_none() && method_name.is_none() {
        return true;
    }
    let Some(info) = method.and_then(|method| method.info()) else {
        return false;
    };
    module.map_or(true, |pattern| wildcard::matches(pattern, &info.module_path))
        && type_name.map_or(true, |pattern| wildcard::matches(pattern, &info.type_name))
        && method_name.map_or(true, |pattern| wildcard::matches(pattern, &info.method_name))
}

fn nearest_matching_ancestor(
    tree: &CallTree,
    node: NodeId,
    patterns: &[String],
) -> Option<NodeId> {
    tree.ancestors(node)
        .find(|&ancestor| wildcard::any_match(patterns, &tree.frame_name(ancestor)))
}
