//! Rebuild pass: extract matched frames into a new forest.
//!
//! Produces a structurally independent forest (the source may still be
//! growing under a live session) containing each kept frame plus the
//! minimum ancestor chain needed to place it. Shared ancestors are cloned
//! exactly once through a memo map keyed by the original frame handle;
//! different matched frames' chains may be walked in any order because the
//! memo map is the only shared state of the pass.

use crate::domain::{FrameRef, FunctionId, NodeId};
use crate::filter::classify::ClassifyOutcome;
use crate::filter::{wildcard, DecodedCache, FilterResult, FrameFilter};
use crate::frame::CallTree;
use crate::reconstruct::TraceResult;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

pub(crate) fn rebuild(
    result: &TraceResult,
    filter: &FrameFilter,
    outcome: ClassifyOutcome,
    cache: &DecodedCache,
) -> FilterResult {
    let kept = if filter.unique {
        dedup_unique(result, &outcome.matched)
    } else {
        outcome.matched.clone()
    };

    let mut builder = Rebuilder::new(result, cache);
    let anchor_mode = !filter.called_from.is_empty();

    if anchor_mode && wildcard::all_match_all(&filter.called_from) {
        // Anchored at the thread root: the clone is the full thread subtree.
        let trees: BTreeSet<usize> = kept.iter().map(|frame| frame.tree).collect();
        for tree in trees {
            builder.clone_subtree(tree);
        }
    } else if anchor_mode {
        for &frame in &kept {
            let Some(&anchor) = outcome.anchors.get(&frame) else {
                continue;
            };
            let out_tree = builder.ensure_tree(frame.tree);
            // The anchor attaches directly under the cloned thread root;
            // its own ancestors are discarded. Anchors sharing a thread
            // merge under one cloned root.
            let anchor_clone =
                builder.clone_under(anchor, FrameRef::new(out_tree, NodeId::ROOT));
            builder.clone_chain(anchor.node, anchor_clone, frame);
        }
    } else {
        for &frame in &kept {
            let out_tree = builder.ensure_tree(frame.tree);
            builder.clone_chain(
                NodeId::ROOT,
                FrameRef::new(out_tree, NodeId::ROOT),
                frame,
            );
        }
    }

    let mut highlights = HashSet::new();
    for &frame in &kept {
        if let Some(&clone) = builder.memo.get(&frame) {
            highlights.insert(clone);
        }
    }
    let mut matched_values = HashMap::new();
    for (frame, values) in outcome.matched_values {
        if let Some(&clone) = builder.memo.get(&frame) {
            matched_values.insert(clone, values);
        }
    }

    let mut rebuilt = FilterResult {
        trees: builder.out_trees,
        highlights,
        matched_values,
    };
    // A unique query that excluded nothing highlights nothing: marking
    // every node conveys no information.
    if filter.unique && rebuilt.total_frames() == result.total_frames() {
        rebuilt.highlights.clear();
    }
    rebuilt
}

/// Collapse matches that share a method identity. The first occurrence (in
/// sequence order) wins, except when it is an ancestor of a later match
/// with the same identity: the deeper occurrence is preferred because the
/// shallower one is subsumed by the chain leading to it.
fn dedup_unique(result: &TraceResult, matched: &[FrameRef]) -> Vec<FrameRef> {
    let mut kept: Vec<FrameRef> = Vec::new();
    let mut by_identity: HashMap<FunctionId, usize> = HashMap::new();

    for &frame in matched {
        let identity = result
            .node(frame)
            .kind()
            .method()
            .map(|method| method.function_id());
        let Some(identity) = identity else {
            // Roots have no identity to collapse on.
            kept.push(frame);
            continue;
        };
        match by_identity.entry(identity) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(frame);
            }
            Entry::Occupied(slot) => {
                let index = *slot.get();
                let prev = kept[index];
                let prev_is_ancestor = prev.tree == frame.tree
                    && result
                        .tree(frame.tree)
                        .ancestors(frame.node)
                        .any(|ancestor| ancestor == prev.node);
                if prev_is_ancestor {
                    kept[index] = frame;
                }
            }
        }
    }
    kept.sort_unstable();
    kept
}

struct Rebuilder<'a> {
    source: &'a TraceResult,
    cache: &'a DecodedCache,
    out_trees: Vec<CallTree>,
    /// Source tree index to output tree index.
    tree_map: HashMap<usize, usize>,
    /// Source frame to its clone; the reason shared ancestors are cloned
    /// exactly once.
    memo: HashMap<FrameRef, FrameRef>,
}

impl<'a> Rebuilder<'a> {
    fn new(source: &'a TraceResult, cache: &'a DecodedCache) -> Self {
        Self {
            source,
            cache,
            out_trees: Vec::new(),
            tree_map: HashMap::new(),
            memo: HashMap::new(),
        }
    }

    /// Output tree for a source tree, created (with its root memoized) on
    /// first use. Kept frames arrive in forest order, so output trees stay
    /// ordered by thread id.
    fn ensure_tree(&mut self, src_tree: usize) -> usize {
        if let Some(&out) = self.tree_map.get(&src_tree) {
            return out;
        }
        let source = self.source.tree(src_tree);
        let mut tree = CallTree::new(source.thread_id());
        if let Some(name) = source.thread_name() {
            tree.set_thread_name(name.to_string());
        }
        let out = self.out_trees.len();
        self.out_trees.push(tree);
        self.tree_map.insert(src_tree, out);
        self.memo.insert(
            FrameRef::new(src_tree, NodeId::ROOT),
            FrameRef::new(out, NodeId::ROOT),
        );
        out
    }

    /// Clone one source frame under an already-cloned parent, memoized.
    /// Decoded values cached for the original re-key to the clone so later
    /// queries do not re-decode.
    fn clone_under(&mut self, src: FrameRef, out_parent: FrameRef) -> FrameRef {
        if let Some(&existing) = self.memo.get(&src) {
            return existing;
        }
        let kind = self.source.tree(src.tree).node(src.node).kind().clone();
        let node = self.out_trees[out_parent.tree].add_child(out_parent.node, kind);
        let clone = FrameRef::new(out_parent.tree, node);
        self.memo.insert(src, clone);
        self.cache.rekey(src, clone);
        clone
    }

    /// Clone the path from `src_from` (already cloned as `from_clone`,
    /// exclusive) down to `to` (inclusive).
    fn clone_chain(&mut self, src_from: NodeId, from_clone: FrameRef, to: FrameRef) {
        let tree = self.source.tree(to.tree);
        let path = tree.path_from_root(to.node);
        let start = path
            .iter()
            .position(|&node| node == src_from)
            .unwrap_or(0);
        let mut parent = from_clone;
        for &node in &path[start + 1..] {
            parent = self.clone_under(FrameRef::new(to.tree, node), parent);
        }
    }

    /// Clone a source tree wholesale, preserving sibling order.
    fn clone_subtree(&mut self, src_tree: usize) {
        self.ensure_tree(src_tree);
        let tree = self.source.tree(src_tree);
        let mut stack = vec![NodeId::ROOT];
        while let Some(node) = stack.pop() {
            let parent_clone = self.memo[&FrameRef::new(src_tree, node)];
            for &child in tree.node(node).children() {
                self.clone_under(FrameRef::new(src_tree, child), parent_clone);
                stack.push(child);
            }
        }
    }
}
