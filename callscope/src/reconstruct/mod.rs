//! Trace reconstruction
//!
//! Per-thread state machines that turn the ordered event stream into call
//! trees, plus the snapshot type handed to queries once reconstruction
//! stops.

pub mod exceptions;
pub mod thread_stack;

pub use exceptions::{ExceptionInfo, ExceptionStatus};
pub use thread_stack::ThreadStack;

use crate::domain::{FrameRef, NodeId};
use crate::frame::{CallTree, FrameNode};

/// A stable snapshot of every reconstructed tree in one session.
///
/// Produced when the dispatch worker stops (shutdown, cancellation, or a
/// fatal error); safe for concurrent structural reads from that point on.
/// Trees are ordered by thread id.
#[derive(Debug, Clone, Default)]
pub struct TraceResult {
    pub trees: Vec<CallTree>,
    pub exceptions: Vec<ExceptionInfo>,
}

impl TraceResult {
    #[must_use]
    pub fn node(&self, frame: FrameRef) -> &FrameNode {
        self.trees[frame.tree].node(frame.node)
    }

    #[must_use]
    pub fn tree(&self, index: usize) -> &CallTree {
        &self.trees[index]
    }

    /// Display/matching name for a frame anywhere in the forest.
    #[must_use]
    pub fn frame_name(&self, frame: FrameRef) -> String {
        self.trees[frame.tree].frame_name(frame.node)
    }

    /// Handles for every tree's root, in forest order.
    pub fn roots(&self) -> impl Iterator<Item = FrameRef> + '_ {
        (0..self.trees.len()).map(|tree| FrameRef::new(tree, NodeId::ROOT))
    }

    /// Total frame count across the forest, roots included.
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.trees.iter().map(CallTree::len).sum()
    }
}
