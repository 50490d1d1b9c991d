//! Identity newtypes
//!
//! Thin wrappers that prevent passing a thread id where a function id is
//! expected and make signatures self-documenting.

use std::fmt;

/// Thread ID of the instrumented process (as reported by the agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

/// Opaque function identity, unique for the lifetime of one trace.
///
/// A `FunctionId` may be observed in call events before the metadata event
/// that names it arrives; see `frame::MethodRef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u64);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Opaque module identity from `ModuleLoaded` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module 0x{:x}", self.0)
    }
}

/// Index of a frame node within one thread's tree arena.
///
/// Node 0 is always that tree's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);
}

/// Forest-wide frame handle: which tree, which node.
///
/// Stable for the lifetime of the forest it points into (trees are
/// append-only during construction and immutable once snapshotted), so it
/// doubles as the key for decoded-value side tables and clone memo maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRef {
    pub tree: usize,
    pub node: NodeId,
}

impl FrameRef {
    #[must_use]
    pub fn new(tree: usize, node: NodeId) -> Self {
        Self { tree, node }
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tree, self.node.0)
    }
}
