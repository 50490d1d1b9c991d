//! Frame model: per-thread call trees.
//!
//! One [`CallTree`] per observed thread, arena-backed: nodes live in a
//! `Vec`, node 0 is always the root, and parent/child links are [`NodeId`]
//! indices. Trees are append-only during construction (a leave only moves
//! the reconstructor's cursor, it never removes a node), so a `NodeId` is
//! stable for the tree's lifetime.

pub mod method;
pub mod value;

pub use method::{MethodInfo, MethodRef};
pub use value::{DecodeError, DecodedFrame, JsonValueDecoder, Value, ValueDecoder};

use crate::domain::{NodeId, ThreadId};
use callscope_common::TransitionKind;
use std::sync::Arc;

/// A method call: who was called and when (per-thread event index).
#[derive(Debug, Clone)]
pub struct MethodFrame {
    pub method: Arc<MethodRef>,
    pub sequence: i64,
}

/// A method call whose argument/return values were captured.
///
/// Payloads stay opaque until a query decodes them; the exit payload, once
/// set, is never overwritten.
#[derive(Debug, Clone)]
pub struct DetailedFrame {
    pub call: MethodFrame,
    pub enter_payload: Vec<u8>,
    pub exit_payload: Option<Vec<u8>>,
}

/// What a frame node represents.
#[derive(Debug, Clone)]
pub enum FrameKind {
    /// The synthetic top of a thread's tree. Sorts before every method
    /// frame (conceptually sequence -1).
    Root,
    Method(MethodFrame),
    MethodDetailed(DetailedFrame),
    /// A managed/unmanaged boundary crossing, modeled as a visible frame.
    Transition(MethodFrame, TransitionKind),
}

impl FrameKind {
    /// The method behind this frame, if it has one.
    #[must_use]
    pub fn method(&self) -> Option<&Arc<MethodRef>> {
        match self {
            FrameKind::Root => None,
            FrameKind::Method(call) | FrameKind::Transition(call, _) => Some(&call.method),
            FrameKind::MethodDetailed(detailed) => Some(&detailed.call.method),
        }
    }

    /// Per-thread event index; the root reports -1 so it sorts first.
    #[must_use]
    pub fn sequence(&self) -> i64 {
        match self {
            FrameKind::Root => -1,
            FrameKind::Method(call) | FrameKind::Transition(call, _) => call.sequence,
            FrameKind::MethodDetailed(detailed) => detailed.call.sequence,
        }
    }

    #[must_use]
    pub fn is_transition(&self) -> bool {
        matches!(self, FrameKind::Transition(..))
    }

    #[must_use]
    pub fn is_detailed(&self) -> bool {
        matches!(self, FrameKind::MethodDetailed(..))
    }
}

/// One node in a thread's call tree.
#[derive(Debug, Clone)]
pub struct FrameNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: FrameKind,
}

impl FrameNode {
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }
}

/// One thread's call tree.
#[derive(Debug, Clone)]
pub struct CallTree {
    thread_id: ThreadId,
    thread_name: Option<String>,
    nodes: Vec<FrameNode>,
}

impl CallTree {
    /// A fresh tree containing only the root node.
    #[must_use]
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            thread_name: None,
            nodes: vec![FrameNode {
                parent: None,
                children: Vec::new(),
                kind: FrameKind::Root,
            }],
        }
    }

    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Thread-naming events may arrive after the tree already exists.
    pub fn set_thread_name(&mut self, name: String) {
        self.thread_name = Some(name);
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &FrameNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        // A tree always has its root.
        false
    }

    /// Append a child frame under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, kind: FrameKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FrameNode {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach an exit payload to a detailed frame. Returns false if the
    /// frame is not detailed or already has one (it is never overwritten).
    pub fn set_exit_payload(&mut self, id: NodeId, payload: Vec<u8>) -> bool {
        match &mut self.nodes[id.0].kind {
            FrameKind::MethodDetailed(detailed) if detailed.exit_payload.is_none() => {
                detailed.exit_payload = Some(payload);
                true
            }
            _ => false,
        }
    }

    /// Walk from `id` towards the root, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent(), move |&current| {
            self.node(current).parent()
        })
    }

    /// Distance from the root (the root itself is depth 0).
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Node ids from the root down to `id`, inclusive.
    #[must_use]
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = std::iter::once(id).chain(self.ancestors(id)).collect();
        path.reverse();
        path
    }

    /// Name used for display and wildcard matching: the qualified method
    /// name for method frames, the thread name (or empty) for the root.
    #[must_use]
    pub fn frame_name(&self, id: NodeId) -> String {
        match self.node(id).kind().method() {
            Some(method) => method.display_name(),
            None => self.thread_name.clone().unwrap_or_default(),
        }
    }
}
