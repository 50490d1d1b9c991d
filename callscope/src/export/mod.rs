//! Forest serialization.
//!
//! A forest is written as one JSON document: a method table (each identity
//! once, unresolved ones included) plus the per-thread frame trees, with
//! frames referencing the table by index. Importing rebuilds the shared
//! `Arc<MethodRef>` per identity, so a round trip preserves method identity
//! sharing as well as tree shape and capture payloads.
//!
//! Exception records are session diagnostics, not forest structure; they
//! are not part of the document.

use crate::domain::{ExportError, FunctionId, NodeId, ThreadId};
use crate::frame::{
    CallTree, DetailedFrame, FrameKind, MethodFrame, MethodInfo, MethodRef,
};
use crate::reconstruct::TraceResult;
use callscope_common::TransitionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

const FOREST_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ForestDocument {
    version: u32,
    methods: Vec<MethodEntry>,
    threads: Vec<ThreadElement>,
}

/// One function identity. `info` is absent for identities whose metadata
/// never arrived.
#[derive(Debug, Serialize, Deserialize)]
struct MethodEntry {
    function_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<MethodInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThreadElement {
    thread_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread_name: Option<String>,
    frames: Vec<FrameElement>,
}

#[derive(Debug, Serialize, Deserialize)]
enum FrameElementKind {
    Method,
    Detailed,
    Transition(TransitionKind),
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameElement {
    /// Index into the document's method table.
    method: usize,
    sequence: i64,
    kind: FrameElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enter: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exit: Option<Vec<u8>>,
    frames: Vec<FrameElement>,
}

/// Serialize a forest as JSON into `writer`.
pub fn export_forest<W: Write>(result: &TraceResult, writer: W) -> Result<(), ExportError> {
    let mut table = MethodTable::default();
    let threads = result
        .trees
        .iter()
        .map(|tree| export_tree(tree, &mut table))
        .collect::<Result<Vec<_>, _>>()?;

    let document = ForestDocument {
        version: FOREST_FORMAT_VERSION,
        methods: table.entries,
        threads,
    };
    serde_json::to_writer(writer, &document)?;
    Ok(())
}

/// Deserialize a forest previously written by [`export_forest`].
pub fn import_forest<R: Read>(reader: R) -> Result<TraceResult, ExportError> {
    let document: ForestDocument = serde_json::from_reader(reader)?;
    if document.version != FOREST_FORMAT_VERSION {
        return Err(ExportError::InvalidForest(format!(
            "unsupported forest format version {}",
            document.version
        )));
    }

    // One shared MethodRef per identity, like a live session's cache.
    let methods: Vec<Arc<MethodRef>> = document
        .methods
        .into_iter()
        .map(|entry| {
            let id = FunctionId(entry.function_id);
            Arc::new(match entry.info {
                Some(info) => MethodRef::resolved(id, info),
                None => MethodRef::unknown(id),
            })
        })
        .collect();

    let mut trees = Vec::with_capacity(document.threads.len());
    for thread in document.threads {
        let mut tree = CallTree::new(ThreadId(thread.thread_id));
        if let Some(name) = thread.thread_name {
            tree.set_thread_name(name);
        }
        for frame in thread.frames {
            import_frame(&mut tree, NodeId::ROOT, frame, &methods)?;
        }
        trees.push(tree);
    }
    trees.sort_by_key(CallTree::thread_id);

    Ok(TraceResult {
        trees,
        exceptions: Vec::new(),
    })
}

#[derive(Default)]
struct MethodTable {
    entries: Vec<MethodEntry>,
    by_id: HashMap<FunctionId, usize>,
}

impl MethodTable {
    fn index_of(&mut self, method: &MethodRef) -> usize {
        if let Some(&index) = self.by_id.get(&method.function_id()) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(MethodEntry {
            function_id: method.function_id().0,
            info: method.info().cloned(),
        });
        self.by_id.insert(method.function_id(), index);
        index
    }
}

fn export_tree(tree: &CallTree, table: &mut MethodTable) -> Result<ThreadElement, ExportError> {
    let frames = tree
        .node(tree.root())
        .children()
        .iter()
        .map(|&child| export_frame(tree, child, table))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ThreadElement {
        thread_id: tree.thread_id().0,
        thread_name: tree.thread_name().map(ToString::to_string),
        frames,
    })
}

fn export_frame(
    tree: &CallTree,
    node: NodeId,
    table: &mut MethodTable,
) -> Result<FrameElement, ExportError> {
    let kind = tree.node(node).kind();
    let (method, kind, enter, exit) = match kind {
        FrameKind::Root => {
            return Err(ExportError::InvalidForest(
                "root frame nested below a tree root".to_string(),
            ));
        }
        FrameKind::Method(call) => (&call.method, FrameElementKind::Method, None, None),
        FrameKind::MethodDetailed(detailed) => (
            &detailed.call.method,
            FrameElementKind::Detailed,
            Some(detailed.enter_payload.clone()),
            detailed.exit_payload.clone(),
        ),
        FrameKind::Transition(call, transition) => (
            &call.method,
            FrameElementKind::Transition(*transition),
            None,
            None,
        ),
    };

    let frames = tree
        .node(node)
        .children()
        .iter()
        .map(|&child| export_frame(tree, child, table))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FrameElement {
        method: table.index_of(method),
        sequence: tree.node(node).kind().sequence(),
        kind,
        enter,
        exit,
        frames,
    })
}

fn import_frame(
    tree: &mut CallTree,
    parent: NodeId,
    element: FrameElement,
    methods: &[Arc<MethodRef>],
) -> Result<(), ExportError> {
    let method = methods.get(element.method).ok_or_else(|| {
        ExportError::InvalidForest(format!(
            "frame references method index {} of {}",
            element.method,
            methods.len()
        ))
    })?;
    let call = MethodFrame {
        method: Arc::clone(method),
        sequence: element.sequence,
    };
    let kind = match element.kind {
        FrameElementKind::Method => FrameKind::Method(call),
        FrameElementKind::Detailed => FrameKind::MethodDetailed(DetailedFrame {
            call,
            enter_payload: element.enter.unwrap_or_default(),
            exit_payload: element.exit,
        }),
        FrameElementKind::Transition(transition) => FrameKind::Transition(call, transition),
    };

    let node = tree.add_child(parent, kind);
    for child in element.frames {
        import_frame(tree, node, child, methods)?;
    }
    Ok(())
}
