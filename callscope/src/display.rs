//! Plain-text rendering of forests and query results.
//!
//! One line per frame, indented by call depth. Direct matches in a query
//! result carry a trailing `*`; matched values are listed beneath their
//! frame as `path = value` lines.

use crate::domain::{FrameRef, NodeId};
use crate::filter::{FilterResult, MatchedValue};
use crate::frame::CallTree;
use crate::reconstruct::TraceResult;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

const INDENT: &str = "  ";

/// Render a reconstructed forest, exceptions included.
pub fn render_forest<W: Write>(result: &TraceResult, mut out: W) -> io::Result<()> {
    for tree in &result.trees {
        render_tree(tree, usize::MAX, &HashSet::new(), &HashMap::new(), &mut out)?;
    }
    if !result.exceptions.is_empty() {
        writeln!(out, "exceptions:")?;
        for exc in &result.exceptions {
            writeln!(
                out,
                "{INDENT}{} seq {}: {} ({:?})",
                exc.thread_id, exc.sequence, exc.exception_type, exc.status
            )?;
        }
    }
    Ok(())
}

/// Render a query result with its highlight and matched-value markers.
pub fn render_filtered<W: Write>(result: &FilterResult, mut out: W) -> io::Result<()> {
    for (index, tree) in result.trees.iter().enumerate() {
        render_tree(tree, index, &result.highlights, &result.matched_values, &mut out)?;
    }
    Ok(())
}

fn render_tree<W: Write>(
    tree: &CallTree,
    tree_index: usize,
    highlights: &HashSet<FrameRef>,
    matched_values: &HashMap<FrameRef, Vec<MatchedValue>>,
    out: &mut W,
) -> io::Result<()> {
    match tree.thread_name() {
        Some(name) => writeln!(out, "{} \"{name}\"", tree.thread_id())?,
        None => writeln!(out, "{}", tree.thread_id())?,
    }
    render_node(tree, tree.root(), tree_index, 0, highlights, matched_values, out)
}

fn render_node<W: Write>(
    tree: &CallTree,
    node: NodeId,
    tree_index: usize,
    depth: usize,
    highlights: &HashSet<FrameRef>,
    matched_values: &HashMap<FrameRef, Vec<MatchedValue>>,
    out: &mut W,
) -> io::Result<()> {
    let frame = FrameRef::new(tree_index, node);
    if node != tree.root() {
        let marker = if highlights.contains(&frame) { " *" } else { "" };
        writeln!(
            out,
            "{}{}{marker}",
            INDENT.repeat(depth),
            tree.frame_name(node)
        )?;
        if let Some(values) = matched_values.get(&frame) {
            for value in values {
                writeln!(
                    out,
                    "{}{} = {}",
                    INDENT.repeat(depth + 1),
                    value.path,
                    value.rendered
                )?;
            }
        }
    }
    let child_depth = if node == tree.root() { 1 } else { depth + 1 };
    for &child in tree.node(node).children() {
        render_node(tree, child, tree_index, child_depth, highlights, matched_values, out)?;
    }
    Ok(())
}
