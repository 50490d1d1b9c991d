//! Query engine: classify frames against a filter, then rebuild a smaller
//! forest.
//!
//! A query runs in two passes over a [`TraceResult`] snapshot:
//!
//! 1. **classification** ([`classify`]) walks every frame on a worker pool
//!    and decides, independently per frame, whether it matches the filter;
//! 2. **rebuild** ([`rebuild`]) clones the matched frames plus the minimum
//!    ancestor chain needed to place them, leaving the source forest
//!    untouched.
//!
//! The output carries a highlight set (direct matches, as opposed to
//! ancestors kept for context) and, for value queries, which decoded values
//! matched inside each frame.

pub mod classify;
pub mod rebuild;
pub mod value_match;
pub mod wildcard;

use crate::domain::FrameRef;
use crate::frame::{CallTree, DecodedFrame, FrameKind, ValueDecoder};
use crate::reconstruct::TraceResult;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A query against a reconstructed forest. Every field is optional; unset
/// fields constrain nothing.
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    /// Frame names to keep. Empty means "keep everything".
    pub include: Vec<String>,
    /// Frame names to drop, applied after every other predicate.
    pub exclude: Vec<String>,
    /// Keep frames one of whose *ancestors* matches; results are re-rooted
    /// at the matching ancestor. A literal all-wildcard pattern anchors at
    /// the thread root instead.
    pub called_from: Vec<String>,
    /// Keep only managed/unmanaged transition frames.
    pub unmanaged: bool,
    /// Collapse duplicate method identities, preferring the deepest
    /// occurrence on any given path.
    pub unique: bool,

    /// Identity filters on the frame's own method.
    pub method_module_name: Option<String>,
    pub method_type_name: Option<String>,
    pub method_name: Option<String>,
    /// Identity filters on the frame's immediate parent.
    pub parent_module_name: Option<String>,
    pub parent_type_name: Option<String>,
    pub parent_name: Option<String>,

    /// Value filters; any non-empty set activates deep value matching,
    /// which only detailed frames can satisfy.
    pub bool_values: Vec<bool>,
    pub char_values: Vec<char>,
    pub int_values: Vec<i64>,
    pub uint_values: Vec<u64>,
    pub float_values: Vec<f64>,
    pub pointer_values: Vec<u64>,
    pub string_values: Vec<String>,
    /// Composite value type names (wildcards allowed).
    pub class_type_names: Vec<String>,
}

impl FrameFilter {
    /// True when no field constrains anything; such a query is answered
    /// without classifying at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
            && self.exclude.is_empty()
            && self.called_from.is_empty()
            && !self.unmanaged
            && !self.unique
            && !self.has_identity_filter()
            && !self.has_value_filter()
    }

    #[must_use]
    pub fn has_identity_filter(&self) -> bool {
        self.method_module_name.is_some()
            || self.method_type_name.is_some()
            || self.method_name.is_some()
            || self.parent_module_name.is_some()
            || self.parent_type_name.is_some()
            || self.parent_name.is_some()
    }

    #[must_use]
    pub fn has_value_filter(&self) -> bool {
        !self.bool_values.is_empty()
            || !self.char_values.is_empty()
            || !self.int_values.is_empty()
            || !self.uint_values.is_empty()
            || !self.float_values.is_empty()
            || !self.pointer_values.is_empty()
            || !self.string_values.is_empty()
            || !self.class_type_names.is_empty()
    }
}

/// One step into a decoded value graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Parameter(usize),
    Return,
    Field(String),
    Index(usize),
    Deref,
}

/// Where inside a frame's decoded values a match was found, e.g.
/// `arg0.items[2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ValuePath(pub Vec<PathSegment>);

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            match segment {
                PathSegment::Parameter(i) => write!(f, "arg{i}")?,
                PathSegment::Return => write!(f, "ret")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
                PathSegment::Deref => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

/// A value inside a frame that satisfied the value filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedValue {
    pub path: ValuePath,
    /// Rendered form of the matching value, for display.
    pub rendered: String,
}

/// Session-scoped side table of decoded frame values.
///
/// Decoding is done at most once per frame per cache lifetime; clones made
/// by the rebuild pass are re-keyed here so repeated queries against the
/// same session never re-decode. A frame whose payload fails to decode is
/// cached as `None` and simply never matches a value filter.
#[derive(Debug, Default)]
pub struct DecodedCache {
    entries: Mutex<HashMap<FrameRef, Option<Arc<DecodedFrame>>>>,
}

impl DecodedCache {
    /// Decoded values for `frame`, decoding on first use. Non-detailed
    /// frames yield `None` without touching the cache.
    pub fn decode(
        &self,
        trees: &[CallTree],
        frame: FrameRef,
        decoder: &dyn ValueDecoder,
    ) -> Option<Arc<DecodedFrame>> {
        let FrameKind::MethodDetailed(detailed) = trees[frame.tree].node(frame.node).kind() else {
            return None;
        };
        if let Some(cached) = self.entries.lock().ok()?.get(&frame) {
            return cached.clone();
        }

        let decoded = Self::decode_detailed(decoder, detailed, frame);
        let decoded = decoded.map(Arc::new);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(frame, decoded.clone());
        }
        decoded
    }

    fn decode_detailed(
        decoder: &dyn ValueDecoder,
        detailed: &crate::frame::DetailedFrame,
        frame: FrameRef,
    ) -> Option<DecodedFrame> {
        let parameters = match decoder.decode_parameters(&detailed.enter_payload) {
            Ok(parameters) => parameters,
            Err(err) => {
                warn!("{frame}: undecodable parameters: {err}");
                return None;
            }
        };
        let return_value = match &detailed.exit_payload {
            Some(payload) => match decoder.decode_return(payload) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!("{frame}: undecodable return value: {err}");
                    return None;
                }
            },
            None => None,
        };
        Some(DecodedFrame {
            parameters,
            return_value,
        })
    }

    /// Share the decoded entry for `from` under the clone's key `to`.
    pub fn rekey(&self, from: FrameRef, to: FrameRef) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(decoded) = entries.get(&from).cloned() {
                entries.insert(to, decoded);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A rebuilt forest: the query's answer.
///
/// Structurally independent of the source; [`FrameRef`]s in `highlights`
/// and `matched_values` point into `trees`, never into the source forest.
#[derive(Debug, Default)]
pub struct FilterResult {
    pub trees: Vec<CallTree>,
    /// Direct matches, as opposed to ancestors kept only for context.
    pub highlights: HashSet<FrameRef>,
    /// For value queries, which decoded values matched inside each frame.
    pub matched_values: HashMap<FrameRef, Vec<MatchedValue>>,
}

impl FilterResult {
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.trees.iter().map(CallTree::len).sum()
    }
}

/// Run `filter` against a snapshot and rebuild the matching forest.
///
/// `workers` caps the classification pool; the unfiltered query skips
/// classification entirely and returns the whole forest.
#[must_use]
pub fn filter_trace(
    result: &TraceResult,
    filter: &FrameFilter,
    decoder: &dyn ValueDecoder,
    cache: &DecodedCache,
    workers: usize,
) -> FilterResult {
    if filter.is_empty() {
        return FilterResult {
            trees: result.trees.clone(),
            highlights: HashSet::new(),
            matched_values: HashMap::new(),
        };
    }
    let outcome = classify::classify_forest(result, filter, decoder, cache, workers);
    rebuild::rebuild(result, filter, outcome, cache)
}
