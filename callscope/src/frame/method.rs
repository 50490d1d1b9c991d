//! Method identity and late-arriving metadata resolution.
//!
//! Call events reference methods by an opaque [`FunctionId`]; the metadata
//! event that names the function travels on a different channel and may
//! arrive later, or never. A [`MethodRef`] starts out unresolved (the
//! "unknown" sentinel) and is resolved in place through its shared `Arc`
//! when the metadata shows up, so frames already in the tree pick up the
//! name without a rewrite.

use crate::domain::FunctionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Resolved method metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub module_path: String,
    pub type_name: String,
    pub method_name: String,
}

impl MethodInfo {
    /// `TypeName.MethodName`, the form filters match against.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.type_name, self.method_name)
    }
}

/// A function identity plus its (possibly not yet known) metadata.
///
/// Shared by every frame that calls the function and by the session's
/// method cache. Resolution is write-once: a second metadata event for the
/// same identity is ignored.
#[derive(Debug)]
pub struct MethodRef {
    function_id: FunctionId,
    resolved: OnceLock<MethodInfo>,
}

impl MethodRef {
    /// The "unknown" sentinel: an identity observed in a call event before
    /// (or without) its metadata event. Expected under races between event
    /// channels; never an error.
    #[must_use]
    pub fn unknown(function_id: FunctionId) -> Self {
        Self {
            function_id,
            resolved: OnceLock::new(),
        }
    }

    /// An identity whose metadata is already known (import path, tests).
    #[must_use]
    pub fn resolved(function_id: FunctionId, info: MethodInfo) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(info);
        Self {
            function_id,
            resolved: cell,
        }
    }

    #[must_use]
    pub fn function_id(&self) -> FunctionId {
        self.function_id
    }

    #[must_use]
    pub fn info(&self) -> Option<&MethodInfo> {
        self.resolved.get()
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.resolved.get().is_none()
    }

    /// Resolve the identity in place. Returns false if it was already
    /// resolved (the new metadata is dropped).
    pub fn resolve(&self, info: MethodInfo) -> bool {
        self.resolved.set(info).is_ok()
    }

    /// Name used for display and wildcard matching.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.resolved.get() {
            Some(info) => info.qualified_name(),
            None => format!("<unknown:{}>", self.function_id),
        }
    }
}

// Method equality is metadata equality keyed by function identity; used for
// de-duplication, never for in-tree identity (that is sequence/FrameRef).
impl PartialEq for MethodRef {
    fn eq(&self, other: &Self) -> bool {
        self.function_id == other.function_id
    }
}

impl Eq for MethodRef {}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
