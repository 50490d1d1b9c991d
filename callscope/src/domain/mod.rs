//! Domain model for callscope
//!
//! Core identity newtypes and structured errors shared by the rest of the
//! crate. The newtypes keep thread ids, function ids, and frame handles from
//! being mixed up in signatures; the errors carry enough context to name the
//! exact failure (expected vs. actual sequence numbers, mismatched methods).

pub mod errors;
pub mod types;

pub use errors::{ExportError, TraceError};
pub use types::{FrameRef, FunctionId, ModuleId, NodeId, ThreadId};
