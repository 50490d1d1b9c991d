//! CLI argument definitions

use crate::filter::FrameFilter;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "callscope",
    about = "Reconstruct and query call trees from an instrumented process's event stream",
    after_help = "\
EXAMPLES:
    callscope trace.jsonl                          Replay a recorded event stream
    callscope trace.jsonl --include '*second*'     Keep frames matching a pattern
    callscope trace.jsonl --watch                  Print frames as they arrive
    callscope --load forest.json --unmanaged       Query a previously exported forest"
)]
pub struct Args {
    /// Event stream to replay, one JSON event per line (use '-' for stdin)
    #[arg(value_name = "EVENTS")]
    pub events: Option<PathBuf>,

    /// Load a previously exported forest instead of replaying events
    #[arg(long, value_name = "FILE", conflicts_with = "events")]
    pub load: Option<PathBuf>,

    /// Export the reconstructed forest to a file (for later --load)
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Print frames live while the trace is being reconstructed
    #[arg(long)]
    pub watch: bool,

    /// Stop when no event arrives for N seconds (0 = wait forever)
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub idle_timeout: u64,

    /// Record transition frames whose function identity never resolved
    #[arg(long)]
    pub keep_unknown_transitions: bool,

    /// Classification worker threads (0 = one per CPU)
    #[arg(long, default_value = "0")]
    pub workers: usize,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Keep only frames whose name matches (wildcards * and ?, repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Drop frames whose name matches (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Keep frames called (transitively) from a matching ancestor; results
    /// are re-rooted at that ancestor
    #[arg(long, value_name = "PATTERN")]
    pub called_from: Vec<String>,

    /// Keep only managed/unmanaged transition frames
    #[arg(long)]
    pub unmanaged: bool,

    /// Collapse duplicate method identities, preferring the deepest match
    #[arg(long)]
    pub unique: bool,

    /// Keep frames with a bool argument/return equal to VALUE (repeatable)
    #[arg(long, value_name = "VALUE")]
    pub bool_value: Vec<bool>,

    /// Keep frames with a char argument/return equal to VALUE (repeatable)
    #[arg(long, value_name = "VALUE")]
    pub char_value: Vec<char>,

    /// Keep frames with a signed integer argument/return equal to VALUE
    #[arg(long, value_name = "VALUE")]
    pub int_value: Vec<i64>,

    /// Keep frames with an unsigned integer argument/return equal to VALUE
    #[arg(long, value_name = "VALUE")]
    pub uint_value: Vec<u64>,

    /// Keep frames with a float argument/return equal to VALUE
    #[arg(long, value_name = "VALUE")]
    pub float_value: Vec<f64>,

    /// Keep frames holding a pointer with this address (repeatable)
    #[arg(long, value_name = "ADDR")]
    pub pointer_value: Vec<u64>,

    /// Keep frames with a string argument/return equal to VALUE (repeatable)
    #[arg(long, value_name = "VALUE")]
    pub string_value: Vec<String>,

    /// Keep frames holding a composite value of this type (wildcards)
    #[arg(long, value_name = "PATTERN")]
    pub class_type: Vec<String>,

    /// Identity filter on the frame's own method
    #[arg(long, value_name = "PATTERN")]
    pub method_module: Option<String>,
    #[arg(long, value_name = "PATTERN")]
    pub method_type: Option<String>,
    #[arg(long, value_name = "PATTERN")]
    pub method_name: Option<String>,

    /// Identity filter on the frame's immediate parent
    #[arg(long, value_name = "PATTERN")]
    pub parent_module: Option<String>,
    #[arg(long, value_name = "PATTERN")]
    pub parent_type: Option<String>,
    #[arg(long, value_name = "PATTERN")]
    pub parent_name: Option<String>,
}

impl Args {
    /// Build the query from the filter-related flags.
    #[must_use]
    pub fn to_filter(&self) -> FrameFilter {
        FrameFilter {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            called_from: self.called_from.clone(),
            unmanaged: self.unmanaged,
            unique: self.unique,
            method_module_name: self.method_module.clone(),
            method_type_name: self.method_type.clone(),
            method_name: self.method_name.clone(),
            parent_module_name: self.parent_module.clone(),
            parent_type_name: self.parent_type.clone(),
            parent_name: self.parent_name.clone(),
            bool_values: self.bool_value.clone(),
            char_values: self.char_value.clone(),
            int_values: self.int_value.clone(),
            uint_values: self.uint_value.clone(),
            float_values: self.float_value.clone(),
            pointer_values: self.pointer_value.clone(),
            string_values: self.string_value.clone(),
            class_type_names: self.class_type.clone(),
        }
    }
}
