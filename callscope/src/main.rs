//! # callscope - Main Entry Point
//!
//! Two operational modes:
//! - **Replay** (`callscope trace.jsonl`): feed a recorded event stream
//!   (one JSON event per line, `-` for stdin) through a live session.
//! - **Load** (`--load forest.json`): query a previously exported forest.
//!
//! In both modes the filter flags, if any, run a query whose result is
//! rendered to stdout; without them the whole forest is printed.

use anyhow::{Context, Result};
use callscope::cli::Args;
use callscope::display;
use callscope::export::{export_forest, import_forest};
use callscope::filter::{filter_trace, DecodedCache};
use callscope::frame::JsonValueDecoder;
use callscope::reconstruct::TraceResult;
use callscope::session::{SessionConfig, TraceSession};
use callscope_common::ProfilerEvent;
use clap::Parser;
use crossbeam_channel::{bounded, Sender};
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::time::Duration;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().to_lowercase().contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let result = if let Some(path) = &args.load {
        let file = File::open(path)
            .with_context(|| format!("Failed to open forest file: {}", path.display()))?;
        import_forest(BufReader::new(file)).context("Failed to load forest")?
    } else {
        replay(&args)?
    };

    if !args.quiet {
        eprintln!(
            "reconstructed: {} threads, {} frames",
            result.trees.len(),
            result.total_frames()
        );
    }

    if let Some(path) = &args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create export file: {}", path.display()))?;
        export_forest(&result, BufWriter::new(file)).context("Failed to export forest")?;
        if !args.quiet {
            eprintln!("saved: {}", path.display());
        }
    }

    let filter = args.to_filter();
    let stdout = std::io::stdout();
    if filter.is_empty() {
        display::render_forest(&result, stdout.lock())?;
    } else {
        let cache = DecodedCache::default();
        let filtered = filter_trace(
            &result,
            &filter,
            &JsonValueDecoder,
            &cache,
            effective_workers(args.workers),
        );
        if !args.quiet {
            eprintln!(
                "matched: {} frames across {} threads",
                filtered.highlights.len(),
                filtered.trees.len()
            );
        }
        display::render_filtered(&filtered, stdout.lock())?;
    }
    Ok(())
}

fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism().map_or(1, usize::from)
    }
}

/// Replay a recorded event stream through a live session.
fn replay(args: &Args) -> Result<TraceResult> {
    let Some(path) = &args.events else {
        anyhow::bail!(
            "Missing required argument: EVENTS or --load\n\n\
             Usage:\n  \
             callscope trace.jsonl          Replay a recorded event stream\n  \
             callscope --load forest.json   Query an exported forest\n\n\
             Run 'callscope --help' for more options"
        );
    };
    let reader: Box<dyn BufRead + Send> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = File::open(path)
            .with_context(|| format!("Failed to open event stream: {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let (tx, rx) = bounded(1024);
    let feeder = std::thread::spawn(move || feed_events(reader, &tx));

    let config = SessionConfig {
        record_unknown_transitions: args.keep_unknown_transitions,
        idle_grace: match args.idle_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
        ..SessionConfig::default()
    };
    let mut session = TraceSession::start(config, rx);

    if args.watch {
        if let Some(notices) = session.watch() {
            for notice in notices {
                println!(
                    "{} {}{}",
                    notice.thread_id,
                    "  ".repeat(notice.depth.saturating_sub(1)),
                    notice.name
                );
            }
        }
    }

    let result = session.wait()?;
    feeder.join().ok();
    Ok(result)
}

/// Parse one JSON event per line and push it into the session's transport.
/// Malformed lines degrade a single event and are skipped.
fn feed_events(reader: Box<dyn BufRead + Send>, tx: &Sender<ProfilerEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("event stream read failed: {err}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ProfilerEvent>(&line) {
            Ok(event) => {
                // The session hung up; nothing left to feed.
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(err) => warn!("skipping malformed event: {err}"),
        }
    }
}
