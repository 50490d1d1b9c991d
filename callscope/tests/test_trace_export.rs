//! Session-to-file round trips: reconstruct from an event stream, export,
//! re-import, and query the imported forest.

use callscope::domain::{ThreadId, TraceError};
use callscope::export::{export_forest, import_forest};
use callscope::filter::{filter_trace, DecodedCache, FrameFilter};
use callscope::frame::{FrameKind, JsonValueDecoder, Value};
use callscope::reconstruct::TraceResult;
use callscope::session::{SessionConfig, TraceSession};
use callscope_common::{CallInfo, EventStatus, ProfilerEvent};
use crossbeam_channel::unbounded;
use std::fs::File;
use std::io::{BufReader, BufWriter};

fn call(thread_id: u32, sequence: i64, function_id: u64) -> CallInfo {
    CallInfo {
        thread_id,
        sequence,
        function_id,
        timestamp_ns: sequence as u64 * 1_000,
        status: EventStatus::Ok,
    }
}

fn method_info(function_id: u64, type_name: &str, method_name: &str) -> ProfilerEvent {
    ProfilerEvent::MethodInfo {
        function_id,
        module_id: 1,
        type_name: type_name.to_string(),
        method_name: method_name.to_string(),
    }
}

fn payload(values: &[Value]) -> Vec<u8> {
    serde_json::to_vec(values).unwrap()
}

/// Reconstruct `Root(1000) → first("aaa") → [second(true), second(false)]`
/// from raw events.
fn reconstruct_sample() -> TraceResult {
    let (tx, rx) = unbounded();
    let session = TraceSession::start(SessionConfig::default(), rx);

    tx.send(ProfilerEvent::ModuleLoaded {
        module_id: 1,
        path: "/app/demo.dll".to_string(),
    })
    .unwrap();
    tx.send(method_info(1, "Test", "first")).unwrap();
    tx.send(method_info(2, "Test", "second")).unwrap();
    tx.send(ProfilerEvent::ThreadName {
        thread_id: 1000,
        name: "Main".to_string(),
    })
    .unwrap();

    tx.send(ProfilerEvent::CallEnterDetailed {
        info: call(1000, 1, 1),
        parameters: payload(&[Value::Str("aaa".to_string())]),
    })
    .unwrap();
    tx.send(ProfilerEvent::CallEnterDetailed {
        info: call(1000, 2, 2),
        parameters: payload(&[Value::Bool(true)]),
    })
    .unwrap();
    tx.send(ProfilerEvent::CallLeaveDetailed {
        info: call(1000, 3, 2),
        return_value: serde_json::to_vec(&Value::Void).unwrap(),
    })
    .unwrap();
    tx.send(ProfilerEvent::CallEnterDetailed {
        info: call(1000, 4, 2),
        parameters: payload(&[Value::Bool(false)]),
    })
    .unwrap();
    tx.send(ProfilerEvent::CallLeave(call(1000, 5, 2))).unwrap();
    tx.send(ProfilerEvent::CallLeave(call(1000, 6, 1))).unwrap();
    tx.send(ProfilerEvent::Shutdown).unwrap();

    session.wait().unwrap()
}

#[test]
fn export_then_import_preserves_the_forest() {
    let result = reconstruct_sample();
    assert_eq!(result.trees.len(), 1);
    assert_eq!(result.trees[0].len(), 4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.json");
    export_forest(&result, BufWriter::new(File::create(&path).unwrap())).unwrap();
    let imported = import_forest(BufReader::new(File::open(&path).unwrap())).unwrap();

    assert_eq!(imported.trees.len(), 1);
    let original = &result.trees[0];
    let tree = &imported.trees[0];
    assert_eq!(tree.thread_id(), ThreadId(1000));
    assert_eq!(tree.thread_name(), Some("Main"));
    assert_eq!(tree.len(), original.len());

    let first = tree.node(tree.root()).children()[0];
    assert_eq!(tree.frame_name(first), "Test.first");
    assert_eq!(tree.node(first).children().len(), 2);
    for (&imported_child, &original_child) in tree
        .node(first)
        .children()
        .iter()
        .zip(original.node(original.node(original.root()).children()[0]).children())
    {
        assert_eq!(
            tree.frame_name(imported_child),
            original.frame_name(original_child)
        );
        let FrameKind::MethodDetailed(after) = tree.node(imported_child).kind() else {
            panic!("expected detailed frame after import");
        };
        let FrameKind::MethodDetailed(before) = original.node(original_child).kind() else {
            panic!("expected detailed frame before export");
        };
        assert_eq!(after.enter_payload, before.enter_payload);
        assert_eq!(after.exit_payload, before.exit_payload);
        assert_eq!(after.call.sequence, before.call.sequence);
    }
}

#[test]
fn imported_forest_answers_value_queries() {
    let result = reconstruct_sample();
    let mut buffer = Vec::new();
    export_forest(&result, &mut buffer).unwrap();
    let imported = import_forest(buffer.as_slice()).unwrap();

    let filter = FrameFilter {
        bool_values: vec![true],
        ..FrameFilter::default()
    };
    let cache = DecodedCache::default();
    let filtered = filter_trace(&imported, &filter, &JsonValueDecoder, &cache, 2);

    assert_eq!(filtered.highlights.len(), 1);
    let tree = &filtered.trees[0];
    let first = tree.node(tree.root()).children()[0];
    assert_eq!(tree.node(first).children().len(), 1);
    assert_eq!(tree.frame_name(tree.node(first).children()[0]), "Test.second");
}

#[test]
fn sequence_gap_aborts_reconstruction_before_the_bad_event() {
    let (tx, rx) = unbounded();
    let session = TraceSession::start(SessionConfig::default(), rx);

    tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
    tx.send(ProfilerEvent::CallEnter(call(1, 2, 20))).unwrap();
    tx.send(ProfilerEvent::CallEnter(call(1, 4, 30))).unwrap();
    drop(tx);

    let err = session.wait().unwrap_err();
    assert_eq!(
        err,
        TraceError::SequenceGap {
            thread_id: ThreadId(1),
            expected: 3,
            actual: 4,
        }
    );
}

#[test]
fn leaves_strictly_decrease_depth() {
    let (tx, rx) = unbounded();
    let session = TraceSession::start(SessionConfig::default(), rx);

    // Max concurrent depth 3; the tree keeps every frame.
    tx.send(ProfilerEvent::CallEnter(call(1, 1, 10))).unwrap();
    tx.send(ProfilerEvent::CallEnter(call(1, 2, 20))).unwrap();
    tx.send(ProfilerEvent::CallEnter(call(1, 3, 30))).unwrap();
    tx.send(ProfilerEvent::CallLeave(call(1, 4, 30))).unwrap();
    tx.send(ProfilerEvent::CallLeave(call(1, 5, 20))).unwrap();
    tx.send(ProfilerEvent::Tailcall(call(1, 6, 10))).unwrap();
    tx.send(ProfilerEvent::Shutdown).unwrap();

    let result = session.wait().unwrap();
    let tree = &result.trees[0];
    assert_eq!(tree.len(), 4);
    let mut node = tree.root();
    for expected_depth in 1..=3 {
        node = tree.node(node).children()[0];
        assert_eq!(tree.depth(node), expected_depth);
    }
}
