//! End-to-end query scenarios against hand-built forests.

use callscope::domain::{FrameRef, FunctionId, ThreadId};
use callscope::filter::{filter_trace, DecodedCache, FilterResult, FrameFilter};
use callscope::frame::{
    CallTree, DetailedFrame, FrameKind, JsonValueDecoder, MethodFrame, MethodInfo, MethodRef,
    Value,
};
use callscope::reconstruct::TraceResult;
use callscope_common::TransitionKind;
use std::sync::Arc;

const WORKERS: usize = 2;

fn method(id: u64, name: &str) -> Arc<MethodRef> {
    Arc::new(MethodRef::resolved(
        FunctionId(id),
        MethodInfo {
            module_path: "/app/demo.dll".to_string(),
            type_name: "Test".to_string(),
            method_name: name.to_string(),
        },
    ))
}

fn plain(method: Arc<MethodRef>, sequence: i64) -> FrameKind {
    FrameKind::Method(MethodFrame { method, sequence })
}

fn detailed(method: Arc<MethodRef>, sequence: i64, parameters: &[Value]) -> FrameKind {
    FrameKind::MethodDetailed(DetailedFrame {
        call: MethodFrame { method, sequence },
        enter_payload: serde_json::to_vec(parameters).unwrap(),
        exit_payload: None,
    })
}

/// `Root(1000) → first("aaa") → [second(true), second(false)]`
fn sample_forest() -> TraceResult {
    let mut tree = CallTree::new(ThreadId(1000));
    tree.set_thread_name("Main".to_string());
    let first = tree.add_child(
        tree.root(),
        detailed(method(1, "first"), 1, &[Value::Str("aaa".to_string())]),
    );
    tree.add_child(first, detailed(method(2, "second"), 2, &[Value::Bool(true)]));
    tree.add_child(first, detailed(method(2, "second"), 4, &[Value::Bool(false)]));
    TraceResult {
        trees: vec![tree],
        exceptions: Vec::new(),
    }
}

fn run(forest: &TraceResult, filter: &FrameFilter) -> FilterResult {
    let cache = DecodedCache::default();
    filter_trace(forest, filter, &JsonValueDecoder, &cache, WORKERS)
}

fn names_in_order(tree: &CallTree) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if node != tree.root() {
            names.push(tree.frame_name(node));
        }
        for &child in tree.node(node).children().iter().rev() {
            stack.push(child);
        }
    }
    names
}

#[test]
fn unique_include_keeps_the_first_sibling_match() {
    let forest = sample_forest();
    let filter = FrameFilter {
        include: vec!["*second*".to_string()],
        unique: true,
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);

    assert_eq!(result.trees.len(), 1);
    let tree = &result.trees[0];
    // Root → first → second(true); the later duplicate is dropped.
    assert_eq!(names_in_order(tree), vec!["Test.first", "Test.second"]);

    let first = tree.node(tree.root()).children()[0];
    let second = tree.node(first).children()[0];
    let FrameKind::MethodDetailed(frame) = tree.node(second).kind() else {
        panic!("expected detailed frame");
    };
    let parameters: Vec<Value> = serde_json::from_slice(&frame.enter_payload).unwrap();
    assert_eq!(parameters, vec![Value::Bool(true)]);

    // Only the direct match is highlighted, not its context chain.
    assert_eq!(result.highlights.len(), 1);
    assert!(result.highlights.contains(&FrameRef::new(0, second)));
}

#[test]
fn bool_value_filter_matches_by_decoded_argument() {
    let forest = sample_forest();
    let filter = FrameFilter {
        bool_values: vec![true],
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);

    let tree = &result.trees[0];
    assert_eq!(names_in_order(tree), vec!["Test.first", "Test.second"]);

    let first = tree.node(tree.root()).children()[0];
    let second = tree.node(first).children()[0];
    let matched = &result.matched_values[&FrameRef::new(0, second)];
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].path.to_string(), "arg0");
    assert_eq!(matched[0].rendered, "true");
}

#[test]
fn unmanaged_filter_keeps_only_transition_frames() {
    let mut tree = CallTree::new(ThreadId(1));
    tree.add_child(tree.root(), plain(method(1, "managed"), 1));
    tree.add_child(
        tree.root(),
        FrameKind::Transition(
            MethodFrame {
                method: method(2, "native"),
                sequence: 2,
            },
            TransitionKind::ManagedToUnmanaged,
        ),
    );
    let forest = TraceResult {
        trees: vec![tree],
        exceptions: Vec::new(),
    };

    let filter = FrameFilter {
        unmanaged: true,
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);

    let tree = &result.trees[0];
    assert_eq!(names_in_order(tree), vec!["Test.native"]);
    let frame = tree.node(tree.root()).children()[0];
    assert!(tree.node(frame).kind().is_transition());
}

#[test]
fn called_from_re_roots_at_the_matching_ancestor() {
    // first → second → [third, readLine]
    let mut tree = CallTree::new(ThreadId(1));
    let first = tree.add_child(tree.root(), plain(method(1, "first"), 1));
    let second = tree.add_child(first, plain(method(2, "second"), 2));
    tree.add_child(second, plain(method(3, "third"), 3));
    tree.add_child(second, plain(method(4, "readLine"), 4));
    let forest = TraceResult {
        trees: vec![tree],
        exceptions: Vec::new(),
    };

    let filter = FrameFilter {
        called_from: vec!["*second".to_string()],
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);

    let tree = &result.trees[0];
    // The anchor sits directly under the thread root; "first" is gone.
    assert_eq!(
        names_in_order(tree),
        vec!["Test.second", "Test.third", "Test.readLine"]
    );
    let anchor = tree.node(tree.root()).children()[0];
    assert_eq!(tree.node(anchor).children().len(), 2);
}

#[test]
fn all_wildcard_called_from_clones_full_thread_subtrees() {
    let forest = sample_forest();
    let filter = FrameFilter {
        called_from: vec!["*".to_string()],
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);
    assert_eq!(result.total_frames(), forest.total_frames());
    assert_eq!(
        names_in_order(&result.trees[0]),
        vec!["Test.first", "Test.second", "Test.second"]
    );
}

#[test]
fn classification_is_idempotent() {
    let forest = sample_forest();
    let filter = FrameFilter {
        bool_values: vec![true, false],
        include: vec!["*second*".to_string()],
        ..FrameFilter::default()
    };
    let once = run(&forest, &filter);
    let twice = run(&forest, &filter);

    assert_eq!(once.highlights, twice.highlights);
    assert_eq!(once.total_frames(), twice.total_frames());
    assert_eq!(names_in_order(&once.trees[0]), names_in_order(&twice.trees[0]));
}

#[test]
fn unique_prefers_the_deeper_occurrence_on_a_path() {
    // work → helper → work: the outer match is subsumed by the chain
    // leading to the inner one.
    let work = method(5, "work");
    let mut tree = CallTree::new(ThreadId(1));
    let outer = tree.add_child(tree.root(), plain(Arc::clone(&work), 1));
    let mid = tree.add_child(outer, plain(method(6, "helper"), 2));
    tree.add_child(mid, plain(work, 3));
    let forest = TraceResult {
        trees: vec![tree],
        exceptions: Vec::new(),
    };

    let filter = FrameFilter {
        include: vec!["*work*".to_string()],
        unique: true,
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);

    let tree = &result.trees[0];
    assert_eq!(
        names_in_order(tree),
        vec!["Test.work", "Test.helper", "Test.work"]
    );
    // Only the deepest occurrence is a direct match.
    assert_eq!(result.highlights.len(), 1);
    let highlighted = *result.highlights.iter().next().unwrap();
    assert_eq!(tree.depth(highlighted.node), 3);
}

#[test]
fn unique_query_that_excludes_nothing_highlights_nothing() {
    let mut tree = CallTree::new(ThreadId(1));
    tree.set_thread_name("Main".to_string());
    let a = tree.add_child(tree.root(), plain(method(1, "a"), 1));
    tree.add_child(a, plain(method(2, "b"), 2));
    let forest = TraceResult {
        trees: vec![tree],
        exceptions: Vec::new(),
    };

    let filter = FrameFilter {
        include: vec!["*".to_string()],
        unique: true,
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);
    assert_eq!(result.total_frames(), forest.total_frames());
    assert!(result.highlights.is_empty());
}

#[test]
fn empty_filter_returns_the_whole_forest_unclassified() {
    let forest = sample_forest();
    let result = run(&forest, &FrameFilter::default());
    assert_eq!(result.total_frames(), forest.total_frames());
    assert!(result.highlights.is_empty());
    assert!(result.matched_values.is_empty());
}

#[test]
fn exclude_overrides_include() {
    let forest = sample_forest();
    let filter = FrameFilter {
        include: vec!["*".to_string()],
        exclude: vec!["*second*".to_string()],
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);
    assert_eq!(names_in_order(&result.trees[0]), vec!["Test.first"]);
}

#[test]
fn parent_identity_filter_constrains_by_caller() {
    let forest = sample_forest();
    let filter = FrameFilter {
        method_name: Some("second".to_string()),
        parent_name: Some("first".to_string()),
        ..FrameFilter::default()
    };
    let result = run(&forest, &filter);
    // Both second calls share the parent "first".
    assert_eq!(result.highlights.len(), 2);

    let no_match = FrameFilter {
        method_name: Some("second".to_string()),
        parent_name: Some("main".to_string()),
        ..FrameFilter::default()
    };
    let result = run(&forest, &no_match);
    assert!(result.trees.is_empty());
}
