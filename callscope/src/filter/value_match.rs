//! Deep value matching for detailed frames.
//!
//! Recursively scans a frame's decoded argument and return-value graphs
//! against the filter's per-type value sets. Primitives and strings compare
//! with exact equality; composite values recurse into named fields; arrays
//! recurse into every element with indices tracked so a match can later be
//! rendered as a path; pointers recurse into the pointee.

use crate::filter::{FrameFilter, MatchedValue, PathSegment, ValuePath};
use crate::frame::{DecodedFrame, Value};

/// Every value in the frame's graphs that satisfies the filter, with the
/// path it was found at. Empty means the frame fails the value filter.
#[must_use]
pub fn find_matches(decoded: &DecodedFrame, filter: &FrameFilter) -> Vec<MatchedValue> {
    let mut matches = Vec::new();
    for (index, parameter) in decoded.parameters.iter().enumerate() {
        let mut path = vec![PathSegment::Parameter(index)];
        walk(parameter, filter, &mut path, &mut matches);
    }
    if let Some(return_value) = &decoded.return_value {
        let mut path = vec![PathSegment::Return];
        walk(return_value, filter, &mut path, &mut matches);
    }
    matches
}

fn walk(
    value: &Value,
    filter: &FrameFilter,
    path: &mut Vec<PathSegment>,
    matches: &mut Vec<MatchedValue>,
) {
    if leaf_matches(value, filter) {
        matches.push(MatchedValue {
            path: ValuePath(path.clone()),
            rendered: value.to_string(),
        });
    }
    match value {
        Value::Ptr { pointee, .. } => {
            path.push(PathSegment::Deref);
            walk(pointee, filter, path, matches);
            path.pop();
        }
        Value::Array { elements, .. } => {
            // Row-major index into the flattened element list; rank is
            // irrelevant for matching.
            for (index, element) in elements.iter().enumerate() {
                path.push(PathSegment::Index(index));
                walk(element, filter, path, matches);
                path.pop();
            }
        }
        Value::Struct { fields, .. } => {
            for (name, field) in fields {
                path.push(PathSegment::Field(name.clone()));
                walk(field, filter, path, matches);
                path.pop();
            }
        }
        _ => {}
    }
}

#[allow(clippy::float_cmp)] // exact equality against user-supplied values
fn leaf_matches(value: &Value, filter: &FrameFilter) -> bool {
    match value {
        Value::Void => false,
        Value::Bool(v) => filter.bool_values.contains(v),
        Value::Char(v) => filter.char_values.contains(v),
        Value::I8(v) => filter.int_values.contains(&i64::from(*v)),
        Value::I16(v) => filter.int_values.contains(&i64::from(*v)),
        Value::I32(v) => filter.int_values.contains(&i64::from(*v)),
        Value::I64(v) => filter.int_values.contains(v),
        Value::U8(v) => filter.uint_values.contains(&u64::from(*v)),
        Value::U16(v) => filter.uint_values.contains(&u64::from(*v)),
        Value::U32(v) => filter.uint_values.contains(&u64::from(*v)),
        Value::U64(v) => filter.uint_values.contains(v),
        Value::F32(v) => filter.float_values.iter().any(|want| *want == f64::from(*v)),
        Value::F64(v) => filter.float_values.contains(v),
        Value::Str(v) => filter.string_values.iter().any(|want| want == v),
        Value::Ptr { address, .. } | Value::FnPtr(address) => {
            filter.pointer_values.contains(address)
        }
        Value::Array { .. } => false,
        Value::Struct { type_name, .. } => {
            crate::filter::wildcard::any_match(&filter.class_type_names, type_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(parameters: Vec<Value>, return_value: Option<Value>) -> DecodedFrame {
        DecodedFrame {
            parameters,
            return_value,
        }
    }

    #[test]
    fn bool_filter_matches_only_equal_arguments() {
        let filter = FrameFilter {
            bool_values: vec![true],
            ..FrameFilter::default()
        };
        let hit = find_matches(&frame(vec![Value::Bool(true)], None), &filter);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].path.to_string(), "arg0");
        assert_eq!(hit[0].rendered, "true");

        let miss = find_matches(&frame(vec![Value::Bool(false)], None), &filter);
        assert!(miss.is_empty());
    }

    #[test]
    fn integers_match_across_widths() {
        let filter = FrameFilter {
            int_values: vec![42],
            ..FrameFilter::default()
        };
        let hits = find_matches(
            &frame(vec![Value::I8(42), Value::I64(42), Value::I32(41)], None),
            &filter,
        );
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn matches_recurse_into_structs_arrays_and_pointers() {
        let filter = FrameFilter {
            string_values: vec!["needle".to_string()],
            ..FrameFilter::default()
        };
        let value = Value::Struct {
            type_name: "Haystack".to_string(),
            fields: vec![(
                "items".to_string(),
                Value::Array {
                    shape: vec![2],
                    elements: vec![
                        Value::Str("hay".to_string()),
                        Value::Ptr {
                            address: 0x10,
                            pointee: Box::new(Value::Str("needle".to_string())),
                        },
                    ],
                },
            )],
        };
        let hits = find_matches(&frame(vec![value], None), &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.to_string(), "arg0.items[1]*");
    }

    #[test]
    fn return_value_participates() {
        let filter = FrameFilter {
            uint_values: vec![7],
            ..FrameFilter::default()
        };
        let hits = find_matches(&frame(Vec::new(), Some(Value::U32(7))), &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.to_string(), "ret");
    }

    #[test]
    fn class_type_name_matches_composites_by_wildcard() {
        let filter = FrameFilter {
            class_type_names: vec!["*Request".to_string()],
            ..FrameFilter::default()
        };
        let value = Value::Struct {
            type_name: "HttpRequest".to_string(),
            fields: vec![("body".to_string(), Value::Void)],
        };
        let hits = find_matches(&frame(vec![value], None), &filter);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn pointer_address_matches() {
        let filter = FrameFilter {
            pointer_values: vec![0xdead],
            ..FrameFilter::default()
        };
        let hits = find_matches(
            &frame(
                vec![Value::Ptr {
                    address: 0xdead,
                    pointee: Box::new(Value::Void),
                }],
                None,
            ),
            &filter,
        );
        assert_eq!(hits.len(), 1);
    }
}
