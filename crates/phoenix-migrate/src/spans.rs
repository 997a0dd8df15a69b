//! Helpers over exported span and span-annotation JSON.

use serde_json::Value;
use std::collections::HashSet;

/// `annotator_kind` marking a span annotation as an evaluation.
pub const LLM_ANNOTATOR: &str = "LLM";

fn context_field<'a>(span: &'a Value, field: &str) -> Option<&'a str> {
    span.get("context")?.get(field)?.as_str()
}

/// Number of distinct `context.trace_id` values.
pub fn count_traces(spans: &[Value]) -> u64 {
    spans
        .iter()
        .filter_map(|s| context_field(s, "trace_id"))
        .collect::<HashSet<_>>()
        .len() as u64
}

/// Span IDs in order of appearance.
pub fn span_ids(spans: &[Value]) -> Vec<String> {
    spans
        .iter()
        .filter_map(|s| context_field(s, "span_id"))
        .map(String::from)
        .collect()
}

/// Whether a span annotation was produced by an LLM evaluator.
pub fn is_evaluation(annotation: &Value) -> bool {
    annotation
        .get("annotator_kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.eq_ignore_ascii_case(LLM_ANNOTATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spans() -> Vec<Value> {
        vec![
            json!({"context": {"trace_id": "t1", "span_id": "s1"}}),
            json!({"context": {"trace_id": "t1", "span_id": "s2"}}),
            json!({"context": {"trace_id": "t2", "span_id": "s3"}}),
            json!({"name": "no context"}),
        ]
    }

    #[test]
    fn test_count_traces() {
        assert_eq!(count_traces(&spans()), 2);
        assert_eq!(count_traces(&[]), 0);
    }

    #[test]
    fn test_span_ids() {
        assert_eq!(span_ids(&spans()), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_is_evaluation() {
        assert!(is_evaluation(&json!({"annotator_kind": "LLM"})));
        assert!(is_evaluation(&json!({"annotator_kind": "llm"})));
        assert!(!is_evaluation(&json!({"annotator_kind": "HUMAN"})));
        assert!(!is_evaluation(&json!({"name": "x"})));
    }
}
