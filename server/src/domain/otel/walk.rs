//! Export tree walking
//!
//! Collector versions wrap spans at different depths (bare span, `spans[]`,
//! `scopeSpans[]`, full `resourceSpans[]` request). Every node is classified
//! once and the walkers descend on the classification.

use serde_json::Value as JsonValue;

/// Shape of one node in an OTEL export tree.
#[derive(Debug)]
pub enum OtelNode<'a> {
    /// A leaf span (has an `attributes` array).
    Span,
    Spans(&'a [JsonValue]),
    ScopeSpans(&'a [JsonValue]),
    ResourceSpans(&'a [JsonValue]),
    /// A bare array of nodes.
    List(&'a [JsonValue]),
    Unknown,
}

impl<'a> OtelNode<'a> {
    pub fn classify(value: &'a JsonValue) -> Self {
        let map = match value {
            JsonValue::Object(map) => map,
            JsonValue::Array(items) => return Self::List(items),
            _ => return Self::Unknown,
        };

        if matches!(map.get("attributes"), Some(JsonValue::Array(_))) {
            return Self::Span;
        }
        if let Some(JsonValue::Array(items)) = map.get("spans") {
            return Self::Spans(items);
        }
        if let Some(JsonValue::Array(items)) = map.get("scopeSpans") {
            return Self::ScopeSpans(items);
        }
        if let Some(JsonValue::Array(items)) = map.get("resourceSpans") {
            return Self::ResourceSpans(items);
        }
        Self::Unknown
    }
}

/// Descend through the first element of each wrapper until a span is found.
///
/// Falls back to `value` itself when no span exists along the first path, so
/// callers always get something to build events from.
pub fn dig_for_span(value: &JsonValue) -> &JsonValue {
    let mut current = value;
    loop {
        match OtelNode::classify(current) {
            OtelNode::Span => return current,
            OtelNode::Spans(items)
            | OtelNode::ScopeSpans(items)
            | OtelNode::ResourceSpans(items)
            | OtelNode::List(items) => match items.first() {
                Some(next) => current = next,
                None => return value,
            },
            OtelNode::Unknown => return value,
        }
    }
}

/// Collect every leaf span in the tree, across all wrappers.
pub fn flatten_spans(value: &JsonValue) -> Vec<&JsonValue> {
    let mut out = Vec::new();
    collect(value, &mut out);
    out
}

fn collect<'a>(value: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
    match OtelNode::classify(value) {
        OtelNode::Span => out.push(value),
        OtelNode::Spans(items)
        | OtelNode::ScopeSpans(items)
        | OtelNode::ResourceSpans(items)
        | OtelNode::List(items) => {
            for item in items {
                collect(item, out);
            }
        }
        OtelNode::Unknown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn span(name: &str) -> JsonValue {
        json!({"name": name, "attributes": []})
    }

    #[test]
    fn test_classify() {
        assert!(matches!(OtelNode::classify(&span("a")), OtelNode::Span));
        assert!(matches!(
            OtelNode::classify(&json!({"spans": []})),
            OtelNode::Spans(_)
        ));
        assert!(matches!(
            OtelNode::classify(&json!({"scopeSpans": []})),
            OtelNode::ScopeSpans(_)
        ));
        assert!(matches!(
            OtelNode::classify(&json!({"resourceSpans": []})),
            OtelNode::ResourceSpans(_)
        ));
        assert!(matches!(OtelNode::classify(&json!(1)), OtelNode::Unknown));
        assert!(matches!(
            OtelNode::classify(&json!({"attributes": "nope"})),
            OtelNode::Unknown
        ));
    }

    #[test]
    fn test_dig_for_span_full_request() {
        let req = json!({
            "resourceSpans": [{
                "scopeSpans": [{"spans": [span("first"), span("second")]}]
            }]
        });
        assert_eq!(dig_for_span(&req), &span("first"));
    }

    #[test]
    fn test_dig_for_span_bare_span() {
        let s = span("bare");
        assert_eq!(dig_for_span(&s), &s);
    }

    #[test]
    fn test_dig_for_span_falls_back_to_original() {
        let empty = json!({"resourceSpans": [{"scopeSpans": []}]});
        assert_eq!(dig_for_span(&empty), &empty);

        let unknown = json!({"hello": "world"});
        assert_eq!(dig_for_span(&unknown), &unknown);
    }

    #[test]
    fn test_flatten_spans_visits_every_branch() {
        let req = json!({
            "resourceSpans": [
                {"scopeSpans": [
                    {"spans": [span("a"), span("b")]},
                    {"spans": [span("c")]}
                ]},
                {"scopeSpans": [{"spans": [span("d")]}]}
            ]
        });
        let names: Vec<&str> = flatten_spans(&req)
            .into_iter()
            .filter_map(|s| s.get("name").and_then(JsonValue::as_str))
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_flatten_spans_empty_for_unknown() {
        assert!(flatten_spans(&json!({"foo": 1})).is_empty());
    }
}
