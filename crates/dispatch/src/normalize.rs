//! Reply normalization: turn whatever the relay returned into display text.

use serde_json::Value;

/// Maximum nesting depth the generic walk descends into.
const MAX_WALK_DEPTH: usize = 64;

/// A relay reply before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// The body was not JSON.
    Text(String),
    Structured(Value),
}

/// Extract the reply text, trying the known response shapes first.
///
/// Returns `None` only for a JSON `null` body.
pub fn extract_reply_text(raw: &RawReply) -> Option<String> {
    let value = match raw {
        RawReply::Text(text) => return Some(text.clone()),
        RawReply::Structured(Value::Null) => return None,
        RawReply::Structured(value) => value,
    };

    from_candidates(value)
        .or_else(|| from_output(value))
        .or_else(|| find_text_field(value))
        .or_else(|| Some(value.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Known shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{"candidates": [{"content": {"parts": [{"text": ..}]}}]}`
fn from_candidates(value: &Value) -> Option<String> {
    let candidates: Vec<&Value> = object_entries(value.get("candidates")?).collect();
    let first = candidates.first()?;

    if let Some(text) = candidate_text(first) {
        return Some(text.to_owned());
    }

    if candidates.len() > 1 {
        let merged: Vec<&str> = candidates
            .iter()
            .flat_map(|c| candidate_fragments(*c))
            .collect();
        if !merged.is_empty() {
            return Some(merged.join("\n\n"));
        }
    }
    None
}

fn candidate_text(candidate: &Value) -> Option<&str> {
    let content = candidate.get("content");
    content
        .and_then(|c| c.get("parts"))
        .and_then(|parts| object_entries(parts).next())
        .and_then(|part| non_empty_str(part.get("text")))
        .or_else(|| content.and_then(|c| non_empty_str(c.get("text"))))
        .or_else(|| non_empty_str(candidate.get("text")))
}

/// Every text fragment a candidate carries, in order.
fn candidate_fragments(candidate: &Value) -> Vec<&str> {
    let content = candidate.get("content");
    let mut fragments: Vec<&str> = content
        .and_then(|c| c.get("parts"))
        .map(|parts| {
            object_entries(parts)
                .filter_map(|part| non_empty_str(part.get("text")))
                .collect()
        })
        .unwrap_or_default();

    if fragments.is_empty() {
        if let Some(text) = content
            .and_then(|c| non_empty_str(c.get("text")))
            .or_else(|| non_empty_str(candidate.get("text")))
        {
            fragments.push(text);
        }
    }
    fragments
}

/// `{"output": [{"content": ".."}]}` or `{"output": [{"content": [{"text": ..}]}]}`
fn from_output(value: &Value) -> Option<String> {
    let first = object_entries(value.get("output")?).next()?;
    let content = first.get("content")?;
    non_empty_str(Some(content))
        .or_else(|| non_empty_str(content.get(0).and_then(|c| c.get("text"))))
        .map(str::to_owned)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generic walk
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Depth-first search for the first non-empty `text` or `content` string.
///
/// Breadth within an object comes first: a `text`/`content` string on an
/// object wins over one inside any of its children, even a child listed
/// earlier.  Children are then searched in field (insertion) order.  Uses an
/// explicit stack, so deeply nested input costs heap rather than call stack.
fn find_text_field(root: &Value) -> Option<String> {
    let mut stack: Vec<(&Value, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        let children: Vec<&Value> = match node {
            Value::Object(map) => {
                let hit = map
                    .iter()
                    .filter(|(key, _)| *key == "text" || *key == "content")
                    .find_map(|(_, v)| non_empty_str(Some(v)));
                if let Some(text) = hit {
                    return Some(text.to_owned());
                }
                map.values().collect()
            }
            Value::Array(items) => items.iter().collect(),
            _ => continue,
        };

        if depth >= MAX_WALK_DEPTH {
            continue;
        }
        // Reversed so the first child is popped first.
        stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|v| v.is_object() || v.is_array())
                .map(|v| (v, depth + 1)),
        );
    }
    None
}

fn object_entries(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter(|v| v.is_object())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(value: Value) -> Option<String> {
        extract_reply_text(&RawReply::Structured(value))
    }

    #[test]
    fn plain_text_passes_through() {
        let raw = RawReply::Text("  raw body ".into());
        assert_eq!(extract_reply_text(&raw).as_deref(), Some("  raw body "));
    }

    #[test]
    fn null_yields_none() {
        assert_eq!(extract(Value::Null), None);
    }

    #[test]
    fn candidates_parts_text() {
        let body = json!({"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]});
        assert_eq!(extract(body).as_deref(), Some("Hi"));
    }

    #[test]
    fn output_content_array() {
        let body = json!({"output":[{"content":[{"text":"Hello"}]}]});
        assert_eq!(extract(body).as_deref(), Some("Hello"));
    }

    #[test]
    fn output_content_string() {
        let body = json!({"output":[{"content":"Hello there"}]});
        assert_eq!(extract(body).as_deref(), Some("Hello there"));
    }

    #[test]
    fn candidate_fallbacks_in_order() {
        let content_text = json!({"candidates":[{"content":{"text":"from content"},"text":"own"}]});
        assert_eq!(extract(content_text).as_deref(), Some("from content"));

        let own_text = json!({"candidates":[{"content":{},"text":"own"}]});
        assert_eq!(extract(own_text).as_deref(), Some("own"));
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let body = json!({"candidates":["junk", 3, {"content":{"parts":[null, {"text":"real"}]}}]});
        assert_eq!(extract(body).as_deref(), Some("real"));
    }

    #[test]
    fn multiple_candidates_merge_when_first_is_empty() {
        let body = json!({"candidates":[
            {"finishReason":"SAFETY"},
            {"content":{"parts":[{"text":"one"},{"text":"two"}]}},
            {"text":"three"}
        ]});
        assert_eq!(extract(body).as_deref(), Some("one\n\ntwo\n\nthree"));
    }

    #[test]
    fn generic_walk_prefers_own_fields_before_children() {
        let body = json!({
            "data": {"nested": {"text": "deep"}},
            "meta": {"content": "shallow-ish"},
            "text": ""
        });
        // Root has only an empty `text`; children are visited in field order.
        assert_eq!(extract(body).as_deref(), Some("deep"));

        let own_first = json!({"child": {"text": "child"}, "content": "own"});
        assert_eq!(extract(own_first).as_deref(), Some("own"));
    }

    #[test]
    fn walk_visits_array_elements_in_order() {
        let body = json!({"items":[{"x":1},{"text":"first"},{"text":"second"}]});
        assert_eq!(extract(body).as_deref(), Some("first"));
    }

    #[test]
    fn unknown_shape_dumps_json() {
        let body = json!({"status":"ok","n":3});
        assert_eq!(extract(body).as_deref(), Some(r#"{"status":"ok","n":3}"#));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut body = json!({"text": "buried"});
        for _ in 0..200 {
            body = json!([body]);
        }
        let out = extract(body).unwrap();
        // Too deep for the walk, so it falls back to the dump.
        assert!(out.starts_with("[[["));
    }
}
