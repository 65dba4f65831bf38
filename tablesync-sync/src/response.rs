//! Interpretation of remote query responses.
//!
//! The query endpoint has answered in several envelopes over time. Each
//! known envelope maps to [`QueryPage::Rows`]; anything else is
//! [`QueryPage::Unrecognized`] so callers can tell "no rows" apart from
//! "could not read".

use serde_json::{Map, Value};

/// Keys under which an envelope may wrap its containers.
const ENVELOPE_KEYS: &[&str] = &["data", "result", "tables", "Results", "response"];

/// Keys under which a container may hold its rows.
const ROW_KEYS: &[&str] = &["rows", "data", "items", "records"];

/// One page of a query response.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPage {
    Rows {
        rows: Vec<Map<String, Value>>,
        /// Continuation token for the next page.
        next: Option<String>,
    },
    Unrecognized(String),
}

/// Classifies a decoded query response.
#[must_use]
pub fn parse_query_response(body: &Value) -> QueryPage {
    parse_level(body, true)
}

fn parse_level(body: &Value, allow_envelope: bool) -> QueryPage {
    match body {
        Value::Array(items) if items.is_empty() => QueryPage::Rows {
            rows: Vec::new(),
            next: None,
        },
        Value::Array(items) => {
            if let Some(container) = items
                .iter()
                .filter_map(Value::as_object)
                .find(|obj| row_list(obj).is_some())
            {
                return from_container(container);
            }
            match objects(items) {
                Some(rows) => QueryPage::Rows { rows, next: None },
                None => QueryPage::Unrecognized("array of non-object rows".into()),
            }
        }
        Value::Object(obj) => {
            if row_list(obj).is_some_and(|items| !holds_containers(items)) {
                return from_container(obj);
            }
            if allow_envelope {
                if let Some(inner) = ENVELOPE_KEYS.iter().find_map(|k| obj.get(*k)) {
                    return parse_level(inner, false);
                }
            }
            let keys: Vec<&str> = obj.keys().map(String::as_str).take(8).collect();
            QueryPage::Unrecognized(format!("object with keys [{}]", keys.join(", ")))
        }
        Value::Null => QueryPage::Unrecognized("empty body".into()),
        other => QueryPage::Unrecognized(format!("unexpected {}", kind(other))),
    }
}

fn row_list(container: &Map<String, Value>) -> Option<&Vec<Value>> {
    ROW_KEYS
        .iter()
        .find_map(|k| container.get(*k).and_then(Value::as_array))
}

fn holds_containers(items: &[Value]) -> bool {
    items
        .first()
        .and_then(Value::as_object)
        .is_some_and(|first| row_list(first).is_some())
}

fn from_container(container: &Map<String, Value>) -> QueryPage {
    let Some(items) = row_list(container) else {
        return QueryPage::Unrecognized("container without rows".into());
    };
    let next = container
        .get("next")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    match objects(items) {
        Some(rows) => QueryPage::Rows { rows, next },
        None => QueryPage::Unrecognized("container with non-object rows".into()),
    }
}

fn objects(items: &[Value]) -> Option<Vec<Map<String, Value>>> {
    items.iter().map(|v| v.as_object().cloned()).collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
