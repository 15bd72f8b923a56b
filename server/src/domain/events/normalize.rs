//! Raw payload to canonical event

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};

use super::usage::complete_token_usage;
use super::{ErrorInfo, Event, EventError, EventType};
use crate::domain::identity::ensure_uuid_value;
use crate::utils::json::{camelize_keys, non_null};
use crate::utils::time::parse_timestamp_value;

/// Prefix leaked into model names by Vertex/Gemini clients.
const MODELS_PREFIX: &str = "models/";

/// Convert an arbitrary incoming payload into a canonical [`Event`].
///
/// Keys are camelCased before any field is read. A payload delivered as a JSON
/// string is decoded first. Run identifiers go through identity resolution and
/// the timestamp is parsed strictly: a present but unparseable timestamp is an
/// error, an absent one defaults to now.
pub fn normalize(raw: JsonValue) -> Result<Event, EventError> {
    let raw = match raw {
        JsonValue::String(s) => {
            serde_json::from_str::<JsonValue>(&s).map_err(|_| EventError::NotAnObject)?
        }
        other => other,
    };

    let JsonValue::Object(mut map) = camelize_keys(raw) else {
        return Err(EventError::NotAnObject);
    };

    let kind = match map.remove("type") {
        Some(JsonValue::String(s)) => EventType::parse(&s)?,
        Some(JsonValue::Null) | None => return Err(EventError::MissingType),
        Some(other) => return Err(EventError::UnknownType(other.to_string())),
    };

    let timestamp = match non_null(map.remove("timestamp")) {
        Some(value) => parse_timestamp_value(&value)
            .ok_or_else(|| EventError::InvalidTimestamp(display_value(&value)))?,
        None => Utc::now(),
    };

    let tokens_usage = complete_token_usage(&map);
    map.remove("tokensUsage");

    let mut event = Event::new(kind, timestamp);
    event.run_id = ensure_uuid_value(map.remove("runId").as_ref());
    event.parent_run_id = ensure_uuid_value(map.remove("parentRunId").as_ref());
    event.name = map.remove("name").and_then(normalize_name);
    event.tags = map.remove("tags").and_then(normalize_tags);
    event.tokens_usage = tokens_usage;

    event.app = take_string(&mut map, "app");
    event.event = take_string(&mut map, "event");
    event.level = take_string(&mut map, "level");
    event.user_id = take_string(&mut map, "userId");

    event.input = non_null(map.remove("input"));
    event.output = non_null(map.remove("output"));
    event.message = non_null(map.remove("message"));
    event.extra = non_null(map.remove("extra"));
    event.metadata = non_null(map.remove("metadata"));
    event.feedback = non_null(map.remove("feedback"));
    event.error = map.remove("error").as_ref().and_then(ErrorInfo::from_value);

    event.rest = map;
    Ok(event)
}

fn normalize_name(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(match s.strip_prefix(MODELS_PREFIX) {
            Some(stripped) => stripped.to_string(),
            None => s,
        }),
        _ => None,
    }
}

fn normalize_tags(value: JsonValue) -> Option<Vec<String>> {
    match value {
        JsonValue::String(s) => Some(vec![s]),
        JsonValue::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    JsonValue::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn take_string(map: &mut Map<String, JsonValue>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(JsonValue::String(s)) => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
