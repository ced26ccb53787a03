use serde_json::Value;

use super::format_scalar;

/// Fields that answer "what did this command conclude", most specific first.
const PRIORITY_KEYS: [&str; 8] = [
    "effective_level",
    "final_risk_level",
    "risk_level",
    "adjusted_score",
    "valid",
    "newly_expired",
    "downgraded",
    "alerts",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_answer(value));
}

fn minimal_answer(value: &Value) -> String {
    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match body {
        Value::Object(map) => {
            for key in PRIORITY_KEYS {
                if let Some(val) = find_key(map, key) {
                    return match val {
                        Value::Array(items) => items.len().to_string(),
                        other => format_scalar(other),
                    };
                }
            }
            map.iter()
                .next()
                .map(|(k, v)| format!("{}: {}", k, format_scalar(v)))
                .unwrap_or_default()
        }
        // lists print their length
        Value::Array(items) => items.len().to_string(),
        other => format_scalar(other),
    }
}

/// Look one level into nested objects, so `result.risk_level` of an
/// evaluation record is found.
fn find_key<'a>(map: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(key).filter(|v| !v.is_null()) {
        return Some(v);
    }
    map.values()
        .filter_map(Value::as_object)
        .find_map(|inner| inner.get(key).filter(|v| !v.is_null()))
}
