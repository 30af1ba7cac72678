//! Action input normalization.
//!
//! Models send `Action Input` either as bare text (`2+2`) or as a small JSON
//! object matching the tool's schema (`{"expression": "2+2"}`). Both forms
//! resolve to the same argument string.

use serde_json::Value;

/// Extract the named argument, falling back to the whole input as text.
pub fn argument(input: &str, key: &str) -> String {
    let trimmed = input.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
            None => map
                .values()
                .find_map(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
        Ok(Value::String(s)) => s.trim().to_string(),
        _ => strip_quotes(trimmed).to_string(),
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner.trim();
        }
    }
    s
}
