//! Redaction and truncation of captured audit data.
//!
//! Walks a `serde_json::Value` tree once, masking sensitive fields and
//! bounding string lengths and collection sizes. The same pass is applied to
//! captured arguments and results before a record is persisted, so nothing
//! sensitive or unbounded ever reaches the sink.

use serde_json::Value;

/// Replacement written over sensitive values.
pub const MASK: &str = "******";

/// Case-insensitive markers; any object key containing one is masked.
/// Covers the concrete sensitive keys seen in practice (`oldPassword`,
/// `accessToken`, `appSecret`, ...) without enumerating them.
const SENSITIVE_MARKERS: [&str; 3] = ["password", "token", "secret"];

/// Bounds applied during sanitization, set per audited operation.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeLimits {
    /// Strings longer than this are cut, with a marker noting the original
    /// length.
    pub max_field_length: usize,
    /// Arrays longer than this are cut, with a marker noting the original
    /// element count.
    pub max_collection_size: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            max_field_length: 500,
            max_collection_size: 10,
        }
    }
}

/// True when `key` names a value that must never be logged in the clear.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Redact and truncate `value` recursively.
///
/// Masking happens before recursion, so a sensitive key's entire subtree is
/// replaced rather than partially serialized.
#[must_use]
pub fn sanitize(value: Value, limits: &SanitizeLimits) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_string(&s, limits.max_field_length)),
        Value::Array(items) => {
            let total = items.len();
            let mut kept: Vec<Value> = items
                .into_iter()
                .take(limits.max_collection_size)
                .map(|item| sanitize(item, limits))
                .collect();
            if total > limits.max_collection_size {
                kept.push(Value::String(format!("...(truncated, total {total} items)")));
            }
            Value::Array(kept)
        }
        Value::Object(map) => {
            let sanitized = map
                .into_iter()
                .map(|(key, item)| {
                    if is_sensitive_key(&key) {
                        (key, Value::String(MASK.to_string()))
                    } else {
                        (key, sanitize(item, limits))
                    }
                })
                .collect();
            Value::Object(sanitized)
        }
        other => other,
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let total = s.chars().count();
    if total <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len).collect();
    format!("{kept}...(truncated, total {total})")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn masks_password_fields_and_drops_the_secret() {
        let input = json!({"username": "alice", "password": "s3cr3t"});
        let out = sanitize(input, &SanitizeLimits::default());
        let rendered = out.to_string();
        assert!(rendered.contains(r#""password":"******""#));
        assert!(!rendered.contains("s3cr3t"));
        assert_eq!(out["username"], "alice");
    }

    #[test]
    fn masking_is_case_insensitive_and_substring_based() {
        let input = json!({
            "oldPassword": "a",
            "AccessToken": "b",
            "app_secret": "c",
            "tokenizer": "still masked, contains token",
        });
        let out = sanitize(input, &SanitizeLimits::default());
        for key in ["oldPassword", "AccessToken", "app_secret", "tokenizer"] {
            assert_eq!(out[key], MASK, "{key} should be masked");
        }
    }

    #[test]
    fn masks_recursively_through_nested_structures() {
        let input = json!({
            "profile": {"credentials": {"refreshToken": "abc"}},
            "history": [{"password": "x"}, {"note": "fine"}],
        });
        let out = sanitize(input, &SanitizeLimits::default());
        assert_eq!(out["profile"]["credentials"]["refreshToken"], MASK);
        assert_eq!(out["history"][0]["password"], MASK);
        assert_eq!(out["history"][1]["note"], "fine");
    }

    #[test]
    fn truncates_long_strings_with_original_length_marker() {
        let long = "x".repeat(600);
        let limits = SanitizeLimits {
            max_field_length: 10,
            max_collection_size: 10,
        };
        let out = sanitize(json!(long), &limits);
        let s = out.as_str().unwrap();
        assert!(s.starts_with(&"x".repeat(10)));
        assert!(!s.starts_with(&"x".repeat(11)));
        assert!(s.ends_with("...(truncated, total 600)"));
    }

    #[test]
    fn truncates_long_collections_with_original_count_marker() {
        let items: Vec<u32> = (0..20).collect();
        let limits = SanitizeLimits {
            max_field_length: 500,
            max_collection_size: 5,
        };
        let out = sanitize(json!(items), &limits);
        let arr = out.as_array().unwrap();
        assert_eq!(arr.len(), 6);
        assert_eq!(arr[4], 4);
        assert_eq!(arr[5], "...(truncated, total 20 items)");
    }

    #[test]
    fn scalars_and_short_values_pass_through() {
        let input = json!({"count": 3, "flag": true, "note": "ok", "nothing": null});
        let out = sanitize(input.clone(), &SanitizeLimits::default());
        assert_eq!(out, input);
    }
}
