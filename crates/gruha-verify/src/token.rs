//! Token extraction from heterogeneous success payloads.
//!
//! The provider returns the verification token under different field names
//! depending on path and SDK version, and sometimes as a JSON-encoded
//! string that needs a second parse. Extraction never errors: a success
//! signal with no extractable token still counts as verified upstream.

use crate::config::TokenRules;
use serde_json::Value;
use tracing::warn;

/// Search `payload` for a verification token using the configured field
/// priority order. Returns `None` when nothing plausible is found.
pub fn extract(payload: &Value, rules: &TokenRules) -> Option<String> {
    let found = search(payload, rules, 0);
    if found.is_none() {
        warn!(payload = %payload, "success payload carried no extractable token");
    }
    found
}

fn search(payload: &Value, rules: &TokenRules, depth: u8) -> Option<String> {
    // A bare string payload is treated like the free-text fallback field.
    if let Value::String(s) = payload {
        return from_text(s, rules, depth);
    }
    let obj = payload.as_object()?;

    for (i, field) in rules.fields.iter().enumerate() {
        let Some(value) = obj.get(field) else { continue };
        let is_fallback_field = i + 1 == rules.fields.len();
        match value {
            Value::String(s) if is_fallback_field => {
                if let Some(token) = from_text(s, rules, depth) {
                    return Some(token);
                }
            }
            Value::String(s) if !s.is_empty() => {
                // A named token field may itself hold a JSON-encoded object.
                if looks_like_json(s) {
                    if let Some(token) = reparse(s, rules, depth) {
                        return Some(token);
                    }
                }
                return Some(s.clone());
            }
            _ => {}
        }
    }
    None
}

/// The generic free-text field: re-parse if it is JSON, otherwise accept
/// the raw string only inside the configured length bounds (keeps "OK"
/// banners and HTML error pages from masquerading as tokens).
fn from_text(s: &str, rules: &TokenRules, depth: u8) -> Option<String> {
    if looks_like_json(s) {
        if let Some(token) = reparse(s, rules, depth) {
            return Some(token);
        }
    }
    let len = s.len();
    (len >= rules.fallback_min_len && len <= rules.fallback_max_len).then(|| s.to_string())
}

/// One level of nested-JSON recursion, no more.
fn reparse(s: &str, rules: &TokenRules, depth: u8) -> Option<String> {
    if depth >= 1 {
        return None;
    }
    let inner: Value = serde_json::from_str(s).ok()?;
    search(&inner, rules, depth + 1)
}

fn looks_like_json(s: &str) -> bool {
    matches!(s.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> TokenRules {
        TokenRules::default()
    }

    #[test]
    fn token_field_wins_over_message() {
        let payload = json!({"message": "a-long-enough-message-string", "token": "abc123"});
        assert_eq!(extract(&payload, &rules()).as_deref(), Some("abc123"));
    }

    #[test]
    fn alias_fields_are_searched_in_order() {
        let payload = json!({"verificationToken": "vt-1", "authToken": "at-1"});
        assert_eq!(extract(&payload, &rules()).as_deref(), Some("vt-1"));
    }

    #[test]
    fn nested_json_string_is_reparsed_once() {
        let payload = json!({"message": r#"{"token": "nested-token"}"#});
        assert_eq!(extract(&payload, &rules()).as_deref(), Some("nested-token"));
    }

    #[test]
    fn message_fallback_respects_length_bounds() {
        let payload = json!({"message": "OK"});
        assert_eq!(extract(&payload, &rules()), None);

        let plausible = "eyJhbGciOiJIUzI1NiJ9.payload.signature";
        let payload = json!({"message": plausible});
        assert_eq!(extract(&payload, &rules()).as_deref(), Some(plausible));
    }

    #[test]
    fn oversized_message_is_not_a_token() {
        let huge = "x".repeat(5000);
        let payload = json!({"message": huge});
        assert_eq!(extract(&payload, &rules()), None);
    }

    #[test]
    fn empty_and_non_string_fields_are_skipped() {
        let payload = json!({"token": 42, "verificationToken": "", "authToken": "fallback-ok"});
        assert_eq!(extract(&payload, &rules()).as_deref(), Some("fallback-ok"));
    }

    #[test]
    fn absent_token_yields_none_without_error() {
        assert_eq!(extract(&json!({"status": "sent"}), &rules()), None);
        assert_eq!(extract(&Value::Null, &rules()), None);
    }

    #[test]
    fn bare_string_payload_uses_fallback_rules() {
        let tok = "a-perfectly-plausible-token-string";
        assert_eq!(
            extract(&Value::String(tok.into()), &rules()).as_deref(),
            Some(tok)
        );
    }
}
