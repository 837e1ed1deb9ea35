//! Structured single-line request logging for the MCP stdio loop.
//!
//! Adapted from an axum request-logging middleware: same truncation and
//! secret-redaction rules, reimplemented as a plain function called directly
//! from the stdio dispatch loop instead of HTTP middleware, since there is
//! no HTTP layer left to hang middleware off of.

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

const MAX_PARAM_LENGTH: usize = 30;
const TRUNCATION_SUFFIX: &str = "...";

/// Logs one MCP tool call in the format:
/// `YYYY-MM-DD HH:MM:SS [functionName] [34 ms] param1="value", param2="long value..."`
pub fn log_mcp_call(method: &str, params: &Value, duration: Duration) {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
    let params_summary = format_params_summary(params);

    if params_summary.is_empty() {
        info!("{} [{}] [{} ms]", timestamp, method, duration.as_millis());
    } else {
        info!(
            "{} [{}] [{} ms] {}",
            timestamp,
            method,
            duration.as_millis(),
            params_summary
        );
    }
}

fn format_params_summary(params: &Value) -> String {
    match params {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, value)| {
                if is_sensitive_parameter(key) {
                    return Some(format!("{key}=\"[REDACTED]\""));
                }
                let formatted_value = format_parameter_value(value);
                if formatted_value.is_empty() {
                    None
                } else {
                    Some(format!("{key}=\"{formatted_value}\""))
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        _ => format_parameter_value(params),
    }
}

fn format_parameter_value(value: &Value) -> String {
    let value_str = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{...{} fields}}", obj.len()),
        Value::Null => "null".to_string(),
    };
    truncate_string(&value_str, MAX_PARAM_LENGTH)
}

fn truncate_string(input: &str, max_length: usize) -> String {
    if input.len() <= max_length {
        input.to_string()
    } else {
        let truncated_length = max_length.saturating_sub(TRUNCATION_SUFFIX.len());
        format!("{}{}", &input[..truncated_length], TRUNCATION_SUFFIX)
    }
}

fn is_sensitive_parameter(key: &str) -> bool {
    const SENSITIVE_KEYS: &[&str] = &[
        "password", "token", "secret", "key", "auth", "authorization",
        "credential", "api_key", "access_token", "refresh_token",
    ];
    let key_lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|&sensitive| key_lower.contains(sensitive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_string_adds_suffix_past_limit() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("this is a very long string", 10), "this is...");
        assert_eq!(truncate_string("exactly10c", 10), "exactly10c");
    }

    #[test]
    fn format_parameter_value_covers_json_types() {
        assert_eq!(format_parameter_value(&json!("test")), "test");
        assert_eq!(format_parameter_value(&json!(42)), "42");
        assert_eq!(format_parameter_value(&json!(true)), "true");
        assert_eq!(format_parameter_value(&json!(null)), "null");
        assert_eq!(format_parameter_value(&json!(["a", "b", "c"])), "[3 items]");
    }

    #[test]
    fn format_params_summary_truncates_long_values() {
        let params = json!({
            "code": "TASK-001",
            "name": "This is a very long task name that should be truncated",
            "count": 42,
            "enabled": true
        });

        let summary = format_params_summary(&params);
        assert!(summary.contains("code=\"TASK-001\""));
        assert!(summary.contains("name=\"This is a very long task na...\""));
        assert!(summary.contains("count=\"42\""));
        assert!(summary.contains("enabled=\"true\""));
    }

    #[test]
    fn sensitive_parameters_are_redacted() {
        let params = json!({
            "username": "user123",
            "password": "secret123",
            "api_key": "sensitive_key",
            "normal_field": "normal_value"
        });

        let summary = format_params_summary(&params);
        assert!(summary.contains("username=\"user123\""));
        assert!(summary.contains("password=\"[REDACTED]\""));
        assert!(summary.contains("api_key=\"[REDACTED]\""));
        assert!(summary.contains("normal_field=\"normal_value\""));
    }

    #[test]
    fn is_sensitive_parameter_matches_known_keys() {
        assert!(is_sensitive_parameter("password"));
        assert!(is_sensitive_parameter("api_key"));
        assert!(is_sensitive_parameter("access_token"));
        assert!(is_sensitive_parameter("AUTH_TOKEN"));
        assert!(!is_sensitive_parameter("username"));
        assert!(!is_sensitive_parameter("name"));
        assert!(!is_sensitive_parameter("description"));
    }
}
