//! Tool calls written as text
//!
//! Some local models emit tool calls as XML-ish text instead of native
//! tool-call blocks:
//!
//! ```text
//! <function=search_transactions>
//! <parameter=query>coffee</parameter>
//! <parameter=limit>10</parameter>
//! </function>
//! ```
//!
//! These helpers extract such calls so the agent can run them.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

/// A tool call recovered from text output
#[derive(Debug, Clone, PartialEq)]
pub struct TextToolCall {
    pub name: String,
    pub input: Value,
}

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<function=([^>]+)>(.*?)</function>").expect("valid regex"))
}

fn parameter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<parameter=([^>]+)>(.*?)</parameter>").expect("valid regex")
    })
}

fn artifact_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</?\s*tool_?call\s*>").expect("valid regex"))
}

/// Extract every `<function=...>` call in `text`
pub fn parse_text_tool_calls(text: &str) -> Vec<TextToolCall> {
    function_regex()
        .captures_iter(text)
        .map(|func| {
            let mut params = Map::new();
            for param in parameter_regex().captures_iter(&func[2]) {
                params.insert(param[1].trim().to_string(), parameter_value(param[2].trim()));
            }
            TextToolCall {
                name: func[1].trim().to_string(),
                input: Value::Object(params),
            }
        })
        .collect()
}

/// Text with tool calls and stray `<tool_call>` tags removed
pub fn strip_text_tool_calls(text: &str) -> String {
    let without_calls = function_regex().replace_all(text, "");
    artifact_regex()
        .replace_all(&without_calls, "")
        .trim()
        .to_string()
}

/// Numbers and booleans keep their JSON type, JSON arrays/objects are
/// decoded, anything else is a string
fn parameter_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_call() {
        let text = "Let me check.\n<function=search_transactions>\n<parameter=query>coffee</parameter>\n<parameter=limit>10</parameter>\n</function>";
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_transactions");
        assert_eq!(calls[0].input, json!({"query": "coffee", "limit": 10}));
    }

    #[test]
    fn test_parse_multiple_calls_and_types() {
        let text = "<function=monthly_trend><parameter=months>3</parameter></function>\
                    <function=spending_by_category><parameter=period>last-month</parameter>\
                    <parameter=income>false</parameter><parameter=min>2.5</parameter></function>";
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].input, json!({"months": 3}));
        assert_eq!(
            calls[1].input,
            json!({"period": "last-month", "income": false, "min": 2.5})
        );
    }

    #[test]
    fn test_parse_json_parameter() {
        let calls = parse_text_tool_calls(
            r#"<function=search_transactions><parameter=categories>["FOOD_DINING"]</parameter></function>"#,
        );
        assert_eq!(calls[0].input, json!({"categories": ["FOOD_DINING"]}));
    }

    #[test]
    fn test_no_calls() {
        assert!(parse_text_tool_calls("You spent 42 EUR on coffee.").is_empty());
    }

    #[test]
    fn test_strip_calls() {
        let text = "Checking your data.\n<tool_call>\n<function=account_summary>\n</function>\n</tool_call>";
        assert_eq!(strip_text_tool_calls(text), "Checking your data.");
    }
}
