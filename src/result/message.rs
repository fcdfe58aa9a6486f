//! Rule violation messages

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One violated rule.
///
/// `template` may carry `{name}` placeholders filled from `params`, and
/// `{value}` filled from the offending value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable rule code (the validator id for built-ins)
    pub code: String,
    /// Message template
    pub template: String,
    /// The offending value (`null` when absent)
    #[serde(default)]
    pub value: Value,
    /// Template parameters
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Message {
    pub fn new(code: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            template: template.into(),
            value: Value::Null,
            params: Map::new(),
        }
    }

    pub fn with_value(mut self, value: Option<&Value>) -> Self {
        self.value = value.cloned().unwrap_or(Value::Null);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Template with placeholders substituted
    pub fn render(&self) -> String {
        let mut out = self.template.replace("{value}", &display(&self.value));
        for (name, value) in &self.params {
            out = out.replace(&format!("{{{}}}", name), &display(value));
        }
        out
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_params_and_value() {
        let message = Message::new("range", "{value} is outside {min}..{max}")
            .with_value(Some(&json!(16)))
            .with_param("min", 18)
            .with_param("max", 120);

        assert_eq!(message.render(), "16 is outside 18..120");
        assert_eq!(message.to_string(), "range: 16 is outside 18..120");
    }

    #[test]
    fn test_render_lists_and_strings() {
        let message = Message::new("enum", "'{value}' is not one of {values}")
            .with_value(Some(&json!("purple")))
            .with_param("values", json!(["red", "green"]));

        assert_eq!(message.render(), "'purple' is not one of red, green");
    }

    #[test]
    fn test_absent_value_serializes_as_null() {
        let message = Message::new("required", "A value is required").with_value(None);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["value"], Value::Null);
        assert!(json.get("params").is_none());
    }
}
