//! Tool schema and result types

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Outcome of executing one tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result with text output
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed result with no output
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Create a failed result that still carries captured output
    pub fn failed_with_output(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }

    /// Content of the tool-role message fed back to the model.
    ///
    /// The error is appended after a blank line so the model sees both the
    /// captured output and the reason it failed.
    pub fn to_message_content(&self) -> String {
        match &self.error {
            Some(error) => format!("{}\n\nError: {}", self.output, error),
            None => self.output.clone(),
        }
    }

    /// Human-readable rendering for hosts
    pub fn display_content(&self) -> String {
        match &self.error {
            Some(error) if self.output.is_empty() => format!("Error: {}", error),
            Some(_) => self.to_message_content(),
            None => self.output.clone(),
        }
    }
}

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    /// Array of strings
    Array,
}

/// One named parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// A parameter the model must always supply
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    /// A parameter the model may omit
    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Attach a documented default value
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Description of one callable tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str, parameters: Vec<ToolParameter>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Names of the parameters marked required, in declaration order
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Render the parameters as a JSON-Schema object for function calling
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(param.kind));
            prop.insert("description".to_string(), json!(param.description));
            if param.kind == ParamType::Array {
                prop.insert("items".to_string(), json!({ "type": "string" }));
            }
            if let Some(default) = &param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_parameters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_ok() {
        let result = ToolResult::ok("done");
        assert!(result.success);
        assert_eq!(result.output, "done");
        assert!(result.error.is_none());
        assert_eq!(result.to_message_content(), "done");
    }

    #[test]
    fn test_tool_result_error_content() {
        let result = ToolResult::error("boom");
        assert!(!result.success);
        assert_eq!(result.to_message_content(), "\n\nError: boom");
        assert_eq!(result.display_content(), "Error: boom");

        let result = ToolResult::failed_with_output("partial", "exit 1");
        assert_eq!(result.to_message_content(), "partial\n\nError: exit 1");
        assert_eq!(result.display_content(), "partial\n\nError: exit 1");
    }

    #[test]
    fn test_tool_result_serialization_skips_missing_error() {
        let json = serde_json::to_string(&ToolResult::ok("x")).unwrap();
        assert_eq!(json, r#"{"success":true,"output":"x"}"#);
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = ToolSchema::new(
            "write_file",
            "Write content to a file.",
            vec![
                ToolParameter::required("path", ParamType::String, "Path"),
                ToolParameter::required("content", ParamType::String, "Content"),
                ToolParameter::optional("append", ParamType::Boolean, "Append")
                    .with_default(json!(false)),
            ],
        );

        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["path", "content"]));
        assert_eq!(rendered["properties"]["append"]["type"], "boolean");
        assert_eq!(rendered["properties"]["append"]["default"], false);
        assert!(rendered["properties"]["path"].get("default").is_none());
    }

    #[test]
    fn test_array_parameter_has_items() {
        let schema = ToolSchema::new(
            "task_complete",
            "Finish.",
            vec![ToolParameter::optional("files_modified", ParamType::Array, "Files")],
        );
        let rendered = schema.to_json_schema();
        assert_eq!(
            rendered["properties"]["files_modified"]["items"],
            json!({ "type": "string" })
        );
        assert_eq!(rendered["required"], json!([]));
    }
}
