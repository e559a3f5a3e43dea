//! Tool definitions handed to the model
//!
//! This module contains helpers for:
//! - Describing a structured output as a function tool
//! - Generating and cleaning JSON schemas for backend compatibility

use schemars::JsonSchema;
use serde::Serialize;

/// A tool definition in the OpenAI function format
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolFunction,
}

/// Function definition within a tool
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn parameters(&self) -> &serde_json::Value {
        &self.function.parameters
    }
}

/// How strongly the model is pushed toward a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Model must call the named function
    Function(String),
}

impl ToolChoice {
    /// OpenAI wire representation
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Self::Auto => serde_json::json!("auto"),
            Self::Function(name) => serde_json::json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }
}

/// Clean up a JSON schema for backend compatibility
/// Removes $schema, title, and other fields that confuse smaller models
pub fn clean_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(obj) => {
            let mut cleaned = serde_json::Map::new();
            for (key, value) in obj {
                if key == "$schema" || key == "title" || key == "additionalProperties" {
                    continue;
                }
                cleaned.insert(key.clone(), clean_schema(value));
            }
            serde_json::Value::Object(cleaned)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(clean_schema).collect())
        }
        other => other.clone(),
    }
}

/// Parameters schema for a record type, ready to embed in a [`ToolSpec`]
pub fn parameters_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    let mut value = clean_schema(&serde_json::to_value(&schema).unwrap_or_default());
    // Record docs live in the tool description, not the parameters
    if let serde_json::Value::Object(obj) = &mut value {
        obj.remove("description");
    }
    value
}
