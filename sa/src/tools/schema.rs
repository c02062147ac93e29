//! Declarative tool schemas shared by the registry, dispatcher and model clients

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::ToolError;

/// Type of a tool parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParameterType {
    String,
    Array(Box<ParameterType>),
}

impl ParameterType {
    /// JSON Schema type name
    pub fn json_name(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Array(_) => "array",
        }
    }

    /// Check a JSON value against this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Array(items) => value
                .as_array()
                .is_some_and(|values| values.iter().all(|v| items.matches(v))),
        }
    }

    fn to_json_schema(&self, description: &str) -> Value {
        let mut schema = json!({
            "type": self.json_name(),
            "description": description,
        });
        if let ParameterType::Array(items) = self {
            schema["items"] = json!({ "type": items.json_name() });
        }
        schema
    }
}

/// A single named parameter of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub description: String,
}

impl ToolParameter {
    /// A parameter the model must always supply
    pub fn required(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    /// A parameter the model may omit
    pub fn optional(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        }
    }
}

/// Name, description and ordered parameters of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    /// Create a schema with no parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter (order is preserved)
    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON Schema object describing the parameters
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.param_type.to_json_schema(&param.description));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    /// Check model-supplied arguments against this schema
    ///
    /// Unknown keys are ignored; a missing required parameter or a value of
    /// the wrong type is rejected. `null` counts as absent.
    pub fn validate(&self, input: &Value) -> Result<(), ToolError> {
        debug!(tool = %self.name, "ToolSchema::validate: called");
        let empty = Map::new();
        let args = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::InvalidArgument(format!(
                    "arguments must be an object, got {}",
                    other
                )));
            }
        };

        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    debug!(param = %param.name, "ToolSchema::validate: missing required parameter");
                    return Err(ToolError::InvalidArgument(format!("{} is required", param.name)));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.matches(value) => {
                    debug!(param = %param.name, "ToolSchema::validate: wrong type");
                    return Err(ToolError::InvalidArgument(format!(
                        "{} must be of type {}",
                        param.name,
                        param.param_type.json_name()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
