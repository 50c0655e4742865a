use super::ToolError;
use serde_json::{Map, Value};

/// Arguments of a tool call, which must be a JSON object.
///
/// A missing (`null`) input is treated as no arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(pub Option<Map<String, Value>>);

impl ToolArguments {
    /// The arguments as a map, empty when none were given.
    pub fn as_map(&self) -> Map<String, Value> {
        self.0.clone().unwrap_or_default()
    }
}

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self(None)),
            Value::Object(map) => Ok(Self(Some(map))),
            other => Err(ToolError::InvalidArguments(format!(
                "arguments must be a JSON object, got {other}"
            ))),
        }
    }
}
