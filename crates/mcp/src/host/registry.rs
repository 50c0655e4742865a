//! Static registry of tool handlers.

use std::collections::HashMap;
use std::marker::PhantomData;

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::protocol::Tool;

/// Why a handler could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    /// The arguments do not fit the declared input schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The operation itself failed.
    #[error("{0}")]
    Execution(String),
}

/// A named synchronous operation exposed by a host.
pub trait ToolHandler: Send + Sync {
    /// Name, description and input schema advertised to clients.
    fn descriptor(&self) -> &Tool;

    /// Run the operation.
    fn call(&self, arguments: Value) -> std::result::Result<Value, ToolFailure>;
}

/// A handler built from a plain function over a typed argument struct.
///
/// The input schema is generated from `A`, and incoming arguments are checked
/// by deserializing into `A`.
pub struct TypedTool<A, F> {
    descriptor: Tool,
    handler: F,
    _args: PhantomData<fn(A)>,
}

impl<A, F, R, E> TypedTool<A, F>
where
    A: DeserializeOwned + JsonSchema,
    F: Fn(A) -> std::result::Result<R, E> + Send + Sync,
    R: Serialize,
    E: std::fmt::Display,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            descriptor: Tool {
                name: name.into(),
                description: Some(description.into()),
                input_schema: input_schema::<A>(),
            },
            handler,
            _args: PhantomData,
        }
    }
}

impl<A, F, R, E> ToolHandler for TypedTool<A, F>
where
    A: DeserializeOwned + JsonSchema,
    F: Fn(A) -> std::result::Result<R, E> + Send + Sync,
    R: Serialize,
    E: std::fmt::Display,
{
    fn descriptor(&self) -> &Tool {
        &self.descriptor
    }

    fn call(&self, arguments: Value) -> std::result::Result<Value, ToolFailure> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let args: A = serde_json::from_value(arguments)
            .map_err(|e| ToolFailure::InvalidArguments(e.to_string()))?;
        let output = (self.handler)(args).map_err(|e| ToolFailure::Execution(e.to_string()))?;
        serde_json::to_value(output).map_err(|e| ToolFailure::Execution(e.to_string()))
    }
}

/// JSON Schema for `A`, without the `$schema` meta field.
fn input_schema<A: JsonSchema>() -> Value {
    let mut schema =
        serde_json::to_value(schemars::schema_for!(A)).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

/// The fixed set of tools a host serves. Immutable once built.
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects handlers before freezing them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    /// Add a handler. Names must be unique.
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Result<Self> {
        let name = handler.descriptor().name.clone();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Box::new(handler));
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct Pair {
        /// First operand
        a: i64,
        b: i64,
    }

    fn multiply() -> TypedTool<Pair, impl Fn(Pair) -> std::result::Result<i64, String>> {
        TypedTool::new("multiply", "Multiply two numbers together", |p: Pair| {
            p.a.checked_mul(p.b).ok_or_else(|| "integer overflow".to_string())
        })
    }

    #[test]
    fn generates_input_schema() {
        let tool = multiply();
        let schema = &tool.descriptor().input_schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["properties"]["a"]["description"], "First operand");
        assert_eq!(schema["required"], json!(["a", "b"]));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn calls_handler() {
        assert_eq!(multiply().call(json!({"a": 8, "b": 8})), Ok(json!(64)));
    }

    #[test]
    fn rejects_bad_arguments() {
        let err = multiply().call(json!({"a": "8"})).unwrap_err();
        assert!(matches!(err, ToolFailure::InvalidArguments(_)));
    }

    #[test]
    fn reports_execution_failure() {
        let err = multiply().call(json!({"a": i64::MAX, "b": 2})).unwrap_err();
        assert_eq!(err, ToolFailure::Execution("integer overflow".into()));
    }

    #[test]
    fn registry_keeps_order_and_rejects_duplicates() {
        let registry = ToolRegistry::builder()
            .register(multiply())
            .unwrap()
            .build();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].name, "multiply");
        assert!(registry.get("multiply").is_some());
        assert!(registry.get("add").is_none());

        let dup = ToolRegistry::builder()
            .register(multiply())
            .unwrap()
            .register(multiply());
        assert!(matches!(dup, Err(Error::DuplicateTool(name)) if name == "multiply"));
    }
}
