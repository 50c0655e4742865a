//! Calculator tool host: integer `add` and `multiply` served over MCP.

use std::sync::Arc;

use mcp::{Host, ToolRegistry, TypedTool};
use schemars::JsonSchema;
use serde::Deserialize;

/// Name reported in the handshake.
pub const SERVER_NAME: &str = "Calculator";

/// Operands of a binary operation.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Operands {
    /// Left operand
    pub a: i64,
    /// Right operand
    pub b: i64,
}

pub fn add(Operands { a, b }: Operands) -> Result<i64, String> {
    a.checked_add(b)
        .ok_or_else(|| format!("integer overflow computing {a} + {b}"))
}

pub fn multiply(Operands { a, b }: Operands) -> Result<i64, String> {
    a.checked_mul(b)
        .ok_or_else(|| format!("integer overflow computing {a} * {b}"))
}

/// The calculator's tools, in advertised order.
pub fn registry() -> mcp::Result<ToolRegistry> {
    Ok(ToolRegistry::builder()
        .register(TypedTool::new("add", "Add two numbers together", add))?
        .register(TypedTool::new(
            "multiply",
            "Multiply two numbers together",
            multiply,
        ))?
        .build())
}

/// A ready-to-serve calculator host.
pub fn host() -> mcp::Result<Arc<Host>> {
    Ok(Arc::new(Host::new(SERVER_NAME, registry()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arithmetic() {
        assert_eq!(add(Operands { a: 5, b: 3 }), Ok(8));
        assert_eq!(multiply(Operands { a: 8, b: 8 }), Ok(64));
        assert_eq!(add(Operands { a: -2, b: 2 }), Ok(0));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(add(Operands { a: i64::MAX, b: 1 }).is_err());
        assert!(multiply(Operands { a: i64::MIN, b: -1 }).is_err());
    }

    #[test]
    fn advertises_both_tools_in_order() {
        let tools = registry().unwrap().list();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["add", "multiply"]);
        assert_eq!(tools[0].input_schema["required"], json!(["a", "b"]));
        assert_eq!(tools[1].input_schema["properties"]["b"]["type"], "integer");
    }
}
