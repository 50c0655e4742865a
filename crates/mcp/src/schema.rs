//! Argument checks against a tool's declared input schema.
//!
//! Only the parts of JSON Schema that tool declarations actually use are
//! checked: object shape, `required`, primitive property `type`s and
//! `additionalProperties: false`. Anything else is accepted and left to the
//! host.

use serde_json::{Map, Value};

/// Validate `arguments` against `schema`.
///
/// Returns a human-readable description of the first violation.
pub fn validate(schema: &Value, arguments: &Map<String, Value>) -> Result<(), String> {
    if let Some(kind) = schema.get("type")
        && !type_allows(kind, "object")
    {
        return Ok(());
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(name) {
                return Err(format!("missing required argument `{name}`"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (name, value) in arguments {
        match properties.and_then(|p| p.get(name)) {
            Some(property) => {
                if let Some(kind) = property.get("type")
                    && !type_allows(kind, type_name(value))
                    && !(type_allows(kind, "number") && value.is_number())
                {
                    return Err(format!(
                        "argument `{name}` must be {}, got {}",
                        describe(kind),
                        type_name(value)
                    ));
                }
            }
            None if closed => return Err(format!("unexpected argument `{name}`")),
            None => {}
        }
    }

    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `type` may be a single name or a list of names.
fn type_allows(kind: &Value, name: &str) -> bool {
    match kind {
        Value::String(s) => s == name,
        Value::Array(kinds) => kinds.iter().any(|k| k.as_str() == Some(name)),
        _ => true,
    }
}

fn describe(kind: &Value) -> String {
    match kind {
        Value::String(s) => s.clone(),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binary_schema() -> Value {
        json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            }
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_matching_arguments() {
        assert!(validate(&binary_schema(), &args(json!({"a": 5, "b": 3}))).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate(&binary_schema(), &args(json!({"a": 5}))).unwrap_err();
        assert!(err.contains("`b`"));
    }

    #[test]
    fn rejects_wrong_type() {
        let err = validate(&binary_schema(), &args(json!({"a": "five", "b": 3}))).unwrap_err();
        assert_eq!(err, "argument `a` must be integer, got string");
    }

    #[test]
    fn integer_is_a_number() {
        let schema = json!({"type": "object", "properties": {"x": {"type": "number"}}});
        assert!(validate(&schema, &args(json!({"x": 2}))).is_ok());
        assert!(validate(&schema, &args(json!({"x": 2.5}))).is_ok());
    }

    #[test]
    fn fraction_is_not_an_integer() {
        assert!(validate(&binary_schema(), &args(json!({"a": 2.5, "b": 1}))).is_err());
    }

    #[test]
    fn nullable_union_types() {
        let schema = json!({"type": "object", "properties": {"x": {"type": ["integer", "null"]}}});
        assert!(validate(&schema, &args(json!({"x": null}))).is_ok());
        assert!(validate(&schema, &args(json!({"x": true}))).is_err());
    }

    #[test]
    fn closed_objects_reject_extras() {
        let mut schema = binary_schema();
        schema["additionalProperties"] = json!(false);
        let err = validate(&schema, &args(json!({"a": 1, "b": 2, "c": 3}))).unwrap_err();
        assert!(err.contains("`c`"));
        assert!(validate(&binary_schema(), &args(json!({"a": 1, "b": 2, "c": 3}))).is_ok());
    }
}
