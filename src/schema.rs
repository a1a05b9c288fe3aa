//! Minimal JSON-schema checks applied to tool arguments.
//!
//! Covers the subset that function-calling schemas actually use: `type`,
//! `required`, `properties`, `enum`, `items` and `additionalProperties: false`.
//! Anything else in the schema is ignored.

use serde_json::Value;

/// Validates `args` against `schema`, returning a message naming the first
/// offending path.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    validate_at(schema, args, "$")
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if !schema.is_object() {
        return Ok(());
    }

    if let Some(expected) = schema.get("type") {
        let ok = match expected {
            Value::String(t) => type_matches(t, value),
            Value::Array(ts) => ts
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(t, value)),
            _ => true,
        };
        if !ok {
            return Err(format!(
                "{}: expected {}, got {}",
                path,
                expected,
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{}: {} is not one of {}", path, value, Value::Array(allowed.clone())));
        }
    }

    if let Value::Object(fields) = value {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    return Err(format!("{}: missing required field '{}'", path, name));
                }
            }
        }

        let props = schema.get("properties").and_then(Value::as_object);
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        for (name, field) in fields {
            match props.and_then(|p| p.get(name)) {
                Some(sub) => validate_at(sub, field, &format!("{}.{}", path, name))?,
                None if closed => {
                    return Err(format!("{}: unexpected field '{}'", path, name));
                }
                None => {}
            }
        }
    }

    if let (Value::Array(elems), Some(items)) = (value, schema.get("items")) {
        for (i, elem) in elems.iter().enumerate() {
            validate_at(items, elem, &format!("{}[{}]", path, i))?;
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
