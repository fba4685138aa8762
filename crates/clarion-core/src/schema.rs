//! Output contract validation
//!
//! Supports the JSON-schema subset used in step and final-output contracts:
//! type / const / enum / required / properties / additionalProperties /
//! items. Scalar values are coerced toward the declared type before
//! validation (e.g. `"42"` conforms to `{"type": "integer"}`), so model
//! and tool outputs that arrive as strings still satisfy numeric contracts.

use serde_json::{Number, Value};

/// Validate `value` against `schema`, coercing scalars where possible.
/// Returns the conformed value, or a reason rooted at a JSON path.
pub fn conform(value: &Value, schema: &Value) -> Result<Value, String> {
    conform_at(value, schema, "$")
}

fn conform_at(value: &Value, schema: &Value, path: &str) -> Result<Value, String> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| format!("schema at '{}' must be an object", path))?;

    let mut conformed = match schema_obj.get("type") {
        Some(type_spec) => coerce_to_type(value, type_spec, path)?,
        None => value.clone(),
    };

    if let Some(constant) = schema_obj.get("const") {
        if &conformed != constant {
            return Err(format!("{} expected const {}", path, constant));
        }
    }

    if let Some(variants) = schema_obj.get("enum").and_then(|v| v.as_array()) {
        if !variants.iter().any(|candidate| candidate == &conformed) {
            return Err(format!("{} is not one of the allowed enum values", path));
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(|v| v.as_array()) {
        let object = conformed
            .as_object()
            .ok_or_else(|| format!("{} must be an object for required fields", path))?;
        for key in required.iter().filter_map(|v| v.as_str()) {
            if !object.contains_key(key) {
                return Err(format!("{} missing required field '{}'", path, key));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(|v| v.as_object()) {
        let object = conformed
            .as_object_mut()
            .ok_or_else(|| format!("{} must be an object for properties validation", path))?;
        for (key, property_schema) in properties {
            if let Some(child) = object.get(key) {
                let child_path = format!("{}.{}", path, key);
                let child_conformed = conform_at(child, property_schema, &child_path)?;
                object.insert(key.clone(), child_conformed);
            }
        }

        if schema_obj
            .get("additionalProperties")
            .and_then(|v| v.as_bool())
            == Some(false)
        {
            for key in object.keys() {
                if !properties.contains_key(key) {
                    return Err(format!("{} contains unknown field '{}'", path, key));
                }
            }
        }
    }

    if let Some(item_schema) = schema_obj.get("items") {
        let array = conformed
            .as_array_mut()
            .ok_or_else(|| format!("{} must be an array for items validation", path))?;
        for (idx, item) in array.iter_mut().enumerate() {
            let item_path = format!("{}[{}]", path, idx);
            *item = conform_at(item, item_schema, &item_path)?;
        }
    }

    Ok(conformed)
}

fn coerce_to_type(value: &Value, type_spec: &Value, path: &str) -> Result<Value, String> {
    match type_spec {
        Value::String(type_name) => coerce_single(value, type_name)
            .ok_or_else(|| format!("{} expected type '{}'", path, type_name)),
        Value::Array(types) => {
            for ty in types {
                if let Some(type_name) = ty.as_str() {
                    if let Some(conformed) = coerce_single(value, type_name) {
                        return Ok(conformed);
                    }
                }
            }
            Err(format!("{} did not match any allowed types", path))
        }
        _ => Err(format!("{} schema.type must be string or array", path)),
    }
}

/// Coerce a value toward one named type. Exact matches pass through;
/// numeric/boolean strings and number-to-string are the only conversions.
fn coerce_single(value: &Value, type_name: &str) -> Option<Value> {
    match type_name {
        "object" if value.is_object() => Some(value.clone()),
        "array" if value.is_array() => Some(value.clone()),
        "null" if value.is_null() => Some(value.clone()),
        "string" => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        "boolean" => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        "integer" => match value {
            Value::Number(n) if n.as_i64().is_some() || n.as_u64().is_some() => {
                Some(value.clone())
            }
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        "number" => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        _ => None,
    }
}
