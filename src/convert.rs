//! Argument accessors for tool dispatch.
//!
//! Helpers for pulling typed values out of JSON tool arguments, plus the
//! coercion from a `form_data` object to plain name/value string pairs.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::error::{McpError, Result};

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::MissingArgs(vec![name.to_string()]))
}

/// Helper to get a required object argument from JSON arguments.
pub fn get_object_arg<'a>(
    args: &'a Map<String, JsonValue>,
    name: &str,
) -> Result<&'a Map<String, JsonValue>> {
    match args.get(name) {
        Some(JsonValue::Object(map)) => Ok(map),
        Some(_) => Err(McpError::InvalidArg {
            name: name.to_string(),
            reason: "expected an object".to_string(),
        }),
        None => Err(McpError::MissingArgs(vec![name.to_string()])),
    }
}

/// Coerce a JSON object of form values into name/value string pairs.
///
/// Strings pass through; numbers and booleans take their display form.
/// Nested arrays and objects are rejected.
pub fn to_field_values(
    arg_name: &str,
    map: &Map<String, JsonValue>,
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for (key, value) in map {
        let rendered = match value {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => {
                return Err(McpError::InvalidArg {
                    name: arg_name.to_string(),
                    reason: format!("value for '{}' must be a string, number, or boolean", key),
                })
            }
        };
        values.insert(key.clone(), rendered);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn string_arg_missing_or_wrong_type() {
        let a = args(json!({"page_id": 7}));
        assert!(matches!(
            get_string_arg(&a, "page_id"),
            Err(McpError::MissingArgs(_))
        ));
        assert_eq!(
            get_string_arg(&args(json!({"page_id": "7"})), "page_id").unwrap(),
            "7"
        );
    }

    #[test]
    fn field_values_coerce_scalars() {
        let a = args(json!({"budget": 50000, "approved": true, "owner": "Ana"}));
        let values = to_field_values("form_data", &a).unwrap();
        assert_eq!(values["budget"], "50000");
        assert_eq!(values["approved"], "true");
        assert_eq!(values["owner"], "Ana");
    }

    #[test]
    fn field_values_reject_nested_structures() {
        let a = args(json!({"tags": ["a", "b"]}));
        assert!(matches!(
            to_field_values("form_data", &a),
            Err(McpError::InvalidArg { .. })
        ));
    }
}
