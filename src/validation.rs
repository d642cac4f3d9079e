//! Validation of JSON values against a [`Schema`].
//!
//! ```
//! use hemmer_provider_arangodb::schema::{Attribute, Schema};
//! use hemmer_provider_arangodb::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("user", Attribute::required_string())
//!     .with_attribute(
//!         "permission",
//!         Attribute::required_string().with_allowed_values(["ro", "rw", "none"]),
//!     );
//!
//! assert!(validate(&schema, &json!({"user": "alice", "permission": "rw"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"user": "alice", "permission": "admin"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("permission"));
//! ```

use serde_json::Value;

use crate::schema::{Attribute, Diagnostic, Schema};

/// Check `value` against `schema`. An empty result means it is valid.
///
/// `null` counts as an empty object. Each attribute yields at most one
/// diagnostic: a missing required value, a wrong type, or a string outside
/// the allowed values.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let object = match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            return vec![Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", json_type(other)))]
        }
    };

    schema
        .attributes
        .iter()
        .filter_map(|(name, attr)| {
            let value = object.and_then(|o| o.get(name)).filter(|v| !v.is_null());
            check_attribute(name, attr, value)
        })
        .collect()
}

fn check_attribute(name: &str, attr: &Attribute, value: Option<&Value>) -> Option<Diagnostic> {
    let Some(value) = value else {
        return attr.presence.is_required().then(|| {
            Diagnostic::error(format!("Missing required attribute '{}'", name))
                .with_detail("This attribute is required and must be provided")
                .with_attribute(name)
        });
    };

    if !attr.kind.matches(value) {
        return Some(
            Diagnostic::error(format!("Invalid type for attribute '{}'", name))
                .with_detail(format!(
                    "Expected {}, got {}",
                    attr.kind.name(),
                    json_type(value)
                ))
                .with_attribute(name),
        );
    }

    let s = value.as_str()?;
    if attr.allowed_values.is_empty() || attr.allowed_values.iter().any(|a| a == s) {
        return None;
    }
    Some(
        Diagnostic::error(format!("Invalid value for attribute '{}'", name))
            .with_detail(format!(
                "Expected one of {}, got '{}'",
                attr.allowed_values.join(", "),
                s
            ))
            .with_attribute(name),
    )
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
