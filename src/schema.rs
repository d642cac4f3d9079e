//! Attribute schemas and diagnostics.
//!
//! A [`Schema`] lists the attributes of the provider block or of one resource
//! type. The same schema drives validation, planning and the `GetSchema`
//! reply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A JSON string.
    String,
    /// A JSON boolean.
    Bool,
}

impl AttributeType {
    /// Whether `value` has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
        }
    }

    /// Name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
        }
    }
}

/// Whether the configuration must set an attribute, and whether the provider
/// fills it when it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set.
    Required,
    /// May be left unset.
    Optional,
    /// May be left unset; the provider then reports the value.
    OptionalComputed,
}

impl Presence {
    /// The configuration must set the attribute.
    pub fn is_required(self) -> bool {
        self == Self::Required
    }

    /// The configuration may leave the attribute unset.
    pub fn is_optional(self) -> bool {
        self != Self::Required
    }

    /// The provider reports the value.
    pub fn is_computed(self) -> bool {
        self == Self::OptionalComputed
    }
}

/// One attribute of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub kind: AttributeType,
    /// Required, optional or computed.
    pub presence: Presence,
    /// Hidden in plans and logs.
    #[serde(default)]
    pub sensitive: bool,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the object instead of updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when the attribute is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// The only accepted string values. Empty accepts any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// When unset in a plan, the prior state's value is kept.
    ///
    /// For write-only values the server never returns.
    #[serde(default)]
    pub use_state_for_unknown: bool,
}

impl Attribute {
    fn of(kind: AttributeType, presence: Presence) -> Self {
        Self {
            kind,
            presence,
            sensitive: false,
            description: None,
            force_new: false,
            default: None,
            allowed_values: Vec::new(),
            use_state_for_unknown: false,
        }
    }

    /// A string the configuration must set.
    pub fn required_string() -> Self {
        Self::of(AttributeType::String, Presence::Required)
    }

    /// A string the configuration may leave unset.
    pub fn optional_string() -> Self {
        Self::of(AttributeType::String, Presence::Optional)
    }

    /// A bool the configuration may leave unset.
    pub fn optional_bool() -> Self {
        Self::of(AttributeType::Bool, Presence::Optional)
    }

    /// A bool the provider reports when the configuration leaves it unset.
    pub fn optional_computed_bool() -> Self {
        Self::of(AttributeType::Bool, Presence::OptionalComputed)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the object when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Plan `default` when the attribute is unset.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Accept only the given values.
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Keep the prior state's value when the attribute is unset in a plan.
    pub fn with_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    /// Hide the value in plans and logs.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Attributes of the provider block or of a resource type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when stored state changes shape.
    #[serde(default)]
    pub version: u64,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// The provider block schema and every resource schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Schema of the provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas by resource type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// An empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource type.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The call failed.
    Error,
    /// The call succeeded, with something the user should know.
    Warning,
}

/// A user-facing message attached to a protocol reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute the message is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the attribute name.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presence() {
        assert!(Presence::Required.is_required());
        assert!(!Presence::Required.is_optional());
        assert!(Presence::OptionalComputed.is_optional());
        assert!(Presence::OptionalComputed.is_computed());
        assert!(!Presence::Optional.is_computed());
    }

    #[test]
    fn test_attribute_type_matches() {
        assert!(AttributeType::String.matches(&json!("mydb")));
        assert!(!AttributeType::String.matches(&json!(true)));
        assert!(AttributeType::Bool.matches(&json!(false)));
        assert!(!AttributeType::Bool.matches(&json!("true")));
    }

    #[test]
    fn test_user_password_attribute() {
        let attr = Attribute::required_string()
            .sensitive()
            .with_state_for_unknown()
            .with_description("The password of the user");

        assert_eq!(attr.kind, AttributeType::String);
        assert!(attr.presence.is_required());
        assert!(attr.sensitive);
        assert!(attr.use_state_for_unknown);
        assert!(!attr.force_new);
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::v0()
            .with_description("An Arango User can access databases")
            .with_attribute("user", Attribute::required_string().with_force_new())
            .with_attribute(
                "active",
                Attribute::optional_computed_bool().with_default(json!(true)),
            );

        assert_eq!(schema.version, 0);
        assert!(schema.attribute("user").unwrap().force_new);
        assert_eq!(schema.attribute("active").unwrap().default, Some(json!(true)));
        assert!(schema.attribute("password").is_none());
    }

    #[test]
    fn test_attribute_serializes_type_and_presence() {
        let value = serde_json::to_value(
            Attribute::required_string().with_allowed_values(["ro", "rw", "none"]),
        )
        .unwrap();
        assert_eq!(value["type"], "string");
        assert_eq!(value["presence"], "required");
        assert_eq!(value["allowed_values"], json!(["ro", "rw", "none"]));
        assert!(value.get("default").is_none());
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid value for attribute 'permission'")
            .with_detail("Expected one of ro, rw, none, got 'admin'")
            .with_attribute("permission");

        assert!(err.is_error());
        assert_eq!(err.attribute.as_deref(), Some("permission"));
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }
}
