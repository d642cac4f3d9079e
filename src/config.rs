//! Provider configuration.
//!
//! The provider block names the server endpoint and credentials. Attributes
//! left out of the block are taken from the environment:
//!
//! | Attribute  | Variable            |
//! |------------|---------------------|
//! | `endpoint` | `ARANGODB_ENDPOINT` |
//! | `username` | `ARANGODB_USERNAME` |
//! | `password` | `ARANGODB_PASSWORD` |
//! | `tls`      | `ARANGODB_TLS`      |

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::arango::{ArangoClient, TransportSettings};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::validate;

const ENV_VARS: [(&str, &str); 4] = [
    ("endpoint", "ARANGODB_ENDPOINT"),
    ("username", "ARANGODB_USERNAME"),
    ("password", "ARANGODB_PASSWORD"),
    ("tls", "ARANGODB_TLS"),
];

const TLS_WARNING_DETAIL: &str = "Server certificates are not verified when tls is enabled. \
     Self-signed and otherwise invalid certificates are accepted.";

/// Schema of the provider block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Manage databases, users and permissions of an ArangoDB server.")
        .with_attribute(
            "endpoint",
            Attribute::required_string()
                .with_description("Server URL, e.g. http://localhost:8529. Env: ARANGODB_ENDPOINT"),
        )
        .with_attribute(
            "username",
            Attribute::required_string()
                .with_description("User to authenticate as. Env: ARANGODB_USERNAME"),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Password of the user. Env: ARANGODB_PASSWORD"),
        )
        .with_attribute(
            "tls",
            Attribute::optional_bool()
                .with_default(Value::Bool(true))
                .with_description(
                    "Connect over TLS. Certificate verification is disabled when enabled. \
                     Defaults to true. Env: ARANGODB_TLS",
                ),
        )
}

/// Fill attributes missing from `config` using `lookup` on the matching
/// environment variable.
///
/// `ARANGODB_TLS` accepts `true`/`false`/`1`/`0`; anything else is kept as a
/// string so that validation reports it against the `tls` attribute.
pub fn merge_env<F>(config: &Value, lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = match config {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    for (attribute, var) in ENV_VARS {
        if !matches!(merged.get(attribute), None | Some(Value::Null)) {
            continue;
        }
        let Some(raw) = lookup(var) else {
            continue;
        };
        let value = if attribute == "tls" {
            match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::String(raw),
            }
        } else {
            Value::String(raw)
        };
        merged.insert(attribute.to_string(), value);
    }

    Value::Object(merged)
}

/// Merge the process environment into `config`.
pub fn merge_process_env(config: &Value) -> Value {
    merge_env(config, |var| std::env::var(var).ok())
}

/// Validate a merged provider block.
pub fn validate_config(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(&schema(), config);
    if let Some(endpoint) = config.get("endpoint").and_then(Value::as_str) {
        if let Err(message) = parse_endpoint(endpoint) {
            diagnostics.push(
                Diagnostic::error("Invalid endpoint")
                    .with_detail(message)
                    .with_attribute("endpoint"),
            );
        }
    }
    diagnostics
}

fn parse_endpoint(endpoint: &str) -> Result<Url, String> {
    let url = Url::parse(endpoint).map_err(|e| format!("'{}' is not a valid URL: {}", endpoint, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!(
            "'{}' uses scheme '{}', expected http or https",
            endpoint, other
        )),
    }
}

#[derive(Deserialize)]
struct RawConfig {
    endpoint: String,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    tls: Option<bool>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Server URL.
    pub endpoint: Url,
    /// User to authenticate as.
    pub username: String,
    /// Password, empty when not configured.
    pub password: String,
    /// Whether TLS is requested (certificate verification off).
    pub tls: bool,
}

impl ProviderConfig {
    /// Parse a merged provider block.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        let raw: RawConfig = serde_json::from_value(config.clone())
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        let endpoint = parse_endpoint(&raw.endpoint).map_err(ProviderError::Configuration)?;

        Ok(Self {
            endpoint,
            username: raw.username,
            password: raw.password.unwrap_or_default(),
            tls: raw.tls.unwrap_or(true),
        })
    }

    /// Build the HTTP client for this configuration.
    pub fn connect(&self, settings: &TransportSettings) -> Result<ArangoClient, ProviderError> {
        ArangoClient::new(
            self.endpoint.clone(),
            &self.username,
            &self.password,
            self.tls,
            settings,
        )
        .map_err(|e| ProviderError::Configuration(format!("Unable to create ArangoDB client: {}", e)))
    }

    /// Warnings to surface for an otherwise valid configuration.
    pub fn warnings(&self) -> Vec<Diagnostic> {
        if self.tls {
            vec![Diagnostic::warning("TLS certificate verification is disabled")
                .with_detail(TLS_WARNING_DETAIL)
                .with_attribute("tls")]
        } else {
            vec![]
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::has_errors;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_value_defaults() {
        let config = ProviderConfig::from_value(&json!({
            "endpoint": "http://localhost:8529",
            "username": "root"
        }))
        .unwrap();

        assert_eq!(config.endpoint.as_str(), "http://localhost:8529/");
        assert_eq!(config.username, "root");
        assert_eq!(config.password, "");
        assert!(config.tls);
    }

    #[test]
    fn test_from_value_rejects_bad_endpoint() {
        let err = ProviderConfig::from_value(&json!({
            "endpoint": "tcp://localhost:8529",
            "username": "root"
        }))
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("expected http or https"));
    }

    #[test]
    fn test_merge_env_fills_missing_only() {
        let merged = merge_env(
            &json!({"endpoint": "http://db:8529", "username": null}),
            env(&[
                ("ARANGODB_ENDPOINT", "http://ignored:8529"),
                ("ARANGODB_USERNAME", "admin"),
                ("ARANGODB_PASSWORD", "secret"),
                ("ARANGODB_TLS", "false"),
            ]),
        );

        assert_eq!(
            merged,
            json!({
                "endpoint": "http://db:8529",
                "username": "admin",
                "password": "secret",
                "tls": false
            })
        );
    }

    #[test]
    fn test_merge_env_on_null_block() {
        let merged = merge_env(&Value::Null, env(&[("ARANGODB_USERNAME", "root")]));
        assert_eq!(merged, json!({"username": "root"}));
    }

    #[test]
    fn test_validate_config() {
        let diagnostics = validate_config(&json!({
            "endpoint": "http://localhost:8529",
            "username": "root",
            "tls": false
        }));
        assert!(diagnostics.is_empty());

        let diagnostics = validate_config(&json!({"endpoint": "not a url"}));
        assert!(has_errors(&diagnostics));
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("username")));
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Invalid endpoint"));
    }

    #[test]
    fn test_invalid_tls_env_is_reported() {
        let merged = merge_env(
            &json!({"endpoint": "http://localhost:8529", "username": "root"}),
            env(&[("ARANGODB_TLS", "maybe")]),
        );
        let diagnostics = validate_config(&merged);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("tls"));
    }

    #[test]
    fn test_tls_warning() {
        let mut config = ProviderConfig::from_value(&json!({
            "endpoint": "https://localhost:8529",
            "username": "root",
            "password": "secret"
        }))
        .unwrap();
        let warnings = config.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].is_error());

        config.tls = false;
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ProviderConfig::from_value(&json!({
            "endpoint": "http://localhost:8529",
            "username": "root",
            "password": "hunter2"
        }))
        .unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_schema_marks_password_sensitive() {
        let schema = schema();
        assert!(schema.attribute("password").unwrap().sensitive);
        assert_eq!(
            schema.attribute("tls").unwrap().default,
            Some(Value::Bool(true))
        );
    }
}
