//! Error types for the provider.

use std::fmt;

use thiserror::Error;

use crate::arango::ArangoError;
use crate::schema::Diagnostic;

/// The lifecycle step a remote call was made for.
///
/// Used to phrase the detail of a remote failure diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Creating the resource.
    Create,
    /// Refreshing tracked state from the server.
    Refresh,
    /// Updating the resource in place.
    Update,
    /// Deleting the resource.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create the resource",
            Action::Refresh => "refresh resource state",
            Action::Update => "update the resource",
            Action::Delete => "delete the resource",
        })
    }
}

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resource operation arrived before the provider was configured.
    #[error("Provider not configured: the Configure call must succeed before managing resources")]
    NotConfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A request field held bytes that are not JSON.
    #[error("Invalid JSON payload in {field}: {source}")]
    InvalidPayload {
        /// Name of the request field.
        field: &'static str,
        /// The parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A call to the ArangoDB API failed.
    #[error("{summary}: {source}")]
    Api {
        /// Operator-facing summary of what failed.
        summary: String,
        /// The lifecycle step the call was made for.
        action: Action,
        /// The underlying API error.
        #[source]
        source: ArangoError,
    },

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Wrap an API error with the summary shown to the operator.
    pub fn api(summary: impl Into<String>, action: Action, source: ArangoError) -> Self {
        Self::Api {
            summary: summary.into(),
            action,
            source,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg) => msg.clone(),
            Self::Api { summary, .. } => summary.clone(),
            other => other.to_string(),
        }
    }

    /// Convert the error into the diagnostic reported to the engine.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Api {
                summary,
                action,
                source,
            } => Diagnostic::error(summary.clone()).with_detail(format!(
                "An unexpected error occurred while attempting to {}. \
                 Please retry the operation or report this issue to the provider developers.\n\n\
                 HTTP Error: {}",
                action, source
            )),
            Self::InvalidPayload { field, source } => Diagnostic::error("Invalid JSON payload")
                .with_detail(format!("The {} field could not be decoded: {}", field, source)),
            other => Diagnostic::error(other.to_string()),
        }
    }
}
