//! Errors returned by the ArangoDB API.

use serde::Deserialize;
use thiserror::Error;

/// `ERROR_ARANGO_DOCUMENT_NOT_FOUND`
pub const ERROR_DOCUMENT_NOT_FOUND: i64 = 1202;
/// `ERROR_ARANGO_DUPLICATE_NAME`
pub const ERROR_DUPLICATE_NAME: i64 = 1207;
/// `ERROR_ARANGO_DATABASE_NOT_FOUND`
pub const ERROR_DATABASE_NOT_FOUND: i64 = 1228;
/// `ERROR_USER_DUPLICATE`
pub const ERROR_USER_DUPLICATE: i64 = 1702;
/// `ERROR_USER_NOT_FOUND`
pub const ERROR_USER_NOT_FOUND: i64 = 1703;

/// Errors that can occur when calling the ArangoDB API.
#[derive(Debug, Error)]
pub enum ArangoError {
    /// The server answered with an error body.
    #[error("{message} (status {code}, errorNum {error_num})")]
    Response {
        /// HTTP status code.
        code: u16,
        /// ArangoDB error number.
        error_num: i64,
        /// Server supplied message.
        message: String,
    },

    /// The server answered with an error status but no ArangoDB error body,
    /// e.g. a proxy error page. Never classified as not-found or conflict.
    #[error("HTTP status {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Start of the response body.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be built.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The authentication header could not be built.
    #[error("Authentication configuration failed: {0}")]
    Authentication(String),

    /// The server answered with something the client does not understand.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ArangoError {
    /// Build a response error.
    pub fn response(code: u16, error_num: i64, message: impl Into<String>) -> Self {
        Self::Response {
            code,
            error_num,
            message: message.into(),
        }
    }

    /// A 404 error, as the server reports missing entities.
    pub fn not_found(error_num: i64, message: impl Into<String>) -> Self {
        Self::response(404, error_num, message)
    }

    /// A 409 error, as the server reports duplicate entities.
    pub fn conflict(error_num: i64, message: impl Into<String>) -> Self {
        Self::response(409, error_num, message)
    }

    /// Whether the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Response {
                code, error_num, ..
            } => {
                *code == 404
                    || matches!(
                        *error_num,
                        ERROR_DOCUMENT_NOT_FOUND | ERROR_DATABASE_NOT_FOUND | ERROR_USER_NOT_FOUND
                    )
            }
            _ => false,
        }
    }

    /// Whether the entity already exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Response {
                code, error_num, ..
            } => *code == 409 || matches!(*error_num, ERROR_DUPLICATE_NAME | ERROR_USER_DUPLICATE),
            _ => false,
        }
    }
}

/// Longest body excerpt kept in [`ArangoError::Status`].
const BODY_EXCERPT: usize = 200;

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(rename = "errorNum", default)]
    pub error_num: i64,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

/// Classify a non-success response. Only a JSON body flagged `"error": true`
/// is an ArangoDB error; anything else keeps just the status.
pub(crate) fn from_response(status: u16, body: &[u8]) -> ArangoError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(error_body) if error_body.error => error_body.into_error(status),
        _ => ArangoError::Status {
            code: status,
            body: String::from_utf8_lossy(body)
                .chars()
                .take(BODY_EXCERPT)
                .collect(),
        },
    }
}

impl ErrorBody {
    /// Turn the body into an error, falling back to the HTTP status when the
    /// body has no code of its own.
    pub(crate) fn into_error(self, status: u16) -> ArangoError {
        ArangoError::response(
            self.code.unwrap_or(status),
            self.error_num,
            self.error_message,
        )
    }
}
