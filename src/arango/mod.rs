//! ArangoDB administrative API.
//!
//! Reconcilers talk to the server only through the [`ArangoApi`] trait. The
//! production implementation is [`ArangoClient`], an HTTP client over the
//! server's REST API; tests use [`crate::testing::MemoryArango`].
//!
//! Errors are classified with [`ArangoError::is_not_found`] and
//! [`ArangoError::is_conflict`], which is all the reconcilers need to decide
//! whether a failure is tolerated, turned into a state removal, or surfaced.

pub mod client;
pub mod error;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{ArangoClient, TransportSettings};
pub use error::ArangoError;

/// Access level of a user on a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grant {
    /// Read-only access.
    #[serde(rename = "ro")]
    ReadOnly,
    /// Read-write access.
    #[serde(rename = "rw")]
    ReadWrite,
    /// No access.
    #[serde(rename = "none")]
    None,
}

impl Grant {
    /// All grant levels, in the order they are documented.
    pub const ALL: [Grant; 3] = [Grant::ReadOnly, Grant::ReadWrite, Grant::None];

    /// The wire representation of the grant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::ReadOnly => "ro",
            Grant::ReadWrite => "rw",
            Grant::None => "none",
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grant {
    type Err = ArangoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ro" => Ok(Grant::ReadOnly),
            "rw" => Ok(Grant::ReadWrite),
            "none" => Ok(Grant::None),
            other => Err(ArangoError::UnexpectedResponse(format!(
                "unknown grant '{}', expected one of ro, rw, none",
                other
            ))),
        }
    }
}

/// A user record as returned by the server. The password is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    /// The user name.
    pub user: String,
    /// Whether the account is active.
    pub active: bool,
}

/// Options sent when creating or updating a user.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct UserOptions {
    /// The account password.
    #[serde(rename = "passwd")]
    pub password: String,
    /// Whether the account is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl fmt::Debug for UserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserOptions")
            .field("password", &"<redacted>")
            .field("active", &self.active)
            .finish()
    }
}

/// A database as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseInfo {
    /// The database name.
    pub name: String,
}

/// The subset of the ArangoDB administrative API used by the provider.
#[async_trait]
pub trait ArangoApi: Send + Sync + 'static {
    /// Create a database.
    async fn create_database(&self, name: &str) -> Result<(), ArangoError>;

    /// Fetch a database, failing with not-found if it does not exist.
    async fn database(&self, name: &str) -> Result<DatabaseInfo, ArangoError>;

    /// Drop a database.
    async fn remove_database(&self, name: &str) -> Result<(), ArangoError>;

    /// Fetch a user.
    async fn user(&self, name: &str) -> Result<UserRecord, ArangoError>;

    /// Create a user.
    async fn create_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError>;

    /// Update an existing user's password and active flag.
    async fn update_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError>;

    /// Remove a user.
    async fn remove_user(&self, name: &str) -> Result<(), ArangoError>;

    /// Get a user's access level on a database.
    async fn database_access(&self, user: &str, database: &str) -> Result<Grant, ArangoError>;

    /// Set a user's access level on a database.
    async fn set_database_access(
        &self,
        user: &str,
        database: &str,
        grant: Grant,
    ) -> Result<(), ArangoError>;

    /// Clear a user's access level on a database.
    async fn remove_database_access(&self, user: &str, database: &str)
        -> Result<(), ArangoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_parse_and_display() {
        for grant in Grant::ALL {
            assert_eq!(grant.as_str().parse::<Grant>().unwrap(), grant);
            assert_eq!(grant.to_string(), grant.as_str());
        }
        assert!("admin".parse::<Grant>().is_err());
    }

    #[test]
    fn test_grant_serde() {
        assert_eq!(serde_json::to_value(Grant::ReadWrite).unwrap(), "rw");
        let grant: Grant = serde_json::from_value(serde_json::json!("none")).unwrap();
        assert_eq!(grant, Grant::None);
    }

    #[test]
    fn test_user_options_body_and_debug() {
        let options = UserOptions {
            password: "1234".to_string(),
            active: Some(true),
        };
        let body = serde_json::to_value(&options).unwrap();
        assert_eq!(body, serde_json::json!({"passwd": "1234", "active": true}));

        let debug = format!("{:?}", options);
        assert!(!debug.contains("1234"));
    }
}
