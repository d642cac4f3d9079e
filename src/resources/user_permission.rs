//! `arangodb_user_permission`: the access level of a user on a database.
//!
//! Imported with the identifier `<user>/<database>`. Database names cannot
//! contain `/`, so the identifier is split at its last `/`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::Reconciler;
use crate::arango::{ArangoApi, Grant};
use crate::error::{Action, ProviderError};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "arangodb_user_permission";

/// Schema of `arangodb_user_permission`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("The access level of an Arango User on a Database")
        .with_attribute(
            "user",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the user"),
        )
        .with_attribute(
            "database",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the database"),
        )
        .with_attribute(
            "permission",
            Attribute::required_string()
                .with_allowed_values(Grant::ALL.iter().map(Grant::as_str))
                .with_description("The access level: ro, rw or none"),
        )
}

/// Tracked state of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantModel {
    /// User name.
    pub user: String,
    /// Database name.
    pub database: String,
    /// Access level, unset after an import.
    #[serde(default)]
    pub permission: Option<Grant>,
}

impl GrantModel {
    fn permission(&self) -> Result<Grant, ProviderError> {
        self.permission.ok_or_else(|| {
            ProviderError::Validation(format!(
                "permission is required for user '{}' on database '{}'",
                self.user, self.database
            ))
        })
    }
}

/// Reconciler for `arangodb_user_permission`.
pub struct UserPermissionResource {
    api: Arc<dyn ArangoApi>,
}

impl UserPermissionResource {
    /// Create the reconciler around a shared client.
    pub fn new(api: Arc<dyn ArangoApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reconciler for UserPermissionResource {
    type Model = GrantModel;

    #[instrument(skip_all, fields(user = %plan.user, database = %plan.database))]
    async fn create(&self, plan: GrantModel) -> Result<GrantModel, ProviderError> {
        let grant = plan.permission()?;
        self.api.user(&plan.user).await.map_err(|e| {
            ProviderError::api("Unable to find existing User", Action::Create, e)
        })?;
        self.api
            .set_database_access(&plan.user, &plan.database, grant)
            .await
            .map_err(|e| ProviderError::api("Unable to Create Resource", Action::Create, e))?;
        info!(%grant, "Granted database access");
        Ok(plan)
    }

    #[instrument(skip_all, fields(user = %state.user, database = %state.database))]
    async fn read(&self, mut state: GrantModel) -> Result<Option<GrantModel>, ProviderError> {
        match self.api.user(&state.user).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!("User not found, removing permission from state");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::api(
                    "Unable to find existing User",
                    Action::Refresh,
                    e,
                ))
            }
        }

        match self.api.database_access(&state.user, &state.database).await {
            Ok(grant) => {
                debug!(%grant, "Read database access");
                state.permission = Some(grant);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                warn!("Permission not found, removing from state");
                Ok(None)
            }
            Err(e) => Err(ProviderError::api(
                "Unable to get permissions",
                Action::Refresh,
                e,
            )),
        }
    }

    #[instrument(skip_all, fields(user = %plan.user, database = %plan.database))]
    async fn update(&self, _prior: GrantModel, plan: GrantModel) -> Result<GrantModel, ProviderError> {
        let grant = plan.permission()?;
        self.api
            .user(&plan.user)
            .await
            .map_err(|e| ProviderError::api("Unable to get User", Action::Update, e))?;

        match self
            .api
            .set_database_access(&plan.user, &plan.database, grant)
            .await
        {
            Ok(()) => {
                info!(%grant, "Updated database access");
                Ok(plan)
            }
            Err(e) if e.is_not_found() => Err(ProviderError::api(
                "Unable to find database",
                Action::Update,
                e,
            )),
            Err(e) => Err(ProviderError::api(
                "Unable to Update Resource",
                Action::Update,
                e,
            )),
        }
    }

    #[instrument(skip_all, fields(user = %state.user, database = %state.database))]
    async fn delete(&self, state: GrantModel) -> Result<(), ProviderError> {
        self.api.user(&state.user).await.map_err(|e| {
            ProviderError::api("Unable to get existing user", Action::Delete, e)
        })?;

        match self
            .api
            .remove_database_access(&state.user, &state.database)
            .await
        {
            Ok(()) => {
                info!("Revoked database access");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Permission already removed");
                Ok(())
            }
            Err(e) => Err(ProviderError::api(
                "Unable to Delete Resource",
                Action::Delete,
                e,
            )),
        }
    }

    fn import(&self, id: &str) -> Result<GrantModel, ProviderError> {
        match id.rsplit_once('/') {
            Some((user, database)) if !user.is_empty() && !database.is_empty() => Ok(GrantModel {
                user: user.to_string(),
                database: database.to_string(),
                permission: None,
            }),
            _ => Err(ProviderError::Validation(format!(
                "expected import identifier '<user>/<database>', got '{}'",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arango::error::{ERROR_DATABASE_NOT_FOUND, ERROR_USER_NOT_FOUND};
    use crate::arango::ArangoError;
    use crate::testing::MemoryArango;

    fn setup() -> (Arc<MemoryArango>, UserPermissionResource) {
        let api = Arc::new(MemoryArango::new());
        api.add_database("mydb");
        api.add_user("alice", "1234", true);
        let resource = UserPermissionResource::new(api.clone());
        (api, resource)
    }

    fn grant(permission: Grant) -> GrantModel {
        GrantModel {
            user: "alice".to_string(),
            database: "mydb".to_string(),
            permission: Some(permission),
        }
    }

    #[test]
    fn test_schema_restricts_permission() {
        let schema = schema();
        assert_eq!(
            schema.attribute("permission").unwrap().allowed_values,
            vec!["ro", "rw", "none"]
        );
        assert!(schema.attribute("database").unwrap().force_new);
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (api, resource) = setup();
        let state = Reconciler::create(&resource, grant(Grant::ReadWrite))
            .await
            .unwrap();
        assert_eq!(api.grant("alice", "mydb"), Some(Grant::ReadWrite));

        let read = Reconciler::read(&resource, state.clone()).await.unwrap();
        assert_eq!(read, Some(state));
    }

    #[tokio::test]
    async fn test_create_for_missing_user() {
        let (api, resource) = setup();
        let plan = GrantModel {
            user: "bob".to_string(),
            ..grant(Grant::ReadOnly)
        };
        let err = Reconciler::create(&resource, plan).await.unwrap_err();
        assert_eq!(err.message(), "Unable to find existing User");
        assert_eq!(api.operations(), vec!["user"]);
    }

    #[tokio::test]
    async fn test_create_for_missing_database() {
        let (_api, resource) = setup();
        let plan = GrantModel {
            database: "other".to_string(),
            ..grant(Grant::ReadOnly)
        };
        let err = Reconciler::create(&resource, plan).await.unwrap_err();
        assert_eq!(err.message(), "Unable to Create Resource");
    }

    #[tokio::test]
    async fn test_read_overwrites_permission() {
        let (api, resource) = setup();
        api.add_grant("alice", "mydb", Grant::ReadOnly);

        let read = Reconciler::read(&resource, grant(Grant::ReadWrite))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.permission, Some(Grant::ReadOnly));
    }

    #[tokio::test]
    async fn test_read_removes_state_when_user_or_database_gone() {
        let (api, resource) = setup();
        api.fail_next(
            "user",
            ArangoError::not_found(ERROR_USER_NOT_FOUND, "user not found"),
        );
        assert_eq!(
            Reconciler::read(&resource, grant(Grant::ReadOnly)).await.unwrap(),
            None
        );

        api.fail_next(
            "database_access",
            ArangoError::not_found(ERROR_DATABASE_NOT_FOUND, "database not found"),
        );
        assert_eq!(
            Reconciler::read(&resource, grant(Grant::ReadOnly)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_read_failures_are_reported() {
        let (api, resource) = setup();
        api.fail_next("user", ArangoError::response(500, 4, "internal"));
        let err = Reconciler::read(&resource, grant(Grant::ReadOnly))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to find existing User");

        api.fail_next("database_access", ArangoError::response(500, 4, "internal"));
        let err = Reconciler::read(&resource, grant(Grant::ReadOnly))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to get permissions");
    }

    #[tokio::test]
    async fn test_update_changes_grant() {
        let (api, resource) = setup();
        api.add_grant("alice", "mydb", Grant::ReadWrite);

        let state = Reconciler::update(&resource, grant(Grant::ReadWrite), grant(Grant::ReadOnly))
            .await
            .unwrap();
        assert_eq!(state.permission, Some(Grant::ReadOnly));
        assert_eq!(api.grant("alice", "mydb"), Some(Grant::ReadOnly));
    }

    #[tokio::test]
    async fn test_update_failures() {
        let (api, resource) = setup();
        api.fail_next("user", ArangoError::response(500, 4, "internal"));
        let err = Reconciler::update(&resource, grant(Grant::ReadWrite), grant(Grant::ReadOnly))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to get User");

        let plan = GrantModel {
            database: "other".to_string(),
            ..grant(Grant::ReadOnly)
        };
        let err = Reconciler::update(&resource, grant(Grant::ReadWrite), plan)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to find database");

        api.fail_next("set_database_access", ArangoError::response(500, 4, "internal"));
        let err = Reconciler::update(&resource, grant(Grant::ReadWrite), grant(Grant::ReadOnly))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to Update Resource");
    }

    #[tokio::test]
    async fn test_delete() {
        let (api, resource) = setup();
        api.add_grant("alice", "mydb", Grant::ReadWrite);

        Reconciler::delete(&resource, grant(Grant::ReadWrite))
            .await
            .unwrap();
        assert_eq!(api.grant("alice", "mydb"), None);

        api.fail_next(
            "remove_database_access",
            ArangoError::not_found(ERROR_DATABASE_NOT_FOUND, "database not found"),
        );
        Reconciler::delete(&resource, grant(Grant::ReadWrite))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_requires_user() {
        let (api, resource) = setup();
        api.fail_next(
            "user",
            ArangoError::not_found(ERROR_USER_NOT_FOUND, "user not found"),
        );
        let err = Reconciler::delete(&resource, grant(Grant::ReadWrite))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unable to get existing user");
    }

    #[tokio::test]
    async fn test_import_splits_at_last_slash() {
        let (api, resource) = setup();
        let state = Reconciler::import(&resource, "team/alice/mydb").unwrap();
        assert_eq!(state.user, "team/alice");
        assert_eq!(state.database, "mydb");
        assert!(state.permission.is_none());

        for id in ["alice", "alice/", "/mydb", ""] {
            assert!(matches!(
                Reconciler::import(&resource, id),
                Err(ProviderError::Validation(_))
            ));
        }
        assert!(api.calls().is_empty());
    }
}
