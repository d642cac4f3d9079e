//! `arangodb_user`: a user account.
//!
//! The password is write-only. The server never returns it, so reads leave
//! the tracked value alone and an imported account has no password until the
//! configuration supplies one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{require_id, Reconciler};
use crate::arango::{ArangoApi, UserOptions, UserRecord};
use crate::error::{Action, ProviderError};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "arangodb_user";

/// Schema of `arangodb_user`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("An Arango User can access databases")
        .with_attribute(
            "user",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the user"),
        )
        .with_attribute(
            "password",
            Attribute::required_string()
                .sensitive()
                .with_state_for_unknown()
                .with_description("The password of the user"),
        )
        .with_attribute(
            "active",
            Attribute::optional_computed_bool()
                .with_default(Value::Bool(true))
                .with_description("Whether the user can log in. Defaults to true"),
        )
}

/// Tracked state of a user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModel {
    /// User name.
    pub user: String,
    /// Password, unset after an import.
    #[serde(default)]
    pub password: Option<String>,
    /// Whether the account is active, unset until known.
    #[serde(default)]
    pub active: Option<bool>,
}

impl UserModel {
    fn options(&self) -> Result<UserOptions, ProviderError> {
        let password = self.password.clone().ok_or_else(|| {
            ProviderError::Validation(format!("password is required for user '{}'", self.user))
        })?;
        Ok(UserOptions {
            password,
            active: Some(self.active.unwrap_or(true)),
        })
    }

    fn observe(&mut self, record: UserRecord) {
        self.user = record.user;
        self.active = Some(record.active);
    }
}

impl std::fmt::Debug for UserModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserModel")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("active", &self.active)
            .finish()
    }
}

/// Reconciler for `arangodb_user`.
pub struct UserResource {
    api: Arc<dyn ArangoApi>,
}

impl UserResource {
    /// Create the reconciler around a shared client.
    pub fn new(api: Arc<dyn ArangoApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reconciler for UserResource {
    type Model = UserModel;

    #[instrument(skip_all, fields(user = %plan.user))]
    async fn create(&self, mut plan: UserModel) -> Result<UserModel, ProviderError> {
        let options = plan.options()?;
        match self.api.create_user(&plan.user, &options).await {
            Ok(record) => {
                info!("Created user");
                plan.observe(record);
            }
            Err(e) if e.is_conflict() => {
                warn!("User already exists, adopting it");
                plan.active = options.active;
            }
            Err(e) => {
                return Err(ProviderError::api(
                    format!("Unable to Create User {}", plan.user),
                    Action::Create,
                    e,
                ))
            }
        }
        Ok(plan)
    }

    #[instrument(skip_all, fields(user = %state.user))]
    async fn read(&self, mut state: UserModel) -> Result<Option<UserModel>, ProviderError> {
        match self.api.user(&state.user).await {
            Ok(record) => {
                debug!(active = record.active, "User exists");
                state.observe(record);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                warn!("User not found, removing from state");
                Ok(None)
            }
            Err(e) => Err(ProviderError::api(
                "Unable to Refresh Resource",
                Action::Refresh,
                e,
            )),
        }
    }

    #[instrument(skip_all, fields(user = %plan.user))]
    async fn update(&self, _prior: UserModel, mut plan: UserModel) -> Result<UserModel, ProviderError> {
        let options = plan.options()?;
        let record = self
            .api
            .update_user(&plan.user, &options)
            .await
            .map_err(|e| ProviderError::api("Unable to Update Resource", Action::Update, e))?;
        info!(active = record.active, "Updated user");
        plan.observe(record);
        Ok(plan)
    }

    #[instrument(skip_all, fields(user = %state.user))]
    async fn delete(&self, state: UserModel) -> Result<(), ProviderError> {
        match self.api.remove_user(&state.user).await {
            Ok(()) => {
                info!("Deleted user");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("User already removed");
                Ok(())
            }
            Err(e) => Err(ProviderError::api(
                "Unable to Delete Resource",
                Action::Delete,
                e,
            )),
        }
    }

    fn import(&self, id: &str) -> Result<UserModel, ProviderError> {
        Ok(UserModel {
            user: require_id(id)?.to_string(),
            password: None,
            active: None,
        })
    }
}
