//! `arangodb_database`: a named database.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{require_id, Reconciler};
use crate::arango::ArangoApi;
use crate::error::{Action, ProviderError};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "arangodb_database";

/// Schema of `arangodb_database`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("An Arango Database can store data")
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the database"),
        )
}

/// Tracked state of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseModel {
    /// Database name.
    pub name: String,
}

/// Reconciler for `arangodb_database`.
pub struct DatabaseResource {
    api: Arc<dyn ArangoApi>,
}

impl DatabaseResource {
    /// Create the reconciler around a shared client.
    pub fn new(api: Arc<dyn ArangoApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reconciler for DatabaseResource {
    type Model = DatabaseModel;

    #[instrument(skip_all, fields(database = %plan.name))]
    async fn create(&self, plan: DatabaseModel) -> Result<DatabaseModel, ProviderError> {
        self.api
            .create_database(&plan.name)
            .await
            .map_err(|e| ProviderError::api("Unable to Create Resource", Action::Create, e))?;
        info!("Created database");
        Ok(plan)
    }

    #[instrument(skip_all, fields(database = %state.name))]
    async fn read(&self, state: DatabaseModel) -> Result<Option<DatabaseModel>, ProviderError> {
        match self.api.database(&state.name).await {
            Ok(info) => {
                debug!("Database exists");
                Ok(Some(DatabaseModel { name: info.name }))
            }
            Err(e) if e.is_not_found() => {
                warn!("Database not found, removing from state");
                Ok(None)
            }
            Err(e) => Err(ProviderError::api(
                "Unable to Refresh Resource",
                Action::Refresh,
                e,
            )),
        }
    }

    async fn update(
        &self,
        _prior: DatabaseModel,
        plan: DatabaseModel,
    ) -> Result<DatabaseModel, ProviderError> {
        // The only attribute is immutable, so every change is a replacement.
        Ok(plan)
    }

    #[instrument(skip_all, fields(database = %state.name))]
    async fn delete(&self, state: DatabaseModel) -> Result<(), ProviderError> {
        self.api
            .database(&state.name)
            .await
            .map_err(|e| ProviderError::api("Unable to Delete Resource", Action::Delete, e))?;

        match self.api.remove_database(&state.name).await {
            Ok(()) => {
                info!("Deleted database");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Database already removed");
                Ok(())
            }
            Err(e) => Err(ProviderError::api(
                "Unable to Delete Resource",
                Action::Delete,
                e,
            )),
        }
    }

    fn import(&self, id: &str) -> Result<DatabaseModel, ProviderError> {
        Ok(DatabaseModel {
            name: require_id(id)?.to_string(),
        })
    }
}
