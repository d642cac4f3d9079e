//! The ArangoDB provider.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{info, instrument};

use crate::arango::{ArangoApi, TransportSettings};
use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{
    database, user, user_permission, DatabaseResource, Resource, UserPermissionResource,
    UserResource,
};
use crate::schema::{has_errors, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::validate;

/// Provider for ArangoDB databases, users and user permissions.
///
/// The HTTP client is built once by `Configure` and shared by every
/// reconciler for the life of the process.
pub struct ArangoProvider {
    version: String,
    transport: TransportSettings,
    api: OnceLock<Arc<dyn ArangoApi>>,
}

impl ArangoProvider {
    /// Create an unconfigured provider.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            transport: TransportSettings::default(),
            api: OnceLock::new(),
        }
    }

    /// Create a provider that is already configured with `api`.
    pub fn with_client(version: impl Into<String>, api: Arc<dyn ArangoApi>) -> Self {
        let provider = Self::new(version);
        let _ = provider.api.set(api);
        provider
    }

    /// Override the HTTP transport settings used by `Configure`.
    pub fn with_transport(mut self, transport: TransportSettings) -> Self {
        self.transport = transport;
        self
    }

    /// The provider version reported in logs.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether `Configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.api.get().is_some()
    }

    fn api(&self) -> Result<Arc<dyn ArangoApi>, ProviderError> {
        self.api.get().cloned().ok_or(ProviderError::NotConfigured)
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            database::TYPE_NAME => Ok(database::schema()),
            user::TYPE_NAME => Ok(user::schema()),
            user_permission::TYPE_NAME => Ok(user_permission::schema()),
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<Box<dyn Resource>, ProviderError> {
        let resource: Box<dyn Resource> = match resource_type {
            database::TYPE_NAME => Box::new(DatabaseResource::new(self.api()?)),
            user::TYPE_NAME => Box::new(UserResource::new(self.api()?)),
            user_permission::TYPE_NAME => Box::new(UserPermissionResource::new(self.api()?)),
            other => return Err(ProviderError::UnknownResource(other.to_string())),
        };
        Ok(resource)
    }
}

#[async_trait::async_trait]
impl ProviderService for ArangoProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config::schema())
            .with_resource(database::TYPE_NAME, database::schema())
            .with_resource(user::TYPE_NAME, user::schema())
            .with_resource(user_permission::TYPE_NAME, user_permission::schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![
                database::TYPE_NAME.to_string(),
                user::TYPE_NAME.to_string(),
                user_permission::TYPE_NAME.to_string(),
            ],
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let merged = config::merge_process_env(&config);
        let mut diagnostics = config::validate_config(&merged);
        if !has_errors(&diagnostics) {
            diagnostics.extend(ProviderConfig::from_value(&merged)?.warnings());
        }
        Ok(diagnostics)
    }

    #[instrument(skip_all, fields(version = %self.version))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.is_configured() {
            return Err(ProviderError::Configuration(
                "provider is already configured".to_string(),
            ));
        }

        let merged = config::merge_process_env(&config);
        let mut diagnostics = config::validate_config(&merged);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(&merged)?;
        let client = config.connect(&self.transport)?;
        self.api.set(Arc::new(client)).map_err(|_| {
            ProviderError::Configuration("provider is already configured".to_string())
        })?;

        info!(
            endpoint = %config.endpoint,
            username = %config.username,
            tls = config.tls,
            "Configured ArangoDB client"
        );
        diagnostics.extend(config.warnings());
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.resource_schema(resource_type)?, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(plan_resource(&schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.resource(resource_type)?.create(planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.resource(resource_type)?.read(current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource(resource_type)?.delete(current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.resource(resource_type)?.import(id)?;
        info!(resource_type, id, "Imported resource");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
