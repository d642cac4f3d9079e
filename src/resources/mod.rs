//! Reconcilers for the managed resource types.
//!
//! Each reconciler works on a typed model of its resource and owns a handle
//! to the shared [`ArangoApi`](crate::arango::ArangoApi) client. The
//! [`Resource`] trait erases the model so the provider can dispatch on the
//! resource type name.

pub mod database;
pub mod user;
pub mod user_permission;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProviderError;

pub use database::{DatabaseModel, DatabaseResource};
pub use user::{UserModel, UserResource};
pub use user_permission::{GrantModel, UserPermissionResource};

/// CRUD and import over one kind of remote object.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Tracked state of the resource.
    type Model: Serialize + DeserializeOwned + Send + 'static;

    /// Create the remote object described by `plan` and return the new state.
    async fn create(&self, plan: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Refresh `state` from the server. `None` means the object is gone.
    async fn read(&self, state: Self::Model) -> Result<Option<Self::Model>, ProviderError>;

    /// Apply `plan` to an existing object.
    async fn update(
        &self,
        prior: Self::Model,
        plan: Self::Model,
    ) -> Result<Self::Model, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, state: Self::Model) -> Result<(), ProviderError>;

    /// Build the initial state for an existing object from its identifier.
    ///
    /// Makes no remote call; the engine follows up with a read.
    fn import(&self, id: &str) -> Result<Self::Model, ProviderError>;
}

/// A [`Reconciler`] operating on JSON state.
#[async_trait]
pub trait Resource: Send + Sync {
    /// See [`Reconciler::create`].
    async fn create(&self, planned_state: Value) -> Result<Value, ProviderError>;
    /// See [`Reconciler::read`].
    async fn read(&self, current_state: Value) -> Result<Option<Value>, ProviderError>;
    /// See [`Reconciler::update`].
    async fn update(&self, prior_state: Value, planned_state: Value)
        -> Result<Value, ProviderError>;
    /// See [`Reconciler::delete`].
    async fn delete(&self, current_state: Value) -> Result<(), ProviderError>;
    /// See [`Reconciler::import`].
    fn import(&self, id: &str) -> Result<Value, ProviderError>;
}

fn decode<M: DeserializeOwned>(value: Value) -> Result<M, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

fn encode<M: Serialize>(model: &M) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

#[async_trait]
impl<R: Reconciler> Resource for R {
    async fn create(&self, planned_state: Value) -> Result<Value, ProviderError> {
        let state = Reconciler::create(self, decode(planned_state)?).await?;
        encode(&state)
    }

    async fn read(&self, current_state: Value) -> Result<Option<Value>, ProviderError> {
        match Reconciler::read(self, decode(current_state)?).await? {
            Some(state) => Ok(Some(encode(&state)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let state =
            Reconciler::update(self, decode(prior_state)?, decode(planned_state)?).await?;
        encode(&state)
    }

    async fn delete(&self, current_state: Value) -> Result<(), ProviderError> {
        Reconciler::delete(self, decode(current_state)?).await
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        encode(&Reconciler::import(self, id)?)
    }
}

/// Reject empty import identifiers.
pub(crate) fn require_id(id: &str) -> Result<&str, ProviderError> {
    if id.is_empty() {
        Err(ProviderError::Validation(
            "import identifier must not be empty".to_string(),
        ))
    } else {
        Ok(id)
    }
}
