//! Test support.
//!
//! [`ProviderTester`] runs resource lifecycles through a [`ProviderService`]
//! without starting the gRPC server. [`MemoryArango`] stands in for the
//! ArangoDB server: an [`ArangoApi`] kept in memory, with a call log and
//! injected failures.
//!
//! ```
//! use std::sync::Arc;
//! use hemmer_provider_arangodb::testing::{MemoryArango, ProviderTester};
//! use hemmer_provider_arangodb::ArangoProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(MemoryArango::new());
//! let tester = ProviderTester::new(ArangoProvider::with_client("test", api.clone()));
//!
//! let state = tester
//!     .lifecycle_create("arangodb_database", json!({"name": "mydb"}))
//!     .await
//!     .unwrap();
//! assert_eq!(state["name"], "mydb");
//! assert!(api.has_database("mydb"));
//! # });
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::arango::error::{
    ERROR_DATABASE_NOT_FOUND, ERROR_DUPLICATE_NAME, ERROR_USER_DUPLICATE, ERROR_USER_NOT_FOUND,
};
use crate::arango::{ArangoApi, ArangoError, DatabaseInfo, Grant, UserOptions, UserRecord};
use crate::error::ProviderError;
use crate::schema::{has_errors, Diagnostic};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider the way the engine does, one call at a time.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// `ValidateProviderConfig`. Warnings on success.
    pub async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, TestError> {
        warnings_or_errors(self.provider.validate_provider_config(config).await?)
    }

    /// `Configure`. Warnings on success.
    pub async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, TestError> {
        warnings_or_errors(self.provider.configure(config).await?)
    }

    /// `ValidateResourceConfig`. Warnings on success.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, TestError> {
        warnings_or_errors(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior: Option<Value>,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        let config = proposed.clone();
        self.provider
            .plan(resource_type, prior, proposed, config)
            .await
    }

    /// Plan with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, None, config).await
    }

    /// Plan a change from `prior` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, Some(prior), config).await
    }

    /// Plan the destroy of `prior`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, Some(prior), Value::Null).await
    }

    /// `Create`.
    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// `Read`. `None` means the object is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// `Update`.
    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// `Delete`.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// `ImportResourceState`.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read after an apply. The object must still exist.
    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::Validation(format!("{} vanished after apply", resource_type))
        })
    }

    /// Plan, create, then read. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let state = self.create(resource_type, plan.planned_state).await?;
        self.refresh(resource_type, state).await
    }

    /// Plan, update, then read. Returns the refreshed state.
    ///
    /// Fails with a validation error when the plan needs a replacement, since
    /// the engine would destroy and create instead of calling `Update`.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior.clone(), config)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::Validation(format!(
                "{} change requires replacement",
                resource_type
            )));
        }
        let state = self
            .update(resource_type, prior, plan.planned_state)
            .await?;
        self.refresh(resource_type, state).await
    }

    /// Plan the destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, state.clone()).await?;
        self.delete(resource_type, state).await
    }

    /// Create from `initial`, update to `updated`, then delete. Returns the
    /// state that was deleted.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let state = self
            .lifecycle_update(resource_type, created, updated)
            .await?;
        self.lifecycle_delete(resource_type, state.clone()).await?;
        Ok(state)
    }
}

/// Failure of a [`ProviderTester`] call.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s)", diagnostics.len());
    for d in diagnostics {
        out.push_str(&format!("\n  {}", d.summary));
        if let Some(attribute) = &d.attribute {
            out.push_str(&format!(" [{}]", attribute));
        }
        if let Some(detail) = &d.detail {
            out.push_str(&format!(": {}", detail));
        }
    }
    out
}

fn warnings_or_errors(diagnostics: Vec<Diagnostic>) -> Result<Vec<Diagnostic>, TestError> {
    if has_errors(&diagnostics) {
        let errors = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
        return Err(TestError::Diagnostics(errors));
    }
    Ok(diagnostics)
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Panics unless the plan has changes and no replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan has no changes");
    assert!(!plan.requires_replace, "create plan requires replacement");
}

/// Panics if the plan has changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected an empty plan, got changes to {:?}",
        changed_paths(plan)
    );
}

/// Panics unless the plan requires replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected a replacement, got an in-place plan changing {:?}",
        changed_paths(plan)
    );
}

/// Panics unless the plan has changes that apply in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "update plan has no changes");
    assert!(
        !plan.requires_replace,
        "expected an in-place update, got a replacement changing {:?}",
        changed_paths(plan)
    );
}

/// Panics unless the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "'{}' is not among the changed attributes {:?}",
        path,
        changed_paths(plan)
    );
}

/// Panics if any diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

/// Panics unless an error diagnostic's summary contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        errors.iter().any(|s| s.contains(needle)),
        "no error mentions '{}': {:?}",
        needle,
        errors
    );
}

// In-memory ArangoDB

/// A remote call recorded by [`MemoryArango`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The [`ArangoApi`] method name, e.g. `"create_user"`.
    pub operation: &'static str,
    /// The entity addressed: a database, a user, or `user/database`.
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    active: bool,
    grants: BTreeMap<String, Grant>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeSet<String>,
    users: BTreeMap<String, StoredUser>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, VecDeque<ArangoError>>,
}

/// An in-memory ArangoDB server.
///
/// Mirrors the server's error classes: missing users and databases are
/// not-found errors, duplicates are conflicts. Seeding helpers such as
/// [`add_user`](Self::add_user) are not recorded as calls.
#[derive(Debug, Default)]
pub struct MemoryArango {
    state: Mutex<State>,
}

fn user_not_found(name: &str) -> ArangoError {
    ArangoError::not_found(ERROR_USER_NOT_FOUND, format!("user '{}' not found", name))
}

fn database_not_found(name: &str) -> ArangoError {
    ArangoError::not_found(
        ERROR_DATABASE_NOT_FOUND,
        format!("database '{}' not found", name),
    )
}

impl MemoryArango {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and return the injected failure for it, if any.
    fn begin(&self, operation: &'static str, target: String) -> Result<MutexGuard<'_, State>, ArangoError> {
        let mut state = self.lock();
        state.calls.push(Call { operation, target });
        if let Some(err) = state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }

    /// Fail the next call to `operation` with `err`.
    pub fn fail_next(&self, operation: &'static str, err: ArangoError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// The operation names of every call made so far, in order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|c| c.operation).collect()
    }

    /// Seed a database.
    pub fn add_database(&self, name: &str) {
        self.lock().databases.insert(name.to_string());
    }

    /// Seed a user.
    pub fn add_user(&self, name: &str, password: &str, active: bool) {
        self.lock().users.insert(
            name.to_string(),
            StoredUser {
                password: password.to_string(),
                active,
                grants: BTreeMap::new(),
            },
        );
    }

    /// Seed a grant. The user must have been seeded.
    pub fn add_grant(&self, user: &str, database: &str, grant: Grant) {
        if let Some(stored) = self.lock().users.get_mut(user) {
            stored.grants.insert(database.to_string(), grant);
        }
    }

    /// Whether the database exists.
    pub fn has_database(&self, name: &str) -> bool {
        self.lock().databases.contains(name)
    }

    /// The stored password of a user.
    pub fn password(&self, user: &str) -> Option<String> {
        self.lock().users.get(user).map(|u| u.password.clone())
    }

    /// The active flag of a user.
    pub fn user_active(&self, user: &str) -> Option<bool> {
        self.lock().users.get(user).map(|u| u.active)
    }

    /// The explicit grant of a user on a database.
    pub fn grant(&self, user: &str, database: &str) -> Option<Grant> {
        self.lock()
            .users
            .get(user)
            .and_then(|u| u.grants.get(database).copied())
    }
}

#[async_trait]
impl ArangoApi for MemoryArango {
    async fn create_database(&self, name: &str) -> Result<(), ArangoError> {
        let mut state = self.begin("create_database", name.to_string())?;
        if state.databases.contains(name) {
            return Err(ArangoError::conflict(
                ERROR_DUPLICATE_NAME,
                format!("duplicate database name '{}'", name),
            ));
        }
        state.databases.insert(name.to_string());
        Ok(())
    }

    async fn database(&self, name: &str) -> Result<DatabaseInfo, ArangoError> {
        let state = self.begin("database", name.to_string())?;
        if state.databases.contains(name) {
            Ok(DatabaseInfo {
                name: name.to_string(),
            })
        } else {
            Err(database_not_found(name))
        }
    }

    async fn remove_database(&self, name: &str) -> Result<(), ArangoError> {
        let mut state = self.begin("remove_database", name.to_string())?;
        if !state.databases.remove(name) {
            return Err(database_not_found(name));
        }
        for user in state.users.values_mut() {
            user.grants.remove(name);
        }
        Ok(())
    }

    async fn user(&self, name: &str) -> Result<UserRecord, ArangoError> {
        let state = self.begin("user", name.to_string())?;
        state
            .users
            .get(name)
            .map(|u| UserRecord {
                user: name.to_string(),
                active: u.active,
            })
            .ok_or_else(|| user_not_found(name))
    }

    async fn create_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError> {
        let mut state = self.begin("create_user", name.to_string())?;
        if state.users.contains_key(name) {
            return Err(ArangoError::conflict(
                ERROR_USER_DUPLICATE,
                format!("duplicate user '{}'", name),
            ));
        }
        let active = options.active.unwrap_or(true);
        state.users.insert(
            name.to_string(),
            StoredUser {
                password: options.password.clone(),
                active,
                grants: BTreeMap::new(),
            },
        );
        Ok(UserRecord {
            user: name.to_string(),
            active,
        })
    }

    async fn update_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError> {
        let mut state = self.begin("update_user", name.to_string())?;
        let user = state.users.get_mut(name).ok_or_else(|| user_not_found(name))?;
        user.password = options.password.clone();
        if let Some(active) = options.active {
            user.active = active;
        }
        Ok(UserRecord {
            user: name.to_string(),
            active: user.active,
        })
    }

    async fn remove_user(&self, name: &str) -> Result<(), ArangoError> {
        let mut state = self.begin("remove_user", name.to_string())?;
        state
            .users
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| user_not_found(name))
    }

    async fn database_access(&self, user: &str, database: &str) -> Result<Grant, ArangoError> {
        let state = self.begin("database_access", format!("{}/{}", user, database))?;
        let stored = state.users.get(user).ok_or_else(|| user_not_found(user))?;
        if !state.databases.contains(database) {
            return Err(database_not_found(database));
        }
        Ok(stored.grants.get(database).copied().unwrap_or(Grant::None))
    }

    async fn set_database_access(
        &self,
        user: &str,
        database: &str,
        grant: Grant,
    ) -> Result<(), ArangoError> {
        let mut state = self.begin("set_database_access", format!("{}/{}", user, database))?;
        if !state.databases.contains(database) {
            return Err(database_not_found(database));
        }
        let stored = state.users.get_mut(user).ok_or_else(|| user_not_found(user))?;
        stored.grants.insert(database.to_string(), grant);
        Ok(())
    }

    async fn remove_database_access(
        &self,
        user: &str,
        database: &str,
    ) -> Result<(), ArangoError> {
        let mut state = self.begin("remove_database_access", format!("{}/{}", user, database))?;
        if !state.databases.contains(database) {
            return Err(database_not_found(database));
        }
        let stored = state.users.get_mut(user).ok_or_else(|| user_not_found(user))?;
        stored.grants.remove(database);
        Ok(())
    }
}
