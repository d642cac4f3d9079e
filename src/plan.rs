//! Schema-driven planning.
//!
//! Given the prior state and the proposed state of a resource, compute the
//! state the provider will converge to and the attribute changes it implies.
//! Immutable (force-new) attributes turn an update into a replacement.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan a change for a resource described by `schema`.
///
/// - `prior` is `None` when the resource is being created.
/// - A null `proposed` state plans a destroy.
/// - Unset attributes take their schema default, or the prior value when the
///   attribute is computed or flagged `use_state_for_unknown`.
/// - `requires_replace` is set when a force-new attribute changes on an
///   existing resource.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior_obj = prior.and_then(Value::as_object);

    let Some(proposed_obj) = proposed.as_object() else {
        return plan_destroy(prior_obj);
    };

    let mut planned = proposed_obj.clone();
    for (name, attr) in &schema.attributes {
        if !is_unset(planned.get(name)) {
            continue;
        }
        let prior_value = prior_obj
            .and_then(|p| p.get(name))
            .filter(|v| !v.is_null());

        if let Some(value) = prior_value.filter(|_| attr.use_state_for_unknown || attr.presence.is_computed())
        {
            planned.insert(name.clone(), value.clone());
        } else if let Some(default) = &attr.default {
            planned.insert(name.clone(), default.clone());
        }
    }

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for (name, attr) in &schema.attributes {
        let after = planned.get(name).filter(|v| !v.is_null());
        match prior_obj {
            None => {
                if let Some(after) = after {
                    changes.push(AttributeChange::added(name.clone(), after.clone()));
                }
            }
            Some(prior_obj) => {
                let before = prior_obj.get(name).filter(|v| !v.is_null());
                if before == after {
                    continue;
                }
                if attr.force_new {
                    requires_replace = true;
                }
                changes.push(AttributeChange::new(
                    name.clone(),
                    before.cloned(),
                    after.cloned(),
                ));
            }
        }
    }

    let planned = Value::Object(planned);
    if changes.is_empty() {
        PlanResult::no_change(planned)
    } else {
        PlanResult::with_changes(planned, changes, requires_replace)
    }
}

fn plan_destroy(prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = prior
        .map(|prior| {
            prior
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(name, v)| AttributeChange::removed(name.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn is_unset(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}
