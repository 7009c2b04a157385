//! Generic CRUD engine: five handlers parameterized over a model
//! descriptor, registered once per model at startup. Handlers are stateless
//! across requests; all shared state lives in the storage collaborator.

pub mod create;
pub mod find_many;
pub mod find_one;
pub mod query;
pub mod remove;
pub mod update;
pub mod validate;

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router};
use serde_json::Value;

use crate::app::AppContext;
use crate::model::{ModelDescriptor, USERS_COLLECTION};
use crate::store::{Condition, Datastore, Document, Filter, Populate, StoreError};

use validate::FieldErrors;

/// Routes for one model, with the descriptor injected so every handler
/// receives it by reference instead of inspecting anything at runtime.
pub fn model_routes(model: &Arc<ModelDescriptor>) -> Router<AppContext> {
    Router::new()
        .route(
            &format!("/{}", model.name),
            get(find_many::find_many).post(create::create),
        )
        .route(
            &format!("/{}/:item_id", model.name),
            get(find_one::find_one)
                .patch(update::update)
                .delete(remove::remove),
        )
        .layer(Extension(model.clone()))
}

/// Resolve populate keys into storage populate specs. `user` always expands
/// into the account collection with a profile projection; other keys must
/// name a declared reference field.
pub(crate) fn build_populates(keys: &[String], model: &ModelDescriptor) -> Vec<Populate> {
    keys.iter()
        .filter_map(|key| {
            if key == "user" {
                return Some(Populate {
                    field: "user".to_string(),
                    collection: USERS_COLLECTION.to_string(),
                    select: Some(
                        ["name", "email", "lastUpdated", "createdAt"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    ),
                });
            }

            let target = model.fields.get(key)?.reference_type.as_deref()?;
            Some(Populate {
                field: key.clone(),
                collection: target.to_string(),
                select: None,
            })
        })
        .collect()
}

/// Best-effort uniqueness enforcement for fields marked `opts.unique`.
///
/// Check-then-act against storage: two concurrent creates of the same value
/// can both pass. A backend with a real unique index is needed for a hard
/// guarantee.
pub(crate) async fn ensure_unique(
    store: &dyn Datastore,
    model: &ModelDescriptor,
    value: &Document,
    exclude_id: Option<&str>,
) -> Result<FieldErrors, StoreError> {
    let mut errors = FieldErrors::new();

    for (name, descriptor) in &model.fields {
        if !descriptor.opts.unique {
            continue;
        }
        let Some(candidate) = value.get(name) else {
            continue;
        };
        if candidate.is_null() {
            continue;
        }

        let filter = Filter::new().with(name.clone(), Condition::Eq(candidate.clone()));
        if let Some(existing) = store.find_one(&model.name, &filter).await? {
            let own = exclude_id
                .is_some_and(|id| existing.get("id").and_then(Value::as_str) == Some(id));
            if !own {
                errors.insert(name.clone(), format!("{} must be unique", name));
            }
        }
    }

    Ok(errors)
}

/// Owner subject id of a record. Handles both the raw stored form (an id
/// string) and a populated owner (an embedded document).
pub(crate) fn owner_id(doc: &Document) -> Option<&str> {
    match doc.get("user") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Object(user)) => user.get("id").and_then(Value::as_str),
        _ => None,
    }
}
