use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Extension, Json};
use serde_json::Value;

use crate::app::AppContext;
use crate::auth::authenticate;
use crate::crud::{ensure_unique, owner_id, validate};
use crate::error::{ApiError, RequestContext};
use crate::model::ModelDescriptor;

/// `PATCH /{model}/{item_id}`: partial update of an owned record. Only
/// fields present in the body change; required fields may be omitted.
pub async fn update(
    State(ctx): State<AppContext>,
    Extension(model): Extension<Arc<ModelDescriptor>>,
    uri: Uri,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&headers, &ctx.config.project_secret)?;

    let patch = validate::validate(&model.fields, &body, true).map_err(ApiError::validation)?;

    let request = RequestContext::new(&uri, &headers)
        .with_params(&item_id)
        .with_body(&body);

    let existing = ctx
        .store
        .find_by_id(&model.name, &item_id, &[])
        .await
        .map_err(|err| {
            ApiError::unexpected("UPDATE", request, err, StatusCode::BAD_REQUEST)
        })?
        .ok_or(ApiError::NotFound)?;

    if owner_id(&existing) != Some(subject.id.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    let conflicts = ensure_unique(ctx.store.as_ref(), &model, &patch, Some(&item_id))
        .await
        .map_err(|err| {
            ApiError::unexpected("UPDATE", request, err, StatusCode::BAD_REQUEST)
        })?;
    if !conflicts.is_empty() {
        return Err(ApiError::validation(conflicts));
    }

    let updated = ctx
        .store
        .update(&model.name, &item_id, patch)
        .await
        .map_err(|err| {
            ApiError::unexpected("UPDATE DOC SAVE", request, err, StatusCode::BAD_REQUEST)
        })?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(Value::Object(updated)))
}
