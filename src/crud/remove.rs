use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Extension, Json};
use serde_json::Value;

use crate::app::AppContext;
use crate::auth::authenticate;
use crate::crud::owner_id;
use crate::error::{ApiError, RequestContext};
use crate::model::ModelDescriptor;

/// `DELETE /{model}/{item_id}`: delete an owned record and echo it back.
pub async fn remove(
    State(ctx): State<AppContext>,
    Extension(model): Extension<Arc<ModelDescriptor>>,
    uri: Uri,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&headers, &ctx.config.project_secret)?;

    let request = RequestContext::new(&uri, &headers).with_params(&item_id);

    let doc = ctx
        .store
        .find_by_id(&model.name, &item_id, &[])
        .await
        .map_err(|err| ApiError::unexpected("DELETE", request, err, StatusCode::NOT_FOUND))?
        .ok_or(ApiError::NotFound)?;

    if owner_id(&doc) != Some(subject.id.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    let deleted = ctx
        .store
        .delete_one(&model.name, &item_id)
        .await
        .map_err(|err| ApiError::unexpected("DELETE", request, err, StatusCode::NOT_FOUND))?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(Json(Value::Object(doc)))
}
