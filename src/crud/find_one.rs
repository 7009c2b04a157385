use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppContext;
use crate::auth::authenticate;
use crate::crud::{build_populates, owner_id};
use crate::error::{ApiError, RequestContext};
use crate::model::{AccessLevel, ModelDescriptor};

#[derive(Debug, Default, Deserialize)]
pub struct GetParams {
    populate: Option<String>,
}

/// `GET /{model}/{item_id}`: fetch one record, owner-scoped unless the
/// model is PUBLIC. Missing record wins over the ownership check so a 404
/// never turns into a misleading 401.
pub async fn find_one(
    State(ctx): State<AppContext>,
    Extension(model): Extension<Arc<ModelDescriptor>>,
    uri: Uri,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Query(params): Query<GetParams>,
) -> Result<Json<Value>, ApiError> {
    let subject = match model.access {
        AccessLevel::Public => None,
        _ => Some(authenticate(&headers, &ctx.config.project_secret)?),
    };

    let populate_keys: Vec<String> = params
        .populate
        .as_deref()
        .map(|v| {
            v.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let populates = build_populates(&populate_keys, &model);

    let request = RequestContext::new(&uri, &headers).with_params(&item_id);

    let doc = ctx
        .store
        .find_by_id(&model.name, &item_id, &populates)
        .await
        .map_err(|err| ApiError::unexpected("FIND", request, err, StatusCode::NOT_FOUND))?
        .ok_or(ApiError::NotFound)?;

    if let Some(subject) = &subject {
        if owner_id(&doc) != Some(subject.id.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }

    Ok(Json(Value::Object(doc)))
}
