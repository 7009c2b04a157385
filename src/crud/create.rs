use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Extension, Json};
use serde_json::Value;

use crate::app::AppContext;
use crate::auth::authenticate;
use crate::crud::{ensure_unique, validate};
use crate::error::{ApiError, RequestContext};
use crate::model::ModelDescriptor;

/// `POST /{model}`: validate, stamp ownership, persist.
pub async fn create(
    State(ctx): State<AppContext>,
    Extension(model): Extension<Arc<ModelDescriptor>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&headers, &ctx.config.project_secret)?;

    let mut doc =
        validate::validate(&model.fields, &body, false).map_err(ApiError::validation)?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let conflicts = ensure_unique(ctx.store.as_ref(), &model, &doc, None)
        .await
        .map_err(|err| ApiError::unexpected("POST", request, err, StatusCode::BAD_REQUEST))?;
    if !conflicts.is_empty() {
        return Err(ApiError::validation(conflicts));
    }

    // Ownership is always the authenticated subject, never caller-supplied.
    doc.insert("user".to_string(), Value::String(subject.id));

    let stored = ctx
        .store
        .create(&model.name, doc)
        .await
        .map_err(|err| ApiError::unexpected("POST", request, err, StatusCode::BAD_REQUEST))?;

    Ok(Json(Value::Object(stored)))
}
