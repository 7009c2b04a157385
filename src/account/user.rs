use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use serde_json::Value;

use crate::account::{failure, strip_user};
use crate::app::AppContext;
use crate::auth::authenticate;
use crate::auth::password::hash_password;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::Document;

/// `GET /user`: the caller's own stripped profile.
pub async fn user_profile(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&headers, &ctx.config.project_secret)?;

    let request = RequestContext::new(&uri, &headers);

    let user = ctx
        .store
        .find_by_id(USERS_COLLECTION, &subject.id, &[])
        .await
        .map_err(|err| failure("GET USER", request, err, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::bad_request("No user found"))?;

    Ok(Json(strip_user(&user)))
}

/// `POST /user`: patch the caller's profile. Only `name` and `password`
/// are writable, and only when supplied.
pub async fn user_update(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&headers, &ctx.config.project_secret)?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let user = ctx
        .store
        .find_by_id(USERS_COLLECTION, &subject.id, &[])
        .await
        .map_err(|err| failure("USER UPDATE", request, err, "Failed to update user"))?
        .ok_or_else(|| ApiError::bad_request("No user found"))?;

    let mut patch = Document::new();
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        patch.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(password) = body.get("password").and_then(Value::as_str) {
        let credentials = hash_password(password);
        patch.insert("salt".to_string(), Value::String(credentials.salt));
        patch.insert(
            "hashedPassword".to_string(),
            Value::String(credentials.digest),
        );
    }

    if patch.is_empty() {
        return Ok(Json(strip_user(&user)));
    }

    let updated = ctx
        .store
        .update(USERS_COLLECTION, &subject.id, patch)
        .await
        .map_err(|err| failure("USER UPDATE", request, err, "Failed to update user"))?
        .ok_or_else(|| ApiError::bad_request("No user found"))?;

    Ok(Json(strip_user(&updated)))
}
