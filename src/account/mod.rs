//! Account endpoints: signup, signin, password reset, magic links, and the
//! profile routes. These live outside the generic CRUD engine because the
//! `users` collection carries credentials and single-use tokens that must
//! never pass through model validation or be echoed back to callers.

mod forgot;
mod magic_link;
mod reset;
mod signin;
mod signup;
mod user;

pub use forgot::forgot;
pub use magic_link::{magic_link_request, magic_link_signin};
pub use reset::reset;
pub use signin::signin;
pub use signup::signup;
pub use user::{user_profile, user_update};

use serde_json::{json, Value};

use crate::auth::{sign_token, Claims};
use crate::config::AppConfig;
use crate::error::{ApiError, RequestContext};
use crate::store::Document;

/// Public projection of a user record. Everything else on the record
/// (salt, digest, reset and magic-link tokens) stays server-side.
pub(crate) fn strip_user(user: &Document) -> Value {
    json!({
        "id": user.get("id"),
        "name": user.get("name"),
        "email": user.get("email"),
    })
}

/// The `{token, user}` body every successful credential exchange returns.
pub(crate) fn token_response(
    config: &AppConfig,
    user: &Document,
    failure_message: &str,
) -> Result<axum::Json<Value>, ApiError> {
    let id = user.get("id").and_then(Value::as_str).unwrap_or_default();
    let email = user.get("email").and_then(Value::as_str).unwrap_or_default();

    let claims = Claims::new(id, email, config.token_expiry_hours);
    let token = sign_token(&claims, &config.project_secret).map_err(|err| {
        tracing::error!(%err, "token signing failed");
        ApiError::bad_request(failure_message)
    })?;

    Ok(axum::Json(json!({ "token": token, "user": strip_user(user) })))
}

/// Log an unexpected account failure with full request context and surface
/// the endpoint's plain-text message.
pub(crate) fn failure(
    tag: &str,
    request: RequestContext<'_>,
    err: impl std::fmt::Display,
    message: &str,
) -> ApiError {
    tracing::error!(
        %err,
        uri = %request.uri,
        headers = ?request.headers,
        params = ?request.params,
        body = ?request.body,
        "{} failed",
        tag
    );
    ApiError::bad_request(message)
}

pub(crate) fn required_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

pub(crate) fn doc_id(doc: &Document) -> &str {
    doc.get("id").and_then(Value::as_str).unwrap_or_default()
}
