use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use serde_json::Value;

use crate::account::{failure, required_str, token_response};
use crate::app::AppContext;
use crate::auth::password::verify_password;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::Filter;

/// `POST /signin`: exchange email and password for a token. A wrong email
/// and a wrong password produce the same message.
pub async fn signin(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let email = required_str(&body, "email")
        .ok_or_else(|| ApiError::field_error("email", "Email is required"))?;
    let password = required_str(&body, "password")
        .ok_or_else(|| ApiError::field_error("password", "Password is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let user = ctx
        .store
        .find_one(USERS_COLLECTION, &Filter::field_eq("email", email))
        .await
        .map_err(|err| failure("SIGNIN", request, err, "Failed to signin"))?;

    let authenticated = user.as_ref().is_some_and(|user| {
        let salt = user.get("salt").and_then(Value::as_str).unwrap_or_default();
        let digest = user
            .get("hashedPassword")
            .and_then(Value::as_str)
            .unwrap_or_default();
        verify_password(password, salt, digest)
    });

    match user {
        Some(user) if authenticated => token_response(&ctx.config, &user, "Failed to signin"),
        _ => Err(ApiError::bad_request("Invalid email/password")),
    }
}
