use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use serde_json::Value;

use crate::account::{failure, required_str, token_response};
use crate::app::AppContext;
use crate::auth::password::hash_password;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::{Document, Filter};

/// `POST /signup`: create an account and hand back a signed token.
pub async fn signup(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let email = required_str(&body, "email")
        .ok_or_else(|| ApiError::field_error("email", "Email is required"))?;
    let name = required_str(&body, "name")
        .ok_or_else(|| ApiError::field_error("name", "Name is required"))?;
    let password = required_str(&body, "password")
        .ok_or_else(|| ApiError::field_error("password", "Password is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let existing = ctx
        .store
        .find_one(USERS_COLLECTION, &Filter::field_eq("email", email))
        .await
        .map_err(|err| failure("SIGNUP", request, err, "Failed to signup"))?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Email is already in use"));
    }

    let credentials = hash_password(password);
    let mut doc = Document::new();
    doc.insert("email".to_string(), Value::String(email.to_string()));
    doc.insert("name".to_string(), Value::String(name.to_string()));
    doc.insert("salt".to_string(), Value::String(credentials.salt));
    doc.insert(
        "hashedPassword".to_string(),
        Value::String(credentials.digest),
    );

    let user = ctx
        .store
        .create(USERS_COLLECTION, doc)
        .await
        .map_err(|err| failure("SIGNUP", request, err, "Failed to signup"))?;

    token_response(&ctx.config, &user, "Failed to signup")
}
