use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Json;
use serde_json::Value;

use crate::account::{doc_id, required_str};
use crate::app::AppContext;
use crate::auth::password::{one_hour_expiry, single_use_token};
use crate::email::Email;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::{Document, Filter};

/// `POST /forgot`: issue a single-use reset token and email the link.
pub async fn forgot(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<String, ApiError> {
    let email = required_str(&body, "email")
        .ok_or_else(|| ApiError::bad_request("Email is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let user = ctx
        .store
        .find_one(USERS_COLLECTION, &Filter::field_eq("email", email))
        .await
        .map_err(|err| {
            ApiError::unexpected("FORGOT", request, err, StatusCode::BAD_REQUEST)
        })?
        // Wording stays vague so the endpoint cannot be used to probe
        // which addresses have accounts.
        .ok_or_else(|| ApiError::bad_request("Failed to reset password"))?;

    let token = single_use_token();
    let mut patch = Document::new();
    patch.insert(
        "resetPasswordToken".to_string(),
        Value::String(token.clone()),
    );
    patch.insert(
        "resetPasswordExpires".to_string(),
        Value::String(one_hour_expiry()),
    );

    ctx.store
        .update(USERS_COLLECTION, doc_id(&user), patch)
        .await
        .map_err(|err| {
            ApiError::unexpected("FORGOT", request, err, StatusCode::BAD_REQUEST)
        })?;

    let message = format!(
        "You've requested a password reset. If this wasn't you ignore this email. \
         <a href=\"{}?token={}\">Reset your password</a>",
        ctx.config.project_url, token
    );
    ctx.mailer
        .send(&Email {
            to: email.to_string(),
            subject: "Password reset instructions".to_string(),
            message,
        })
        .await
        .map_err(|err| {
            ApiError::unexpected("FORGOT", request, err, StatusCode::BAD_REQUEST)
        })?;

    Ok("Check your email for password reset instructions".to_string())
}
