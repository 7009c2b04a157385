use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::account::{doc_id, failure, required_str, token_response};
use crate::app::AppContext;
use crate::auth::password::hash_password;
use crate::email::Email;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::{Condition, Document, Filter};

/// `POST /reset`: consume a reset token and install a new password.
pub async fn reset(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let password = required_str(&body, "password")
        .ok_or_else(|| ApiError::field_error("password", "Password is required"))?;
    let token = required_str(&body, "token")
        .ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let filter = Filter::new()
        .with(
            "resetPasswordToken",
            Condition::Eq(Value::String(token.to_string())),
        )
        .with("resetPasswordExpires", Condition::Gt(Value::String(now)));

    let user = ctx
        .store
        .find_one(USERS_COLLECTION, &filter)
        .await
        .map_err(|err| failure("RESET", request, err, "Failed to reset"))?
        .ok_or_else(|| {
            ApiError::bad_request("Password reset token is invalid or has expired.")
        })?;

    let credentials = hash_password(password);
    let mut patch = Document::new();
    patch.insert("salt".to_string(), Value::String(credentials.salt));
    patch.insert(
        "hashedPassword".to_string(),
        Value::String(credentials.digest),
    );
    patch.insert("resetPasswordToken".to_string(), Value::Null);
    patch.insert("resetPasswordExpires".to_string(), Value::Null);

    let updated = ctx
        .store
        .update(USERS_COLLECTION, doc_id(&user), patch)
        .await
        .map_err(|err| failure("RESET", request, err, "Failed to reset"))?
        .ok_or_else(|| ApiError::bad_request("Failed to reset"))?;

    // Confirmation delivery failures are logged but never block the reset.
    let email = updated
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = format!(
        "This is a confirmation that the password for your account {} has just been \
         changed. If this was not you please contact us as soon as possible.",
        email
    );
    if let Err(err) = ctx
        .mailer
        .send(&Email {
            to: email,
            subject: "Password Reset Confirmation".to_string(),
            message,
        })
        .await
    {
        tracing::error!(%err, uri = %uri, "RESET email send failed");
    }

    token_response(&ctx.config, &updated, "Failed to reset")
}
