use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::account::{doc_id, failure, required_str, token_response};
use crate::app::AppContext;
use crate::auth::password::{one_hour_expiry, single_use_token};
use crate::email::Email;
use crate::error::{ApiError, RequestContext};
use crate::model::USERS_COLLECTION;
use crate::store::{Condition, Document, Filter};

/// `POST /magiclink_request`: passwordless entry point. Unknown addresses
/// get an account created on the spot, so the flow doubles as signup.
pub async fn magic_link_request(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<String, ApiError> {
    let email = required_str(&body, "email")
        .ok_or_else(|| ApiError::bad_request("Email is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);
    let unexpected = |err: crate::store::StoreError| {
        ApiError::unexpected("MAGICLINK-REQUEST", request, err, StatusCode::BAD_REQUEST)
    };

    let user = match ctx
        .store
        .find_one(USERS_COLLECTION, &Filter::field_eq("email", email))
        .await
        .map_err(unexpected)?
    {
        Some(user) => user,
        None => {
            let mut doc = Document::new();
            doc.insert("email".to_string(), Value::String(email.to_string()));
            ctx.store
                .create(USERS_COLLECTION, doc)
                .await
                .map_err(unexpected)?
        }
    };

    let token = single_use_token();
    let mut patch = Document::new();
    patch.insert("magicLinkToken".to_string(), Value::String(token.clone()));
    patch.insert(
        "magicLinkExpires".to_string(),
        Value::String(one_hour_expiry()),
    );

    ctx.store
        .update(USERS_COLLECTION, doc_id(&user), patch)
        .await
        .map_err(unexpected)?;

    let message = format!(
        "Follow this link to <a href=\"{}?magiclink={}\">login</a>",
        ctx.config.project_url, token
    );
    ctx.mailer
        .send(&Email {
            to: email.to_string(),
            subject: "Magic Link".to_string(),
            message,
        })
        .await
        .map_err(|err| {
            ApiError::unexpected("MAGICLINK-REQUEST", request, err, StatusCode::BAD_REQUEST)
        })?;

    Ok("Check your email for magic link".to_string())
}

/// `POST /magiclink_signin`: consume a magic-link token for a session token.
pub async fn magic_link_signin(
    State(ctx): State<AppContext>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let token = required_str(&body, "token")
        .ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let request = RequestContext::new(&uri, &headers).with_body(&body);

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let filter = Filter::new()
        .with(
            "magicLinkToken",
            Condition::Eq(Value::String(token.to_string())),
        )
        .with("magicLinkExpires", Condition::Gt(Value::String(now)));

    let user = ctx
        .store
        .find_one(USERS_COLLECTION, &filter)
        .await
        .map_err(|err| failure("MAGICLINK-SIGNIN", request, err, "Failed to signin"))?
        .ok_or_else(|| ApiError::bad_request("Magic link is invalid or has expired."))?;

    let mut patch = Document::new();
    patch.insert("magicLinkToken".to_string(), Value::Null);
    patch.insert("magicLinkExpires".to_string(), Value::Null);

    let updated = ctx
        .store
        .update(USERS_COLLECTION, doc_id(&user), patch)
        .await
        .map_err(|err| failure("MAGICLINK-SIGNIN", request, err, "Failed to signin"))?
        .ok_or_else(|| ApiError::bad_request("Failed to signin"))?;

    token_response(&ctx.config, &updated, "Failed to signin")
}
