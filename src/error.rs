//! HTTP error taxonomy shared by every handler.
//!
//! Validation and auth failures are produced deliberately and returned
//! without side effects. Anything unexpected is logged once at the handler
//! boundary with the full request context and folded into a bare status so
//! internals never leak to the caller.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

#[derive(Debug)]
pub enum ApiError {
    /// 400 with a field-keyed message map as the response body.
    Validation(BTreeMap<String, String>),
    /// 400 with a plain-text message (account endpoints).
    BadRequest(String),
    /// 401. The cause is never disclosed to the caller.
    Unauthorized,
    /// 404.
    NotFound,
    /// Already logged at the boundary; surfaced as a bare status.
    Unexpected(StatusCode),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation(errors: BTreeMap<String, String>) -> Self {
        ApiError::Validation(errors)
    }

    /// One-field shorthand for the manual checks on the account paths.
    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.into());
        ApiError::Validation(errors)
    }

    /// Log an unexpected failure with the full request context, then report
    /// it as `status` with an empty body.
    pub fn unexpected(
        tag: &str,
        ctx: RequestContext<'_>,
        err: impl std::fmt::Display,
        status: StatusCode,
    ) -> Self {
        tracing::error!(
            %err,
            uri = %ctx.uri,
            headers = ?ctx.headers,
            params = ?ctx.params,
            body = ?ctx.body,
            "{} failed",
            tag
        );
        ApiError::Unexpected(status)
    }
}

/// Request details captured for boundary logging.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub params: Option<&'a str>,
    pub body: Option<&'a Value>,
}

impl<'a> RequestContext<'a> {
    pub fn new(uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            uri,
            headers,
            params: None,
            body: None,
        }
    }

    pub fn with_params(mut self, params: &'a str) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(errors) => write!(f, "validation failed: {:?}", errors),
            ApiError::BadRequest(msg) => write!(f, "{}", msg),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::NotFound => write!(f, "not found"),
            ApiError::Unexpected(status) => write!(f, "unexpected failure ({})", status),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Unexpected(status) => status.into_response(),
        }
    }
}
