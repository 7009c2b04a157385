use std::sync::Arc;

use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppContext;
use crate::auth::authenticate;
use crate::crud::{build_populates, query};
use crate::error::{ApiError, RequestContext};
use crate::model::{AccessLevel, ModelDescriptor};
use crate::store::{Condition, FindOptions};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;
const DEFAULT_ORDER: &str = "lastUpdated";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    page: Option<String>,
    page_size: Option<String>,
    order_by: Option<String>,
    select: Option<String>,
    populate: Option<String>,
    #[serde(rename = "where")]
    where_clause: Option<String>,
}

/// `GET /{model}`: filtered, paginated listing in a result envelope.
pub async fn find_many(
    State(ctx): State<AppContext>,
    Extension(model): Extension<Arc<ModelDescriptor>>,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    // PUBLIC models are readable without a token; everything else scopes
    // the listing to the caller's own records.
    let subject = match model.access {
        AccessLevel::Public => None,
        _ => Some(authenticate(&headers, &ctx.config.project_secret)?),
    };

    let page = parse_positive(params.page.as_deref(), 1);
    let page_size =
        parse_positive(params.page_size.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let order_by = params
        .order_by
        .clone()
        .unwrap_or_else(|| DEFAULT_ORDER.to_string());

    let where_value = match params.where_clause.as_deref() {
        None | Some("") => json!({}),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ApiError::field_error("where", "where must be an object"))?,
    };
    if !where_value.is_object() {
        return Err(ApiError::field_error("where", "where must be an object"));
    }

    let mut filter = query::compile(&model.fields, &where_value);
    if let Some(subject) = &subject {
        filter.insert("user", Condition::Eq(Value::String(subject.id.clone())));
    }

    let populate_keys = split_list(params.populate.as_deref());
    let options = FindOptions {
        order_by: Some(order_by.clone()),
        select: split_list(params.select.as_deref()),
        skip: (page - 1).saturating_mul(page_size) as u64,
        limit: Some(page_size as u64),
        populate: build_populates(&populate_keys, &model),
    };

    let raw_query = raw_query.unwrap_or_default();
    let request = RequestContext::new(&uri, &headers).with_params(&raw_query);

    let results = ctx
        .store
        .find(&model.name, &filter, &options)
        .await
        .map_err(|err| ApiError::unexpected("FIND", request, err, StatusCode::NOT_FOUND))?;

    // Total ignores pagination so clients can page through everything.
    let total = ctx
        .store
        .count_documents(&model.name, &filter)
        .await
        .map_err(|err| ApiError::unexpected("FIND", request, err, StatusCode::NOT_FOUND))?;

    Ok(Json(json!({
        "results": results,
        "page": page,
        "pageSize": page_size,
        "orderBy": order_by,
        "total": total,
    })))
}

/// Lenient integer parsing: anything unparseable or below 1 falls back.
fn parse_positive(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

/// Comma- or space-delimited list parameter (`select`, `populate`).
fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|v| {
        v.split(|c: char| c == ',' || c.is_whitespace())
            .map(|part| part.to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
