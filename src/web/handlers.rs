use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::ScraperError;
use crate::producthunt::parse_date;
use crate::store::{ProductQuery, SortField, DEFAULT_PAGE_SIZE};

use super::launcher::{LaunchError, ScrapeArgs};
use super::render;
use super::AppState;

const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 100;

/// JSONエラーレスポンス
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ScraperError> for ApiError {
    fn from(e: ScraperError) -> Self {
        let status = match &e {
            ScraperError::InvalidDate(_) | ScraperError::InvalidWeek(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("Store request failed: {}", e);
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<LaunchError> for ApiError {
    fn from(e: LaunchError) -> Self {
        let status = match &e {
            LaunchError::AlreadyRunning(_) => StatusCode::CONFLICT,
            LaunchError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// 一覧のクエリパラメータ（HTMLフォームの空欄を許容するため文字列で受ける）
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    pub topic: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
    /// asc / desc
    pub order: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn optional_date(value: &Option<String>) -> Result<Option<NaiveDate>, ScraperError> {
    non_empty(value).map(parse_date).transpose()
}

impl ListParams {
    pub(crate) fn to_query(&self) -> Result<ProductQuery, ApiError> {
        let page = match non_empty(&self.page) {
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| ApiError::bad_request(format!("invalid page: {}", v)))?,
            None => 1,
        };
        let page_size = match non_empty(&self.page_size) {
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| ApiError::bad_request(format!("invalid page_size: {}", v)))?,
            None => DEFAULT_PAGE_SIZE,
        };
        let sort = match non_empty(&self.sort) {
            Some(v) => v
                .parse::<SortField>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
            None => SortField::default(),
        };
        let descending = match non_empty(&self.order) {
            None | Some("desc") => true,
            Some("asc") => false,
            Some(other) => return Err(ApiError::bad_request(format!("invalid order: {}", other))),
        };

        let query = ProductQuery {
            page,
            page_size,
            search: non_empty(&self.search).map(str::to_string),
            topic: non_empty(&self.topic).map(str::to_string),
            start_date: optional_date(&self.start_date)?,
            end_date: optional_date(&self.end_date)?,
            sort,
            descending,
        };
        Ok(query.normalized())
    }
}

pub(crate) async fn healthz_handler() -> &'static str {
    "ok"
}

pub(crate) async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, ApiError> {
    let query = params.to_query()?;
    let page = state.store.list(&query).await?;
    let status = state.launcher.status();
    Ok(Html(render::products_page(&page, &params, &status)))
}

pub(crate) async fn list_products_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let query = params.to_query()?;
    let page = state.store.list(&query).await?;
    Ok(Json(page).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TopParams {
    limit: Option<usize>,
}

pub(crate) async fn top_products_handler(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Result<Response, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(1, MAX_TOP_LIMIT);
    let rows = state.store.top_products(limit).await?;
    Ok(Json(rows).into_response())
}

/// 再スクレイプ要求。日付省略時は今日
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TriggerRequest {
    start_date: Option<String>,
    end_date: Option<String>,
    max_products_per_day: Option<usize>,
    max_total_products: Option<usize>,
}

impl TriggerRequest {
    fn to_args(&self) -> Result<ScrapeArgs, ApiError> {
        let today = Utc::now().date_naive();
        let start = optional_date(&self.start_date)?.unwrap_or(today);
        let end = optional_date(&self.end_date)?.unwrap_or(start);
        if start > end {
            return Err(ApiError::bad_request(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }

        Ok(ScrapeArgs {
            start_date: start,
            end_date: end,
            max_products_per_day: self.max_products_per_day,
            max_total_products: self.max_total_products,
        })
    }
}

pub(crate) async fn trigger_scrape_handler(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Result<Response, ApiError> {
    let args = request.to_args()?;
    let job = state.launcher.launch(args)?;
    Ok((StatusCode::ACCEPTED, Json(job)).into_response())
}

/// HTMLフォームからの再スクレイプ。起動後は一覧に戻す
pub(crate) async fn trigger_scrape_form_handler(
    State(state): State<AppState>,
    Form(request): Form<TriggerRequest>,
) -> Result<Redirect, ApiError> {
    let args = request.to_args()?;
    if let Err(e) = state.launcher.launch(args) {
        warn!("Re-scrape not started: {}", e);
        if matches!(e, LaunchError::Spawn(_)) {
            return Err(e.into());
        }
    }
    Ok(Redirect::to("/"))
}

pub(crate) async fn scrape_status_handler(State(state): State<AppState>) -> Response {
    Json(state.launcher.status()).into_response()
}
