//! Supabase (PostgREST) ストア

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::error::ScraperError;
use crate::producthunt::Product;
use crate::traits::ProductStore;

use super::types::{ProductPage, ProductQuery, ProductRow};

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_COUNT: &str = "count=exact";

/// PostgREST 経由で `products` テーブルを読み書きする
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    config: StoreConfig,
    client: Client,
    endpoint: String,
}

impl SupabaseStore {
    pub fn new(config: StoreConfig) -> Result<Self, ScraperError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&config.key)
            .map_err(|e| ScraperError::Config(format!("invalid SUPABASE_KEY: {}", e)))?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|e| ScraperError::Config(format!("invalid SUPABASE_KEY: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let endpoint = format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            config.table
        );
        info!("Supabase client initialized: {}", endpoint);

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    pub fn from_env() -> Result<Self, ScraperError> {
        Self::new(StoreConfig::from_env()?)
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ScraperError> {
        let response = request.send().await?;
        Self::check(response).await
    }

    async fn check(response: Response) -> Result<Response, ScraperError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("Supabase request failed: {} {}", status, body);
        Err(ScraperError::Status { status, body })
    }

    async fn fetch_rows(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<ProductRow>, ScraperError> {
        let response = self
            .send(self.client.get(&self.endpoint).query(params))
            .await?;
        Ok(response.json().await?)
    }
}

/// `Content-Range: 0-24/573` の総件数部分
pub(crate) fn parse_total(content_range: Option<&str>) -> Option<u64> {
    content_range?.rsplit('/').next()?.trim().parse().ok()
}

/// PostgREST の予約文字を含みうる値をダブルクォートで囲む
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn day_start(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

/// 一覧クエリを PostgREST のクエリパラメータに変換
pub(crate) fn list_params(query: &ProductQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];

    if let Some(search) = &query.search {
        let pattern = quote(&format!("*{}*", search));
        params.push((
            "or",
            format!("(name.ilike.{0},tagline.ilike.{0})", pattern),
        ));
    }
    if let Some(topic) = &query.topic {
        params.push(("topics", format!("cs.{{{}}}", quote(topic))));
    }
    if let Some(start) = query.start_date {
        params.push(("launch_date", format!("gte.{}", day_start(start))));
    }
    if let Some(end) = query.end_date {
        params.push((
            "launch_date",
            format!("lt.{}", day_start(end + Duration::days(1))),
        ));
    }

    let direction = if query.descending { "desc" } else { "asc" };
    params.push(("order", format!("{}.{},id.asc", query.sort.column(), direction)));
    params.push(("limit", query.page_size.to_string()));
    params.push(("offset", query.offset().to_string()));
    params
}

#[async_trait]
impl ProductStore for SupabaseStore {
    async fn save_product(&self, product: &Product) -> Result<(), ScraperError> {
        let row = ProductRow::from_product(product, Utc::now());

        self.send(
            self.client
                .post(&self.endpoint)
                .query(&[("on_conflict", "id")])
                .header("Prefer", PREFER_UPSERT)
                .json(&row),
        )
        .await?;

        info!("Upserted product: {}", product.name);
        Ok(())
    }

    async fn products_by_date(&self, date: NaiveDate) -> Result<Vec<ProductRow>, ScraperError> {
        let params = [
            ("select", "*".to_string()),
            ("launch_date", format!("gte.{}", day_start(date))),
            (
                "launch_date",
                format!("lt.{}", day_start(date + Duration::days(1))),
            ),
            ("order", "upvotes.desc".to_string()),
        ];
        self.fetch_rows(&params).await
    }

    async fn top_products(&self, limit: usize) -> Result<Vec<ProductRow>, ScraperError> {
        let params = [
            ("select", "*".to_string()),
            ("order", "upvotes.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        self.fetch_rows(&params).await
    }

    async fn list(&self, query: &ProductQuery) -> Result<ProductPage, ScraperError> {
        let query = query.clone().normalized();
        let params = list_params(&query);
        debug!(?params, "Listing products");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .header("Prefer", PREFER_COUNT)
            .send()
            .await?;

        let total = parse_total(
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok()),
        );

        // offset が総件数を超えると PostgREST は 416 (Content-Range: */N) を返す
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!("Page {} is past the end", query.page);
            return Ok(ProductPage {
                items: Vec::new(),
                total: total.unwrap_or(0),
                page: query.page,
                page_size: query.page_size,
            });
        }

        let response = Self::check(response).await?;
        let items: Vec<ProductRow> = response.json().await?;
        let total = total.unwrap_or(query.offset() + items.len() as u64);

        Ok(ProductPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn delete_all(&self) -> Result<u64, ScraperError> {
        let response = self
            .send(
                self.client
                    .delete(&self.endpoint)
                    .query(&[("id", "neq.0")])
                    .header("Prefer", format!("return=minimal,{}", PREFER_COUNT)),
            )
            .await?;

        let count = parse_total(
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok()),
        )
        .unwrap_or(0);

        info!("Successfully cleaned database ({} rows)", count);
        Ok(count)
    }
}
