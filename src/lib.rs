//! ProductHunt スクレイパーライブラリ
//!
//! - ProductHunt GraphQL API から期間内の上位プロダクトを取得
//! - Supabase (PostgREST) へ upsert
//! - 保存済みプロダクトを一覧表示するWebフロント
//!
//! # 期間スクレイプ使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use producthunt_scraper::{ProductHuntClient, ScrapeRequest, ScraperService, SupabaseStore};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ProductHuntClient::from_env().unwrap();
//!     let store = SupabaseStore::from_env().unwrap();
//!     let mut service = ScraperService::new(Arc::new(client), Arc::new(store));
//!
//!     let start = chrono::NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
//!     let end = chrono::NaiveDate::from_ymd_opt(2025, 5, 7).unwrap();
//!     let stats = service.call(ScrapeRequest::new(start, end)).await.unwrap();
//!     println!("saved: {}", stats.total_products);
//! }
//! ```
//!
//! # 週間ランキング取得例
//!
//! ```rust,ignore
//! use producthunt_scraper::{ProductHuntClient, Scraper, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ProductHuntClient::new(ScraperConfig::new("token")).unwrap();
//!     let products = client.weekly_posts(2025, 20, 20).await.unwrap();
//!     println!("Products: {}", products.len());
//! }
//! ```

pub mod config;
pub mod error;
pub mod producthunt;
pub mod range;
pub mod service;
pub mod store;
pub mod traits;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;

// 主要な型をリエクスポート
pub use config::{ScraperConfig, StoreConfig};
pub use error::ScraperError;
pub use producthunt::{LaunchWindow, Maker, OutputFormat, Product, ProductHuntClient};
pub use range::{rescrape_week, scrape_date_range, RangeOptions, RangeStats, RescrapeStats};
pub use service::{ScrapeRequest, ScraperService};
pub use store::{MemoryStore, ProductPage, ProductQuery, ProductRow, SupabaseStore};
pub use traits::{ProductStore, Scraper};
