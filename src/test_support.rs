//! テスト共通ヘルパー

use std::time::Duration;

use crate::config::ScraperConfig;
use crate::producthunt::{Maker, Product};

/// リトライ待機を短くし、リダイレクト解決を無効にした設定
pub(crate) fn test_config(api_url: &str) -> ScraperConfig {
    ScraperConfig::new("test-token")
        .with_api_url(api_url)
        .with_resolve_urls(false)
        .with_redirect_delay(Duration::ZERO)
        .with_retries(3, Duration::from_millis(1))
}

pub(crate) fn sample_product() -> Product {
    Product {
        id: "1".into(),
        name: "Widget".into(),
        tagline: "Does widget things".into(),
        description: String::new(),
        url: "https://www.producthunt.com/posts/widget".into(),
        website_url: "https://widget.io/".into(),
        product_url: "https://producthunt.com/products/widget".into(),
        thumbnail_url: String::new(),
        launch_date: "2025-05-12T07:01:00Z".into(),
        upvotes: 420,
        comments_count: 12,
        makers: vec![Maker::new("Ada", "ada"), Maker::new("Bob", "")],
        topics: vec!["Productivity".into(), "AI".into()],
    }
}

/// id / 得票数 / ローンチ日 / トピックを指定したプロダクト
pub(crate) fn product(id: &str, upvotes: i64, launch_date: &str, topics: &[&str]) -> Product {
    Product {
        id: id.into(),
        name: format!("Product {}", id),
        tagline: format!("tagline {}", id),
        upvotes,
        launch_date: launch_date.into(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        makers: Vec::new(),
        ..sample_product()
    }
}
