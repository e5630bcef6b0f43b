//! ProductHunt 週間ランキング取得テスト
//!
//! 実行方法:
//! ```
//! PRODUCTHUNT_TOKEN=... cargo run --example weekly_test
//! ```

use chrono::{Datelike, Utc};
use producthunt_scraper::producthunt::{current_week, render_text};
use producthunt_scraper::{ProductHuntClient, Scraper, ScraperConfig};

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    dotenvy::dotenv().ok();
    let token = std::env::var("PRODUCTHUNT_TOKEN")
        .expect("PRODUCTHUNT_TOKEN environment variable not set");

    // 件数を絞り、リダイレクト解決も確認する
    let config = ScraperConfig::new(token).with_resolve_urls(true);
    let client = ProductHuntClient::new(config).expect("client");

    let today = Utc::now().date_naive();
    let (year, week) = (today.year(), current_week(today));

    println!("=== ProductHunt Weekly Test ({} week {}) ===", year, week);

    match client.weekly_posts(year, week, 5).await {
        Ok(products) => println!("{}", render_text(&products, year, week)),
        Err(e) => eprintln!("エラー: {}", e),
    }
}
