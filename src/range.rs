//! 期間スクレイプ
//!
//! 日付ごとに上位プロダクトを取得してストアへ upsert する。
//! 1日分の失敗はログに残して次の日付へ進む。

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::ScraperError;
use crate::producthunt::date_range;
use crate::traits::{ProductStore, Scraper};

#[derive(Debug, Clone, PartialEq)]
pub struct RangeOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub max_products_per_day: usize,
    pub max_total_products: usize,
    /// 日付間の待機
    pub delay: Duration,
}

impl RangeOptions {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            max_products_per_day: 20,
            max_total_products: 100,
            delay: Duration::from_secs(1),
        }
    }

    pub fn with_max_products_per_day(mut self, n: usize) -> Self {
        self.max_products_per_day = n;
        self
    }

    pub fn with_max_total_products(mut self, n: usize) -> Self {
        self.max_total_products = n;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 期間スクレイプの集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeStats {
    /// 保存に成功した件数
    pub total_products: usize,
    pub failed_saves: usize,
    pub failed_dates: Vec<NaiveDate>,
    pub date_range: DateSpan,
    pub total_dates: usize,
}

/// start..=end を1日ずつスクレイプして保存
pub async fn scrape_date_range<S, P>(
    scraper: &S,
    store: &P,
    options: &RangeOptions,
) -> RangeStats
where
    S: Scraper + ?Sized,
    P: ProductStore + ?Sized,
{
    let dates = date_range(options.start, options.end);
    let mut stats = RangeStats {
        total_products: 0,
        failed_saves: 0,
        failed_dates: Vec::new(),
        date_range: DateSpan {
            start: options.start,
            end: options.end,
        },
        total_dates: dates.len(),
    };

    if dates.is_empty() {
        warn!(
            "Empty date range: {} is after {}",
            options.start, options.end
        );
    }

    for date in dates {
        info!("Processing date: {}", date);

        if stats.total_products >= options.max_total_products {
            warn!(
                "Reached maximum total products limit ({})",
                options.max_total_products
            );
            break;
        }

        let remaining = options.max_total_products - stats.total_products;
        let limit = options.max_products_per_day.min(remaining);
        info!("Scraping products for {} (limit: {})", date, limit);

        match scrape_one_day(scraper, store, date, limit, &mut stats).await {
            Ok(0) => {
                warn!("No products found for {}", date);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error scraping products for {}: {}", date, e);
                stats.failed_dates.push(date);
                continue;
            }
        }

        if stats.total_products >= options.max_total_products {
            continue;
        }
        if !options.delay.is_zero() {
            sleep(options.delay).await;
        }
    }

    info!(
        total_products = stats.total_products,
        failed_saves = stats.failed_saves,
        failed_dates = stats.failed_dates.len(),
        "Scraping completed"
    );
    stats
}

/// 1日分を取得・保存し、取得件数を返す
async fn scrape_one_day<S, P>(
    scraper: &S,
    store: &P,
    date: NaiveDate,
    limit: usize,
    stats: &mut RangeStats,
) -> Result<usize, ScraperError>
where
    S: Scraper + ?Sized,
    P: ProductStore + ?Sized,
{
    let products = scraper.posts_by_date(date, limit).await?;

    for product in products.iter().take(limit) {
        match store.save_product(product).await {
            Ok(()) => stats.total_products += 1,
            Err(e) => {
                error!("Error upserting product {}: {}", product.name, e);
                stats.failed_saves += 1;
            }
        }
    }

    Ok(products.len())
}

/// 週の再スクレイプ結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescrapeStats {
    pub fetched: usize,
    pub deleted: u64,
    pub saved: usize,
    pub failed_saves: usize,
}

/// 指定週を取得してから全件削除し、取得分を保存し直す
///
/// 取得が空の場合は何も削除せずに返す (`fetched == 0`)。
pub async fn rescrape_week<S, P>(
    scraper: &S,
    store: &P,
    year: i32,
    week: u32,
    limit: usize,
) -> Result<RescrapeStats, ScraperError>
where
    S: Scraper + ?Sized,
    P: ProductStore + ?Sized,
{
    let products = scraper.weekly_posts(year, week, limit).await?;
    let mut stats = RescrapeStats {
        fetched: products.len(),
        ..Default::default()
    };

    if products.is_empty() {
        warn!(
            "No products found for week {} of {}, keeping existing rows",
            week, year
        );
        return Ok(stats);
    }

    stats.deleted = store.delete_all().await?;
    info!("Deleted {} existing rows", stats.deleted);

    for product in &products {
        match store.save_product(product).await {
            Ok(()) => stats.saved += 1,
            Err(e) => {
                error!("Error upserting product {}: {}", product.name, e);
                stats.failed_saves += 1;
            }
        }
    }

    info!(
        "Re-scraped week {} of {}: {} saved, {} failed",
        week, year, stats.saved, stats.failed_saves
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::producthunt::{LaunchWindow, Product};
    use crate::store::MemoryStore;
    use crate::test_support::product;

    /// 日付ごとに固定の投稿を返すスクレイパー
    #[derive(Default)]
    struct FakeScraper {
        by_date: HashMap<NaiveDate, Result<usize, ()>>,
        calls: Mutex<Vec<(NaiveDate, usize)>>,
    }

    impl FakeScraper {
        fn with(mut self, date: NaiveDate, result: Result<usize, ()>) -> Self {
            self.by_date.insert(date, result);
            self
        }
    }

    #[async_trait]
    impl Scraper for FakeScraper {
        async fn posts(
            &self,
            window: LaunchWindow,
            limit: usize,
        ) -> Result<Vec<Product>, ScraperError> {
            self.calls.lock().unwrap().push((window.start, limit));
            match self.by_date.get(&window.start) {
                Some(Ok(n)) => Ok((0..*n)
                    .map(|i| {
                        product(
                            &format!("{}-{}", window.start, i),
                            100 - i as i64,
                            &format!("{}T10:00:00Z", window.start),
                            &[],
                        )
                    })
                    .take(limit)
                    .collect()),
                Some(Err(())) => Err(ScraperError::GraphQl("rate limited".into())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    fn options(start: u32, end: u32) -> RangeOptions {
        RangeOptions::new(d(start), d(end)).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_respects_total_cap() {
        let scraper = FakeScraper::default()
            .with(d(1), Ok(20))
            .with(d(2), Ok(20))
            .with(d(3), Ok(20));
        let store = MemoryStore::new();

        let opts = options(1, 3)
            .with_max_products_per_day(4)
            .with_max_total_products(10);
        let stats = scrape_date_range(&scraper, &store, &opts).await;

        assert_eq!(stats.total_products, 10);
        assert_eq!(stats.total_dates, 3);
        assert_eq!(store.len().await, 10);
        assert_eq!(
            *scraper.calls.lock().unwrap(),
            vec![(d(1), 4), (d(2), 4), (d(3), 2)]
        );
    }

    #[tokio::test]
    async fn test_stops_fetching_once_cap_reached() {
        let scraper = FakeScraper::default()
            .with(d(1), Ok(5))
            .with(d(2), Ok(5));
        let store = MemoryStore::new();

        let opts = options(1, 2)
            .with_max_products_per_day(5)
            .with_max_total_products(5);
        let stats = scrape_date_range(&scraper, &store, &opts).await;

        assert_eq!(stats.total_products, 5);
        assert_eq!(scraper.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_and_empty_dates_are_skipped() {
        let scraper = FakeScraper::default()
            .with(d(1), Err(()))
            .with(d(3), Ok(2));
        let store = MemoryStore::new();

        let stats = scrape_date_range(&scraper, &store, &options(1, 3)).await;

        assert_eq!(stats.failed_dates, vec![d(1)]);
        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.total_dates, 3);
        assert_eq!(scraper.calls.lock().unwrap().len(), 3);
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for p in [
            product("old-1", 5, "2025-04-01T10:00:00Z", &[]),
            product("old-2", 6, "2025-04-02T10:00:00Z", &[]),
        ] {
            store.save_product(&p).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_rescrape_week_replaces_rows() {
        // 2025年第20週は 05-19 始まり
        let scraper = FakeScraper::default().with(d(19), Ok(3));
        let store = seeded_store().await;

        let stats = rescrape_week(&scraper, &store, 2025, 20, 20).await.unwrap();

        assert_eq!(
            stats,
            RescrapeStats {
                fetched: 3,
                deleted: 2,
                saved: 3,
                failed_saves: 0,
            }
        );
        let rows = store.rows().await;
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.id.starts_with("2025-05-19")));
    }

    #[tokio::test]
    async fn test_rescrape_empty_week_keeps_rows() {
        let scraper = FakeScraper::default();
        let store = seeded_store().await;

        let stats = rescrape_week(&scraper, &store, 2025, 20, 20).await.unwrap();

        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.deleted, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_rescrape_fetch_error_keeps_rows() {
        let scraper = FakeScraper::default().with(d(19), Err(()));
        let store = seeded_store().await;

        assert!(rescrape_week(&scraper, &store, 2025, 20, 20).await.is_err());
        assert!(matches!(
            rescrape_week(&scraper, &store, 2025, 53, 20).await,
            Err(ScraperError::InvalidWeek(53))
        ));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_range() {
        let scraper = FakeScraper::default();
        let store = MemoryStore::new();

        let stats = scrape_date_range(&scraper, &store, &options(5, 1)).await;
        assert_eq!(stats.total_dates, 0);
        assert_eq!(stats.total_products, 0);
        assert!(scraper.calls.lock().unwrap().is_empty());
    }
}
