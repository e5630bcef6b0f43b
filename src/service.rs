use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::NaiveDate;
use tower::Service;
use tracing::info;

use crate::range::{scrape_date_range, RangeOptions, RangeStats};
use crate::traits::{ProductStore, Scraper};

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_products_per_day: usize,
    pub max_total_products: usize,
    pub delay: Duration,
}

impl ScrapeRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            max_products_per_day: 20,
            max_total_products: 100,
            delay: Duration::from_secs(1),
        }
    }

    /// 1日分のみ
    pub fn single_day(date: NaiveDate) -> Self {
        Self::new(date, date)
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

impl From<ScrapeRequest> for RangeOptions {
    fn from(req: ScrapeRequest) -> Self {
        RangeOptions {
            start: req.start_date,
            end: req.end_date,
            max_products_per_day: req.max_products_per_day,
            max_total_products: req.max_total_products,
            delay: req.delay,
        }
    }
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// 期間内の投稿を取得してストアへ保存し、集計を返す。
/// 日付単位の失敗は集計に記録されるため、サービス自体は失敗しない。
pub struct ScraperService<S: ?Sized, P: ?Sized> {
    scraper: Arc<S>,
    store: Arc<P>,
}

impl<S: ?Sized, P: ?Sized> Clone for ScraperService<S, P> {
    fn clone(&self) -> Self {
        Self {
            scraper: Arc::clone(&self.scraper),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ?Sized, P: ?Sized> ScraperService<S, P> {
    pub fn new(scraper: Arc<S>, store: Arc<P>) -> Self {
        Self { scraper, store }
    }

    pub fn store(&self) -> &Arc<P> {
        &self.store
    }
}

impl<S, P> Service<ScrapeRequest> for ScraperService<S, P>
where
    S: Scraper + ?Sized + 'static,
    P: ProductStore + ?Sized + 'static,
{
    type Response = RangeStats;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "Scrape request received: {} .. {}",
            req.start_date, req.end_date
        );

        let scraper = Arc::clone(&self.scraper);
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            let options: RangeOptions = req.into();
            let stats = scrape_date_range(scraper.as_ref(), store.as_ref(), &options).await;

            info!(
                "Scrape finished: {} products over {} dates",
                stats.total_products, stats.total_dates
            );
            Ok(stats)
        })
    }
}
