use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ScraperError;
use crate::producthunt::{LaunchWindow, Product};
use crate::store::{ProductPage, ProductQuery, ProductRow};

#[async_trait]
pub trait Scraper: Send + Sync {
    /// 期間内の投稿を得票順に最大 limit 件取得
    async fn posts(&self, window: LaunchWindow, limit: usize)
        -> Result<Vec<Product>, ScraperError>;

    /// 1日分
    async fn posts_by_date(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Product>, ScraperError> {
        self.posts(LaunchWindow::day(date), limit).await
    }

    /// 1週間分（週番号 1〜52）
    async fn weekly_posts(
        &self,
        year: i32,
        week: u32,
        limit: usize,
    ) -> Result<Vec<Product>, ScraperError> {
        let window = LaunchWindow::week(year, week)?;
        self.posts(window, limit).await
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// id をキーに挿入または更新
    async fn save_product(&self, product: &Product) -> Result<(), ScraperError>;

    /// 指定日にローンチしたプロダクト（得票順）
    async fn products_by_date(&self, date: NaiveDate) -> Result<Vec<ProductRow>, ScraperError>;

    /// 得票数上位
    async fn top_products(&self, limit: usize) -> Result<Vec<ProductRow>, ScraperError>;

    /// 一覧表示用のページ取得
    async fn list(&self, query: &ProductQuery) -> Result<ProductPage, ScraperError>;

    /// 全件削除。削除件数を返す
    async fn delete_all(&self) -> Result<u64, ScraperError>;
}
