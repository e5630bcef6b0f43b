//! プロセス内ストア (dry-run / テスト用)

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ScraperError;
use crate::producthunt::Product;
use crate::traits::ProductStore;

use super::types::{ProductPage, ProductQuery, ProductRow, SortField};

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, ProductRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// 全行 (得票順)
    pub async fn rows(&self) -> Vec<ProductRow> {
        let mut rows: Vec<ProductRow> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| compare(a, b, SortField::Upvotes, true));
        rows
    }
}

fn matches(row: &ProductRow, query: &ProductQuery) -> bool {
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        let hit = row.name.to_lowercase().contains(&needle)
            || row
                .tagline
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }

    if let Some(topic) = &query.topic {
        if !row.topics.iter().any(|t| t == topic) {
            return false;
        }
    }

    if query.start_date.is_some() || query.end_date.is_some() {
        let Some(day) = row.launch_day() else {
            return false;
        };
        if query.start_date.is_some_and(|start| day < start) {
            return false;
        }
        if query.end_date.is_some_and(|end| day > end) {
            return false;
        }
    }

    true
}

fn compare(a: &ProductRow, b: &ProductRow, sort: SortField, descending: bool) -> Ordering {
    let ord = match sort {
        SortField::Upvotes => a.upvotes.cmp(&b.upvotes),
        SortField::LaunchDate => a.launch_date.cmp(&b.launch_date),
        SortField::Name => a.name.cmp(&b.name),
    };
    let ord = if descending { ord.reverse() } else { ord };
    // 同順位は id で安定させる
    ord.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn save_product(&self, product: &Product) -> Result<(), ScraperError> {
        let now = Utc::now();
        let mut row = ProductRow::from_product(product, now);

        let mut rows = self.rows.write().await;
        row.created_at = rows
            .get(&row.id)
            .and_then(|existing| existing.created_at)
            .or(Some(now));
        rows.insert(row.id.clone(), row);

        info!("Upserted product: {}", product.name);
        Ok(())
    }

    async fn products_by_date(&self, date: NaiveDate) -> Result<Vec<ProductRow>, ScraperError> {
        let query = ProductQuery::default().with_dates(Some(date), Some(date));
        let rows = self.rows.read().await;
        let mut hits: Vec<ProductRow> = rows
            .values()
            .filter(|row| matches(row, &query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| compare(a, b, SortField::Upvotes, true));
        Ok(hits)
    }

    async fn top_products(&self, limit: usize) -> Result<Vec<ProductRow>, ScraperError> {
        let mut rows = self.rows().await;
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list(&self, query: &ProductQuery) -> Result<ProductPage, ScraperError> {
        let query = query.clone().normalized();
        let rows = self.rows.read().await;

        let mut hits: Vec<&ProductRow> = rows.values().filter(|row| matches(row, &query)).collect();
        hits.sort_by(|a, b| compare(a, b, query.sort, query.descending));

        let total = hits.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = hits
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok(ProductPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn delete_all(&self) -> Result<u64, ScraperError> {
        let mut rows = self.rows.write().await;
        let count = rows.len() as u64;
        rows.clear();
        info!("Deleted {} products", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortField;
    use crate::test_support::product;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for p in [
            product("1", 50, "2025-05-12T07:00:00Z", &["AI"]),
            product("2", 300, "2025-05-12T09:30:00Z", &["AI", "Productivity"]),
            product("3", 120, "2025-05-13T01:00:00Z", &["Design"]),
            product("4", 10, "2025-05-15T12:00:00Z", &[]),
        ] {
            store.save_product(&p).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let store = MemoryStore::new();
        let mut p = product("1", 5, "2025-05-12T07:00:00Z", &[]);
        store.save_product(&p).await.unwrap();
        let created = store.rows().await[0].created_at;

        p.upvotes = 500;
        store.save_product(&p).await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].upvotes, 500);
        assert_eq!(rows[0].created_at, created);
    }

    #[tokio::test]
    async fn test_products_by_date() {
        let store = seeded().await;
        let day = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap();
        let rows = store.products_by_date(day).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_top_products() {
        let store = seeded().await;
        let rows = store.top_products(2).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = seeded().await;

        let page = store
            .list(&ProductQuery::default().with_topic("AI"))
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let page = store
            .list(&ProductQuery::default().with_search("TAGLINE 3"))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "3");

        let query = ProductQuery {
            page_size: 2,
            ..Default::default()
        }
        .with_dates(NaiveDate::from_ymd_opt(2025, 5, 12), NaiveDate::from_ymd_opt(2025, 5, 13))
        .with_sort(SortField::LaunchDate, false)
        .with_page(2);
        let page = store.list(&query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages(), 2);
        let ids: Vec<&str> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = seeded().await;
        assert_eq!(store.delete_all().await.unwrap(), 4);
        assert!(store.is_empty().await);
    }
}
