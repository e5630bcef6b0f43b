//! 保存行と一覧クエリの型定義

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;
use crate::producthunt::Product;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `products` テーブルの1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub launch_date: Option<String>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub maker_ids: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    /// 保存用の行を作成。created_at は新規挿入時にストア側で埋める
    pub fn from_product(product: &Product, now: DateTime<Utc>) -> Self {
        fn non_empty(s: &str) -> Option<String> {
            (!s.is_empty()).then(|| s.to_string())
        }

        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            tagline: non_empty(&product.tagline),
            description: non_empty(&product.description),
            url: non_empty(&product.url),
            website_url: non_empty(&product.website_url),
            thumbnail_url: non_empty(&product.thumbnail_url),
            launch_date: non_empty(&product.launch_date),
            upvotes: product.upvotes,
            maker_ids: product.maker_ids(),
            topics: product.topics.clone(),
            created_at: None,
            updated_at: Some(now),
        }
    }

    /// launch_date の日付部分
    pub fn launch_day(&self) -> Option<NaiveDate> {
        let raw = self.launch_date.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .ok()
            .or_else(|| raw.get(..10).and_then(|d| d.parse().ok()))
    }
}

/// 並び順の対象列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Upvotes,
    LaunchDate,
    Name,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Upvotes => "upvotes",
            Self::LaunchDate => "launch_date",
            Self::Name => "name",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvotes" => Ok(Self::Upvotes),
            "launch_date" => Ok(Self::LaunchDate),
            "name" => Ok(Self::Name),
            other => Err(ScraperError::Store(format!("unknown sort field: {}", other))),
        }
    }
}

/// 一覧のフィルタ・ページ指定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    /// 1始まり
    pub page: u32,
    pub page_size: u32,
    /// name / tagline の部分一致（大文字小文字無視）
    pub search: Option<String>,
    pub topic: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort: SortField,
    pub descending: bool,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            topic: None,
            start_date: None,
            end_date: None,
            sort: SortField::Upvotes,
            descending: true,
        }
    }
}

impl ProductQuery {
    /// ページ番号とサイズを有効範囲に丸め、空文字のフィルタを捨てる
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.topic = self.topic.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_sort(mut self, sort: SortField, descending: bool) -> Self {
        self.sort = sort;
        self.descending = descending;
        self
    }
}

/// 一覧の1ページ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<ProductRow>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl ProductPage {
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
