use std::time::Duration;

use crate::error::ScraperError;

pub const PRODUCTHUNT_API_URL: &str = "https://api.producthunt.com/v2/api/graphql";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

/// ProductHunt APIクライアント設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub access_token: String,
    pub api_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// 最終URL解決時の最大リダイレクト回数
    pub max_redirects: u32,
    /// リダイレクト間の待機
    pub redirect_delay: Duration,
    /// false の場合、website/url のリダイレクト解決を行わずクリーニングのみ
    pub resolve_urls: bool,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_url: PRODUCTHUNT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            redirect_delay: Duration::from_millis(500),
            resolve_urls: true,
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

impl ScraperConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// 環境変数 PRODUCTHUNT_TOKEN から作成
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` で変数を引いて作成
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("PRODUCTHUNT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ScraperError::Config(
                    "PRODUCTHUNT_TOKEN environment variable is not set".to_string(),
                )
            })?;
        Ok(Self::new(token))
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn with_resolve_urls(mut self, resolve: bool) -> Self {
        self.resolve_urls = resolve;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }
}

/// Supabase (PostgREST) 接続設定
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
    pub table: String,
    pub timeout: Duration,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            table: "products".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// 環境変数 SUPABASE_URL / SUPABASE_KEY から作成
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` で変数を引いて作成。欠けている変数名をすべてエラーに含める
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SUPABASE_URL").filter(|v| !v.is_empty());
        let key = lookup("SUPABASE_KEY").filter(|v| !v.is_empty());

        match (url, key) {
            (Some(url), Some(key)) => Ok(Self::new(url, key)),
            (url, key) => {
                let missing: Vec<&str> = [
                    url.is_none().then_some("SUPABASE_URL"),
                    key.is_none().then_some("SUPABASE_KEY"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(ScraperError::Config(format!(
                    "missing environment variables: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
