//! URL正規化とリダイレクト解決

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{header, redirect, Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// 除去するトラッキングパラメータ
const TRACKING_PARAMS: &[&str] = &[
    "ref",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

const REDIRECT_STATUSES: &[StatusCode] = &[
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// トラッキングパラメータを除去したURLを返す
///
/// 同じキーが複数ある場合は最初の値のみ残す。空の値は捨てる。
/// クエリ以外 (スキーム・ホスト・パス・フラグメント) は元の文字列のまま。
/// 何も除去しない場合と解析できないURLはそのまま返す。
pub fn clean_url(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    if let Err(e) = Url::parse(raw) {
        warn!("Failed to clean URL {}: {}", raw, e);
        return raw.to_string();
    }

    let (without_fragment, fragment) = match raw.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (raw, None),
    };
    let Some((base, query)) = without_fragment.split_once('?') else {
        return raw.to_string();
    };

    let mut seen = HashSet::new();
    let mut stripped = false;
    let mut kept = form_urlencoded::Serializer::new(String::new());
    let mut kept_any = false;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        if v.is_empty() || TRACKING_PARAMS.iter().any(|p| *p == k) || !seen.insert(k.to_string()) {
            stripped = true;
            continue;
        }
        kept.append_pair(&k, &v);
        kept_any = true;
    }

    if !stripped {
        return raw.to_string();
    }

    let mut cleaned = base.to_string();
    if kept_any {
        cleaned.push('?');
        cleaned.push_str(&kept.finish());
    }
    if let Some(fragment) = fragment {
        cleaned.push('#');
        cleaned.push_str(fragment);
    }
    cleaned
}

/// リダイレクトを手動で辿って最終URLを得る
#[derive(Debug, Clone)]
pub struct UrlResolver {
    client: Client,
    max_redirects: u32,
    delay: Duration,
}

impl UrlResolver {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(BROWSER_ACCEPT));

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            delay: config.redirect_delay,
        })
    }

    /// 最終URL (クリーニング済み)。通信エラー時は元のURLを返す
    pub async fn final_url(&self, url: &str) -> String {
        if url.is_empty() {
            return String::new();
        }

        match self.follow(url).await {
            Ok(final_url) => {
                let cleaned = clean_url(&final_url);
                debug!(original = url, resolved = %cleaned, "Resolved final URL");
                cleaned
            }
            Err(e) => {
                warn!("Error getting final URL for {}: {}", url, e);
                url.to_string()
            }
        }
    }

    async fn follow(&self, url: &str) -> Result<String, ScraperError> {
        let mut current = Url::parse(url)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", url, e)))?;

        for hop in 0..self.max_redirects {
            let response = self.client.get(current.clone()).send().await?;
            if !REDIRECT_STATUSES.contains(&response.status()) {
                break;
            }

            let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                break;
            };

            // 相対パスは現在のURL基準で解決
            current = match current.join(location) {
                Ok(next) => next,
                Err(e) => {
                    debug!("Unusable Location header {}: {}", location, e);
                    break;
                }
            };
            debug!(hop = hop + 1, next = %current, "Following redirect");

            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        Ok(current.into())
    }
}
