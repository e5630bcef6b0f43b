//! ProductHunt GraphQL クライアント

use async_trait::async_trait;
use futures::future::join;
use reqwest::{header, Client};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::query::{posts_query, GraphQlRequest};
use super::types::{GraphQlResponse, Maker, PostNode, PostsData, Product};
use super::urls::{clean_url, UrlResolver};
use super::window::LaunchWindow;

const UNNAMED_PRODUCT: &str = "Unnamed Product";

/// ProductHunt API v2 クライアント
#[derive(Debug, Clone)]
pub struct ProductHuntClient {
    config: ScraperConfig,
    client: Client,
    resolver: UrlResolver,
}

impl ProductHuntClient {
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        if config.access_token.is_empty() {
            return Err(ScraperError::Config(
                "Access token must be provided or set PRODUCTHUNT_TOKEN env var".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;
        let resolver = UrlResolver::new(&config)?;

        Ok(Self {
            config,
            client,
            resolver,
        })
    }

    /// 環境変数の設定で作成
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::new(ScraperConfig::from_env()?)
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// リトライ付きでGraphQLリクエストを実行
    async fn request_with_retry(
        &self,
        request: &GraphQlRequest,
    ) -> Result<PostsData, ScraperError> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match self.request(request).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() => {
                    let backoff = self.config.initial_backoff * 2u32.pow(attempt);
                    warn!(
                        "GraphQL attempt {} failed, retrying in {}ms: {}",
                        attempt + 1,
                        backoff.as_millis(),
                        e
                    );
                    sleep(backoff).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Max retries exceeded".to_string());
        Err(ScraperError::RetriesExhausted {
            retries: self.config.max_retries,
            message,
        })
    }

    async fn request(&self, request: &GraphQlRequest) -> Result<PostsData, ScraperError> {
        debug!("Making request to {}", self.config.api_url);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.access_token)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Response status: {}", status);

        if !status.is_success() {
            error!("API request failed: {} {}", status, body);
            return Err(ScraperError::Status { status, body });
        }

        let parsed: GraphQlResponse<PostsData> = serde_json::from_str(&body)?;
        if let Some(errors) = parsed.errors.filter(|errs| !errs.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_deref().unwrap_or("Unknown error"))
                .collect::<Vec<_>>()
                .join("; ");
            error!("GraphQL errors: {}", message);
            return Err(ScraperError::GraphQl(message));
        }

        Ok(parsed.data.unwrap_or_default())
    }

    /// website / url の最終URLを取得
    async fn resolve(&self, url: &str) -> String {
        if self.config.resolve_urls {
            self.resolver.final_url(url).await
        } else {
            clean_url(url)
        }
    }

    /// ノードから Product を抽出
    async fn extract_product(&self, node: PostNode) -> Product {
        let topics = node
            .topics
            .edges
            .into_iter()
            .filter_map(|edge| edge.node.and_then(|t| t.name))
            .filter(|name| !name.is_empty())
            .collect();

        let makers = node
            .makers
            .into_iter()
            .flatten()
            .filter_map(|m| {
                let name = m.name?;
                Some(Maker::new(name, m.username.unwrap_or_default()))
            })
            .collect();

        let website = node.website.unwrap_or_default();
        let post_url = node.url.unwrap_or_default();
        let (website_url, url) = join(self.resolve(&website), self.resolve(&post_url)).await;

        let product_url = match node.slug.as_deref() {
            Some(slug) if !slug.is_empty() => {
                format!("https://producthunt.com/products/{}", slug)
            }
            _ => String::new(),
        };

        Product {
            id: node.id.unwrap_or_default(),
            name: node.name.unwrap_or_else(|| UNNAMED_PRODUCT.to_string()),
            tagline: node.tagline.unwrap_or_default(),
            description: node.description.unwrap_or_default(),
            url,
            website_url,
            product_url,
            thumbnail_url: node.thumbnail.and_then(|t| t.url).unwrap_or_default(),
            launch_date: node.created_at.unwrap_or_default(),
            upvotes: node.votes_count,
            comments_count: node.comments_count,
            makers,
            topics,
        }
    }
}

#[async_trait]
impl Scraper for ProductHuntClient {
    async fn posts(
        &self,
        window: LaunchWindow,
        limit: usize,
    ) -> Result<Vec<Product>, ScraperError> {
        info!(
            "Fetching top products for {} .. {}",
            window.start, window.end
        );

        let data = self.request_with_retry(&posts_query(&window)).await?;
        let nodes: Vec<PostNode> = data
            .posts
            .edges
            .into_iter()
            .filter_map(|edge| edge.node)
            .collect();

        if nodes.is_empty() {
            warn!(
                "No posts found in API response for {} .. {}",
                window.start, window.end
            );
            return Ok(Vec::new());
        }

        let mut products = Vec::with_capacity(nodes.len());
        for node in nodes {
            products.push(self.extract_product(node).await);
        }

        products.sort_by(|a, b| b.upvotes.cmp(&a.upvotes));
        products.truncate(limit);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::Matcher;
    use serde_json::json;

    use crate::test_support::test_config;

    fn posts_body() -> String {
        json!({
            "data": {
                "posts": {
                    "edges": [
                        {"node": {
                            "id": "100",
                            "name": "Low",
                            "tagline": "fewer votes",
                            "url": "https://www.producthunt.com/posts/low?utm_source=graphql",
                            "slug": "low",
                            "votesCount": 10,
                            "commentsCount": 1,
                            "website": "https://low.dev/?ref=producthunt",
                            "createdAt": "2025-05-12T07:01:00Z",
                            "thumbnail": {"url": "https://ph-files.imgix.net/low.png"},
                            "topics": {"edges": [{"node": {"name": "AI"}}, {"node": {}}]},
                            "makers": [{"id": "1", "name": "Ada", "username": "ada"}, null, {"id": "2"}]
                        }},
                        {"node": {
                            "id": "200",
                            "tagline": "more votes",
                            "votesCount": 99,
                            "createdAt": "2025-05-12T08:00:00Z"
                        }},
                        {"node": null}
                    ]
                }
            }
        })
        .to_string()
    }

    fn day() -> LaunchWindow {
        LaunchWindow::day(NaiveDate::from_ymd_opt(2025, 5, 12).unwrap())
    }

    #[test]
    fn test_new_requires_token() {
        let result = ProductHuntClient::new(ScraperConfig::default());
        assert!(matches!(result, Err(ScraperError::Config(_))));
    }

    #[tokio::test]
    async fn test_posts_extracts_and_sorts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::PartialJson(json!({
                "variables": {
                    "postedAfter": "2025-05-12T00:00:00Z",
                    "postedBefore": "2025-05-12T23:59:59Z"
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(posts_body())
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        let products = client.posts(day(), 20).await.unwrap();
        mock.assert_async().await;

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, "200");
        assert_eq!(products[0].name, "Unnamed Product");
        assert_eq!(products[0].product_url, "");

        let low = &products[1];
        assert_eq!(low.name, "Low");
        assert_eq!(low.url, "https://www.producthunt.com/posts/low");
        assert_eq!(low.website_url, "https://low.dev/");
        assert_eq!(low.product_url, "https://producthunt.com/products/low");
        assert_eq!(low.thumbnail_url, "https://ph-files.imgix.net/low.png");
        assert_eq!(low.topics, vec!["AI".to_string()]);
        assert_eq!(low.makers, vec![Maker::new("Ada", "ada")]);
        assert_eq!(low.maker_ids(), vec!["ada".to_string()]);
    }

    #[tokio::test]
    async fn test_posts_truncates_to_limit() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(posts_body())
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        let products = client.posts(day(), 1).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].upvotes, 99);
    }

    #[tokio::test]
    async fn test_graphql_errors_are_joined() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"errors": [{"message": "invalid_oauth_token"}, {}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        match client.posts(day(), 20).await {
            Err(ScraperError::GraphQl(msg)) => {
                assert_eq!(msg, "invalid_oauth_token; Unknown error")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/graphql")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        let result = client.posts(day(), 20).await;
        failing.assert_async().await;
        assert!(matches!(
            result,
            Err(ScraperError::RetriesExhausted { retries: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(401)
            .with_body("unauthorized")
            .expect(1)
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        let result = client.posts(day(), 20).await;
        mock.assert_async().await;
        assert!(matches!(result, Err(ScraperError::Status { .. })));
    }

    #[tokio::test]
    async fn test_empty_edges() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"posts": {"edges": []}}}"#)
            .create_async()
            .await;

        let client =
            ProductHuntClient::new(test_config(&format!("{}/graphql", server.url()))).unwrap();
        assert!(client.posts(day(), 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: PRODUCTHUNT_TOKEN=... cargo test test_live_weekly -- --ignored --nocapture
    async fn test_live_weekly() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info,producthunt_scraper=debug")
            .try_init();

        let client = ProductHuntClient::from_env().expect("PRODUCTHUNT_TOKEN not set");
        let products = client.weekly_posts(2025, 20, 5).await.unwrap();
        for p in &products {
            println!("{} ({}) {}", p.name, p.upvotes, p.website_url);
        }
        assert!(products.len() <= 5);
    }
}
