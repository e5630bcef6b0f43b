//! ProductHunt 関連の型定義

use serde::{Deserialize, Serialize};

/// GraphQLレスポンス
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: Option<String>,
}

/// `posts` クエリ結果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostsData {
    #[serde(default)]
    pub posts: Connection<PostNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: Option<T>,
}

/// 投稿ノード (API生データ)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostNode {
    pub id: Option<String>,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub slug: Option<String>,
    #[serde(default)]
    pub votes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    pub website: Option<String>,
    pub created_at: Option<String>,
    pub thumbnail: Option<Thumbnail>,
    #[serde(default)]
    pub topics: Connection<TopicNode>,
    #[serde(default)]
    pub makers: Vec<Option<MakerNode>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicNode {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MakerNode {
    pub id: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
}

/// メーカー情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maker {
    pub name: String,
    pub username: String,
    pub profile_url: String,
}

impl Maker {
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        let profile_url = if username.is_empty() {
            String::new()
        } else {
            format!("https://producthunt.com/@{}", username)
        };
        Self {
            name: name.into(),
            username,
            profile_url,
        }
    }
}

/// 抽出済みプロダクト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub description: String,
    /// リダイレクト解決済みの投稿URL
    pub url: String,
    /// リダイレクト解決済みのWebサイトURL
    pub website_url: String,
    /// producthunt.com 上のプロダクトページ
    pub product_url: String,
    pub thumbnail_url: String,
    pub launch_date: String,
    pub upvotes: i64,
    pub comments_count: i64,
    pub makers: Vec<Maker>,
    pub topics: Vec<String>,
}

impl Product {
    pub fn maker_ids(&self) -> Vec<String> {
        self.makers.iter().map(|m| m.username.clone()).collect()
    }
}

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// 週間ランキングをテキスト整形
pub fn render_text(products: &[Product], year: i32, week: u32) -> String {
    let mut lines = vec![
        format!(
            "Week {} of {}'s Top {} Products on ProductHunt:",
            week,
            year,
            products.len()
        ),
        String::new(),
    ];

    for (i, product) in products.iter().enumerate() {
        lines.push(format!("{}. {} - {}", i + 1, product.name, product.tagline));
        lines.push(format!(
            "   Votes: {} | Comments: {}",
            product.upvotes, product.comments_count
        ));
        if !product.website_url.is_empty() {
            lines.push(format!("   Website: {}", product.website_url));
        }
        if !product.product_url.is_empty() {
            lines.push(format!("   ProductHunt: {}", product.product_url));
        }
        if !product.makers.is_empty() {
            let names: Vec<&str> = product.makers.iter().map(|m| m.name.as_str()).collect();
            lines.push(format!("   Makers: {}", names.join(", ")));
        }
        if !product.topics.is_empty() {
            lines.push(format!("   Topics: {}", product.topics.join(", ")));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_product;

    #[test]
    fn test_maker_profile_url() {
        assert_eq!(Maker::new("Ada", "ada").profile_url, "https://producthunt.com/@ada");
        assert_eq!(Maker::new("Bob", "").profile_url, "");
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&[sample_product()], 2025, 20);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Week 20 of 2025's Top 1 Products on ProductHunt:");
        assert_eq!(lines[2], "1. Widget - Does widget things");
        assert_eq!(lines[3], "   Votes: 420 | Comments: 12");
        assert_eq!(lines[4], "   Website: https://widget.io/");
        assert_eq!(lines[5], "   ProductHunt: https://producthunt.com/products/widget");
        assert_eq!(lines[6], "   Makers: Ada, Bob");
        assert_eq!(lines[7], "   Topics: Productivity, AI");
    }

    #[test]
    fn test_post_node_tolerates_missing_fields() {
        let node: PostNode = serde_json::from_str(r#"{"id": "7", "makers": [null]}"#).unwrap();
        assert_eq!(node.id.as_deref(), Some("7"));
        assert_eq!(node.votes_count, 0);
        assert!(node.topics.edges.is_empty());
        assert_eq!(node.makers.len(), 1);
    }
}
