//! GraphQL クエリ構築

use serde::Serialize;
use serde_json::json;

use super::window::LaunchWindow;

/// 1リクエストで取得する投稿数
pub const POSTS_PER_REQUEST: u32 = 50;

const POSTS_QUERY: &str = r#"
query LaunchPosts($first: Int!, $postedAfter: DateTime!, $postedBefore: DateTime!) {
  posts(first: $first, postedAfter: $postedAfter, postedBefore: $postedBefore, order: VOTES) {
    edges {
      node {
        id
        name
        tagline
        description
        url
        slug
        votesCount
        commentsCount
        website
        createdAt
        thumbnail { url }
        topics { edges { node { name } } }
        makers { id name username }
      }
    }
  }
}
"#;

/// POSTボディ `{query, variables}`
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: &'static str,
    pub variables: serde_json::Value,
}

/// 期間内の投稿を得票順に取得するクエリ
pub fn posts_query(window: &LaunchWindow) -> GraphQlRequest {
    GraphQlRequest {
        query: POSTS_QUERY,
        variables: json!({
            "first": POSTS_PER_REQUEST,
            "postedAfter": window.posted_after(),
            "postedBefore": window.posted_before(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producthunt::window::LaunchWindow;

    #[test]
    fn test_posts_query_variables() {
        let window = LaunchWindow::week(2025, 20).unwrap();
        let request = posts_query(&window);

        assert_eq!(request.variables["first"], 50);
        assert_eq!(request.variables["postedAfter"], "2025-05-19T00:00:00Z");
        assert_eq!(request.variables["postedBefore"], "2025-05-25T23:59:59Z");
        assert!(request.query.contains("order: VOTES"));
        assert!(request.query.contains("makers { id name username }"));
    }
}
