//! ProductHunt スクレイパーモジュール
//!
//! GraphQL API v2 から期間内の投稿を得票順に取得する

mod client;
mod query;
mod types;
mod urls;
mod window;

pub use client::ProductHuntClient;
pub use query::{posts_query, GraphQlRequest, POSTS_PER_REQUEST};
pub use types::{render_text, Maker, OutputFormat, PostNode, Product};
pub use urls::{clean_url, UrlResolver};
pub use window::{current_week, date_range, parse_date, LaunchWindow, MAX_WEEK};
