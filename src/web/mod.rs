//! 一覧表示Webフロント
//!
//! 保存済みプロダクトをページング・フィルタ付きの表で表示し、
//! 再スクレイプはスクレイパーCLIをサブプロセスとして起動する。

mod handlers;
mod launcher;
mod render;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ScraperError;
use crate::traits::ProductStore;

pub use launcher::{FinishedJob, JobInfo, JobStatus, LaunchError, RescrapeLauncher, ScrapeArgs};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub launcher: Arc<RescrapeLauncher>,
}

impl AppState {
    pub fn new(store: Arc<dyn ProductStore>, launcher: RescrapeLauncher) -> Self {
        Self {
            store,
            launcher: Arc::new(launcher),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/healthz", get(handlers::healthz_handler))
        .route(
            "/scrape",
            axum::routing::post(handlers::trigger_scrape_form_handler),
        )
        .route("/api/products", get(handlers::list_products_handler))
        .route("/api/products/top", get(handlers::top_products_handler))
        .route(
            "/api/scrape",
            get(handlers::scrape_status_handler).post(handlers::trigger_scrape_handler),
        )
        .with_state(state)
}

/// 指定アドレスで待ち受け
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ScraperError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
