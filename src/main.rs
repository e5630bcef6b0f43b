//! ph-scraper: ProductHunt スクレイパーCLI

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tower::Service;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use producthunt_scraper::producthunt::{current_week, parse_date, render_text, UrlResolver};
use producthunt_scraper::web::{self, AppState, RescrapeLauncher};
use producthunt_scraper::{
    rescrape_week, MemoryStore, OutputFormat, ProductHuntClient, ProductStore, ScrapeRequest, Scraper,
    ScraperConfig, ScraperService, SupabaseStore,
};

#[derive(Parser, Debug)]
#[command(name = "ph-scraper", about = "ProductHunt launches scraper", version)]
struct Cli {
    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 期間内の上位プロダクトをストアへ保存
    Scrape {
        /// YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,

        /// YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        end_date: NaiveDate,

        #[arg(long, default_value_t = 20)]
        max_products_per_day: usize,

        #[arg(long, default_value_t = 100)]
        max_total_products: usize,

        /// 日付間の待機秒数
        #[arg(long, default_value_t = 1.0)]
        delay: f64,

        /// 保存せずメモリ上で実行
        #[arg(long)]
        dry_run: bool,
    },

    /// 週間ランキングを表示
    Weekly {
        #[arg(long)]
        year: Option<i32>,

        /// 1〜52
        #[arg(long)]
        week: Option<u32>,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// 出力先ファイル (省略時は標準出力)
        #[arg(long)]
        output: Option<PathBuf>,

        /// ストアへも保存
        #[arg(long)]
        save: bool,
    },

    /// 今日のプロダクトをストアへ保存
    Daily {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// 全件削除してから指定週を保存し直す
    Rescrape {
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        week: Option<u32>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// リダイレクト解決後のURLを表示
    ResolveUrl {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// 一覧表示Webフロントを起動
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Supabaseの代わりにメモリストアを使う (再スクレイプは同一プロセス内で実行)
        #[arg(long)]
        memory: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,producthunt_scraper=debug,ph_scraper=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--delay` 秒数。負数・NaN・大きすぎる値はエラー
fn delay_from_secs(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(delay) => Ok(delay),
        Err(e) => bail!("--delay must be a non-negative number of seconds ({}): {}", secs, e),
    }
}

/// 年・週の省略時は今日の属する週
fn resolve_week(year: Option<i32>, week: Option<u32>) -> (i32, u32) {
    let today = Utc::now().date_naive();
    (
        year.unwrap_or_else(|| today.year()),
        week.unwrap_or_else(|| current_week(today)),
    )
}

async fn run_range(
    store: Arc<dyn ProductStore>,
    request: ScrapeRequest,
) -> Result<()> {
    let client = ProductHuntClient::from_env()?;
    let mut service = ScraperService::new(Arc::new(client), store);
    let stats = match service.call(request).await {
        Ok(stats) => stats,
        Err(never) => match never {},
    };

    println!("{}", serde_json::to_string_pretty(&stats)?);
    if !stats.failed_dates.is_empty() {
        warn!("{} date(s) failed", stats.failed_dates.len());
    }
    Ok(())
}

fn store_from_env() -> Result<Arc<dyn ProductStore>> {
    let store = SupabaseStore::from_env().context("Supabase is not configured")?;
    Ok(Arc::new(store))
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Scrape {
            start_date,
            end_date,
            max_products_per_day,
            max_total_products,
            delay,
            dry_run,
        } => {
            let delay = delay_from_secs(delay)?;
            let store: Arc<dyn ProductStore> = if dry_run {
                info!("Dry run: products are kept in memory");
                Arc::new(MemoryStore::new())
            } else {
                store_from_env()?
            };
            let request = ScrapeRequest::new(start_date, end_date)
                .with_max_products_per_day(max_products_per_day)
                .with_max_total_products(max_total_products)
                .with_delay(delay);
            run_range(store, request).await
        }

        Command::Weekly {
            year,
            week,
            limit,
            format,
            output,
            save,
        } => {
            let (year, week) = resolve_week(year, week);
            let client = ProductHuntClient::from_env()?;
            let products = client.weekly_posts(year, week, limit).await?;

            let rendered = if products.is_empty() {
                format!(
                    "No products found for week {} of {} on ProductHunt.",
                    week, year
                )
            } else {
                match OutputFormat::from(format) {
                    OutputFormat::Text => render_text(&products, year, week),
                    OutputFormat::Json => serde_json::to_string_pretty(&products)?,
                }
            };

            match output {
                Some(path) => {
                    tokio::fs::write(&path, rendered)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("Wrote {} products to {}", products.len(), path.display());
                }
                None => println!("{}", rendered),
            }

            if save {
                let store = store_from_env()?;
                let mut saved = 0;
                for product in &products {
                    match store.save_product(product).await {
                        Ok(()) => saved += 1,
                        Err(e) => error!("Failed to save {}: {}", product.name, e),
                    }
                }
                info!("Saved {}/{} products", saved, products.len());
            }
            Ok(())
        }

        Command::Daily { limit } => {
            let today = Utc::now().date_naive();
            let request = ScrapeRequest::single_day(today)
                .with_max_products_per_day(limit)
                .with_max_total_products(limit)
                .with_delay(Duration::ZERO);
            run_range(store_from_env()?, request).await
        }

        Command::Rescrape { year, week, limit } => {
            let (year, week) = resolve_week(year, week);
            let client = ProductHuntClient::from_env()?;
            let store = store_from_env()?;

            let stats = rescrape_week(&client, store.as_ref(), year, week, limit).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if stats.fetched == 0 {
                bail!("no products found for week {} of {}, keeping existing rows", week, year);
            }
            if stats.failed_saves > 0 {
                bail!("{} products failed to save", stats.failed_saves);
            }
            Ok(())
        }

        Command::ResolveUrl { urls } => {
            let resolver = UrlResolver::new(&ScraperConfig::default())?;
            for url in urls {
                println!("{}", resolver.final_url(&url).await);
            }
            Ok(())
        }

        Command::Serve { bind, memory } => {
            let (store, launcher): (Arc<dyn ProductStore>, RescrapeLauncher) = if memory {
                // 子プロセスからはメモリストアに書けないので同一プロセスで実行する
                let store: Arc<dyn ProductStore> = Arc::new(MemoryStore::new());
                let client: Arc<dyn Scraper> = Arc::new(
                    ProductHuntClient::from_env()
                        .context("serve --memory scrapes in-process and needs PRODUCTHUNT_TOKEN")?,
                );
                let service = ScraperService::new(client, Arc::clone(&store));
                (store, RescrapeLauncher::in_process(service))
            } else {
                let program = std::env::current_exe().context("cannot locate scraper binary")?;
                (store_from_env()?, RescrapeLauncher::new(program))
            };
            let state = AppState::new(store, launcher);
            web::serve(bind, state).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scrape_args() {
        let cli = Cli::parse_from([
            "ph-scraper",
            "scrape",
            "--start-date",
            "2025-05-01",
            "--end-date",
            "2025-05-07",
            "--delay",
            "0.5",
            "--dry-run",
        ]);
        match cli.command {
            Command::Scrape {
                start_date,
                max_products_per_day,
                delay,
                dry_run,
                ..
            } => {
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
                assert_eq!(max_products_per_day, 20);
                assert_eq!(delay, 0.5);
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "ph-scraper",
            "scrape",
            "--start-date",
            "05/01/2025",
            "--end-date",
            "2025-05-07",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delay_from_secs() {
        assert_eq!(delay_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(delay_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(delay_from_secs(-1.0).is_err());
        assert!(delay_from_secs(f64::NAN).is_err());
        assert!(delay_from_secs(1e20).is_err());
    }

    #[test]
    fn test_weekly_format() {
        let cli = Cli::parse_from(["ph-scraper", "-v", "weekly", "--week", "20", "--format", "json"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Weekly { week, format, .. } => {
                assert_eq!(week, Some(20));
                assert!(matches!(OutputFormat::from(format), OutputFormat::Json));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
