//! 再スクレイプの起動
//!
//! 通常はスクレイパーCLIをサブプロセスで実行する。メモリストアで
//! 配信しているときは同一プロセス内でスクレイプする。

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tower::ServiceExt;
use tracing::{error, info, warn};

use crate::service::{ScrapeRequest, ScraperService};
use crate::traits::{ProductStore, Scraper};

/// 保持する出力の末尾行数
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("scrape already running (job {0})")]
    AlreadyRunning(u64),

    #[error("failed to start scraper: {0}")]
    Spawn(#[from] std::io::Error),
}

/// サブプロセスに渡す期間と上限
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeArgs {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_products_per_day: Option<usize>,
    pub max_total_products: Option<usize>,
}

impl ScrapeArgs {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            max_products_per_day: None,
            max_total_products: None,
        }
    }

    fn to_request(&self) -> ScrapeRequest {
        let mut request = ScrapeRequest::new(self.start_date, self.end_date);
        if let Some(n) = self.max_products_per_day {
            request = request.with_max_products_per_day(n);
        }
        if let Some(n) = self.max_total_products {
            request = request.with_max_total_products(n);
        }
        request
    }

    fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "scrape".to_string(),
            "--start-date".to_string(),
            self.start_date.format("%Y-%m-%d").to_string(),
            "--end-date".to_string(),
            self.end_date.format("%Y-%m-%d").to_string(),
        ];
        if let Some(n) = self.max_products_per_day {
            args.push("--max-products-per-day".to_string());
            args.push(n.to_string());
        }
        if let Some(n) = self.max_total_products {
            args.push("--max-total-products".to_string());
            args.push(n.to_string());
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub id: u64,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub args: ScrapeArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedJob {
    pub job: JobInfo,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output_tail: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub running: Option<JobInfo>,
    pub last: Option<FinishedJob>,
}

/// 再スクレイプの実行方法
#[derive(Clone)]
enum Runner {
    /// スクレイパーCLIを別プロセスで起動
    Subprocess {
        program: PathBuf,
        base_args: Vec<String>,
    },
    /// 同一プロセス内で一覧と同じストアへ保存
    InProcess(ScraperService<dyn Scraper, dyn ProductStore>),
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subprocess { program, base_args } => f
                .debug_struct("Subprocess")
                .field("program", program)
                .field("base_args", base_args)
                .finish(),
            Self::InProcess(_) => f.write_str("InProcess"),
        }
    }
}

/// 再スクレイプを起動する。同時実行は1つまで
#[derive(Debug)]
pub struct RescrapeLauncher {
    runner: Runner,
    next_id: AtomicU64,
    state: Arc<Mutex<JobStatus>>,
}

impl RescrapeLauncher {
    /// `program scrape --start-date ..` をサブプロセスで実行する
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_runner(Runner::Subprocess {
            program: program.into(),
            base_args: Vec::new(),
        })
    }

    /// サブプロセスを使わず `service` で直接スクレイプする (メモリストア用)
    pub fn in_process(service: ScraperService<dyn Scraper, dyn ProductStore>) -> Self {
        Self::with_runner(Runner::InProcess(service))
    }

    fn with_runner(runner: Runner) -> Self {
        Self {
            runner,
            next_id: AtomicU64::new(1),
            state: Arc::new(Mutex::new(JobStatus::default())),
        }
    }

    /// サブコマンドより前に付ける引数 (サブプロセス実行時のみ)
    pub fn with_base_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        if let Runner::Subprocess { base_args, .. } = &mut self.runner {
            *base_args = args.into_iter().map(Into::into).collect();
        }
        self
    }

    fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
        state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> JobStatus {
        Self::lock(&self.state).clone()
    }

    pub fn is_running(&self) -> bool {
        Self::lock(&self.state).running.is_some()
    }

    /// 起動して即座に返る。終了はバックグラウンドで待機する
    pub fn launch(&self, args: ScrapeArgs) -> Result<JobInfo, LaunchError> {
        let mut state = Self::lock(&self.state);
        if let Some(job) = &state.running {
            return Err(LaunchError::AlreadyRunning(job.id));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.state);

        let job = match &self.runner {
            Runner::Subprocess { program, base_args } => {
                let mut child = Command::new(program)
                    .args(base_args)
                    .args(args.to_args())
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()?;

                let job = JobInfo {
                    id,
                    pid: child.id(),
                    started_at: Utc::now(),
                    args,
                };
                let running = job.clone();
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();

                tokio::spawn(async move {
                    let tail = Mutex::new(VecDeque::with_capacity(OUTPUT_TAIL_LINES));
                    let (_, _, status) = tokio::join!(
                        collect_lines(stdout, &tail),
                        collect_lines(stderr, &tail),
                        child.wait()
                    );
                    let mut output_tail: Vec<String> =
                        tail.into_inner().unwrap_or_else(|p| p.into_inner()).into();

                    let (success, exit_code) = match status {
                        Ok(status) => (status.success(), status.code()),
                        Err(e) => {
                            error!("Failed to wait for scraper subprocess: {}", e);
                            output_tail.push(e.to_string());
                            (false, None)
                        }
                    };
                    finish(
                        &shared,
                        FinishedJob {
                            job: running,
                            finished_at: Utc::now(),
                            success,
                            exit_code,
                            output_tail,
                        },
                    );
                });
                job
            }
            Runner::InProcess(service) => {
                let job = JobInfo {
                    id,
                    pid: None,
                    started_at: Utc::now(),
                    args,
                };
                let running = job.clone();
                let service = service.clone();
                let request = job.args.to_request();
                let scrape: std::pin::Pin<
                    Box<dyn std::future::Future<Output = Result<_, std::convert::Infallible>> + Send>,
                > = Box::pin(service.oneshot(request));

                tokio::spawn(async move {
                    let stats = match scrape.await {
                        Ok(stats) => stats,
                        Err(never) => match never {},
                    };
                    let summary = serde_json::to_string(&stats)
                        .unwrap_or_else(|e| format!("failed to encode stats: {}", e));
                    finish(
                        &shared,
                        FinishedJob {
                            job: running,
                            finished_at: Utc::now(),
                            success: true,
                            exit_code: None,
                            output_tail: vec![summary],
                        },
                    );
                });
                job
            }
        };

        info!(
            job = job.id,
            pid = ?job.pid,
            "Started re-scrape for {} .. {}",
            job.args.start_date,
            job.args.end_date
        );
        state.running = Some(job.clone());
        Ok(job)
    }
}

/// パイプを1行ずつ読み、末尾 OUTPUT_TAIL_LINES 行だけ残す
async fn collect_lines<R>(pipe: Option<R>, tail: &Mutex<VecDeque<String>>)
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return;
    };
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut tail = RescrapeLauncher::lock(tail);
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read scraper output: {}", e);
                break;
            }
        }
    }
}

fn finish(shared: &Mutex<JobStatus>, finished: FinishedJob) {
    if finished.success {
        info!(job = finished.job.id, "Re-scrape finished");
    } else {
        warn!(
            job = finished.job.id,
            exit_code = ?finished.exit_code,
            "Re-scrape failed"
        );
    }

    let mut state = RescrapeLauncher::lock(shared);
    state.running = None;
    state.last = Some(finished);
}
