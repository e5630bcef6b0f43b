use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTPステータスエラー: {status} {body}")]
    Status { status: StatusCode, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("不正な週番号: {0} (1〜52で指定してください)")]
    InvalidWeek(u32),

    #[error("不正な日付: {0}")]
    InvalidDate(String),

    #[error("不正なURL: {0}")]
    InvalidUrl(String),

    #[error("ストアエラー: {0}")]
    Store(String),

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("リトライ上限到達 ({retries}回): {message}")]
    RetriesExhausted { retries: u32, message: String },
}

impl ScraperError {
    /// リトライで回復しうるエラーか
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
