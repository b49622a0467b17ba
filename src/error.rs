use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("month {0} is outside 1..=12")]
    MonthOutOfRange(u32),

    #[error("target months must not be empty")]
    EmptyTargetMonths,

    #[error("target months {0:?} are not consecutive")]
    NonConsecutiveMonths(Vec<u32>),

    #[error("no CDS API credentials: set CDSAPI_URL/CDSAPI_KEY or create {0}")]
    MissingCredentials(String),

    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("job {0} did not finish in time")]
    JobTimeout(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}
