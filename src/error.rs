use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("order request rejected (HTTP {status}): {body}")]
    RequestRejected { status: u16, body: String },

    #[error("order {order_id} failed: {}", .messages.join("; "))]
    OrderFailed { order_id: String, messages: Vec<String> },

    #[error("download of {url} failed: {reason}")]
    DownloadFailure { url: String, reason: String },

    #[error("order {order_id} still not complete after {attempts} status checks")]
    PollTimeout { order_id: String, attempts: u32 },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
