use std::fmt;

/// Category of an agent backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection refused, DNS failure, reset mid-request.
    Network,
    Timeout,
    /// Backend answered with a non-2xx status.
    HttpStatus,
    /// Backend answered 2xx with a body we can't read.
    Parse,
    /// The caller gave up on the request.
    Cancelled,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Network => "network",
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::HttpStatus => "http_status",
            ApiErrorKind::Parse => "parse",
            ApiErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Structured error from the agent backend with kind and details.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// HTTP status, for `HttpStatus` errors
    pub status: Option<u16>,
    /// Optional additional details (e.g., the raw body that failed to parse)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    /// Creates an HTTP status error.
    ///
    /// The response body is what the user sees; the status alone is shown
    /// only when the body is empty.
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            message,
            status: Some(status),
            details: None,
        }
    }

    pub fn parse(message: impl Into<String>, body: &str) -> Self {
        Self {
            details: Some(body.to_string()),
            ..Self::new(ApiErrorKind::Parse, message)
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "Request cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ApiErrorKind::Cancelled
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for agent backend calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Maps a transport failure onto an error kind.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::new(ApiErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::new(ApiErrorKind::Network, format!("Connection failed: {e}"))
    } else if e.is_decode() {
        ApiError::new(ApiErrorKind::Parse, format!("Failed to read response: {e}"))
    } else if e.is_request() {
        ApiError::new(ApiErrorKind::Network, format!("Request error: {e}"))
    } else {
        ApiError::new(ApiErrorKind::Network, format!("Network error: {e}"))
    }
}
