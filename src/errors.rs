use std::io;

use reqwest::{Response, StatusCode};
use thiserror::Error;
use tracing::debug;

pub type AppResult<T> = Result<T, AppError>;

pub const CONNECTION_ERROR_MESSAGE: &str =
    "Can't connect to API. Please ensure Anytype is running and reachable.";

const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
const FORBIDDEN_MESSAGE: &str = "Operation not permitted.";
const NOT_FOUND_MESSAGE: &str = "Resource not found.";
const GONE_MESSAGE: &str = "Resource has been deleted.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{}", CONNECTION_ERROR_MESSAGE)]
    Connection,
    #[error(transparent)]
    Http(reqwest::Error),
    #[error("{0}")]
    Mapping(String),
    #[error("{0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Keychain(#[from] keyring::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Numeric HTTP status for API failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            AppError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, AppError::Connection)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            debug!(?err, "request failed before reaching the API");
            AppError::Connection
        } else {
            AppError::Http(err)
        }
    }
}

/// Maps a non-2xx outcome to an [`AppError::Api`].
///
/// Returns `None` for success codes. The body is only consulted for the
/// generic branch and is appended when present and non-empty.
pub fn classify_status(status: u16, status_text: &str, body: Option<&str>) -> Option<AppError> {
    if (200..300).contains(&status) {
        return None;
    }
    Some(status_error(status, status_text, body))
}

fn status_error(status: u16, status_text: &str, body: Option<&str>) -> AppError {
    let message = match status {
        429 => RATE_LIMIT_MESSAGE.to_string(),
        403 => FORBIDDEN_MESSAGE.to_string(),
        404 => NOT_FOUND_MESSAGE.to_string(),
        410 => GONE_MESSAGE.to_string(),
        _ => {
            let mut message = format!("API request failed: [{status}] {status_text}");
            if let Some(text) = body.map(str::trim).filter(|text| !text.is_empty()) {
                message.push(' ');
                message.push_str(text);
            }
            message
        }
    };

    AppError::Api { status, message }
}

/// Passes successful responses through and converts everything else into a
/// typed failure. A body that cannot be read is dropped from the message.
pub async fn check_response_error(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = if needs_body(status) {
        match response.text().await {
            Ok(text) => Some(text),
            Err(err) => {
                debug!(?err, status = status.as_u16(), "unable to read error body");
                None
            }
        }
    } else {
        None
    };

    let status_text = status.canonical_reason().unwrap_or_default();
    Err(status_error(status.as_u16(), status_text, body.as_deref()))
}

fn needs_body(status: StatusCode) -> bool {
    !matches!(status.as_u16(), 403 | 404 | 410 | 429)
}
