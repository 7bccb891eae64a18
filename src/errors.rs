use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

use crate::transport::Response;

/// Why no response came back from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Timeout,
    Connect,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportFailureKind::Timeout => write!(f, "request timed out: {}", self.message),
            TransportFailureKind::Connect => write!(f, "connection failed: {}", self.message),
            TransportFailureKind::Other => f.write_str(&self.message),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            TransportFailureKind::Connect
        } else {
            TransportFailureKind::Other
        };
        TransportFailure::new(kind, err.to_string())
    }
}

/// Outcome of a refresh call that did not re-establish the session.
///
/// Cloneable so one failure can be handed to every queued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub status: Option<StatusCode>,
    pub reason: String,
}

impl RefreshFailure {
    pub fn rejected(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            reason: format!("refresh endpoint answered {status}"),
        }
    }

    pub fn unreachable(failure: &TransportFailure) -> Self {
        Self {
            status: None,
            reason: failure.to_string(),
        }
    }

    pub fn abandoned() -> Self {
        Self {
            status: None,
            reason: "refresh abandoned before it settled".into(),
        }
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to reach the server, check your connection ({0})")]
    Transport(TransportFailure),
    #[error("your session has expired, please sign in again")]
    SessionExpired,
    #[error("you do not have permission to perform this action")]
    Permission,
    #[error("the requested resource was not found")]
    NotFound,
    #[error("the request was rejected with status {}", .0.status())]
    Validation(Box<Response>),
    #[error("the server failed to process the request (status {0})")]
    Server(StatusCode),
    #[error("request failed with status {}", .0.status())]
    Http(Box<Response>),
    #[error("session refresh failed: {0}")]
    RefreshFailed(RefreshFailure),
    #[error("session refresh throttled, retry in {retry_after:?}")]
    RefreshThrottled { retry_after: Duration },
    #[error("gave up waiting {0:?} for the session refresh to settle")]
    QueueTimeout(Duration),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportFailure> for Error {
    fn from(failure: TransportFailure) -> Self {
        Error::Transport(failure)
    }
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::RefreshFailed(failure)
    }
}

impl Error {
    /// Translates a non-success response into the matching error category.
    ///
    /// Validation and unclassified failures keep the original response so
    /// callers can read field-level messages from the body.
    pub fn from_response(response: Response) -> Self {
        match response.status().as_u16() {
            401 => Error::SessionExpired,
            403 => Error::Permission,
            404 => Error::NotFound,
            400 | 422 => Error::Validation(Box::new(response)),
            500 | 502 | 503 => Error::Server(response.status()),
            _ => Error::Http(Box::new(response)),
        }
    }

    /// Response carried by the error, if the server produced one worth keeping.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Validation(resp) | Error::Http(resp) => Some(resp),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired | Error::RefreshFailed(_))
    }
}
