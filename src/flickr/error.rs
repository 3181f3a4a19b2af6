use thiserror::Error;

/// Failure of a single remote call, as reported by a [`PhotoService`].
///
/// The variants drive the accounting in
/// [`RateLimitedCaller`](crate::retry::RateLimitedCaller): timeouts and
/// errors are counted separately, and `Api` and `Io` messages are scrubbed
/// of markup before logging.
///
/// [`PhotoService`]: super::PhotoService
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The service answered with an error payload. The message may carry a
    /// full HTML error page.
    #[error("{0}")]
    Api(String),

    /// Transport-level failure (connection reset, DNS, body decode).
    #[error("transport failure: {0}")]
    Io(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Io(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Api(format!("malformed response: {e}"))
    }
}
