pub mod slack;

use crate::status::RunStatus;
use async_trait::async_trait;

/// Progress notification boundary.
///
/// The runner talks to the outside world only through this trait. Both
/// methods are infallible on purpose: delivery problems are the
/// implementation's to log and absorb, never the run loop's to handle.
#[async_trait]
pub trait ProgressReporter {
    /// Deliver a status update. `header` carries identity lines (who is
    /// running what); `body` is freeform stats text, empty at run start.
    async fn report(&mut self, status: RunStatus, header: &[String], body: &str);

    /// Post the end-of-run attention ping.
    async fn ping(&mut self, text: &str);
}

/// Errors from the notification transport, logged at the reporter boundary.
#[derive(Debug)]
pub enum NotifyError {
    Http { source: reqwest::Error },
    Api { method: &'static str, error: String },
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http { source } => write!(f, "transport error: {source}"),
            NotifyError::Api { method, error } => write!(f, "{method} failed: {error}"),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Http { source } => Some(source),
            NotifyError::Api { .. } => None,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(source: reqwest::Error) -> Self {
        NotifyError::Http { source }
    }
}
