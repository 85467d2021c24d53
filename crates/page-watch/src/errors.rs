//! Error types for waits and polls

use host_page::PageError;
use thiserror::Error;

/// Failure of a single [`crate::ElementWaiter::wait`].
#[derive(Debug, Error, Clone)]
pub enum WaitError {
    /// Nothing matched before the bound expired
    #[error("Timeout: `{selector}` not found within {timeout_ms}ms")]
    Timeout { selector: String, timeout_ms: u64 },

    /// The owning scope was cancelled
    #[error("Wait for `{0}` cancelled")]
    Cancelled(String),

    /// The page stopped publishing mutations (closed or replaced)
    #[error("Mutation stream closed while waiting for `{0}`")]
    Detached(String),

    /// The attribute source to watch is not in the document
    #[error("Watch source `{0}` not found")]
    SourceMissing(String),

    #[error("Page error: {0}")]
    Page(#[from] PageError),
}

impl WaitError {
    pub fn is_retryable(&self) -> bool {
        match self {
            WaitError::Timeout { .. } => true,
            WaitError::Page(err) => err.retriable,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled(_))
    }
}

/// Failure of a bounded poll sequence.
#[derive(Debug, Error, Clone)]
pub enum PollError {
    #[error("Poll `{0}` cancelled")]
    Cancelled(String),

    /// The attempt or duration bound was reached
    #[error("Poll `{label}` exhausted after {attempts} attempts ({elapsed_ms}ms)")]
    Exhausted {
        label: String,
        attempts: u64,
        elapsed_ms: u64,
    },

    #[error("Page error: {0}")]
    Page(#[from] PageError),
}

impl PollError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_selector_and_bound() {
        let err = WaitError::Timeout {
            selector: "ul.trades-cont.current".into(),
            timeout_ms: 10_000,
        };
        let text = err.to_string();
        assert!(text.contains("ul.trades-cont.current"));
        assert!(text.contains("10000ms"));
        assert!(err.is_retryable());
        assert!(!WaitError::Cancelled("x".into()).is_retryable());
    }

    #[test]
    fn page_errors_keep_their_retry_hint() {
        let stale = host_page::ElementHandle::new(3, "#description");
        assert!(WaitError::from(PageError::stale(&stale)).is_retryable());
        assert!(!WaitError::from(PageError::script("boom")).is_retryable());
    }
}
