//! Errors surfaced by the ghost-trader library.

use host_page::PageError;
use intent_store::IntentError;
use page_watch::WaitError;
use thiserror::Error;

/// Message shown to the user when an amount does not resolve to a positive
/// number.
pub const INVALID_AMOUNT_MESSAGE: &str = "Please enter a valid amount greater than 0";

/// A submitted amount that cannot start the workflow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid amount greater than 0 (got `{input}`)")]
    NotPositive { input: String },
}

#[derive(Debug, Error)]
pub enum GhostTraderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("intent store: {0}")]
    Intent(#[from] IntentError),

    #[error("page: {0}")]
    Page(#[from] PageError),

    #[error("watch: {0}")]
    Watch(#[from] WaitError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// No input is offered on the current page load.
    #[error("input is not offered on this page")]
    InputUnavailable,

    #[error("session has ended")]
    SessionClosed,
}

impl GhostTraderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Intent(err) => err.is_retryable(),
            Self::Page(err) => err.retriable,
            Self::Watch(err) => err.is_retryable(),
            _ => false,
        }
    }
}
