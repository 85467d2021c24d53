//! Flow execution error types

use host_page::PageError;
use intent_store::IntentError;
use page_watch::{PollError, WaitError};
use thiserror::Error;

use crate::types::WorkflowStep;

/// Why a workflow run stopped short of `Done`.
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// The page unloaded or the scope was cancelled
    #[error("cancelled")]
    Cancelled,

    #[error("Intent store error: {0}")]
    Intent(#[from] IntentError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Wait failed: {0}")]
    Wait(WaitError),

    /// A polling step hit its configured bound
    #[error("Step {step:?} gave up: {reason}")]
    StepExhausted { step: WorkflowStep, reason: String },
}

impl FlowError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FlowError::Page(err) => err.retriable,
            FlowError::Intent(err) => err.is_retryable(),
            FlowError::Wait(err) => err.is_retryable(),
            FlowError::StepExhausted { .. } => true,
            FlowError::Cancelled => false,
        }
    }

    pub(crate) fn from_poll(step: WorkflowStep, err: PollError) -> Self {
        match err {
            PollError::Cancelled(_) => FlowError::Cancelled,
            PollError::Page(err) => FlowError::Page(err),
            exhausted @ PollError::Exhausted { .. } => FlowError::StepExhausted {
                step,
                reason: exhausted.to_string(),
            },
        }
    }
}

impl From<WaitError> for FlowError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Cancelled(_) => FlowError::Cancelled,
            WaitError::Page(err) => FlowError::Page(err),
            other => FlowError::Wait(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_reads_as_cancelled() {
        let err = FlowError::from(WaitError::Cancelled("#description".into()));
        assert_eq!(err.to_string(), "cancelled");
        assert!(!err.is_retryable());

        let err = FlowError::from_poll(
            WorkflowStep::FillDescriptionAndSubmit,
            PollError::Cancelled("create form".into()),
        );
        assert!(matches!(err, FlowError::Cancelled));
    }

    #[test]
    fn exhausted_polls_name_their_step() {
        let err = FlowError::from_poll(
            WorkflowStep::FillAndConfirmQuantity,
            PollError::Exhausted {
                label: "confirm form".into(),
                attempts: 4,
                elapsed_ms: 2000,
            },
        );
        let text = err.to_string();
        assert!(text.contains("FillAndConfirmQuantity"));
        assert!(text.contains("4 attempts"));
    }
}
