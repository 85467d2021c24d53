//! Core types for the ghost-trade workflow

use std::time::Duration;

use chrono::{DateTime, Utc};
use ghosttrader_core_types::PageLoadId;
use page_watch::PollPolicy;
use serde::{Deserialize, Serialize};

/// Position of the workflow within one page load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Navigating,
    AwaitingTargetList,
    ReuseExisting,
    CreateNew,
    AwaitingQuantityControl,
    AwaitingConfirmation,
    Done,
    Abandoned,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Abandoned)
    }

    /// The step being worked on while in this state.
    pub fn step(&self) -> Option<WorkflowStep> {
        match self {
            WorkflowState::Navigating => Some(WorkflowStep::Navigate),
            WorkflowState::AwaitingTargetList | WorkflowState::ReuseExisting => {
                Some(WorkflowStep::LocateOrCreateTarget)
            }
            WorkflowState::CreateNew => Some(WorkflowStep::FillDescriptionAndSubmit),
            WorkflowState::AwaitingQuantityControl => Some(WorkflowStep::LocateAddQuantityControl),
            WorkflowState::AwaitingConfirmation => Some(WorkflowStep::FillAndConfirmQuantity),
            WorkflowState::Idle | WorkflowState::Done | WorkflowState::Abandoned => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStep {
    Navigate,
    LocateOrCreateTarget,
    FillDescriptionAndSubmit,
    LocateAddQuantityControl,
    FillAndConfirmQuantity,
}

/// Fixed delays and bounds the workflow runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowTiming {
    /// Wait after arriving at the trade screen before looking for the list
    pub settle_delay: Duration,
    pub list_wait_timeout: Duration,
    pub poll_interval: Duration,
    /// Bound of each wait for the add-quantity control; a timeout retries
    pub add_control_timeout: Duration,
    /// Wait after opening the quantity form
    pub confirm_settle: Duration,
    pub max_attempts: u64,
    pub max_duration: Option<Duration>,
    pub stall_log_every: u64,
}

impl Default for FlowTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            list_wait_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(500),
            add_control_timeout: Duration::from_millis(10_000),
            confirm_settle: Duration::from_millis(500),
            max_attempts: u64::MAX,
            max_duration: None,
            stall_log_every: 20,
        }
    }
}

impl FlowTiming {
    /// Policy shared by every polling step.
    pub fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::every(self.poll_interval)
            .with_max_attempts(self.max_attempts)
            .with_stall_log_every(self.stall_log_every);
        match self.max_duration {
            Some(limit) => policy.with_max_duration(limit),
            None => policy,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
}

/// How one page load's run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// No pending intent
    Idle,
    /// The document is being replaced; the next load resumes
    Navigated { url: String },
    /// Amount added and confirmed, intent cleared
    Done { amount: u64, total: u64 },
    /// Intent retained for a later attempt
    Abandoned {
        state: WorkflowState,
        reason: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub load_id: PageLoadId,
    pub outcome: WorkflowOutcome,
    pub transitions: Vec<Transition>,
    pub reused_existing: bool,
}

impl WorkflowReport {
    /// States visited after the initial `Idle`, in order.
    pub fn states(&self) -> Vec<WorkflowState> {
        self.transitions.iter().map(|t| t.to).collect()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Done { .. })
    }
}

/// Progress published on the event bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    Transition {
        load_id: PageLoadId,
        from: WorkflowState,
        to: WorkflowState,
    },
    Finished {
        load_id: PageLoadId,
        outcome: WorkflowOutcome,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_host_latency() {
        let timing = FlowTiming::default();
        assert_eq!(timing.settle_delay, Duration::from_secs(1));
        assert_eq!(timing.list_wait_timeout, Duration::from_secs(10));
        assert_eq!(timing.confirm_settle, Duration::from_millis(500));

        let policy = timing.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(500));
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_attempts, u64::MAX);
    }

    #[test]
    fn only_done_and_abandoned_are_terminal() {
        assert!(WorkflowState::Done.is_terminal());
        assert!(WorkflowState::Abandoned.is_terminal());
        assert!(!WorkflowState::AwaitingConfirmation.is_terminal());
        assert_eq!(
            WorkflowState::ReuseExisting.step(),
            Some(WorkflowStep::LocateOrCreateTarget)
        );
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(WorkflowOutcome::Done {
            amount: 300,
            total: 1300,
        })
        .unwrap();
        assert_eq!(json["outcome"], "done");
        assert_eq!(json["total"], 1300);
    }
}
