//! Ghost-trade workflow
//!
//! Resumes a pending intent on every page load: navigate to the trade
//! screen, reuse or create the marked trade, add the amount and confirm.
//! All knowledge of the host's markup sits behind [`HostUiAdapter`].

pub mod adapter;
pub mod engine;
pub mod errors;
pub mod sim;
pub mod types;

pub use adapter::{ConfirmForm, CreateForm, HostUiAdapter, SelectorSet, TornUiAdapter};
pub use engine::WorkflowEngine;
pub use errors::FlowError;
pub use types::{
    FlowEvent, FlowTiming, Transition, WorkflowOutcome, WorkflowReport, WorkflowState,
    WorkflowStep,
};
