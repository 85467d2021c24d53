use anyhow::Result;
use clap::ValueEnum;
use ghost_trader::SessionEvent;
use serde::Serialize;
use trade_flow::{WorkflowOutcome, WorkflowReport, WorkflowState};

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Print a serializable value; `human` is used for the human format.
pub fn emit<T: Serialize>(format: &OutputFormat, value: &T, human: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", human()),
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Yaml => print!("---\n{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

pub fn print_event(format: &OutputFormat, event: &SessionEvent) -> Result<()> {
    emit(format, event, || describe_event(event))
}

fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::LoadStarted { url, .. } => format!("page loaded: {url}"),
        SessionEvent::Finished { report } => describe_report(report),
        SessionEvent::InputOffered { balance, .. } => {
            format!("amount field ready (balance {balance})")
        }
        SessionEvent::Submitted { amount } => format!("ghost trade of {amount} requested"),
        SessionEvent::Rejected { input, reason } => format!("rejected {input:?}: {reason}"),
        SessionEvent::Discarded => "pending ghost trade discarded".to_string(),
        SessionEvent::Unloaded { url } => format!("leaving {url}"),
    }
}

pub fn describe_report(report: &WorkflowReport) -> String {
    let summary = match &report.outcome {
        WorkflowOutcome::Idle => "no pending ghost trade".to_string(),
        WorkflowOutcome::Navigated { url } => format!("navigating to {url}"),
        WorkflowOutcome::Done { amount, total } => {
            format!("added {amount} to the ghost trade (trade now holds {total})")
        }
        WorkflowOutcome::Abandoned { state, reason } => {
            format!("workflow abandoned while {state:?}: {reason}")
        }
    };
    if report.transitions.is_empty() {
        return summary;
    }
    let mut path = vec![WorkflowState::Idle];
    path.extend(report.states());
    let path: Vec<String> = path.iter().map(|state| format!("{state:?}")).collect();
    format!("{summary}\n  {}", path.join(" -> "))
}
