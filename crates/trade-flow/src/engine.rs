//! Page-load driven workflow engine.
//!
//! The engine keeps no state between page loads. Each call to
//! [`WorkflowEngine::on_page_load`] re-derives where the workflow stands from
//! the stored intent, the URL and the DOM, then runs until it finishes, the
//! document goes away, or a step gives up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ghosttrader_core_types::PageLoadId;
use ghosttrader_event_bus::EventBus;
use host_page::{same_document, DomEvent, ElementHandle, HostPage, PageLifecycle};
use intent_store::{Intent, IntentStore, ResumeSignal};
use page_watch::{poll_until, Attempts, ElementWaiter, WaitError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::HostUiAdapter;
use crate::errors::FlowError;
use crate::types::{
    FlowEvent, FlowTiming, Transition, WorkflowOutcome, WorkflowReport, WorkflowState,
    WorkflowStep,
};

pub struct WorkflowEngine {
    page: Arc<dyn HostPage>,
    adapter: Arc<dyn HostUiAdapter>,
    intents: IntentStore,
    timing: FlowTiming,
    events: Option<Arc<dyn EventBus<FlowEvent>>>,
    cancel: CancellationToken,
}

/// Bookkeeping for one run.
struct Run {
    load_id: PageLoadId,
    state: WorkflowState,
    transitions: Vec<Transition>,
    reused_existing: bool,
    lifecycle: broadcast::Receiver<PageLifecycle>,
    unloaded: bool,
}

impl Run {
    /// Drain lifecycle events seen so far; true once the document unloaded.
    fn unloaded(&mut self) -> bool {
        loop {
            match self.lifecycle.try_recv() {
                Ok(PageLifecycle::Unloading { .. }) | Err(TryRecvError::Closed) => {
                    self.unloaded = true;
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) => return self.unloaded,
            }
        }
    }
}

impl WorkflowEngine {
    pub fn new(
        page: Arc<dyn HostPage>,
        adapter: Arc<dyn HostUiAdapter>,
        intents: IntentStore,
        timing: FlowTiming,
    ) -> Self {
        Self {
            page,
            adapter,
            intents,
            timing,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventBus<FlowEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    /// Scope token; cancelling it abandons the run at the next suspension.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timing(&self) -> &FlowTiming {
        &self.timing
    }

    /// Run the workflow for the page load identified by `load_id`.
    pub async fn on_page_load(&self, load_id: PageLoadId) -> WorkflowReport {
        let mut run = Run {
            load_id,
            state: WorkflowState::Idle,
            transitions: Vec::new(),
            reused_existing: false,
            lifecycle: self.page.lifecycle(),
            unloaded: false,
        };

        let outcome = match self.drive(&mut run).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let state = run.state;
                if matches!(err, FlowError::Cancelled) {
                    info!(load = %run.load_id, ?state, "workflow cancelled, intent kept");
                } else {
                    warn!(load = %run.load_id, ?state, error = %err, "workflow abandoned, intent kept");
                }
                self.advance(&mut run, WorkflowState::Abandoned).await;
                WorkflowOutcome::Abandoned {
                    state,
                    reason: err.to_string(),
                }
            }
        };

        self.publish(FlowEvent::Finished {
            load_id: run.load_id.clone(),
            outcome: outcome.clone(),
        })
        .await;

        WorkflowReport {
            load_id: run.load_id,
            outcome,
            transitions: run.transitions,
            reused_existing: run.reused_existing,
        }
    }

    async fn drive(&self, run: &mut Run) -> Result<WorkflowOutcome, FlowError> {
        let intent = match self.intents.resume_signal().await? {
            ResumeSignal::Resume(intent) => intent,
            ResumeSignal::None => {
                debug!(load = %run.load_id, "no pending intent");
                return Ok(WorkflowOutcome::Idle);
            }
        };
        let url = self.page.current_url().await?;
        info!(load = %run.load_id, amount = intent.amount(), %url, "resuming pending intent");

        // Trade views are never resumed directly; the marker is only visible
        // in the list.
        self.advance(run, WorkflowState::Navigating).await;
        if !self.adapter.is_destination(&url) {
            let destination = self.adapter.destination_url(None);
            let in_document = same_document(&url, &destination);
            self.page.navigate(&destination).await?;
            if !in_document {
                return Ok(WorkflowOutcome::Navigated { url: destination });
            }
            debug!(
                load = %run.load_id,
                from_view = self.adapter.is_target_view(&url),
                "back to the trade list in place"
            );
        }

        self.advance(run, WorkflowState::AwaitingTargetList).await;
        self.pause(run, self.timing.settle_delay).await?;

        match self.locate_existing(run).await? {
            Some(link) => {
                self.advance(run, WorkflowState::ReuseExisting).await;
                run.reused_existing = true;
                info!(load = %run.load_id, "existing trade found, opening it");
                self.page.click(&link).await?;
            }
            None => {
                self.advance(run, WorkflowState::CreateNew).await;
                info!(load = %run.load_id, "no matching trade, creating one");
                self.fill_and_submit().await?;
            }
        }
        if run.unloaded() {
            return self.navigated_away().await;
        }

        self.add_and_confirm(run, intent).await
    }

    /// Probe for the list of current trades. A missing list is the common
    /// "nothing to reuse" case, not a failure.
    async fn locate_existing(&self, run: &mut Run) -> Result<Option<ElementHandle>, FlowError> {
        let selector = self.adapter.target_list_selector();
        let list = match self
            .waiter()
            .wait(selector, self.timing.list_wait_timeout)
            .await
        {
            Ok(list) => list,
            Err(WaitError::Timeout { .. }) => {
                debug!(load = %run.load_id, selector, "no trade list rendered");
                return Ok(None);
            }
            Err(err @ WaitError::Cancelled(_)) => return Err(err.into()),
            Err(err) => {
                debug!(load = %run.load_id, error = %err, "trade list check failed, creating");
                return Ok(None);
            }
        };
        match self
            .adapter
            .find_reusable_target(self.page.as_ref(), &list)
            .await
        {
            Ok(link) => Ok(link),
            Err(err) => {
                debug!(load = %run.load_id, error = %err, "trade list inspection failed, creating");
                Ok(None)
            }
        }
    }

    async fn fill_and_submit(&self) -> Result<(), FlowError> {
        let form = poll_until(
            &self.timing.poll_policy(),
            &self.cancel,
            "create form",
            |_| self.adapter.locate_create_form(self.page.as_ref()),
        )
        .await
        .map_err(|err| FlowError::from_poll(WorkflowStep::FillDescriptionAndSubmit, err))?;

        self.page
            .set_value(&form.description, self.adapter.marker())
            .await?;
        self.page
            .dispatch_event(&form.description, DomEvent::Input)
            .await?;
        if self.page.is_disabled(&form.submit).await? {
            self.page.force_enable(&form.submit).await?;
            self.page
                .dispatch_event(&form.submit, DomEvent::Change)
                .await?;
        }
        self.page.click(&form.submit).await?;
        Ok(())
    }

    async fn add_and_confirm(
        &self,
        run: &mut Run,
        intent: Intent,
    ) -> Result<WorkflowOutcome, FlowError> {
        self.advance(run, WorkflowState::AwaitingQuantityControl).await;
        let add = self.wait_for_add_control().await?;
        self.page.click(&add).await?;
        if run.unloaded() {
            return self.navigated_away().await;
        }
        self.pause(run, self.timing.confirm_settle).await?;

        self.advance(run, WorkflowState::AwaitingConfirmation).await;
        let form = poll_until(
            &self.timing.poll_policy(),
            &self.cancel,
            "confirm form",
            |_| self.adapter.locate_confirm_form(self.page.as_ref()),
        )
        .await
        .map_err(|err| FlowError::from_poll(WorkflowStep::FillAndConfirmQuantity, err))?;

        let current = parse_quantity(&self.page.value(&form.quantity).await?);
        let total = current.saturating_add(intent.amount());
        self.page
            .set_value(&form.quantity, &total.to_string())
            .await?;
        self.page
            .dispatch_event(&form.quantity, DomEvent::Input)
            .await?;
        self.page
            .dispatch_event(&form.quantity, DomEvent::Change)
            .await?;
        self.page.force_enable(&form.confirm).await?;
        self.page.click(&form.confirm).await?;
        self.intents.clear().await?;

        self.advance(run, WorkflowState::Done).await;
        info!(load = %run.load_id, amount = intent.amount(), total, "amount added to trade");
        Ok(WorkflowOutcome::Done {
            amount: intent.amount(),
            total,
        })
    }

    /// Wait for the add-quantity control, retrying after each timed-out wait.
    async fn wait_for_add_control(&self) -> Result<ElementHandle, FlowError> {
        let selector = self.adapter.add_quantity_selector();
        let waiter = self.waiter();
        let policy = self
            .timing
            .poll_policy()
            .with_initial_delay(Duration::ZERO);
        let mut attempts = Attempts::new(policy, self.cancel.clone(), "add quantity control");
        loop {
            attempts.next().await.map_err(|err| {
                FlowError::from_poll(WorkflowStep::LocateAddQuantityControl, err)
            })?;
            match waiter.wait(selector, self.timing.add_control_timeout).await {
                Ok(control) => return Ok(control),
                Err(err @ WaitError::Timeout { .. }) => {
                    info!(error = %err, "add money control not found, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn waiter(&self) -> ElementWaiter {
        ElementWaiter::new(Arc::clone(&self.page)).with_cancel(self.cancel.clone())
    }

    /// Fixed settle delay; fails once the scope is cancelled or the document
    /// unloaded.
    async fn pause(&self, run: &mut Run, delay: Duration) -> Result<(), FlowError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FlowError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        if run.unloaded() {
            return Err(FlowError::Cancelled);
        }
        Ok(())
    }

    async fn navigated_away(&self) -> Result<WorkflowOutcome, FlowError> {
        let url = match self.page.current_url().await {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "url of the next document unavailable");
                String::new()
            }
        };
        debug!(%url, "document replaced, next load resumes");
        Ok(WorkflowOutcome::Navigated { url })
    }

    async fn advance(&self, run: &mut Run, to: WorkflowState) {
        let from = run.state;
        run.state = to;
        run.transitions.push(Transition {
            from,
            to,
            at: Utc::now(),
        });
        info!(load = %run.load_id, from = ?from, to = ?to, "workflow transition");
        self.publish(FlowEvent::Transition {
            load_id: run.load_id.clone(),
            from,
            to,
        })
        .await;
    }

    async fn publish(&self, event: FlowEvent) {
        if let Some(bus) = &self.events {
            if let Err(err) = bus.publish(event).await {
                debug!(error = %err, "flow event dropped");
            }
        }
    }
}

/// Digits of a host-formatted quantity ("$1,300" reads as 1300). Empty or
/// overflowing input is zero.
pub fn parse_quantity(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
