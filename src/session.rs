//! Drives the workflow across page loads.
//!
//! Each document gets its own [`PageLoad`] scope: a fresh watcher registry,
//! a cancellation token and one workflow run. Nothing survives an unload
//! except what the intent store keeps in session storage.

use std::sync::Arc;

use ghosttrader_core_types::PageLoadId;
use ghosttrader_event_bus::{EventBus, InMemoryBus};
use host_page::{HostPage, PageLifecycle, SessionStorage};
use intent_store::IntentStore;
use page_watch::WatcherRegistry;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trade_flow::{
    FlowEvent, FlowTiming, HostUiAdapter, WorkflowEngine, WorkflowOutcome, WorkflowReport,
};

use crate::config::Config;
use crate::errors::GhostTraderError;
use crate::input::{should_offer_input, InputController};

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 16;

/// Requests from whoever plays the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Put `text` in the amount field and press the trigger.
    Submit(String),
    /// Abandon the running workflow; the intent stays stored.
    Cancel,
    /// Abandon the running workflow and forget the intent.
    Discard,
    Shutdown,
}

/// What happened during the session, in order.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoadStarted { load_id: PageLoadId, url: String },
    Finished { report: WorkflowReport },
    InputOffered { load_id: PageLoadId, balance: u64 },
    Submitted { amount: u64 },
    Rejected { input: String, reason: String },
    Discarded,
    Unloaded { url: String },
}

/// Sends commands to a running [`GhostSession`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), GhostTraderError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GhostTraderError::SessionClosed)
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), GhostTraderError> {
        self.send(SessionCommand::Submit(text.into())).await
    }

    pub async fn cancel(&self) -> Result<(), GhostTraderError> {
        self.send(SessionCommand::Cancel).await
    }

    pub async fn shutdown(&self) -> Result<(), GhostTraderError> {
        self.send(SessionCommand::Shutdown).await
    }
}

struct PageLoad {
    id: PageLoadId,
    /// Lives as long as the document
    cancel: CancellationToken,
    /// Child of `cancel`, ends only the workflow run
    run_cancel: CancellationToken,
    registry: Arc<WatcherRegistry>,
    controller: Arc<Mutex<Option<Arc<InputController>>>>,
    task: JoinHandle<()>,
}

impl PageLoad {
    fn controller(&self) -> Option<Arc<InputController>> {
        self.controller.lock().clone()
    }

    fn close(self) -> JoinHandle<()> {
        self.cancel.cancel();
        let stopped = self.registry.teardown_all();
        debug!(load_id = %self.id, watchers = stopped, "page load closed");
        self.task
    }
}

pub struct GhostSession {
    page: Arc<dyn HostPage>,
    adapter: Arc<dyn HostUiAdapter>,
    intents: IntentStore,
    timing: FlowTiming,
    flow_events: Arc<InMemoryBus<FlowEvent>>,
    events: Arc<InMemoryBus<SessionEvent>>,
}

impl GhostSession {
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
            flow_events: InMemoryBus::new(EVENT_CAPACITY),
            events: InMemoryBus::new(EVENT_CAPACITY),
        }
    }

    pub fn from_config(
        page: Arc<dyn HostPage>,
        storage: Arc<dyn SessionStorage>,
        config: &Config,
    ) -> Self {
        Self::new(
            page,
            Arc::new(config.adapter()),
            IntentStore::new(storage, config.storage.intent_key.clone()),
            config.flow_timing(),
        )
    }

    /// Session progress. Subscribe before spawning to see the first load.
    pub fn events(&self) -> Arc<InMemoryBus<SessionEvent>> {
        Arc::clone(&self.events)
    }

    /// Workflow transitions of every page load.
    pub fn flow_events(&self) -> Arc<InMemoryBus<FlowEvent>> {
        Arc::clone(&self.flow_events)
    }

    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (SessionHandle { commands: tx }, task)
    }

    /// Runs until shutdown, the command channel closing or the page closing.
    pub async fn run(self, mut commands: mpsc::Receiver<SessionCommand>) {
        let mut lifecycle = self.page.lifecycle();
        let mut current = self.resync().await;

        loop {
            tokio::select! {
                event = lifecycle.recv() => match event {
                    Ok(PageLifecycle::Unloading { url }) => {
                        close(current.take());
                        self.emit(SessionEvent::Unloaded { url }).await;
                    }
                    Ok(PageLifecycle::Loaded { url }) => {
                        close(current.take());
                        current = Some(self.start_load(url));
                    }
                    Ok(PageLifecycle::HashChanged { url }) => {
                        debug!(%url, "fragment changed; same document");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle events lagged; restarting page load");
                        close(current.take());
                        current = self.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("page closed; session ending");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::Submit(text)) => {
                        self.submit(current.as_ref(), &text).await;
                    }
                    Some(SessionCommand::Cancel) => {
                        if let Some(load) = &current {
                            info!(load_id = %load.id, "workflow cancelled by user");
                            load.run_cancel.cancel();
                        }
                    }
                    Some(SessionCommand::Discard) => {
                        if let Some(load) = &current {
                            load.run_cancel.cancel();
                        }
                        match self.intents.clear().await {
                            Ok(()) => self.emit(SessionEvent::Discarded).await,
                            Err(err) => warn!(error = %err, "failed to discard intent"),
                        }
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
            }
        }

        if let Some(load) = current.take() {
            if let Err(err) = load.close().await {
                warn!(error = %err, "page load task failed");
            }
        }
    }

    async fn resync(&self) -> Option<PageLoad> {
        match self.page.current_url().await {
            Ok(url) => Some(self.start_load(url)),
            Err(err) => {
                warn!(error = %err, "cannot read page url; waiting for next load");
                None
            }
        }
    }

    fn start_load(&self, url: String) -> PageLoad {
        let id = PageLoadId::new();
        let cancel = CancellationToken::new();
        let run_cancel = cancel.child_token();
        let registry = Arc::new(WatcherRegistry::with_parent(Arc::clone(&self.page), &cancel));
        let controller = Arc::new(Mutex::new(None));
        let engine = WorkflowEngine::new(
            Arc::clone(&self.page),
            Arc::clone(&self.adapter),
            self.intents.clone(),
            self.timing.clone(),
        )
        .with_events(Arc::clone(&self.flow_events) as Arc<dyn EventBus<FlowEvent>>)
        .with_cancel(run_cancel.clone());

        info!(load_id = %id, %url, "page loaded");
        let task = tokio::spawn(settle_load(LoadTask {
            id: id.clone(),
            url,
            engine,
            page: Arc::clone(&self.page),
            adapter: Arc::clone(&self.adapter),
            intents: self.intents.clone(),
            registry: Arc::clone(&registry),
            cancel: cancel.clone(),
            slot: Arc::clone(&controller),
            events: Arc::clone(&self.events),
        }));

        PageLoad {
            id,
            cancel,
            run_cancel,
            registry,
            controller,
            task,
        }
    }

    async fn submit(&self, load: Option<&PageLoad>, text: &str) {
        let Some(controller) = load.and_then(PageLoad::controller) else {
            warn!(input = %text, "no amount field on this page; submission ignored");
            self.emit(SessionEvent::Rejected {
                input: text.to_string(),
                reason: GhostTraderError::InputUnavailable.to_string(),
            })
            .await;
            return;
        };

        controller.on_input(text);
        match controller.trigger().await {
            Ok(intent) => {
                self.emit(SessionEvent::Submitted {
                    amount: intent.amount(),
                })
                .await;
            }
            Err(err) => {
                if !err.is_validation() {
                    warn!(error = %err, "submission failed");
                }
                self.emit(SessionEvent::Rejected {
                    input: text.to_string(),
                    reason: err.to_string(),
                })
                .await;
            }
        }
    }

    async fn emit(&self, event: SessionEvent) {
        emit(&self.events, event).await;
    }
}

fn close(load: Option<PageLoad>) {
    if let Some(load) = load {
        drop(load.close());
    }
}

async fn emit(bus: &InMemoryBus<SessionEvent>, event: SessionEvent) {
    if let Err(err) = bus.publish(event).await {
        debug!(error = %err, "session event dropped");
    }
}

struct LoadTask {
    id: PageLoadId,
    url: String,
    engine: WorkflowEngine,
    page: Arc<dyn HostPage>,
    adapter: Arc<dyn HostUiAdapter>,
    intents: IntentStore,
    registry: Arc<WatcherRegistry>,
    cancel: CancellationToken,
    slot: Arc<Mutex<Option<Arc<InputController>>>>,
    events: Arc<InMemoryBus<SessionEvent>>,
}

/// One page load: resume the workflow, then offer the amount field when no
/// workflow is in flight.
async fn settle_load(task: LoadTask) {
    emit(
        &task.events,
        SessionEvent::LoadStarted {
            load_id: task.id.clone(),
            url: task.url.clone(),
        },
    )
    .await;

    let report = task.engine.on_page_load(task.id.clone()).await;
    let offer = matches!(
        report.outcome,
        WorkflowOutcome::Idle | WorkflowOutcome::Abandoned { .. }
    );
    emit(&task.events, SessionEvent::Finished { report }).await;
    if !offer || task.cancel.is_cancelled() {
        return;
    }

    match offer_input(&task).await {
        Ok(Some(controller)) => {
            let balance = controller.display_balance();
            *task.slot.lock() = Some(Arc::new(controller));
            info!(load_id = %task.id, balance, "amount field offered");
            emit(
                &task.events,
                SessionEvent::InputOffered {
                    load_id: task.id.clone(),
                    balance,
                },
            )
            .await;
        }
        Ok(None) => debug!(load_id = %task.id, "trade list shown; amount field not offered"),
        Err(err) => warn!(load_id = %task.id, error = %err, "failed to offer amount field"),
    }
}

async fn offer_input(task: &LoadTask) -> Result<Option<InputController>, GhostTraderError> {
    if !should_offer_input(task.page.as_ref(), task.adapter.as_ref()).await? {
        return Ok(None);
    }
    let controller = InputController::new(
        Arc::clone(&task.page),
        Arc::clone(&task.adapter),
        task.intents.clone(),
    )
    .await?;
    controller.attach(&task.registry).await?;
    Ok(Some(controller))
}
