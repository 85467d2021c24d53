//! Attribute watchers and their per-page-load registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ghosttrader_core_types::WatchId;
use host_page::{HostPage, MutationRecord, PageError};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::WaitError;

/// Which attribute of which element to follow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSource {
    pub selector: String,
    pub attribute: String,
}

impl AttributeSource {
    pub fn new(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }
}

/// Handle to one running watch. Clones share the same watch.
#[derive(Clone, Debug)]
pub struct Subscription {
    id: WatchId,
    token: CancellationToken,
    running: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.running.load(Ordering::SeqCst)
    }
}

/// Follows one attribute of one element and reports every write to it.
#[derive(Clone)]
pub struct ChangeWatcher {
    page: Arc<dyn HostPage>,
}

impl ChangeWatcher {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    /// Start watching `source`. `on_change` receives the attribute's new
    /// value for every write, on the watcher task; it is never invoked
    /// before this call has returned.
    pub async fn observe<F>(
        &self,
        source: &AttributeSource,
        cancel: CancellationToken,
        on_change: F,
    ) -> Result<Subscription, WaitError>
    where
        F: Fn(Option<String>) + Send + Sync + 'static,
    {
        let element = self
            .page
            .query(&source.selector)
            .await?
            .ok_or_else(|| WaitError::SourceMissing(source.selector.clone()))?;

        let id = WatchId::new();
        let running = Arc::new(AtomicBool::new(true));
        let mut batches = self.page.mutations();
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let page = Arc::clone(&self.page);
        let attribute = source.attribute.clone();
        let token = cancel.clone();
        let flag = Arc::clone(&running);
        tokio::spawn(async move {
            if armed_rx.await.is_err() {
                flag.store(false, Ordering::SeqCst);
                return;
            }
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    batch = batches.recv() => match batch {
                        Ok(batch) => {
                            for value in batch.attribute_values(element.id, &attribute) {
                                on_change(value.map(str::to_string));
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            trace!(skipped, "watcher lagged, re-reading attribute");
                            match page.attribute(&element, &attribute).await {
                                Ok(value) => on_change(value),
                                Err(err) => debug!(error = %err, "watched element is gone"),
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            flag.store(false, Ordering::SeqCst);
            trace!(watch = %id, "watcher stopped");
        });

        debug!(watch = %id, selector = %source.selector, attribute = %source.attribute, "watching attribute");
        let _ = armed_tx.send(());
        Ok(Subscription {
            id,
            token: cancel,
            running,
        })
    }
}

/// Owns every watch created during one page load.
///
/// Dropping the registry tears all of them down.
pub struct WatcherRegistry {
    watcher: ChangeWatcher,
    root: CancellationToken,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl WatcherRegistry {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self::with_parent(page, &CancellationToken::new())
    }

    /// Watches also end when `parent` is cancelled.
    pub fn with_parent(page: Arc<dyn HostPage>, parent: &CancellationToken) -> Self {
        Self {
            watcher: ChangeWatcher::new(page),
            root: parent.child_token(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub async fn observe<F>(
        &self,
        source: &AttributeSource,
        on_change: F,
    ) -> Result<Subscription, WaitError>
    where
        F: Fn(Option<String>) + Send + Sync + 'static,
    {
        let subscription = self
            .watcher
            .observe(source, self.root.child_token(), on_change)
            .await?;
        self.subscriptions.lock().push(subscription.clone());
        Ok(subscription)
    }

    /// Stop every registered watch. Returns how many were registered.
    pub fn teardown_all(&self) -> usize {
        let drained: Vec<Subscription> = self.subscriptions.lock().drain(..).collect();
        for subscription in &drained {
            subscription.stop();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "watchers torn down");
        }
        drained.len()
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.is_active())
            .count()
    }
}

impl Drop for WatcherRegistry {
    fn drop(&mut self) {
        self.teardown_all();
        self.root.cancel();
    }
}

/// Parse a balance the way the host formats it: leading digits, anything
/// else (missing, negative, garbage) is zero.
pub fn parse_balance(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else { return 0 };
    let digits: String = raw
        .trim_start()
        .trim_start_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Snapshot read of the live balance.
pub async fn read_balance(page: &dyn HostPage, source: &AttributeSource) -> Result<u64, PageError> {
    let Some(element) = page.query(&source.selector).await? else {
        return Ok(0);
    };
    let raw = page.attribute(&element, &source.attribute).await?;
    Ok(parse_balance(raw.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_parsing_is_lenient() {
        assert_eq!(parse_balance(Some("1500")), 1500);
        assert_eq!(parse_balance(Some(" 42abc")), 42);
        assert_eq!(parse_balance(Some("-5")), 0);
        assert_eq!(parse_balance(Some("")), 0);
        assert_eq!(parse_balance(None), 0);
        assert_eq!(parse_balance(Some("99999999999999999999999")), 0);
    }
}
