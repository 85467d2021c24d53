//! Wait for an element to exist.

use std::sync::Arc;
use std::time::Duration;

use host_page::{ElementHandle, HostPage};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::WaitError;

/// Resolves "an element matching the selector now exists".
///
/// When the element is already present the wait returns without
/// subscribing to mutations. Otherwise exactly one mutation subscription and
/// one timer live for the duration of the wait; both are dropped on every
/// settlement path.
#[derive(Clone)]
pub struct ElementWaiter {
    page: Arc<dyn HostPage>,
    cancel: CancellationToken,
}

impl ElementWaiter {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self {
            page,
            cancel: CancellationToken::new(),
        }
    }

    /// Settle waits with [`WaitError::Cancelled`] once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn wait(&self, selector: &str, timeout: Duration) -> Result<ElementHandle, WaitError> {
        if let Some(found) = self.page.query(selector).await? {
            trace!(selector, "element already present");
            return Ok(found);
        }
        if self.cancel.is_cancelled() {
            return Err(WaitError::Cancelled(selector.to_string()));
        }

        let mut batches = self.page.mutations();
        // A node inserted between the probe and the subscription would
        // otherwise go unnoticed until some later mutation.
        if let Some(found) = self.page.query(selector).await? {
            return Ok(found);
        }

        debug!(selector, timeout_ms = timeout.as_millis() as u64, "waiting for element");
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(WaitError::Cancelled(selector.to_string()));
                }
                _ = &mut deadline => {
                    debug!(selector, "element wait timed out");
                    return Err(WaitError::Timeout {
                        selector: selector.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                batch = batches.recv() => match batch {
                    Ok(batch) if batch.is_empty() => {}
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if let Some(found) = self.page.query(selector).await? {
                            return Ok(found);
                        }
                    }
                    Err(RecvError::Closed) => {
                        return Err(WaitError::Detached(selector.to_string()));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_page::{El, MemoryPage};

    fn page_with_list() -> MemoryPage {
        let page = MemoryPage::new("https://www.torn.com/trade.php");
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(body, El::new("ul").class("trades-cont current"));
        });
        page
    }

    #[tokio::test]
    async fn present_element_resolves_without_observer() {
        let page = page_with_list();
        let waiter = ElementWaiter::new(Arc::new(page.clone()));

        let found = waiter
            .wait("ul.trades-cont.current", Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(found.selector, "ul.trades-cont.current");
        assert_eq!(page.mutation_observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_times_out_and_disconnects() {
        let page = MemoryPage::new("https://www.torn.com/trade.php");
        let waiter = ElementWaiter::new(Arc::new(page.clone()));

        let err = waiter
            .wait("#description", Duration::from_millis(10_000))
            .await
            .unwrap_err();

        match err {
            WaitError::Timeout {
                selector,
                timeout_ms,
            } => {
                assert_eq!(selector, "#description");
                assert_eq!(timeout_ms, 10_000);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(page.mutation_observer_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_scope_settles_the_wait() {
        let page = MemoryPage::new("https://www.torn.com/trade.php");
        let cancel = CancellationToken::new();
        let waiter = ElementWaiter::new(Arc::new(page.clone())).with_cancel(cancel.clone());
        cancel.cancel();

        let err = waiter
            .wait("#description", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(page.mutation_observer_count(), 0);
    }
}
