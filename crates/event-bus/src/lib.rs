use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use ghosttrader_core_types::GhostError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Publish an event, returning how many subscribers received it.
    async fn publish(&self, event: E) -> Result<usize, GhostError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus. Publishing with nobody listening is not an error;
/// progress events are advisory.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<usize, GhostError> {
        if self.subscriber_count() == 0 {
            debug!(?event, "no subscribers for event");
            return Ok(0);
        }
        self.sender
            .send(event)
            .map_err(|err| GhostError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Forward bus events into an mpsc receiver so callers can await them
/// without handling broadcast lag themselves. Lagged events are skipped.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::<u32>::new(4);
        assert_eq!(bus.publish(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn forwarded_events_arrive_in_order() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut rx = to_mpsc(Arc::clone(&bus), 8);
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(1).await.unwrap();
        bus.publish(2).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }
}
