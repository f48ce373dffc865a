//! In-process domain event fan-out.

use tokio::sync::broadcast;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::DomainEvent;
use frontdesk_core::types::Thread;

use crate::thread_store::ThreadObserver;

/// Broadcast channel carrying [`DomainEvent`]s to live subscribers.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// dropped, and slow subscribers observe `Lagged` on their side.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ThreadObserver for EventBus {
    fn thread_updated(&self, _thread: &Thread, event: &DomainEvent) -> Result<(), FrontdeskError> {
        self.publish(event.clone());
        Ok(())
    }
}
