//! Outbound Dispatcher: appends agent replies and notifies the webhook.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use frontdesk_core::events::{DomainEvent, WebhookEvent};
use frontdesk_core::types::{Message, Thread};

use crate::error::ThreadError;
use crate::events::EventBus;
use crate::notifier::WebhookNotifier;
use crate::thread_store::ThreadStore;

/// Result of a dispatched agent reply.
#[derive(Debug)]
pub struct Dispatched {
    /// Thread snapshot including the appended reply.
    pub thread: Thread,
    pub message: Message,
    /// Background notification task; its outcome is already discarded.
    /// `None` when no async runtime was available to run it.
    pub notification: Option<JoinHandle<()>>,
}

pub struct OutboundDispatcher {
    threads: Arc<ThreadStore>,
    notifier: Arc<dyn WebhookNotifier>,
    events: Option<EventBus>,
}

impl OutboundDispatcher {
    pub fn new(threads: Arc<ThreadStore>, notifier: Arc<dyn WebhookNotifier>) -> Self {
        Self {
            threads,
            notifier,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Append an agent reply to `thread` and notify the webhook listener.
    ///
    /// Blank text or a missing thread is a silent no-op (`Ok(None)`). The
    /// notification runs as a detached task after the append commits; its
    /// failure is logged and never reaches the caller.
    pub fn send_agent_message(
        &self,
        thread: Option<&Thread>,
        text: &str,
    ) -> Result<Option<Dispatched>, ThreadError> {
        let Some(thread) = thread else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let message = Message::agent(text);
        let updated = self
            .threads
            .append_message(&thread.tenant_id, &thread.id, message)?;
        // The store may have raised the timestamp; report what was stored.
        let message = match updated.messages.last() {
            Some(stored) => stored.clone(),
            None => Message::agent(text),
        };

        if let Some(events) = &self.events {
            events.publish(DomainEvent::AgentMessageSent {
                tenant_id: updated.tenant_id.clone(),
                thread_id: updated.id.clone(),
                to: updated.with.clone(),
                timestamp: message.timestamp,
            });
        }

        let event = WebhookEvent::MessageSent {
            tenant: updated.tenant_id.clone(),
            to: updated.with.clone(),
            thread_id: updated.id.clone(),
            message: message.clone(),
        };
        let notification = self.spawn_notification(event);

        Ok(Some(Dispatched {
            thread: updated,
            message,
            notification,
        }))
    }

    fn spawn_notification(&self, event: WebhookEvent) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime, skipping webhook notification");
            return None;
        };

        let notifier = Arc::clone(&self.notifier);
        Some(handle.spawn(async move {
            let WebhookEvent::MessageSent { tenant, thread_id, .. } = &event;
            match notifier.post(&event).await {
                Ok(()) => debug!(tenant = %tenant, thread_id = %thread_id, "Webhook notified"),
                Err(e) => warn!(
                    tenant = %tenant,
                    thread_id = %thread_id,
                    error = %e,
                    "Webhook notification failed, discarding"
                ),
            }
        }))
    }
}
