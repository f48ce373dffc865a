//! Thread Store: per-tenant conversation state.
//!
//! Threads are kept in a keyed map per tenant (`party -> thread id -> thread`)
//! behind a per-tenant mutex. Find-or-create and append for a tenant run under
//! that mutex, which gives the two guarantees callers depend on:
//!
//! - concurrent deliveries from the same party converge on one thread
//! - appends to one thread are applied in call order, never interleaved
//!
//! When a [`ThreadJournal`] is attached, every mutation is written to it before
//! the in-memory map changes, so a failed write leaves no half-applied state.
//! Observers are notified after the tenant lock is released; their failures are
//! logged and never reach the caller.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::DomainEvent;
use frontdesk_core::types::{
    Channel, InboundMessage, Message, PartyKey, TenantId, Thread, ThreadId, Timestamp,
};
use frontdesk_storage::ThreadRepository;

use crate::error::ThreadError;

/// Durable backing for the Thread Store.
pub trait ThreadJournal: Send + Sync {
    /// Insert `thread` unless its `(tenant, party)` key exists. Returns the
    /// stored thread and whether it was created by this call.
    fn insert_if_absent(&self, thread: &Thread) -> Result<(Thread, bool), FrontdeskError>;

    fn append(
        &self,
        tenant: &TenantId,
        thread_id: &ThreadId,
        message: &Message,
    ) -> Result<(), FrontdeskError>;
}

impl ThreadJournal for ThreadRepository {
    fn insert_if_absent(&self, thread: &Thread) -> Result<(Thread, bool), FrontdeskError> {
        ThreadRepository::insert_if_absent(self, thread)
    }

    fn append(
        &self,
        tenant: &TenantId,
        thread_id: &ThreadId,
        message: &Message,
    ) -> Result<(), FrontdeskError> {
        self.append_message(tenant, thread_id, message)
    }
}

/// Receives thread changes after they are committed.
pub trait ThreadObserver: Send + Sync {
    fn thread_updated(&self, thread: &Thread, event: &DomainEvent) -> Result<(), FrontdeskError>;
}

#[derive(Default)]
struct TenantThreads {
    by_party: HashMap<PartyKey, ThreadId>,
    threads: HashMap<ThreadId, Thread>,
}

/// Issues strictly increasing creation timestamps so `{channel}-{millis}` ids
/// never collide, even for parties created within the same millisecond.
#[derive(Default)]
struct ThreadIdGenerator {
    last: AtomicI64,
}

impl ThreadIdGenerator {
    fn next(&self, now: Timestamp) -> Timestamp {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.0.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Timestamp(candidate),
                Err(actual) => current = actual,
            }
        }
    }

    fn observe(&self, ts: Timestamp) {
        self.last.fetch_max(ts.0, Ordering::AcqRel);
    }
}

/// Changes made under the tenant lock, replayed to observers afterwards.
type Committed = Vec<(Thread, DomainEvent)>;

fn poisoned() -> ThreadError {
    ThreadError::Storage("thread store lock poisoned".to_string())
}

pub struct ThreadStore {
    tenants: RwLock<HashMap<TenantId, Arc<Mutex<TenantThreads>>>>,
    observers: RwLock<Vec<Arc<dyn ThreadObserver>>>,
    ids: ThreadIdGenerator,
    journal: Option<Arc<dyn ThreadJournal>>,
    max_message_chars: usize,
}

impl ThreadStore {
    /// An in-memory store with no durable journal.
    pub fn new(max_message_chars: usize) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            ids: ThreadIdGenerator::default(),
            journal: None,
            max_message_chars,
        }
    }

    /// A store that writes through to `journal` before mutating memory.
    pub fn with_journal(max_message_chars: usize, journal: Arc<dyn ThreadJournal>) -> Self {
        Self {
            journal: Some(journal),
            ..Self::new(max_message_chars)
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn ThreadObserver>) {
        match self.observers.write() {
            Ok(mut observers) => observers.push(observer),
            Err(poisoned) => poisoned.into_inner().push(observer),
        }
    }

    /// Load previously persisted threads. Existing entries are replaced.
    pub fn hydrate(&self, threads: Vec<Thread>) -> Result<usize, ThreadError> {
        let count = threads.len();
        for thread in threads {
            self.ids.observe(thread.created_at);
            let slot = self.tenant_slot(&thread.tenant_id)?;
            let mut state = slot.lock().map_err(|_| poisoned())?;
            state.by_party.insert(thread.with.clone(), thread.id.clone());
            state.threads.insert(thread.id.clone(), thread);
        }
        info!(threads = count, "Hydrated thread store");
        Ok(count)
    }

    /// Return the party's thread under `tenant`, creating it on first contact.
    pub fn find_or_create_thread(
        &self,
        tenant: &TenantId,
        channel: Channel,
        party: &PartyKey,
    ) -> Result<Thread, ThreadError> {
        let slot = self.tenant_slot(tenant)?;
        let mut committed = Committed::new();
        let result = {
            let mut state = slot.lock().map_err(|_| poisoned())?;
            let outcome = self
                .find_or_create_locked(&mut state, tenant, channel, party, &mut committed)
                .and_then(|id| snapshot(&state, tenant, &id));
            outcome
        };
        self.notify(&committed);
        result
    }

    /// Append `message` to an existing thread and return the updated snapshot.
    ///
    /// A timestamp older than the thread's last message is raised to it, so the
    /// sequence stays in timestamp order.
    pub fn append_message(
        &self,
        tenant: &TenantId,
        thread_id: &ThreadId,
        message: Message,
    ) -> Result<Thread, ThreadError> {
        let slot = self.existing_slot(tenant)?.ok_or_else(|| ThreadError::NotFound {
            tenant: tenant.clone(),
            thread_id: thread_id.clone(),
        })?;
        let mut committed = Committed::new();
        let thread = {
            let mut state = slot.lock().map_err(|_| poisoned())?;
            self.append_locked(&mut state, tenant, thread_id, message, &mut committed)?
        };
        self.notify(&committed);
        Ok(thread)
    }

    /// Find-or-create the sender's thread and append the delivery, atomically
    /// with respect to other deliveries for the same tenant.
    pub fn ingest(
        &self,
        tenant: &TenantId,
        inbound: &InboundMessage,
    ) -> Result<Thread, ThreadError> {
        let party = PartyKey::parse(&inbound.from)?;
        let length = inbound.text.chars().count();
        if length > self.max_message_chars {
            return Err(ThreadError::Validation(format!(
                "message is {} characters, limit is {}",
                length, self.max_message_chars
            )));
        }
        let received_at = inbound.received_at.unwrap_or_else(Timestamp::now);
        let message = Message::inbound(inbound.channel, inbound.text.clone(), received_at);

        let slot = self.tenant_slot(tenant)?;
        let mut committed = Committed::new();
        let result = {
            let mut state = slot.lock().map_err(|_| poisoned())?;
            let outcome = self
                .find_or_create_locked(&mut state, tenant, inbound.channel, &party, &mut committed)
                .and_then(|id| self.append_locked(&mut state, tenant, &id, message, &mut committed));
            outcome
        };
        // A created thread stays even when its first append fails.
        self.notify(&committed);
        let thread = result?;

        debug!(
            tenant = %tenant,
            thread_id = %thread.id,
            channel = %inbound.channel,
            messages = thread.messages.len(),
            "Ingested inbound message"
        );
        Ok(thread)
    }

    pub fn get(&self, tenant: &TenantId, thread_id: &ThreadId) -> Result<Option<Thread>, ThreadError> {
        let Some(slot) = self.existing_slot(tenant)? else {
            return Ok(None);
        };
        let state = slot.lock().map_err(|_| poisoned())?;
        Ok(state.threads.get(thread_id).cloned())
    }

    pub fn find_by_party(
        &self,
        tenant: &TenantId,
        party: &PartyKey,
    ) -> Result<Option<Thread>, ThreadError> {
        let Some(slot) = self.existing_slot(tenant)? else {
            return Ok(None);
        };
        let state = slot.lock().map_err(|_| poisoned())?;
        Ok(state
            .by_party
            .get(party)
            .and_then(|id| state.threads.get(id))
            .cloned())
    }

    pub fn thread_count(&self, tenant: &TenantId) -> Result<usize, ThreadError> {
        let Some(slot) = self.existing_slot(tenant)? else {
            return Ok(0);
        };
        let state = slot.lock().map_err(|_| poisoned())?;
        Ok(state.threads.len())
    }

    fn existing_slot(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Arc<Mutex<TenantThreads>>>, ThreadError> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        Ok(tenants.get(tenant).cloned())
    }

    fn tenant_slot(&self, tenant: &TenantId) -> Result<Arc<Mutex<TenantThreads>>, ThreadError> {
        if let Some(slot) = self.existing_slot(tenant)? {
            return Ok(slot);
        }
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        Ok(tenants.entry(tenant.clone()).or_default().clone())
    }

    fn find_or_create_locked(
        &self,
        state: &mut TenantThreads,
        tenant: &TenantId,
        channel: Channel,
        party: &PartyKey,
        committed: &mut Committed,
    ) -> Result<ThreadId, ThreadError> {
        if let Some(id) = state.by_party.get(party) {
            return Ok(id.clone());
        }

        let created_at = self.ids.next(Timestamp::now());
        let fresh = Thread::new(
            ThreadId::new(channel, created_at),
            tenant.clone(),
            party.clone(),
            channel,
            created_at,
        );

        let (thread, created) = match &self.journal {
            Some(journal) => journal.insert_if_absent(&fresh)?,
            None => (fresh, true),
        };

        let id = thread.id.clone();
        if created {
            info!(tenant = %tenant, thread_id = %id, channel = %channel, "Created thread");
            committed.push((
                thread.clone(),
                DomainEvent::ThreadCreated {
                    tenant_id: tenant.clone(),
                    thread_id: id.clone(),
                    with: party.clone(),
                    channel,
                    timestamp: created_at,
                },
            ));
        } else {
            // Another writer created it in the journal first; adopt theirs.
            debug!(tenant = %tenant, thread_id = %id, "Adopted existing thread from journal");
            self.ids.observe(thread.created_at);
        }

        state.by_party.insert(party.clone(), id.clone());
        state.threads.insert(id.clone(), thread);
        Ok(id)
    }

    fn append_locked(
        &self,
        state: &mut TenantThreads,
        tenant: &TenantId,
        thread_id: &ThreadId,
        mut message: Message,
        committed: &mut Committed,
    ) -> Result<Thread, ThreadError> {
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| ThreadError::NotFound {
                tenant: tenant.clone(),
                thread_id: thread_id.clone(),
            })?;

        if let Some(last) = thread.last_timestamp() {
            if message.timestamp < last {
                message.timestamp = last;
            }
        }

        if let Some(journal) = &self.journal {
            journal.append(tenant, thread_id, &message)?;
        }
        thread.messages.push(message.clone());

        let snapshot = thread.clone();
        committed.push((
            snapshot.clone(),
            DomainEvent::MessageAppended {
                tenant_id: tenant.clone(),
                thread_id: thread_id.clone(),
                message_count: snapshot.messages.len(),
                message,
            },
        ));
        Ok(snapshot)
    }

    fn notify(&self, committed: &Committed) {
        if committed.is_empty() {
            return;
        }
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for (thread, event) in committed {
            for observer in &observers {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| observer.thread_updated(thread, event)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        tenant = %thread.tenant_id,
                        thread_id = %thread.id,
                        event = event.name(),
                        error = %e,
                        "Thread observer failed"
                    ),
                    Err(_) => warn!(
                        tenant = %thread.tenant_id,
                        thread_id = %thread.id,
                        event = event.name(),
                        "Thread observer panicked"
                    ),
                }
            }
        }
    }
}

fn snapshot(state: &TenantThreads, tenant: &TenantId, id: &ThreadId) -> Result<Thread, ThreadError> {
    state
        .threads
        .get(id)
        .cloned()
        .ok_or_else(|| ThreadError::NotFound {
            tenant: tenant.clone(),
            thread_id: id.clone(),
        })
}
