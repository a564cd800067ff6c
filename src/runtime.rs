//! Runtime for executing conversations
//!
//! One task per conversation, each owning its state. Conversations never
//! share mutable state, so a slow conversion in one chat does not hold up
//! another.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::dispatch::ConversionDispatcher;
use crate::state_machine::{ConvContext, ConversationId, Event};
use crate::telegram::BotApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// Manager wired to the Telegram adapter
pub type TelegramRuntimeManager = RuntimeManager<BotApi, BotApi>;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Conversations without events for this long lose their runtime
const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// How often idle runtimes are looked for
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Manager for all conversation runtimes
pub struct RuntimeManager<B, R>
where
    B: BlobResolver + 'static,
    R: ReplySink + 'static,
{
    dispatcher: Arc<ConversionDispatcher<B>>,
    sink: Arc<R>,
    runtimes: RwLock<HashMap<ConversationId, ConversationHandle>>,
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    last_activity: Arc<Mutex<Instant>>,
}

impl ConversationHandle {
    fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            event_tx,
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }
}

impl<B, R> RuntimeManager<B, R>
where
    B: BlobResolver + 'static,
    R: ReplySink + 'static,
{
    /// Create a manager and start its idle cleanup task
    pub fn new(dispatcher: Arc<ConversionDispatcher<B>>, sink: Arc<R>) -> Arc<Self> {
        let manager = Arc::new(Self {
            dispatcher,
            sink,
            runtimes: RwLock::new(HashMap::new()),
        });

        // Weak reference so the task ends with the manager
        let manager_weak = Arc::downgrade(&manager);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                let Some(manager) = manager_weak.upgrade() else {
                    tracing::debug!("RuntimeManager dropped, cleanup task exiting");
                    break;
                };
                let evicted = manager.evict_idle(IDLE_TIMEOUT).await;
                if evicted > 0 {
                    let active = manager.active_conversations().await;
                    tracing::info!(
                        evicted,
                        active,
                        "Evicted idle conversation runtimes"
                    );
                }
            }
        });

        manager
    }

    /// Get or create a runtime for a conversation
    pub async fn get_or_create(&self, conversation_id: ConversationId) -> ConversationHandle {
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(&conversation_id) {
                if !handle.event_tx.is_closed() {
                    return handle.clone();
                }
            }
        }

        let mut runtimes = self.runtimes.write().await;
        // Another caller may have started it while we waited for the lock
        if let Some(handle) = runtimes.get(&conversation_id) {
            if !handle.event_tx.is_closed() {
                return handle.clone();
            }
            tracing::warn!(conv_id = %conversation_id, "Replacing stopped conversation runtime");
        }

        let context = ConvContext::new(conversation_id, self.dispatcher.registry().clone())
            .with_limits(self.dispatcher.limits());
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runtime = ConversationRuntime::new(
            context,
            self.dispatcher.clone(),
            self.sink.clone(),
            event_rx,
            event_tx.downgrade(),
        );

        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(conv_id = %conversation_id, "Conversation runtime finished");
        });

        let handle = ConversationHandle::new(event_tx);
        runtimes.insert(conversation_id, handle.clone());
        handle
    }

    /// Queue an event for a conversation, starting its runtime if needed.
    /// Never waits on a busy conversation; a full queue drops the event.
    pub async fn send_event(
        &self,
        conversation_id: ConversationId,
        event: Event,
    ) -> Result<(), String> {
        let handle = self.get_or_create(conversation_id).await;
        handle.touch();

        match handle.event_tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(format!(
                "Event queue full ({EVENT_CHANNEL_CAPACITY}), event dropped"
            )),
            // The runtime stopped between lookup and send
            Err(TrySendError::Closed(event)) => self
                .get_or_create(conversation_id)
                .await
                .event_tx
                .try_send(event)
                .map_err(|e| format!("Failed to send event: {e}")),
        }
    }

    /// Drop runtimes that saw no events for `idle_timeout`. A runtime with a
    /// conversion in flight lives on until the job reports back.
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let now = Instant::now();
        let mut runtimes = self.runtimes.write().await;
        let before = runtimes.len();
        runtimes.retain(|conv_id, handle| {
            let keep = !handle.event_tx.is_closed() && handle.idle_for(now) < idle_timeout;
            if !keep {
                tracing::debug!(conv_id = %conv_id, "Evicting conversation runtime");
            }
            keep
        });
        before - runtimes.len()
    }

    /// Number of conversations with a runtime
    pub async fn active_conversations(&self) -> usize {
        self.runtimes.read().await.len()
    }
}
