//! Conversation runtime executor

use super::traits::{BlobResolver, ReplyMarkup, ReplySink};
use crate::dispatch::{ConversionDispatcher, FailureKind};
use crate::formats::Format;
use crate::messages::Reply;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, UploadedFile};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runs one conversation: applies events to its state and executes effects
pub struct ConversationRuntime<B, R>
where
    B: BlobResolver + 'static,
    R: ReplySink + 'static,
{
    context: ConvContext,
    state: ConvState,
    dispatcher: Arc<ConversionDispatcher<B>>,
    sink: Arc<R>,
    event_rx: mpsc::Receiver<Event>,
    /// Conversion tasks report back through this. Weak so the runtime stops
    /// once its manager lets go and no job is in flight.
    event_tx: mpsc::WeakSender<Event>,
}

impl<B, R> ConversationRuntime<B, R>
where
    B: BlobResolver + 'static,
    R: ReplySink + 'static,
{
    pub fn new(
        context: ConvContext,
        dispatcher: Arc<ConversionDispatcher<B>>,
        sink: Arc<R>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
    ) -> Self {
        Self {
            context,
            state: ConvState::default(),
            dispatcher,
            sink,
            event_rx,
            event_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.context.conversation_id, "Starting conversation runtime");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event).await;
        }

        tracing::info!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        // Effects may generate follow-up events; handle them in the same turn
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(conv_id = %self.context.conversation_id, error = %e, "Event rejected");
                    continue;
                }
            };

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.name() != self.state.name() {
                tracing::debug!(
                    conv_id = %self.context.conversation_id,
                    from = old_state.name(),
                    to = self.state.name(),
                    "State change"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Reply(reply) => {
                self.send_reply(&reply).await;
                None
            }

            Effect::ShowMenu { entries } => {
                let labels = entries.into_iter().map(|entry| entry.label).collect();
                match self
                    .sink
                    .send_text(
                        self.context.conversation_id,
                        &Reply::ChooseFormat.text(),
                        ReplyMarkup::Choices(labels),
                    )
                    .await
                {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::error!(conv_id = %self.context.conversation_id, error = %e, "Failed to show menu");
                        Some(Event::InternalError {
                            message: e.to_string(),
                        })
                    }
                }
            }

            Effect::Convert { file, target } => self.spawn_conversion(file, target),
        }
    }

    /// Run the job in the background so uploads during it can be queued
    fn spawn_conversion(&self, file: UploadedFile, target: Format) -> Option<Event> {
        let conv_id = self.context.conversation_id;
        let Some(event_tx) = self.event_tx.upgrade() else {
            tracing::error!(conv_id = %conv_id, "Event channel closed, cannot report conversion");
            return Some(Event::ConversionComplete {
                outcome: Err(FailureKind::Internal),
            });
        };
        let dispatcher = self.dispatcher.clone();
        let sink = self.sink.clone();

        tracing::info!(
            conv_id = %conv_id,
            file = %file.display_name,
            target = %target,
            "Starting conversion (background)"
        );

        let job = tokio::spawn(async move {
            dispatcher
                .convert(conv_id, &file, target, sink.as_ref())
                .await
                .map_err(|e| {
                    let kind = e.kind();
                    tracing::warn!(conv_id = %conv_id, error = %e, ?kind, "Conversion failed");
                    kind
                })
        });

        // Supervisor: a job that panics still reports an outcome
        tokio::spawn(async move {
            let outcome = match job.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(conv_id = %conv_id, error = %e, "Conversion task died");
                    Err(FailureKind::Internal)
                }
            };

            if event_tx
                .send(Event::ConversionComplete { outcome })
                .await
                .is_err()
            {
                tracing::warn!(conv_id = %conv_id, "Runtime gone before conversion finished");
            }
        });
        None
    }

    async fn send_reply(&self, reply: &Reply) {
        if let Err(e) = self
            .sink
            .send_text(
                self.context.conversation_id,
                &reply.text(),
                ReplyMarkup::RemoveKeyboard,
            )
            .await
        {
            // Nothing left to tell the user through a broken channel
            tracing::error!(conv_id = %self.context.conversation_id, error = %e, "Failed to send reply");
        }
    }
}
