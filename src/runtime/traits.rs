//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::state_machine::ConversationId;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Transport errors
// ============================================================================

/// Transport error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::PayloadTooLarge, message)
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::TimedOut, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

/// What went wrong talking to the messaging service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The service refused the payload size
    PayloadTooLarge,
    /// Request did not complete in time
    TimedOut,
    Other,
}

// ============================================================================
// Collaborator contracts
// ============================================================================

/// Bytes of an uploaded file, streamed
pub struct BlobStream {
    /// Size announced by the source, when known
    pub size: Option<u64>,
    pub chunks: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

/// Turns an upload handle into its bytes
#[async_trait]
pub trait BlobResolver: Send + Sync {
    async fn fetch(&self, file_id: &str) -> Result<BlobStream, TransportError>;
}

/// Keyboard attached to a text reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// Remove any menu the user is looking at
    RemoveKeyboard,
    /// Offer these labels as buttons
    Choices(Vec<String>),
}

/// Phases of a conversion the user is told about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Downloading,
    Converting,
    Sending,
}

/// Outbound replies to a conversation
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        conversation: ConversationId,
        path: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Best-effort progress indication
    async fn notify_progress(
        &self,
        conversation: ConversationId,
        stage: ProgressStage,
    ) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: BlobResolver + ?Sized> BlobResolver for Arc<T> {
    async fn fetch(&self, file_id: &str) -> Result<BlobStream, TransportError> {
        (**self).fetch(file_id).await
    }
}

#[async_trait]
impl<T: ReplySink + ?Sized> ReplySink for Arc<T> {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), TransportError> {
        (**self).send_text(conversation, text, markup).await
    }

    async fn send_document(
        &self,
        conversation: ConversationId,
        path: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        (**self)
            .send_document(conversation, path, filename, caption)
            .await
    }

    async fn notify_progress(
        &self,
        conversation: ConversationId,
        stage: ProgressStage,
    ) -> Result<(), TransportError> {
        (**self).notify_progress(conversation, stage).await
    }
}
