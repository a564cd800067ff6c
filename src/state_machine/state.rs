//! Conversation state types

use crate::formats::{self, Format, FormatRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Upload ceiling: 20 MiB
pub const MAX_UPLOAD_SIZE: u64 = 20 * 1024 * 1024;

/// Ceiling for a converted file we are willing to send: 50 MiB
pub const MAX_OUTPUT_SIZE: u64 = 50 * 1024 * 1024;

/// Display name given to photo uploads, which carry none of their own
pub const PHOTO_DISPLAY_NAME: &str = "photo.jpg";

// ============================================================================
// Conversation identity
// ============================================================================

/// Identity of one conversation (a chat, for the Telegram transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Uploaded File
// ============================================================================

/// The file currently held by a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Opaque handle the blob resolver turns into bytes
    pub file_id: String,
    pub display_name: String,
    pub is_photo: bool,
    /// Size reported by the transport, in bytes
    pub declared_size: u64,
}

impl UploadedFile {
    /// Normalized extension of the display name
    pub fn extension(&self) -> String {
        formats::extension_of(&self.display_name)
    }

    /// Display name without its extension
    pub fn base_name(&self) -> &str {
        formats::base_name(&self.display_name)
    }

    /// Name the converted file is delivered under
    pub fn output_name(&self, target: Format) -> String {
        format!("{}.{}", self.base_name(), target.extension())
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Conversation state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Nothing held, waiting for a file
    #[default]
    AwaitingUpload,

    /// A file was accepted and the format menu is showing
    AwaitingFormatChoice {
        file: UploadedFile,
        /// Offered outputs, in menu order
        options: Vec<Format>,
    },

    /// Conversion job in flight
    Converting {
        file: UploadedFile,
        target: Format,
        /// Latest upload received meanwhile, handled once the job finishes
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queued: Option<UploadedFile>,
    },
}

impl ConvState {
    /// The file held by the session, if any
    #[cfg(test)]
    pub fn file(&self) -> Option<&UploadedFile> {
        match self {
            ConvState::AwaitingUpload => None,
            ConvState::AwaitingFormatChoice { file, .. } | ConvState::Converting { file, .. } => {
                Some(file)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::AwaitingUpload => "awaiting_upload",
            ConvState::AwaitingFormatChoice { .. } => "awaiting_format_choice",
            ConvState::Converting { .. } => "converting",
        }
    }
}

/// Size thresholds enforced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_upload_bytes: u64,
    pub max_output_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_SIZE,
            max_output_bytes: MAX_OUTPUT_SIZE,
        }
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: ConversationId,
    pub registry: Arc<FormatRegistry>,
    pub limits: Limits,
}

impl ConvContext {
    pub fn new(conversation_id: ConversationId, registry: Arc<FormatRegistry>) -> Self {
        Self {
            conversation_id,
            registry,
            limits: Limits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
