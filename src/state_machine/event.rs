//! Events that can occur in a conversation

use super::state::{UploadedFile, PHOTO_DISPLAY_NAME};
use crate::dispatch::FailureKind;

/// Bot commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parse `/start` and `/help`, including the `/cmd@botname` form
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// A file or photo arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    pub is_photo: bool,
    pub file_id: String,
    pub display_name: String,
    pub declared_size: u64,
}

impl UploadEvent {
    pub fn document(
        file_id: impl Into<String>,
        display_name: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            is_photo: false,
            file_id: file_id.into(),
            display_name: display_name.into(),
            declared_size: size,
        }
    }

    pub fn photo(file_id: impl Into<String>, size: u64) -> Self {
        Self {
            is_photo: true,
            file_id: file_id.into(),
            display_name: PHOTO_DISPLAY_NAME.to_string(),
            declared_size: size,
        }
    }

    pub fn into_file(self) -> UploadedFile {
        UploadedFile {
            file_id: self.file_id,
            display_name: self.display_name,
            is_photo: self.is_photo,
            declared_size: self.declared_size,
        }
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Command(Command),
    Upload(UploadEvent),
    Choice { raw_text: String },

    // Runtime events
    ConversionComplete { outcome: Result<(), FailureKind> },
    InternalError { message: String },
}
