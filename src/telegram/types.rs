//! Bot API wire types, trimmed to the fields the bot reads

use super::classify_api_error;
use crate::runtime::TransportError;
use crate::state_machine::{Command, ConversationId, Event, UploadEvent};
use serde::Deserialize;

/// Name given to documents sent without one
const UNNAMED_DOCUMENT: &str = "document";

/// Envelope around every Bot API result
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(classify_api_error(
                self.error_code,
                self.description.as_deref().unwrap_or("no description"),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
    pub document: Option<Document>,
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_size: Option<u64>,
}

/// Result of `getFile`
#[derive(Debug, Deserialize)]
pub struct File {
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

impl Update {
    /// The engine event this update carries, if any
    pub fn into_event(self) -> Option<(ConversationId, Event)> {
        let message = self.message?;
        let conversation = ConversationId(message.chat.id);

        // Photos arrive as several sizes, largest last
        if let Some(largest) = message.photo.and_then(|mut sizes| sizes.pop()) {
            let upload = UploadEvent::photo(largest.file_id, largest.file_size.unwrap_or(0));
            return Some((conversation, Event::Upload(upload)));
        }

        if let Some(document) = message.document {
            let name = document
                .file_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNNAMED_DOCUMENT.to_string());
            let upload =
                UploadEvent::document(document.file_id, name, document.file_size.unwrap_or(0));
            return Some((conversation, Event::Upload(upload)));
        }

        let text = message.text?;
        let event = match Command::parse(&text) {
            Some(command) => Event::Command(command),
            None => Event::Choice { raw_text: text },
        };
        Some((conversation, event))
    }
}
