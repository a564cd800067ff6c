//! Effects produced by state transitions

use crate::formats::{Format, MenuEntry};
use crate::messages::Reply;
use crate::state_machine::state::UploadedFile;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a text reply, removing any menu keyboard
    Reply(Reply),

    /// Send the format menu
    ShowMenu { entries: Vec<MenuEntry> },

    /// Run a conversion job; the runtime answers with `ConversionComplete`
    Convert { file: UploadedFile, target: Format },
}

impl Effect {
    pub fn reply(reply: Reply) -> Self {
        Effect::Reply(reply)
    }

    pub fn convert(file: UploadedFile, target: Format) -> Self {
        Effect::Convert { file, target }
    }
}
