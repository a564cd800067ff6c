//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Command, Event, UploadEvent};
pub use state::{ConvContext, ConvState, ConversationId, Limits, UploadedFile};
pub use transition::{transition, TransitionError};
