//! Pure state transition function
//!
//! Given the same state, context and event it always produces the same new
//! state and effects, with no I/O.

use super::event::Command;
use super::{ConvContext, ConvState, Effect, Event, UploadedFile};
use crate::dispatch::FailureKind;
use crate::formats::{menu_for, parse_choice, Choice, FormatRegistry};
use crate::messages::Reply;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Commands: answered in any state, session untouched
        // ============================================================
        (_, Event::Command(Command::Start)) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::reply(Reply::Welcome)))
        }
        (_, Event::Command(Command::Help)) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::reply(Reply::Help)))
        }

        // ============================================================
        // Uploads: latest upload replaces whatever was held
        // ============================================================
        (
            ConvState::AwaitingUpload | ConvState::AwaitingFormatChoice { .. },
            Event::Upload(upload),
        ) => Ok(accept_upload(context, upload.into_file())),

        // Held until the running job reports back
        (ConvState::Converting { file, target, .. }, Event::Upload(upload)) => {
            Ok(TransitionResult::new(ConvState::Converting {
                file: file.clone(),
                target: *target,
                queued: Some(upload.into_file()),
            }))
        }

        // ============================================================
        // Format choice
        // ============================================================
        (ConvState::AwaitingFormatChoice { file, .. }, Event::Choice { raw_text }) => {
            match parse_choice(&raw_text) {
                Choice::Cancel => Ok(TransitionResult::new(ConvState::AwaitingUpload)
                    .with_effect(Effect::reply(Reply::Cancelled))),
                Choice::Format(target) => Ok(TransitionResult::new(ConvState::Converting {
                    file: file.clone(),
                    target,
                    queued: None,
                })
                .with_effect(Effect::convert(file.clone(), target))),
                Choice::Unrecognized(_) => Ok(TransitionResult::new(ConvState::AwaitingUpload)
                    .with_effect(Effect::reply(Reply::Failure(
                        FailureKind::UnsupportedConversion,
                    )))),
            }
        }

        // Stray choices outside the menu are ignored
        (ConvState::AwaitingUpload | ConvState::Converting { .. }, Event::Choice { .. }) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Conversion outcome
        // ============================================================
        (ConvState::Converting { queued, .. }, Event::ConversionComplete { outcome }) => {
            let reply = match outcome {
                Ok(()) => Reply::Done,
                Err(kind) => Reply::Failure(kind),
            };
            let outcome_reply = Effect::reply(reply);

            match queued {
                None => {
                    Ok(TransitionResult::new(ConvState::AwaitingUpload).with_effect(outcome_reply))
                }
                Some(next) => {
                    let accepted = accept_upload(context, next.clone());
                    let mut result =
                        TransitionResult::new(accepted.new_state).with_effect(outcome_reply);
                    result.effects.extend(accepted.effects);
                    Ok(result)
                }
            }
        }

        (_, Event::ConversionComplete { .. }) => Err(TransitionError::InvalidTransition(format!(
            "conversion completed while {}",
            state.name()
        ))),

        // ============================================================
        // Unhandled internal errors reset the conversation
        // ============================================================
        (_, Event::InternalError { .. }) => Ok(TransitionResult::new(ConvState::AwaitingUpload)
            .with_effect(Effect::reply(Reply::Failure(FailureKind::Internal)))),
    }
}

fn accept_upload(context: &ConvContext, file: UploadedFile) -> TransitionResult {
    let lookup_ext = FormatRegistry::lookup_extension(&file);

    let info = Effect::reply(Reply::FileInfo {
        name: file.display_name.clone(),
        size: file.declared_size,
        extension: lookup_ext.clone(),
    });

    if file.declared_size > context.limits.max_upload_bytes {
        return TransitionResult::new(ConvState::AwaitingUpload)
            .with_effect(info)
            .with_effect(Effect::reply(Reply::Failure(FailureKind::UploadTooLarge)));
    }

    let options = context.registry.outputs_for(&file);
    if options.is_empty() {
        return TransitionResult::new(ConvState::AwaitingUpload)
            .with_effect(info)
            .with_effect(Effect::reply(Reply::Failure(
                FailureKind::UnsupportedInputFormat,
            )));
    }

    let entries = menu_for(&lookup_ext, &options);
    TransitionResult::new(ConvState::AwaitingFormatChoice { file, options })
        .with_effect(info)
        .with_effect(Effect::ShowMenu { entries })
}
