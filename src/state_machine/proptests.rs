//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::event::{Command, UploadEvent};
use super::state::*;
use super::transition::*;
use super::*;
use crate::dispatch::FailureKind;
use crate::formats::{Format, FormatRegistry};
use crate::messages::Reply;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new(ConversationId(7), Arc::new(FormatRegistry::builtin()))
}

fn failure_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Reply(reply) if reply.is_failure()))
        .count()
}

fn is_valid_state(state: &ConvState, ctx: &ConvContext) -> bool {
    match state {
        ConvState::AwaitingUpload => true,
        ConvState::AwaitingFormatChoice { file, options } => {
            !options.is_empty() && file.declared_size <= ctx.limits.max_upload_bytes
        }
        ConvState::Converting { file, .. } => file.declared_size <= ctx.limits.max_upload_bytes,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_extension() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("docx".to_string()),
        Just("jpg".to_string()),
        Just("JPEG".to_string()),
        Just("png".to_string()),
        Just("csv".to_string()),
        Just("xlsx".to_string()),
        Just("pdf".to_string()),
        "[a-z]{1,4}",
    ]
}

fn arb_size() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..1024,
        (MAX_UPLOAD_SIZE - 16)..(MAX_UPLOAD_SIZE + 16),
        (MAX_UPLOAD_SIZE + 1)..(4 * MAX_UPLOAD_SIZE),
    ]
}

fn arb_upload_event() -> impl Strategy<Value = Event> {
    ("[a-z]{6}", "[a-zA-Z]{1,10}", arb_extension(), arb_size(), any::<bool>()).prop_map(
        |(file_id, stem, ext, size, is_photo)| {
            let upload = if is_photo {
                UploadEvent::photo(file_id, size)
            } else {
                UploadEvent::document(file_id, format!("{stem}.{ext}"), size)
            };
            Event::Upload(upload)
        },
    )
}

fn arb_choice_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("📄 Convert to PDF 📱".to_string()),
        Just("🖼️ Convert to PNG 🎨".to_string()),
        Just("🖼️ Convert to JPG 🎨".to_string()),
        Just("📊 Convert to XLSX 📈".to_string()),
        Just("📊 Convert to CSV 📉".to_string()),
        Just("❌ Cancel ↩️".to_string()),
        "[a-zA-Z ]{0,12}",
    ]
}

fn arb_choice_event() -> impl Strategy<Value = Event> {
    arb_choice_text().prop_map(|raw_text| Event::Choice { raw_text })
}

fn arb_failure_kind() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::UnsupportedConversion),
        Just(FailureKind::ConversionFailed),
        Just(FailureKind::OutputTooLarge),
        Just(FailureKind::TransportPayloadTooLarge),
        Just(FailureKind::TransportTimedOut),
        Just(FailureKind::Internal),
    ]
}

fn arb_completion_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::ConversionComplete { outcome: Ok(()) }),
        arb_failure_kind().prop_map(|kind| Event::ConversionComplete { outcome: Err(kind) }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_upload_event(),
        3 => arb_choice_event(),
        2 => arb_completion_event(),
        1 => Just(Event::Command(Command::Start)),
        1 => Just(Event::Command(Command::Help)),
        1 => "[a-z ]{1,20}".prop_map(|message| Event::InternalError { message }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: states stay valid and each handled file gets at most one failure
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..25)) {
        let ctx = test_context();
        let mut state = ConvState::AwaitingUpload;

        for event in events {
            // A completion also handles the upload queued behind it
            let files_handled = match (&state, &event) {
                (ConvState::Converting { queued: Some(_), .. }, Event::ConversionComplete { .. }) => 2,
                _ => 1,
            };
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    prop_assert!(is_valid_state(&result.new_state, &ctx), "Invalid state: {:?}", result.new_state);
                    prop_assert!(failure_count(&result.effects) <= files_handled, "Too many failures: {:?}", result.effects);
                    state = result.new_state;
                }
                Err(_) => { /* Invalid transition is OK */ }
            }
        }
    }

    // Invariant 2: oversized uploads never reach the menu
    #[test]
    fn prop_oversized_upload_never_offers_menu(
        size in (MAX_UPLOAD_SIZE + 1)..(10 * MAX_UPLOAD_SIZE),
        is_photo in any::<bool>(),
    ) {
        let upload = if is_photo {
            UploadEvent::photo("f", size)
        } else {
            UploadEvent::document("f", "report.docx", size)
        };
        let result = transition(&ConvState::AwaitingUpload, &test_context(), Event::Upload(upload)).unwrap();

        prop_assert_eq!(result.new_state, ConvState::AwaitingUpload);
        let shows_menu = result.effects.iter().any(|e| matches!(e, Effect::ShowMenu { .. }));
        prop_assert!(!shows_menu);
        prop_assert!(result.effects.contains(&Effect::reply(Reply::Failure(FailureKind::UploadTooLarge))));
    }

    // Invariant 3: photos within the limit always get a non-empty menu
    #[test]
    fn prop_photo_always_convertible(size in 0u64..=MAX_UPLOAD_SIZE, name in "[a-z]{1,8}\\.[a-z]{0,4}") {
        let mut upload = UploadEvent::photo("p", size);
        upload.display_name = name;
        let result = transition(&ConvState::AwaitingUpload, &test_context(), Event::Upload(upload)).unwrap();

        let is_menu = matches!(result.new_state, ConvState::AwaitingFormatChoice { ref options, .. } if !options.is_empty());
        prop_assert!(is_menu);
    }

    // Invariant 4: choices outside the menu never do anything
    #[test]
    fn prop_stray_choices_are_ignored(event in arb_choice_event()) {
        let result = transition(&ConvState::AwaitingUpload, &test_context(), event).unwrap();
        prop_assert_eq!(result.new_state, ConvState::AwaitingUpload);
        prop_assert!(result.effects.is_empty());
    }

    // Invariant 5: a conversion job always works on the file the session holds
    #[test]
    fn prop_convert_effect_uses_session_file(upload in arb_upload_event(), choice in arb_choice_event()) {
        let ctx = test_context();
        let Ok(first) = transition(&ConvState::AwaitingUpload, &ctx, upload) else {
            return Ok(());
        };
        let held = first.new_state.file().cloned();
        let second = transition(&first.new_state, &ctx, choice).unwrap();

        for effect in &second.effects {
            if let Effect::Convert { file, target } = effect {
                prop_assert_eq!(Some(file), held.as_ref());
                let is_converting = matches!(&second.new_state, ConvState::Converting { target: t, .. } if t == target);
                prop_assert!(is_converting);
            }
        }
    }

    // Invariant 6: every conversion outcome returns to AwaitingUpload with one reply
    #[test]
    fn prop_completion_resets(event in arb_completion_event(), target in prop_oneof![Just(Format::Pdf), Just(Format::Png)]) {
        let state = ConvState::Converting {
            file: UploadEvent::photo("p", 10).into_file(),
            target,
            queued: None,
        };
        let result = transition(&state, &test_context(), event).unwrap();
        prop_assert_eq!(result.new_state, ConvState::AwaitingUpload);
        prop_assert_eq!(result.effects.len(), 1);
    }

    // Invariant 7: an upload queued behind a conversion is answered once it ends
    #[test]
    fn prop_queued_upload_is_answered(upload in arb_upload_event(), completion in arb_completion_event()) {
        let ctx = test_context();
        let converting = ConvState::Converting {
            file: UploadEvent::document("d", "a.docx", 10).into_file(),
            target: Format::Pdf,
            queued: None,
        };
        let queued = transition(&converting, &ctx, upload).unwrap();
        prop_assert!(queued.effects.is_empty());

        let result = transition(&queued.new_state, &ctx, completion).unwrap();
        let file_info_sent = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Reply(Reply::FileInfo { .. })));
        prop_assert!(file_info_sent);

        let offered_menu = result.effects.iter().any(|e| matches!(e, Effect::ShowMenu { .. }));
        let is_choosing = matches!(result.new_state, ConvState::AwaitingFormatChoice { .. });
        prop_assert_eq!(offered_menu, is_choosing);
    }
}
