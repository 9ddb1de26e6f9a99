//! Property tests over the transition table and the dial string parser

use proptest::prelude::*;

use telcall_core::CallState;
use telcall_core::state_table::{EventTemplate, EventType, MASTER_TABLE};
use telcall_core::utils::mmi::MmiCode;
use telcall_core::utils::number::DialString;

fn any_event() -> impl Strategy<Value = EventType> {
    prop::sample::select(EventType::ALL.to_vec())
}

fn any_state() -> impl Strategy<Value = CallState> {
    prop::sample::select(CallState::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Walking the table with arbitrary events never leaves DISCONNECTED,
    /// never returns to IDLE and only publishes a cause on the way in.
    #[test]
    fn prop_random_walks_respect_lifecycle(
        events in prop::collection::vec(any_event(), 1..40),
    ) {
        let mut state = CallState::Idle;
        for event in events {
            let Some(transition) = MASTER_TABLE.get_transition(state, event) else {
                continue;
            };
            let Some(next) = transition.next_state else {
                prop_assert!(transition.publish_events.is_empty());
                continue;
            };

            prop_assert_ne!(state, CallState::Disconnected, "left DISCONNECTED via {:?}", event);
            prop_assert_ne!(next, CallState::Idle);
            prop_assert!(transition.publish_events.contains(&EventTemplate::StateChanged));
            prop_assert_eq!(
                transition.publish_events.contains(&EventTemplate::DisconnectedCause),
                next == CallState::Disconnected
            );
            state = next;
        }
    }

    /// Network release ends every call that has not ended yet
    #[test]
    fn prop_release_always_accepted(state in any_state()) {
        for event in [EventType::Released, EventType::Abort] {
            let transition = MASTER_TABLE.get_transition(state, event);
            prop_assert!(transition.is_some(), "{:?} rejected in {}", event, state);
            if state != CallState::Disconnected {
                prop_assert_eq!(transition.and_then(|t| t.next_state), Some(CallState::Disconnected));
            }
        }
    }

    #[test]
    fn prop_dial_string_output_is_normalized(input in "[0-9 ()+*#,;pPwW-]{0,40}") {
        if let Ok(parsed) = DialString::parse(&input, 255) {
            prop_assert!(!parsed.number.is_empty());
            prop_assert!(parsed
                .number
                .char_indices()
                .all(|(i, c)| c.is_ascii_digit() || c == '*' || c == '#' || (c == '+' && i == 0)));
            if let Some(post_dial) = parsed.post_dial {
                prop_assert!(post_dial.starts_with(',') || post_dial.starts_with(';'));
            }
        }
    }

    #[test]
    fn prop_mmi_parse_never_panics(input in "[0-9*#]{0,24}", in_call in any::<bool>()) {
        if let Some(code) = MmiCode::parse(&input, in_call) {
            prop_assert!(!code.full_string.is_empty());
            prop_assert!(input.starts_with(code.full_string.as_str()));
        }
    }
}
