use crate::core::launch::{NegotiationState, can_transition};

#[test]
fn single_round_path_is_allowed() {
    let path = [
        (NegotiationState::Start, NegotiationState::AwaitingFirstResponse),
        (NegotiationState::AwaitingFirstResponse, NegotiationState::Done),
    ];
    for (from, to) in path {
        assert!(
            can_transition(from, to),
            "expected transition {:?} -> {:?} to be allowed",
            from,
            to
        );
    }
}

#[test]
fn conflict_path_is_allowed() {
    let path = [
        (NegotiationState::Start, NegotiationState::AwaitingFirstResponse),
        (
            NegotiationState::AwaitingFirstResponse,
            NegotiationState::NeedsOperatorDecision,
        ),
        (
            NegotiationState::NeedsOperatorDecision,
            NegotiationState::AwaitingSecondResponse,
        ),
        (NegotiationState::AwaitingSecondResponse, NegotiationState::Done),
    ];
    for (from, to) in path {
        assert!(can_transition(from, to), "{:?} -> {:?}", from, to);
    }
}

#[test]
fn cancel_only_from_operator_decision() {
    assert!(can_transition(
        NegotiationState::NeedsOperatorDecision,
        NegotiationState::Cancelled
    ));
    assert!(!can_transition(
        NegotiationState::AwaitingFirstResponse,
        NegotiationState::Cancelled
    ));
    assert!(!can_transition(
        NegotiationState::AwaitingSecondResponse,
        NegotiationState::Cancelled
    ));
}

#[test]
fn operator_decision_is_never_final() {
    assert!(!NegotiationState::NeedsOperatorDecision.is_terminal());
    assert!(!can_transition(
        NegotiationState::NeedsOperatorDecision,
        NegotiationState::Done
    ));
}

#[test]
fn terminal_states_have_no_exits() {
    let all = [
        NegotiationState::Start,
        NegotiationState::AwaitingFirstResponse,
        NegotiationState::NeedsOperatorDecision,
        NegotiationState::AwaitingSecondResponse,
        NegotiationState::Done,
        NegotiationState::Cancelled,
    ];
    for from in [NegotiationState::Done, NegotiationState::Cancelled] {
        assert!(from.is_terminal());
        for to in all {
            assert!(!can_transition(from, to), "{:?} -> {:?}", from, to);
        }
    }
}
