//! Property-based tests for the run polling state machine

use super::poller::{transition, RunPhase};
use crate::assistants::RunStatus;
use proptest::prelude::*;

fn arb_status() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Queued),
        Just(RunStatus::InProgress),
        Just(RunStatus::RequiresAction),
        Just(RunStatus::Cancelling),
        Just(RunStatus::Cancelled),
        Just(RunStatus::Failed),
        Just(RunStatus::Completed),
        Just(RunStatus::Incomplete),
        Just(RunStatus::Expired),
        Just(RunStatus::Unknown),
    ]
}

fn phase_rank(phase: RunPhase) -> u8 {
    match phase {
        RunPhase::Submitted => 0,
        RunPhase::Pending(status) => status.rank(),
        RunPhase::Succeeded | RunPhase::Failed(_) => 4,
    }
}

proptest! {
    /// Replaying any status sequence never moves the phase backwards
    #[test]
    fn prop_phase_is_monotonic(statuses in prop::collection::vec(arb_status(), 0..40)) {
        let mut phase = RunPhase::Submitted;
        for status in statuses {
            let next = transition(phase, status);
            prop_assert!(phase_rank(next) >= phase_rank(phase), "{phase:?} -> {next:?}");
            phase = next;
        }
    }

    /// Once terminal, the phase never changes
    #[test]
    fn prop_terminal_phase_is_absorbing(
        prefix in prop::collection::vec(arb_status(), 0..20),
        suffix in prop::collection::vec(arb_status(), 0..20),
    ) {
        let mut phase = RunPhase::Submitted;
        for status in prefix {
            phase = transition(phase, status);
        }
        if phase.is_terminal() {
            let settled = phase;
            for status in suffix {
                phase = transition(phase, status);
                prop_assert_eq!(phase, settled);
            }
        }
    }

    /// Success is reached exactly when `completed` is the first terminal status seen
    #[test]
    fn prop_success_iff_first_terminal_is_completed(
        statuses in prop::collection::vec(arb_status(), 1..40),
    ) {
        let mut phase = RunPhase::Submitted;
        for status in &statuses {
            phase = transition(phase, *status);
        }
        let first_terminal = statuses.iter().copied().find(|s| s.is_terminal());
        match first_terminal {
            Some(RunStatus::Completed) => prop_assert_eq!(phase, RunPhase::Succeeded),
            Some(status) => prop_assert_eq!(phase, RunPhase::Failed(status)),
            None => prop_assert!(!phase.is_terminal()),
        }
    }
}
