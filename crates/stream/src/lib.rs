//! Stream status reconciliation: the enable/disable state machine, the
//! auto-revert timer and the outcome messages shown to chat users.

pub mod coordinator;
pub mod label;
pub mod outcome;
pub mod timer;

pub use {
    coordinator::{StreamCoordinator, StreamStatus},
    label::hours_label,
    outcome::{FAILURE_TEXT, Transition, TransitionOutcome, TransitionRequest},
    timer::RevertTimer,
};
