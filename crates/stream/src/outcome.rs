use std::time::Duration;

use homegate_common::{ReplyTarget, StreamState};

use crate::label::hours_label;

/// Reply text for any failed transition.
pub const FAILURE_TEXT: &str = "failed";

/// One request to move the stream into `desired`.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub desired: StreamState,
    /// `None` for timer-originated requests, which nobody is waiting on.
    pub reply_target: Option<ReplyTarget>,
}

impl TransitionRequest {
    #[must_use]
    pub fn new(desired: StreamState, reply_target: ReplyTarget) -> Self {
        Self {
            desired,
            reply_target: Some(reply_target),
        }
    }

    #[must_use]
    pub fn unattended(desired: StreamState) -> Self {
        Self {
            desired,
            reply_target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(StreamState),
    /// The proxy manager reported the stream already disabled.
    AlreadyDisabled,
    /// The stream was already enabled; the revert window restarted.
    Extended(Duration),
    Failed(String),
}

/// Result of a transition, handed to the formatter.
#[derive(Debug, Clone)]
pub struct Transition {
    pub outcome: TransitionOutcome,
    /// Revert window in effect when the transition ran.
    pub window: Duration,
    pub reply_target: Option<ReplyTarget>,
}

impl Transition {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TransitionOutcome::Failed(_))
    }

    /// State the stream is known to be in afterwards, if the transition succeeded.
    #[must_use]
    pub fn state(&self) -> Option<StreamState> {
        match self.outcome {
            TransitionOutcome::Applied(state) => Some(state),
            TransitionOutcome::AlreadyDisabled => Some(StreamState::Disabled),
            TransitionOutcome::Extended(_) => Some(StreamState::Enabled),
            TransitionOutcome::Failed(_) => None,
        }
    }

    /// Human-readable message for the chat user.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.outcome {
            TransitionOutcome::Applied(StreamState::Enabled) => {
                format!("回家模式已激活，有效期{}小时", hours_label(self.window))
            },
            TransitionOutcome::Applied(StreamState::Disabled)
            | TransitionOutcome::AlreadyDisabled => "回家模式已停用".into(),
            TransitionOutcome::Extended(added) => {
                format!("有效期已延长{}小时", hours_label(*added))
            },
            TransitionOutcome::Failed(_) => FAILURE_TEXT.into(),
        }
    }
}
