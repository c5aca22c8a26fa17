//! Stream status coordinator.
//!
//! Sole owner of the logical [`StreamState`] and the [`RevertTimer`]. Every
//! transition, whether requested by a user or fired by the timer, runs to
//! completion (proxy-manager call included) under one mutex, so transitions
//! are applied strictly one after another. Readers of [`StreamCoordinator::status`]
//! see the last published snapshot and never wait on that mutex.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use {
    tokio::{
        sync::{Mutex, watch},
        time::Instant,
    },
    tracing::{debug, error, info, warn},
};

use {
    homegate_common::StreamState,
    homegate_npm::{ApplyOutcome, StreamControl},
};

use crate::{
    outcome::{Transition, TransitionOutcome, TransitionRequest},
    timer::RevertTimer,
};

struct Inner {
    state: StreamState,
    timer: RevertTimer,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: StreamState,
    deadline: Option<Instant>,
    window: Duration,
}

impl From<&Inner> for Snapshot {
    fn from(inner: &Inner) -> Self {
        Self {
            state: inner.state,
            deadline: inner.timer.deadline(),
            window: inner.window,
        }
    }
}

/// Snapshot returned by [`StreamCoordinator::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: StreamState,
    /// Time left before the auto-revert fires, if one is pending.
    pub revert_in: Option<Duration>,
    pub window: Duration,
}

pub struct StreamCoordinator {
    control: Arc<dyn StreamControl>,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<Snapshot>,
    this: Weak<Self>,
}

impl StreamCoordinator {
    pub fn new(control: Arc<dyn StreamControl>, window: Duration) -> Arc<Self> {
        let inner = Inner {
            state: StreamState::Disabled,
            timer: RevertTimer::new(),
            window,
        };
        let (snapshot, _) = watch::channel(Snapshot::from(&inner));
        Arc::new_cyclic(|this| Self {
            control,
            inner: Mutex::new(inner),
            snapshot,
            this: this.clone(),
        })
    }

    /// Apply `request` and report what happened.
    pub async fn transition(&self, request: TransitionRequest) -> Transition {
        let mut inner = self.inner.lock().await;
        let window = inner.window;
        let outcome = self.apply_locked(&mut inner, request.desired).await;
        self.publish(&inner);
        Transition {
            outcome,
            window,
            reply_target: request.reply_target,
        }
    }

    /// State as of the last completed transition. Does not wait for one in
    /// flight.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        let snapshot = *self.snapshot.borrow();
        StreamStatus {
            state: snapshot.state,
            revert_in: snapshot
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now())),
            window: snapshot.window,
        }
    }

    /// Change the revert window. A pending revert keeps its deadline; the new
    /// window applies from the next enable.
    pub async fn set_window(&self, window: Duration) {
        let mut inner = self.inner.lock().await;
        info!(
            old_secs = inner.window.as_secs(),
            new_secs = window.as_secs(),
            "revert window changed"
        );
        inner.window = window;
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot.send_replace(Snapshot::from(inner));
    }

    /// Timer callback. Ignored when a later transition superseded `generation`.
    async fn revert(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if !inner.timer.take_fired(generation) {
            debug!(generation, "stale revert ignored");
            return;
        }
        info!(generation, "revert window elapsed, disabling stream");
        let request = TransitionRequest::unattended(StreamState::Disabled);
        let outcome = self.apply_locked(&mut inner, request.desired).await;
        self.publish(&inner);
        if let TransitionOutcome::Failed(reason) = outcome {
            warn!(%reason, "automatic disable failed, stream left enabled");
        }
    }

    async fn apply_locked(&self, inner: &mut Inner, desired: StreamState) -> TransitionOutcome {
        let previous = inner.state;
        let outcome = match (desired, self.control.apply_status(desired).await) {
            (StreamState::Enabled, ApplyOutcome::Applied) => {
                inner.state = StreamState::Enabled;
                self.arm(inner);
                TransitionOutcome::Applied(StreamState::Enabled)
            },
            (StreamState::Enabled, ApplyOutcome::AlreadyEnabled) => {
                inner.state = StreamState::Enabled;
                self.arm(inner);
                TransitionOutcome::Extended(inner.window)
            },
            (StreamState::Disabled, ApplyOutcome::Applied) => {
                inner.state = StreamState::Disabled;
                inner.timer.cancel();
                TransitionOutcome::Applied(StreamState::Disabled)
            },
            (StreamState::Disabled, ApplyOutcome::AlreadyDisabled) => {
                inner.state = StreamState::Disabled;
                inner.timer.cancel();
                TransitionOutcome::AlreadyDisabled
            },
            (_, ApplyOutcome::Failed(e)) => {
                error!(%desired, error = %e, "stream transition failed");
                return TransitionOutcome::Failed(e.to_string());
            },
            (_, other) => {
                error!(%desired, outcome = ?other, "proxy manager answered for the opposite state");
                return TransitionOutcome::Failed(format!("unexpected {other:?} for {desired}"));
            },
        };
        info!(
            from = %previous,
            to = %inner.state,
            revert_in_secs = inner.timer.remaining().map(|d| d.as_secs()),
            "stream transition applied"
        );
        outcome
    }

    fn arm(&self, inner: &mut Inner) {
        let this = self.this.clone();
        inner.timer.schedule(inner.window, move |generation| async move {
            if let Some(coordinator) = this.upgrade() {
                coordinator.revert(generation).await;
            }
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        homegate_common::{Correlation, ReplyTarget},
        homegate_npm::Error,
        std::{collections::VecDeque, sync::Mutex as StdMutex},
        tokio::time::{Instant, sleep},
    };

    #[derive(Clone, Copy, Debug)]
    enum Reply {
        Applied,
        AlreadyEnabled,
        AlreadyDisabled,
        Fail,
    }

    /// Proxy manager stand-in: answers from a script (default `Applied`) and
    /// records every call with its virtual timestamp.
    #[derive(Default)]
    struct ScriptedControl {
        script: StdMutex<VecDeque<Reply>>,
        calls: StdMutex<Vec<(StreamState, Instant)>>,
        latency: Duration,
    }

    impl ScriptedControl {
        fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Default::default()
            }
        }

        fn push(&self, reply: Reply) {
            self.script.lock().unwrap().push_back(reply);
        }

        fn calls(&self) -> Vec<(StreamState, Instant)> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, state: StreamState) -> usize {
            self.calls().iter().filter(|(s, _)| *s == state).count()
        }
    }

    #[async_trait]
    impl StreamControl for ScriptedControl {
        async fn apply_status(&self, desired: StreamState) -> ApplyOutcome {
            self.calls.lock().unwrap().push((desired, Instant::now()));
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Applied);
            match reply {
                Reply::Applied => ApplyOutcome::Applied,
                Reply::AlreadyEnabled => ApplyOutcome::AlreadyEnabled,
                Reply::AlreadyDisabled => ApplyOutcome::AlreadyDisabled,
                Reply::Fail => ApplyOutcome::Failed(Error::auth_failed("scripted failure")),
            }
        }
    }

    fn setup(control: ScriptedControl, window: Duration) -> (Arc<ScriptedControl>, Arc<StreamCoordinator>) {
        let control = Arc::new(control);
        let coordinator = StreamCoordinator::new(Arc::clone(&control) as Arc<dyn StreamControl>, window);
        (control, coordinator)
    }

    fn request(desired: StreamState) -> TransitionRequest {
        TransitionRequest::new(desired, ReplyTarget::DirectPush("42".into()))
    }

    fn assert_consistent(coordinator: &StreamCoordinator) {
        let status = coordinator.status();
        assert_eq!(
            status.state.is_enabled(),
            status.revert_in.is_some(),
            "timer must be live exactly when enabled: {status:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn starts_disabled_without_timer() {
        let (_, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(7200));
        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Disabled);
        assert!(status.revert_in.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn enable_arms_timer_and_reports_window() {
        let (_, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(7200));
        let t = coordinator.transition(request(StreamState::Enabled)).await;

        assert_eq!(t.outcome, TransitionOutcome::Applied(StreamState::Enabled));
        assert_eq!(t.message(), "回家模式已激活，有效期两小时");
        assert!(matches!(t.reply_target, Some(ReplyTarget::DirectPush(ref id)) if id == "42"));

        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Enabled);
        assert_eq!(status.revert_in, Some(Duration::from_secs(7200)));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_disables_after_window() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(3600));
        coordinator.transition(request(StreamState::Enabled)).await;

        sleep(Duration::from_secs(3599)).await;
        assert_eq!(control.count(StreamState::Disabled), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(control.count(StreamState::Disabled), 1);

        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Disabled);
        assert!(status.revert_in.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_enable_replaces_pending_revert() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(1));
        coordinator.transition(request(StreamState::Enabled)).await;

        sleep(Duration::from_millis(100)).await;
        control.push(Reply::AlreadyEnabled);
        let second_at = Instant::now();
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert_eq!(t.outcome, TransitionOutcome::Extended(Duration::from_secs(1)));

        // The first schedule would have fired at 1.0 s.
        sleep(Duration::from_millis(950)).await;
        assert_eq!(control.count(StreamState::Disabled), 0);

        sleep(Duration::from_secs(5)).await;
        let disables: Vec<_> = control
            .calls()
            .into_iter()
            .filter(|(s, _)| *s == StreamState::Disabled)
            .collect();
        assert_eq!(disables.len(), 1);
        assert_eq!(disables[0].1 - second_at, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn user_disable_cancels_revert() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(10));
        coordinator.transition(request(StreamState::Enabled)).await;
        let t = coordinator.transition(request(StreamState::Disabled)).await;
        assert_eq!(t.message(), "回家模式已停用");

        sleep(Duration::from_secs(60)).await;
        assert_eq!(control.count(StreamState::Disabled), 1);
        assert_consistent(&coordinator);
    }

    #[tokio::test(start_paused = true)]
    async fn already_disabled_clears_timer_with_disabled_message() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(10));
        coordinator.transition(request(StreamState::Enabled)).await;

        control.push(Reply::AlreadyDisabled);
        let t = coordinator.transition(request(StreamState::Disabled)).await;
        assert_eq!(t.outcome, TransitionOutcome::AlreadyDisabled);
        assert_eq!(t.message(), "回家模式已停用");

        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Disabled);
        assert!(status.revert_in.is_none());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(control.count(StreamState::Disabled), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_enabled_from_disabled_records_enabled_and_arms() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(10));
        control.push(Reply::AlreadyEnabled);
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert_eq!(t.outcome, TransitionOutcome::Extended(Duration::from_secs(10)));
        assert_consistent(&coordinator);
        assert_eq!(coordinator.status().state, StreamState::Enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_touches_neither_state_nor_timer() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(10));

        control.push(Reply::Fail);
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert!(t.is_failed());
        assert_eq!(t.message(), "failed");
        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Disabled);
        assert!(status.revert_in.is_none());

        coordinator.transition(request(StreamState::Enabled)).await;
        sleep(Duration::from_secs(4)).await;
        control.push(Reply::Fail);
        assert!(coordinator.transition(request(StreamState::Disabled)).await.is_failed());
        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Enabled);
        assert_eq!(status.revert_in, Some(Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_outcome_is_a_failure() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(10));
        control.push(Reply::AlreadyDisabled);
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert!(t.is_failed());
        assert_eq!(coordinator.status().state, StreamState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn state_follows_last_successful_request() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(3600));
        let script = [
            (StreamState::Enabled, Reply::Applied),
            (StreamState::Disabled, Reply::Fail),
            (StreamState::Enabled, Reply::AlreadyEnabled),
            (StreamState::Disabled, Reply::Applied),
            (StreamState::Disabled, Reply::AlreadyDisabled),
            (StreamState::Enabled, Reply::Fail),
            (StreamState::Enabled, Reply::Applied),
            (StreamState::Disabled, Reply::Fail),
        ];

        let mut expected = StreamState::Disabled;
        for (desired, reply) in script {
            control.push(reply);
            let t = coordinator.transition(request(desired)).await;
            if !t.is_failed() {
                expected = desired;
            }
            assert_eq!(coordinator.status().state, expected, "after {desired} / {reply:?}");
            assert_consistent(&coordinator);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_automatic_disable_leaves_stream_enabled() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(5));
        coordinator.transition(request(StreamState::Enabled)).await;
        control.push(Reply::Fail);

        sleep(Duration::from_secs(6)).await;
        assert_eq!(control.count(StreamState::Disabled), 1);
        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Enabled);
        assert!(status.revert_in.is_none());

        // A later enable arms a fresh revert.
        coordinator.transition(request(StreamState::Enabled)).await;
        assert_consistent(&coordinator);
    }

    #[tokio::test(start_paused = true)]
    async fn enable_racing_the_fire_wins_when_it_holds_the_lock() {
        let latency = Duration::from_millis(50);
        let (control, coordinator) = setup(ScriptedControl::with_latency(latency), Duration::from_secs(1));
        coordinator.transition(request(StreamState::Enabled)).await;

        // Enable starts 10 ms before the deadline and is still talking to the
        // proxy manager when the timer fires.
        sleep(Duration::from_millis(990)).await;
        control.push(Reply::AlreadyEnabled);
        let racer = Arc::clone(&coordinator);
        let enable = tokio::spawn(async move { racer.transition(request(StreamState::Enabled)).await });
        let t = enable.await.unwrap();
        assert_eq!(t.outcome, TransitionOutcome::Extended(Duration::from_secs(1)));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(control.count(StreamState::Disabled), 0);
        assert_eq!(coordinator.status().state, StreamState::Enabled);
        assert_consistent(&coordinator);
    }

    #[tokio::test(start_paused = true)]
    async fn enable_after_the_fire_is_applied_last() {
        let latency = Duration::from_millis(50);
        let (control, coordinator) = setup(ScriptedControl::with_latency(latency), Duration::from_secs(1));
        coordinator.transition(request(StreamState::Enabled)).await;

        // Fire happens at 1.05 s and holds the lock until 1.10 s.
        sleep(Duration::from_millis(1_020)).await;
        let racer = Arc::clone(&coordinator);
        let enable = tokio::spawn(async move { racer.transition(request(StreamState::Enabled)).await });
        let t = enable.await.unwrap();
        assert_eq!(t.outcome, TransitionOutcome::Applied(StreamState::Enabled));

        let calls: Vec<_> = control.calls().into_iter().map(|(s, _)| s).collect();
        assert_eq!(
            calls,
            [StreamState::Enabled, StreamState::Disabled, StreamState::Enabled]
        );
        assert_eq!(coordinator.status().state, StreamState::Enabled);
        assert_consistent(&coordinator);
    }

    #[tokio::test(start_paused = true)]
    async fn status_does_not_wait_for_transition_in_flight() {
        let latency = Duration::from_secs(5);
        let (_, coordinator) = setup(ScriptedControl::with_latency(latency), Duration::from_secs(60));
        let racer = Arc::clone(&coordinator);
        let enable = tokio::spawn(async move { racer.transition(request(StreamState::Enabled)).await });

        sleep(Duration::from_secs(1)).await;
        let before = Instant::now();
        let status = coordinator.status();
        assert_eq!(Instant::now(), before);
        assert_eq!(status.state, StreamState::Disabled);
        assert!(status.revert_in.is_none());

        enable.await.unwrap();
        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Enabled);
        assert_eq!(status.revert_in, Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_window_enables_without_panicking() {
        let (control, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(u64::MAX));
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert_eq!(t.outcome, TransitionOutcome::Applied(StreamState::Enabled));

        let status = coordinator.status();
        assert_eq!(status.state, StreamState::Enabled);
        assert!(status.revert_in.is_some());

        // The coordinator is still usable afterwards.
        let t = coordinator.transition(request(StreamState::Disabled)).await;
        assert_eq!(t.outcome, TransitionOutcome::Applied(StreamState::Disabled));
        assert_eq!(control.count(StreamState::Disabled), 1);
        assert_consistent(&coordinator);
    }

    #[tokio::test(start_paused = true)]
    async fn window_change_applies_to_next_enable() {
        let (_, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(7200));
        coordinator.set_window(Duration::from_secs(3600)).await;
        let t = coordinator.transition(request(StreamState::Enabled)).await;
        assert_eq!(t.message(), "回家模式已激活，有效期一小时");
        assert_eq!(coordinator.status().window, Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn inline_target_is_passed_through() {
        let (_, coordinator) = setup(ScriptedControl::default(), Duration::from_secs(60));
        let correlation = Correlation {
            to_user_name: "corp".into(),
            from_user_name: "alice".into(),
            create_time: "1700000000".into(),
        };
        let t = coordinator
            .transition(TransitionRequest::new(
                StreamState::Disabled,
                ReplyTarget::InlineXml(correlation.clone()),
            ))
            .await;
        assert_eq!(t.reply_target, Some(ReplyTarget::InlineXml(correlation)));
    }
}
