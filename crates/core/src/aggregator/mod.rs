//! Debounced per-channel activity state.
//!
//! Working and waiting follow `Idle -> PendingActivate -> Active`; a
//! deactivation while pending cancels the timer so the activation is never
//! observable. The error channel is pulsed: each pulse raises it at once and
//! restarts a single auto-reset timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    smoothing::{RatePolicy, Smoothed},
    AggregatorConfig, SmoothingConfig, TimerHandle, TimerQueue,
};

/// One of the tracked activity signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Working,
    Waiting,
    Error,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Working, Channel::Waiting, Channel::Error];

    fn index(self) -> usize {
        match self {
            Channel::Working => 0,
            Channel::Waiting => 1,
            Channel::Error => 2,
        }
    }
}

/// Observable phase of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelPhase {
    Idle,
    PendingActivate,
    Active,
}

/// Timer payloads owned by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    Activate(Channel),
    ResetError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSlot {
    level: Smoothed,
    pending: Option<TimerHandle>,
    locked: bool,
}

impl StateSlot {
    fn new() -> Self {
        Self {
            level: Smoothed::unit(0.0),
            pending: None,
            locked: false,
        }
    }

    pub fn target(&self) -> f32 {
        self.level.target()
    }

    pub fn actual(&self) -> f32 {
        self.level.actual()
    }

    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.pending
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Copy of the three channel levels taken at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelLevels {
    pub working: f32,
    pub waiting: f32,
    pub error: f32,
}

impl ChannelLevels {
    /// Combined non-error activity.
    pub fn activity(&self) -> f32 {
        self.working.max(self.waiting)
    }
}

#[derive(Debug, Clone)]
pub struct StateAggregator {
    slots: [StateSlot; 3],
    timers: TimerQueue<TimerAction>,
    activation_delay: Duration,
    error_pulse: Duration,
    activity_rates: RatePolicy,
    error_rates: RatePolicy,
}

impl StateAggregator {
    pub fn new(config: &AggregatorConfig, smoothing: &SmoothingConfig) -> Self {
        Self {
            slots: [StateSlot::new(); 3],
            timers: TimerQueue::new(),
            activation_delay: config.activation_delay(),
            error_pulse: config.error_pulse(),
            activity_rates: RatePolicy::activity(smoothing),
            error_rates: RatePolicy::error(smoothing),
        }
    }

    pub fn slot(&self, channel: Channel) -> &StateSlot {
        &self.slots[channel.index()]
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut StateSlot {
        &mut self.slots[channel.index()]
    }

    pub fn phase(&self, channel: Channel) -> ChannelPhase {
        let slot = self.slot(channel);
        if slot.target() >= 1.0 {
            ChannelPhase::Active
        } else if slot.pending.is_some() {
            ChannelPhase::PendingActivate
        } else {
            ChannelPhase::Idle
        }
    }

    /// Starts the debounce toward `target = 1`. A channel that is already
    /// active or pending is left alone. The error channel has no debounce and
    /// is pulsed for the configured duration instead.
    pub fn request_activate(&mut self, channel: Channel, now: Duration) {
        if channel == Channel::Error {
            self.pulse_error(self.error_pulse, now);
            return;
        }

        let delay = self.activation_delay;
        let slot = self.slot(channel);
        if slot.target() >= 1.0 || slot.pending.is_some() {
            trace!(?channel, "activation already active or pending");
            return;
        }

        let handle = self
            .timers
            .schedule(now, delay, TimerAction::Activate(channel));
        self.slot_mut(channel).pending = Some(handle);
        debug!(?channel, delay_ms = delay.as_millis() as u64, "activation scheduled");
    }

    /// Immediate deactivation. Cancels a pending activation so it never
    /// becomes visible. Ignored while the channel is locked.
    pub fn request_deactivate(&mut self, channel: Channel) {
        if self.slot(channel).locked {
            trace!(?channel, "deactivation suppressed by lock");
            return;
        }

        if let Some(handle) = self.slot_mut(channel).pending.take() {
            self.timers.cancel(handle);
            debug!(?channel, "pending timer cancelled");
        }
        self.slot_mut(channel).level.set_target(0.0);
    }

    pub fn lock(&mut self, channel: Channel) {
        self.slot_mut(channel).locked = true;
    }

    pub fn unlock(&mut self, channel: Channel) {
        self.slot_mut(channel).locked = false;
    }

    /// Raises the error channel now and (re)starts its auto-reset timer.
    pub fn pulse_error(&mut self, duration: Duration, now: Duration) {
        if let Some(previous) = self.slot_mut(Channel::Error).pending.take() {
            self.timers.cancel(previous);
            trace!("error pulse extended");
        }

        let handle = self.timers.schedule(now, duration, TimerAction::ResetError);
        let slot = self.slot_mut(Channel::Error);
        slot.level.set_target(1.0);
        slot.pending = Some(handle);
        debug!(duration_ms = duration.as_millis() as u64, "error pulse");
    }

    /// Applies every timer that expired at or before `now`.
    pub fn fire_due(&mut self, now: Duration) {
        for (handle, action) in self.timers.drain_due(now) {
            match action {
                TimerAction::Activate(channel) => {
                    let slot = self.slot_mut(channel);
                    if slot.pending == Some(handle) {
                        slot.pending = None;
                        slot.level.set_target(1.0);
                        debug!(?channel, "channel activated");
                    }
                }
                TimerAction::ResetError => {
                    let slot = self.slot_mut(Channel::Error);
                    if slot.pending == Some(handle) {
                        slot.pending = None;
                        slot.level.set_target(0.0);
                        debug!("error pulse expired");
                    }
                }
            }
        }
    }

    /// Moves every channel's `actual` one smoothing step toward its target.
    pub fn settle(&mut self) {
        let activity = self.activity_rates;
        let error = self.error_rates;
        for channel in Channel::ALL {
            let policy = if channel == Channel::Error {
                &error
            } else {
                &activity
            };
            self.slot_mut(channel).level.step_with(policy);
        }
    }

    pub fn levels(&self) -> ChannelLevels {
        ChannelLevels {
            working: self.slot(Channel::Working).actual(),
            waiting: self.slot(Channel::Waiting).actual(),
            error: self.slot(Channel::Error).actual(),
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn aggregator() -> StateAggregator {
        StateAggregator::new(&AggregatorConfig::default(), &SmoothingConfig::default())
    }

    /// Advances in 10ms steps, firing timers and settling each step.
    fn run(
        agg: &mut StateAggregator,
        from: u64,
        to: u64,
        mut check: impl FnMut(&StateAggregator),
    ) {
        let mut now = from;
        while now < to {
            now += 10;
            agg.fire_due(ms(now));
            agg.settle();
            check(agg);
        }
    }

    #[test]
    fn activation_is_debounced() {
        let mut agg = aggregator();
        agg.request_activate(Channel::Working, ms(0));
        assert_eq!(agg.phase(Channel::Working), ChannelPhase::PendingActivate);

        run(&mut agg, 0, 1_990, |agg| {
            assert_eq!(agg.slot(Channel::Working).target(), 0.0)
        });
        run(&mut agg, 1_990, 2_000, |_| {});
        assert_eq!(agg.phase(Channel::Working), ChannelPhase::Active);
        assert!(agg.slot(Channel::Working).pending_timer().is_none());
    }

    #[test]
    fn deactivate_before_delay_never_activates() {
        for cancel_at in [0, 10, 500, 1_990] {
            let mut agg = aggregator();
            agg.request_activate(Channel::Working, ms(0));
            run(&mut agg, 0, cancel_at, |_| {});
            agg.request_deactivate(Channel::Working);
            assert_eq!(agg.pending_timers(), 0);

            run(&mut agg, cancel_at, 5_000, |agg| {
                let slot = agg.slot(Channel::Working);
                assert_eq!(slot.target(), 0.0);
                assert_eq!(slot.actual(), 0.0);
            });
        }
    }

    #[test]
    fn repeated_activation_keeps_single_timer() {
        let mut agg = aggregator();
        agg.request_activate(Channel::Waiting, ms(0));
        let first = agg.slot(Channel::Waiting).pending_timer();
        agg.request_activate(Channel::Waiting, ms(300));
        agg.request_activate(Channel::Waiting, ms(600));
        assert_eq!(agg.pending_timers(), 1);
        assert_eq!(agg.slot(Channel::Waiting).pending_timer(), first);

        // The original deadline stands.
        agg.fire_due(ms(2_000));
        assert_eq!(agg.phase(Channel::Waiting), ChannelPhase::Active);
    }

    #[test]
    fn lock_suppresses_deactivation() {
        let mut agg = aggregator();
        agg.request_activate(Channel::Working, ms(0));
        agg.fire_due(ms(2_000));
        agg.lock(Channel::Working);
        agg.request_deactivate(Channel::Working);
        assert_eq!(agg.phase(Channel::Working), ChannelPhase::Active);

        agg.unlock(Channel::Working);
        agg.request_deactivate(Channel::Working);
        assert_eq!(agg.phase(Channel::Working), ChannelPhase::Idle);
    }

    #[test]
    fn lock_keeps_pending_activation() {
        let mut agg = aggregator();
        agg.lock(Channel::Waiting);
        agg.request_activate(Channel::Waiting, ms(0));
        agg.request_deactivate(Channel::Waiting);
        agg.fire_due(ms(2_000));
        assert_eq!(agg.phase(Channel::Waiting), ChannelPhase::Active);
    }

    #[test]
    fn error_pulses_extend_without_stacking() {
        let mut agg = aggregator();
        for call in 0..5u64 {
            let at = call * 200;
            run(&mut agg, at.saturating_sub(200), at, |agg| {
                if at > 0 {
                    assert_eq!(agg.phase(Channel::Error), ChannelPhase::Active);
                }
            });
            agg.pulse_error(ms(500), ms(at));
            assert_eq!(agg.pending_timers(), 1);
        }

        // Last pulse at 800ms; stays active until 1300ms.
        run(&mut agg, 800, 1_290, |agg| {
            assert_eq!(agg.phase(Channel::Error), ChannelPhase::Active)
        });
        run(&mut agg, 1_290, 1_300, |_| {});
        assert_eq!(agg.phase(Channel::Error), ChannelPhase::Idle);
    }

    #[test]
    fn error_level_uses_its_own_fast_rate() {
        let mut agg = aggregator();
        agg.request_activate(Channel::Working, ms(0));
        agg.fire_due(ms(2_000));
        agg.pulse_error(ms(1_000), ms(2_000));
        agg.settle();
        let levels = agg.levels();
        assert!(levels.error > levels.working * 10.0);
    }

    #[test]
    fn activating_error_channel_pulses_immediately() {
        let mut agg = aggregator();
        agg.request_activate(Channel::Error, ms(0));
        assert_eq!(agg.phase(Channel::Error), ChannelPhase::Active);
        agg.fire_due(ms(1_500));
        assert_eq!(agg.phase(Channel::Error), ChannelPhase::Idle);

        agg.request_activate(Channel::Error, ms(2_000));
        agg.request_deactivate(Channel::Error);
        assert_eq!(agg.phase(Channel::Error), ChannelPhase::Idle);
        assert_eq!(agg.pending_timers(), 0);
    }

    #[test]
    fn duplicate_deactivation_is_a_no_op() {
        let mut agg = aggregator();
        agg.request_deactivate(Channel::Working);
        agg.request_deactivate(Channel::Working);
        assert_eq!(agg.phase(Channel::Working), ChannelPhase::Idle);
        assert_eq!(agg.pending_timers(), 0);
    }
}
