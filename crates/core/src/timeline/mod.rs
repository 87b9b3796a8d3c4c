use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Monotonic engine clock, advanced once per frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    elapsed: Duration,
    frame: u64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves the clock forward by one frame of length `delta`. Saturates at
    /// [`Duration::MAX`].
    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.frame = self.frame.saturating_add(1);
    }

    /// Same as [`advance`](Self::advance) for a frame delta in seconds.
    /// Negative or non-finite deltas count as zero.
    pub fn advance_secs(&mut self, delta: f32) {
        self.advance(secs_to_duration(delta));
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Converts a frame delta in seconds. Negative or non-finite values become
/// zero and values too large for a [`Duration`] become [`Duration::MAX`].
pub fn secs_to_duration(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Opaque reference to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct PendingTimer<T> {
    handle: TimerHandle,
    deadline: Duration,
    payload: T,
}

/// Single-shot timers resolved cooperatively against the engine clock.
///
/// Nothing fires on its own: the owner calls [`drain_due`](Self::drain_due)
/// with the current time, which hands back every expired payload in deadline
/// order. A cancelled timer is removed immediately and can never be drained.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    pending: Vec<PendingTimer<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to fire once `delay` has passed after `now`.
    pub fn schedule(&mut self, now: Duration, delay: Duration, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            handle,
            deadline: now.saturating_add(delay),
            payload,
        });
        handle
    }

    /// Cancels a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|timer| timer.handle != handle);
        self.pending.len() != before
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|timer| timer.handle == handle)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|timer| timer.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every timer whose deadline is at or before `now`,
    /// earliest first. Ties fire in scheduling order.
    pub fn drain_due(&mut self, now: Duration) -> Vec<(TimerHandle, T)> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].deadline <= now {
                due.push(self.pending.swap_remove(index));
            } else {
                index += 1;
            }
        }

        due.sort_by_key(|timer| (timer.deadline, timer.handle.0));
        due.into_iter()
            .map(|timer| (timer.handle, timer.payload))
            .collect()
    }
}
