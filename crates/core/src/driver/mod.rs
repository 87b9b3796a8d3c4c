use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    classify, timeline::secs_to_duration, AnimationSnapshot, Channel, ChannelLevels,
    Classification, Event, OrbConfig, ParameterEngine, PlaybackClock, RenderBackend, Result,
    StateAggregator, StateClass,
};

/// One visualisation instance: clock, channel state and parameter engine.
///
/// All mutation happens through `&mut self`, so timer resolution, event
/// ingestion and ticks are naturally serialised on the owner's thread.
#[derive(Debug, Clone)]
pub struct OrbEngine {
    config: OrbConfig,
    clock: PlaybackClock,
    aggregator: StateAggregator,
    params: ParameterEngine,
    last: Option<AnimationSnapshot>,
}

impl OrbEngine {
    /// Builds an engine, rejecting out-of-range configuration.
    pub fn new(config: OrbConfig) -> Result<Self> {
        config.validate()?;
        let aggregator = StateAggregator::new(&config.aggregator, &config.smoothing);
        let params = ParameterEngine::new(&config);
        Ok(Self {
            config,
            clock: PlaybackClock::new(),
            aggregator,
            params,
            last: None,
        })
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn aggregator(&self) -> &StateAggregator {
        &self.aggregator
    }

    pub fn parameters(&self) -> &ParameterEngine {
        &self.params
    }

    pub fn last_snapshot(&self) -> Option<&AnimationSnapshot> {
        self.last.as_ref()
    }

    /// Classifies an event and applies it to the channels. Never fails.
    pub fn ingest(&mut self, mut event: Event) -> Classification {
        if event.timestamp.is_zero() {
            event.timestamp = self.now();
        }

        let class = classify(&event.text);
        debug!(
            at_ms = event.timestamp.as_millis() as u64,
            token = ?class.token,
            state = ?class.state_class,
            error = event.is_error,
            "event"
        );

        match class.state_class {
            StateClass::Working => self.request_activate(Channel::Working),
            StateClass::Idle => {
                self.request_deactivate(Channel::Working);
                self.request_deactivate(Channel::Waiting);
            }
            StateClass::Neutral => {}
        }

        if event.is_error || class.is_failure() {
            self.pulse_error(self.config.aggregator.error_pulse());
        }

        if class.is_mapped() {
            self.params.set_accent(class.accent);
            self.trigger_impulse(self.config.impulse.ingest_magnitude);
        }

        class
    }

    pub fn request_activate(&mut self, channel: Channel) {
        let now = self.now();
        self.aggregator.request_activate(channel, now);
    }

    pub fn request_deactivate(&mut self, channel: Channel) {
        self.aggregator.request_deactivate(channel);
    }

    pub fn lock(&mut self, channel: Channel) {
        self.aggregator.lock(channel);
    }

    pub fn unlock(&mut self, channel: Channel) {
        self.aggregator.unlock(channel);
    }

    pub fn pulse_error(&mut self, duration: Duration) {
        let now = self.now();
        self.aggregator.pulse_error(duration, now);
    }

    pub fn advance_color(&mut self) {
        self.params.advance_color();
    }

    pub fn trigger_impulse(&mut self, magnitude: f32) {
        self.params.trigger_impulse(magnitude);
    }

    /// Advances the clock by `dt`, resolves due timers, smooths the channel
    /// levels and derives this frame's parameters.
    pub fn tick(&mut self, dt: Duration) -> AnimationSnapshot {
        self.clock.advance(dt);
        let now = self.clock.elapsed();

        self.aggregator.fire_due(now);
        self.aggregator.settle();
        let levels: ChannelLevels = self.aggregator.levels();

        let snapshot = self.params.update(levels, &self.clock, dt);
        self.last = Some(snapshot);
        snapshot
    }

    /// Variant of [`tick`](Self::tick) for frame deltas in seconds. Negative or
    /// non-finite deltas count as zero.
    pub fn tick_secs(&mut self, dt: f32) -> AnimationSnapshot {
        self.tick(secs_to_duration(dt))
    }
}

/// Pairs an engine with a backend and pushes one snapshot per frame.
#[derive(Debug)]
pub struct FrameDriver<B> {
    engine: OrbEngine,
    backend: B,
    dropped: u64,
}

impl<B: RenderBackend> FrameDriver<B> {
    pub fn new(engine: OrbEngine, backend: B) -> Self {
        Self {
            engine,
            backend,
            dropped: 0,
        }
    }

    pub fn engine(&self) -> &OrbEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut OrbEngine {
        &mut self.engine
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Snapshots the backend refused.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Ticks the engine and submits the snapshot. A failing backend is
    /// logged; the engine keeps running regardless.
    pub fn run_frame(&mut self, dt: Duration) -> AnimationSnapshot {
        let snapshot = self.engine.tick(dt);
        if let Err(err) = self.backend.submit(&snapshot) {
            self.dropped += 1;
            warn!(frame = snapshot.frame, %err, "backend rejected snapshot");
        }
        snapshot
    }

    pub fn into_parts(self) -> (OrbEngine, B) {
        (self.engine, self.backend)
    }
}
