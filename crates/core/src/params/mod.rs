//! Per-frame animation parameters.
//!
//! Targets are derived from the channel levels each tick, blended toward the
//! error spike by the error level, and then smoothed asymmetrically. The
//! displayed colour goes through two smoothing stages: a time-driven palette
//! walk produces a colour that becomes the target of a second exponential
//! follower.

use std::{f32::consts::TAU, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    field::{self, FieldParams},
    smoothing::{RatePolicy, Smoothed},
    ChannelLevels, FieldConfig, OrbConfig, Palette, PlaybackClock, Rgb,
};

/// Largest displacement, reached at `energy = 1`.
pub const MAX_AMPLITUDE: f32 = 0.35;
pub const SHARPNESS_RANGE: (f32, f32) = (1.0, 6.0);
pub const ROTATION_SPEED_MAX: f32 = 2.0;
pub const BLOOM_MAX: f32 = 3.0;

const ERROR_TINT: Rgb = Rgb::new(1.0, 0.09, 0.267);

/// Field time wraps after this many seconds so `f32` keeps millisecond
/// resolution on long runs.
pub const FIELD_TIME_PERIOD: f64 = 3600.0;

/// Target values for every non-colour parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub energy: f32,
    pub sharpness: f32,
    pub tremor: f32,
    pub rotation_speed_x: f32,
    pub rotation_speed_y: f32,
    pub bloom_strength: f32,
}

impl Preset {
    pub const IDLE: Preset = Preset {
        energy: 0.08,
        sharpness: 1.0,
        tremor: 0.0,
        rotation_speed_x: 0.05,
        rotation_speed_y: 0.1,
        bloom_strength: 0.4,
    };

    pub const ACTIVE: Preset = Preset {
        energy: 0.55,
        sharpness: 2.5,
        tremor: 0.15,
        rotation_speed_x: 0.3,
        rotation_speed_y: 0.6,
        bloom_strength: 1.2,
    };

    /// Fixed high-intensity configuration blended in by the error level.
    pub const ERROR_SPIKE: Preset = Preset {
        energy: 1.0,
        sharpness: 6.0,
        tremor: 0.8,
        rotation_speed_x: 0.9,
        rotation_speed_y: 1.4,
        bloom_strength: 2.5,
    };

    pub fn lerp(&self, other: &Preset, t: f32) -> Preset {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a * (1.0 - t) + b * t;
        Preset {
            energy: mix(self.energy, other.energy),
            sharpness: mix(self.sharpness, other.sharpness),
            tremor: mix(self.tremor, other.tremor),
            rotation_speed_x: mix(self.rotation_speed_x, other.rotation_speed_x),
            rotation_speed_y: mix(self.rotation_speed_y, other.rotation_speed_y),
            bloom_strength: mix(self.bloom_strength, other.bloom_strength),
        }
    }

    /// Normal target for a given combined activity level.
    pub fn for_activity(activity: f32) -> Preset {
        Preset::IDLE.lerp(&Preset::ACTIVE, ease(activity))
    }
}

/// Smoothstep easing. Continuous and monotonic on `[0, 1]`.
fn ease(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Smoothed parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationParams {
    pub energy: Smoothed,
    pub sharpness: Smoothed,
    pub tremor: Smoothed,
    pub color_offset: Smoothed,
    pub rotation_speed_x: Smoothed,
    pub rotation_speed_y: Smoothed,
    pub bloom_strength: Smoothed,
}

impl AnimationParams {
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            energy: Smoothed::unit(preset.energy),
            sharpness: Smoothed::new(preset.sharpness, SHARPNESS_RANGE.0, SHARPNESS_RANGE.1),
            tremor: Smoothed::unit(preset.tremor),
            color_offset: Smoothed::new(0.0, 0.0, f32::INFINITY),
            rotation_speed_x: Smoothed::new(preset.rotation_speed_x, 0.0, ROTATION_SPEED_MAX),
            rotation_speed_y: Smoothed::new(preset.rotation_speed_y, 0.0, ROTATION_SPEED_MAX),
            bloom_strength: Smoothed::new(preset.bloom_strength, 0.0, BLOOM_MAX),
        }
    }

    fn set_targets(&mut self, preset: &Preset) {
        self.energy.set_target(preset.energy);
        self.sharpness.set_target(preset.sharpness);
        self.tremor.set_target(preset.tremor);
        self.rotation_speed_x.set_target(preset.rotation_speed_x);
        self.rotation_speed_y.set_target(preset.rotation_speed_y);
        self.bloom_strength.set_target(preset.bloom_strength);
    }

    fn step(&mut self, activity: &RatePolicy, color: &RatePolicy) {
        self.energy.step_with(activity);
        self.sharpness.step_with(activity);
        self.tremor.step_with(activity);
        self.rotation_speed_x.step_with(activity);
        self.rotation_speed_y.step_with(activity);
        self.bloom_strength.step_with(activity);
        self.color_offset.step_with(color);
    }
}

/// Colour smoothed channel by channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedColor {
    r: Smoothed,
    g: Smoothed,
    b: Smoothed,
}

impl SmoothedColor {
    pub fn new(initial: Rgb) -> Self {
        Self {
            r: Smoothed::unit(initial.r),
            g: Smoothed::unit(initial.g),
            b: Smoothed::unit(initial.b),
        }
    }

    pub fn set_target(&mut self, color: Rgb) {
        self.r.set_target(color.r);
        self.g.set_target(color.g);
        self.b.set_target(color.b);
    }

    pub fn step(&mut self, policy: &RatePolicy) -> Rgb {
        Rgb::new(
            self.r.step_with(policy),
            self.g.step_with(policy),
            self.b.step_with(policy),
        )
    }

    pub fn actual(&self) -> Rgb {
        Rgb::new(self.r.actual(), self.g.actual(), self.b.actual())
    }

    pub fn target(&self) -> Rgb {
        Rgb::new(self.r.target(), self.g.target(), self.b.target())
    }
}

/// Immutable per-frame output handed to the rendering backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationSnapshot {
    pub frame: u64,
    pub elapsed_seconds: f64,
    pub activity: f32,
    pub levels: ChannelLevels,
    pub energy: f32,
    pub sharpness: f32,
    pub tremor: f32,
    pub color_offset: f32,
    pub rotation_speed_x: f32,
    pub rotation_speed_y: f32,
    pub bloom_strength: f32,
    pub palette_index: f64,
    pub color: Rgb,
    /// Accumulated rotation around the x and y axes, in radians.
    pub rotation: [f32; 2],
    pub field: FieldParams,
}

impl AnimationSnapshot {
    /// Field time matching this frame, in `[0, FIELD_TIME_PERIOD)`.
    pub fn field_time(&self) -> f32 {
        self.elapsed_seconds.rem_euclid(FIELD_TIME_PERIOD) as f32
    }

    /// Displacement of `position` for this frame.
    pub fn displace(&self, position: Vec3) -> f32 {
        field::displace(position, self.field_time(), &self.field)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterEngine {
    params: AnimationParams,
    color: SmoothedColor,
    accent: Rgb,
    palette: Palette,
    cycle_speed: f32,
    advance_step: f32,
    accent_weight: f32,
    field: FieldConfig,
    activity_rates: RatePolicy,
    /// Escalation rate reached while the error level is at 1.
    error_rate: f32,
    color_rates: RatePolicy,
    rotation: [f32; 2],
}

impl ParameterEngine {
    /// Expects a validated configuration.
    pub fn new(config: &OrbConfig) -> Self {
        let palette = config.palette.colors.clone();
        let initial = palette.sample(0.0);
        Self {
            params: AnimationParams::from_preset(&Preset::IDLE),
            color: SmoothedColor::new(initial),
            accent: initial,
            palette,
            cycle_speed: config.palette.cycle_speed,
            advance_step: config.palette.advance_step,
            accent_weight: config.palette.accent_weight,
            field: config.field,
            activity_rates: RatePolicy::activity(&config.smoothing),
            error_rate: config.smoothing.error_rate,
            color_rates: RatePolicy::color(&config.smoothing),
            rotation: [0.0; 2],
        }
    }

    pub fn params(&self) -> &AnimationParams {
        &self.params
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn accent(&self) -> Rgb {
        self.accent
    }

    /// Shifts the palette walk by one step.
    pub fn advance_color(&mut self) {
        let offset = self.params.color_offset.target() + self.advance_step;
        self.params.color_offset.set_target(offset);
    }

    /// Heartbeat bump applied straight to the current energy.
    pub fn trigger_impulse(&mut self, magnitude: f32) {
        self.params.energy.bump(magnitude);
    }

    pub fn set_accent(&mut self, accent: Rgb) {
        self.accent = accent.clamped();
    }

    /// Palette position at `elapsed_seconds` for a given colour offset.
    pub fn effective_index(&self, elapsed_seconds: f64, color_offset: f32) -> f64 {
        self.palette.wrap(
            elapsed_seconds * f64::from(self.cycle_speed) + f64::from(color_offset),
        )
    }

    /// Rates for the non-colour parameters. Escalation speeds up toward the
    /// error rate as the error level rises, so a spike reads as urgent while
    /// plain activity still wakes up slowly.
    pub fn parameter_rates(&self, error: f32) -> RatePolicy {
        let error = error.clamp(0.0, 1.0);
        let escalate = self.activity_rates.escalate * (1.0 - error) + self.error_rate * error;
        RatePolicy::new(escalate, self.activity_rates.deescalate)
    }

    /// Spatial frequency of the field, rising with activity.
    pub fn frequency_for(&self, activity: f32) -> f32 {
        self.field.base_frequency * (1.0 + 0.8 * ease(activity))
    }

    /// Runs one tick against the channel levels captured at tick start.
    pub fn update(
        &mut self,
        levels: ChannelLevels,
        clock: &PlaybackClock,
        dt: Duration,
    ) -> AnimationSnapshot {
        let activity = levels.activity();
        let error = levels.error.clamp(0.0, 1.0);

        let target = Preset::for_activity(activity).lerp(&Preset::ERROR_SPIKE, error);
        self.params.set_targets(&target);
        let rates = self.parameter_rates(error);
        self.params.step(&rates, &self.color_rates);

        let dt = dt.as_secs_f32();
        self.rotation[0] = (self.rotation[0] + self.params.rotation_speed_x.actual() * dt)
            .rem_euclid(TAU);
        self.rotation[1] = (self.rotation[1] + self.params.rotation_speed_y.actual() * dt)
            .rem_euclid(TAU);

        let elapsed = clock.seconds();
        let palette_index = self.effective_index(elapsed, self.params.color_offset.actual());
        let walked = self
            .palette
            .sample(palette_index)
            .lerp(self.accent, self.accent_weight)
            .lerp(ERROR_TINT, error);
        self.color.set_target(walked);
        let color = self.color.step(&self.color_rates);

        let sharpness = self.params.sharpness.actual();
        let field = FieldParams {
            amplitude: self.params.energy.actual() * MAX_AMPLITUDE,
            frequency: self.frequency_for(activity),
            sharpness,
            ridge_mix: ((sharpness - SHARPNESS_RANGE.0) / 3.0).clamp(0.0, 1.0),
            tremor: self.params.tremor.actual() * 0.05,
            flow: 0.15 + 0.6 * activity + 0.8 * error,
            octaves: self.field.octaves,
            lacunarity: self.field.lacunarity,
            gain: self.field.gain,
        };

        AnimationSnapshot {
            frame: clock.frame(),
            elapsed_seconds: elapsed,
            activity,
            levels,
            energy: self.params.energy.actual(),
            sharpness,
            tremor: self.params.tremor.actual(),
            color_offset: self.params.color_offset.actual(),
            rotation_speed_x: self.params.rotation_speed_x.actual(),
            rotation_speed_y: self.params.rotation_speed_y.actual(),
            bloom_strength: self.params.bloom_strength.actual(),
            palette_index,
            color,
            rotation: self.rotation,
            field,
        }
    }
}
