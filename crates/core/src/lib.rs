//! Core library for the Status Orb activity indicator.
//!
//! The crate turns a stream of agent log lines into per-frame animation
//! parameters for a deforming, colour-cycling orb. Events are classified,
//! folded into debounced activity channels, and smoothed into a snapshot that
//! a rendering backend consumes together with the pure displacement field.

pub mod aggregator;
pub mod classify;
pub mod color;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod field;
pub mod params;
pub mod render;
pub mod smoothing;
pub mod timeline;

pub use aggregator::{Channel, ChannelLevels, ChannelPhase, StateAggregator, StateSlot};
pub use classify::{classify, Bucket, Classification, StateClass};
pub use color::{Palette, Rgb};
pub use config::{
    AggregatorConfig, FieldConfig, ImpulseConfig, OrbConfig, PaletteConfig, SmoothingConfig,
};
pub use driver::{FrameDriver, OrbEngine};
pub use error::{OrbError, Result};
pub use event::{decode_line, Event, LogMessage};
pub use field::{displace, reconstruct_normal, FieldParams};
pub use params::{AnimationParams, AnimationSnapshot, ParameterEngine, Preset};
pub use render::{RenderBackend, RenderGraph, SurfaceMesh, SurfaceStats, SurfaceVertex};
pub use smoothing::{RatePolicy, Smoothed};
pub use timeline::{PlaybackClock, TimerHandle, TimerQueue};
