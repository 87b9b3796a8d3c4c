use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{OrbError, Palette, Result};

/// Top-level configuration structure for an orb engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    pub aggregator: AggregatorConfig,
    pub smoothing: SmoothingConfig,
    pub palette: PaletteConfig,
    pub field: FieldConfig,
    pub impulse: ImpulseConfig,
}

impl OrbConfig {
    /// Parses a JSON preset. Missing sections fall back to their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: OrbConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks every construction parameter, naming the first one that is out
    /// of range.
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.palette.validate()?;
        self.field.validate()?;

        if !self.impulse.ingest_magnitude.is_finite() || self.impulse.ingest_magnitude < 0.0 {
            return Err(OrbError::invalid(
                "impulse.ingest_magnitude",
                "must be a non-negative number",
            ));
        }

        Ok(())
    }
}

/// Timing of the debounced channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Delay before a requested activation becomes visible.
    pub activation_delay_ms: u64,
    /// Auto-reset duration used for error events.
    pub error_pulse_ms: u64,
}

impl AggregatorConfig {
    pub fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }

    pub fn error_pulse(&self) -> Duration {
        Duration::from_millis(self.error_pulse_ms)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            activation_delay_ms: 2_000,
            error_pulse_ms: 1_500,
        }
    }
}

/// Per-tick exponential smoothing rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Rate used while a value climbs toward higher activity.
    pub escalate_rate: f32,
    /// Rate used while a value settles back down.
    pub deescalate_rate: f32,
    /// Rate of the error channel, in both directions.
    pub error_rate: f32,
    /// Rate of the displayed colour and the colour offset.
    pub color_rate: f32,
}

impl SmoothingConfig {
    fn validate(&self) -> Result<()> {
        let rates = [
            ("smoothing.escalate_rate", self.escalate_rate),
            ("smoothing.deescalate_rate", self.deescalate_rate),
            ("smoothing.error_rate", self.error_rate),
            ("smoothing.color_rate", self.color_rate),
        ];

        for (field, rate) in rates {
            if !(rate > 0.0 && rate < 1.0) {
                return Err(OrbError::invalid(
                    field,
                    format!("rate {rate} must lie strictly between 0 and 1"),
                ));
            }
        }

        Ok(())
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            escalate_rate: 0.004,
            deescalate_rate: 0.04,
            error_rate: 0.15,
            color_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub colors: Palette,
    /// Palette entries traversed per second.
    pub cycle_speed: f32,
    /// Offset added to the colour index by each explicit advance.
    pub advance_step: f32,
    /// How strongly the most recent event accent tints the palette colour.
    pub accent_weight: f32,
}

impl PaletteConfig {
    fn validate(&self) -> Result<()> {
        if self.colors.len() < 2 {
            return Err(OrbError::invalid(
                "palette.colors",
                "palette needs at least two colours",
            ));
        }
        if let Some(color) = self.colors.colors().iter().find(|c| !c.in_gamut()) {
            return Err(OrbError::invalid(
                "palette.colors",
                format!("colour {color:?} has channels outside [0, 1]"),
            ));
        }
        if !(self.cycle_speed.is_finite() && self.cycle_speed > 0.0) {
            return Err(OrbError::invalid("palette.cycle_speed", "must be positive"));
        }
        if !(self.advance_step.is_finite() && self.advance_step > 0.0) {
            return Err(OrbError::invalid("palette.advance_step", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.accent_weight) {
            return Err(OrbError::invalid(
                "palette.accent_weight",
                "must lie within [0, 1]",
            ));
        }
        Ok(())
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            colors: Palette::default(),
            cycle_speed: 0.05,
            advance_step: 1.0,
            accent_weight: 0.35,
        }
    }
}

/// Shape of the fractal displacement field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub octaves: u32,
    pub base_frequency: f32,
    pub lacunarity: f32,
    pub gain: f32,
    pub normal_epsilon: f32,
}

impl FieldConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.octaves) {
            return Err(OrbError::invalid("field.octaves", "must be between 1 and 8"));
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            return Err(OrbError::invalid("field.base_frequency", "must be positive"));
        }
        if !(self.lacunarity.is_finite() && self.lacunarity > 1.0) {
            return Err(OrbError::invalid("field.lacunarity", "must exceed 1"));
        }
        if !(self.gain > 0.0 && self.gain < 1.0) {
            return Err(OrbError::invalid(
                "field.gain",
                "must lie strictly between 0 and 1",
            ));
        }
        if !(self.normal_epsilon.is_finite() && self.normal_epsilon > 0.0) {
            return Err(OrbError::invalid("field.normal_epsilon", "must be positive"));
        }
        Ok(())
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            base_frequency: 1.5,
            lacunarity: 2.0,
            gain: 0.5,
            normal_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Energy bump applied whenever an event carries a known token.
    pub ingest_magnitude: f32,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            ingest_magnitude: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        OrbConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_rates_outside_open_interval() {
        for rate in [0.0, 1.0, -0.2, f32::NAN] {
            let mut config = OrbConfig::default();
            config.smoothing.deescalate_rate = rate;
            let err = config.validate().unwrap_err();
            assert!(format!("{err}").contains("smoothing.deescalate_rate"));
        }
    }

    #[test]
    fn rejects_single_colour_palette() {
        let mut config = OrbConfig::default();
        config.palette.colors = Palette::new(vec![crate::Rgb::WHITE]);
        assert!(matches!(
            config.validate(),
            Err(OrbError::InvalidConfig {
                field: "palette.colors",
                ..
            })
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            OrbConfig::from_json_str(r#"{ "aggregator": { "activation_delay_ms": 750 } }"#)
                .unwrap();
        assert_eq!(config.aggregator.activation_delay(), Duration::from_millis(750));
        assert_eq!(config.aggregator.error_pulse_ms, 1_500);
        assert_eq!(config.field.octaves, 4);
    }

    #[test]
    fn json_with_invalid_values_fails_fast() {
        let err = OrbConfig::from_json_str(r#"{ "field": { "octaves": 0 } }"#).unwrap_err();
        assert!(format!("{err}").contains("field.octaves"));
    }
}
