use serde::{Deserialize, Serialize};

/// Linear RGB colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a colour from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: self.r * (1.0 - t) + other.r * t,
            g: self.g * (1.0 - t) + other.g * t,
            b: self.b * (1.0 - t) + other.b * t,
        }
    }

    pub fn clamped(self) -> Rgb {
        Rgb {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
        }
    }

    pub fn in_gamut(&self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Cyclic sequence of accent colours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Wraps an unbounded index into `[0, len)`.
    pub fn wrap(&self, index: f64) -> f64 {
        let len = self.colors.len() as f64;
        if len == 0.0 {
            return 0.0;
        }
        index.rem_euclid(len)
    }

    /// Interpolates the two entries adjacent to `index` by its fractional part.
    pub fn sample(&self, index: f64) -> Rgb {
        match self.colors.len() {
            0 => Rgb::WHITE,
            1 => self.colors[0],
            len => {
                let wrapped = self.wrap(index);
                let lower = (wrapped.floor() as usize) % len;
                let upper = (lower + 1) % len;
                let frac = (wrapped - wrapped.floor()) as f32;
                self.colors[lower].lerp(self.colors[upper], frac)
            }
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(vec![
            Rgb::from_hex(0x00e5ff),
            Rgb::from_hex(0x7c4dff),
            Rgb::from_hex(0xff4081),
            Rgb::from_hex(0xffab40),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_channels() {
        let color = Rgb::from_hex(0xff8000);
        assert_eq!(color.r, 1.0);
        assert!((color.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(color.b, 0.0);
    }

    #[test]
    fn samples_between_adjacent_entries() {
        let palette = Palette::new(vec![Rgb::new(0.0, 0.0, 0.0), Rgb::new(1.0, 1.0, 1.0)]);
        let mid = palette.sample(0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);

        // Index 1.5 sits between the last entry and the first one again.
        let wrapped = palette.sample(1.5);
        assert!((wrapped.g - 0.5).abs() < 1e-6);
    }

    #[test]
    fn lerp_lands_exactly_on_both_ends() {
        let from = Rgb::new(0.1, 0.7, 0.3);
        let to = Rgb::from_hex(0xff4081);
        assert_eq!(from.lerp(to, 0.0), from);
        assert_eq!(from.lerp(to, 1.0), to);
    }

    #[test]
    fn wraps_negative_indices() {
        let palette = Palette::default();
        let wrapped = palette.wrap(-0.25);
        assert!((wrapped - 3.75).abs() < 1e-9);
    }
}
