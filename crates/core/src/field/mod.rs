//! Procedural displacement field.
//!
//! Everything here is a pure function of `(position, time, params)`: there is
//! no shared state, so vertices can be evaluated from any number of threads and
//! repeated evaluation is bit-identical.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::FieldConfig;

/// Seed used to build the gradient permutation table.
const PERMUTATION_SEED: u64 = 0x5eed_0f0b_1a2c_3d4e;

const PERM: [u8; 512] = build_permutation(PERMUTATION_SEED);

/// Shuffles `0..=255` with a xorshift generator and duplicates the result so
/// lookups never need to wrap.
const fn build_permutation(seed: u64) -> [u8; 512] {
    let mut base = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        base[i] = i as u8;
        i += 1;
    }

    let mut state = seed;
    let mut i = 255;
    while i > 0 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state % (i as u64 + 1)) as usize;
        let tmp = base[i];
        base[i] = base[j];
        base[j] = tmp;
        i -= 1;
    }

    let mut table = [0u8; 512];
    let mut i = 0;
    while i < 512 {
        table[i] = base[i & 255];
        i += 1;
    }
    table
}

/// Parameters consumed by [`displace`]. Produced every frame by the parameter
/// engine and handed to the rendering backend alongside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldParams {
    /// Peak displacement along the normal.
    pub amplitude: f32,
    /// Spatial frequency of the first octave.
    pub frequency: f32,
    /// Exponent of the ridge transform.
    pub sharpness: f32,
    /// Blend between smooth (0) and ridged (1) noise.
    pub ridge_mix: f32,
    /// Amplitude of the fast high-frequency jitter layer.
    pub tremor: f32,
    /// Speed at which the field drifts through noise space.
    pub flow: f32,
    pub octaves: u32,
    pub lacunarity: f32,
    pub gain: f32,
}

impl FieldParams {
    /// Calm field shaped by `config`.
    pub fn from_config(config: &FieldConfig) -> Self {
        Self {
            amplitude: 0.0,
            frequency: config.base_frequency,
            sharpness: 1.0,
            ridge_mix: 0.0,
            tremor: 0.0,
            flow: 0.2,
            octaves: config.octaves,
            lacunarity: config.lacunarity,
            gain: config.gain,
        }
    }
}

impl Default for FieldParams {
    fn default() -> Self {
        Self::from_config(&FieldConfig::default())
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn grad(hash: u8, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

/// Coherent gradient noise in roughly `[-1, 1]`.
pub fn gradient_noise(p: Vec3) -> f32 {
    let floor = p.floor();
    let xi = (floor.x as i32 & 255) as usize;
    let yi = (floor.y as i32 & 255) as usize;
    let zi = (floor.z as i32 & 255) as usize;
    let x = p.x - floor.x;
    let y = p.y - floor.y;
    let z = p.z - floor.z;

    let u = fade(x);
    let v = fade(y);
    let w = fade(z);

    let a = PERM[xi] as usize + yi;
    let aa = PERM[a] as usize + zi;
    let ab = PERM[a + 1] as usize + zi;
    let b = PERM[xi + 1] as usize + yi;
    let ba = PERM[b] as usize + zi;
    let bb = PERM[b + 1] as usize + zi;

    lerp(
        lerp(
            lerp(grad(PERM[aa], x, y, z), grad(PERM[ba], x - 1.0, y, z), u),
            lerp(
                grad(PERM[ab], x, y - 1.0, z),
                grad(PERM[bb], x - 1.0, y - 1.0, z),
                u,
            ),
            v,
        ),
        lerp(
            lerp(
                grad(PERM[aa + 1], x, y, z - 1.0),
                grad(PERM[ba + 1], x - 1.0, y, z - 1.0),
                u,
            ),
            lerp(
                grad(PERM[ab + 1], x, y - 1.0, z - 1.0),
                grad(PERM[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                u,
            ),
            v,
        ),
        w,
    )
}

/// Sum of `octaves` noise layers, each at `gain` times the amplitude and
/// `lacunarity` times the frequency of the previous one. Normalised back to
/// roughly `[-1, 1]`.
pub fn fbm(p: Vec3, octaves: u32, lacunarity: f32, gain: f32) -> f32 {
    let mut sum = 0.0;
    let mut norm = 0.0;
    let mut amplitude = 1.0;
    let mut point = p;
    for _ in 0..octaves.max(1) {
        sum += gradient_noise(point) * amplitude;
        norm += amplitude;
        amplitude *= gain;
        point *= lacunarity;
    }
    sum / norm
}

/// Ridge transform `(1 - |n|) ^ sharpness`, in `[0, 1]`.
pub fn ridge(noise: f32, sharpness: f32) -> f32 {
    (1.0 - noise.abs()).clamp(0.0, 1.0).powf(sharpness.max(f32::EPSILON))
}

/// Fractal sum of ridged octaves, in `[0, 1]`.
pub fn ridged_fbm(p: Vec3, octaves: u32, lacunarity: f32, gain: f32, sharpness: f32) -> f32 {
    let mut sum = 0.0;
    let mut norm = 0.0;
    let mut amplitude = 1.0;
    let mut point = p;
    for _ in 0..octaves.max(1) {
        sum += ridge(gradient_noise(point), sharpness) * amplitude;
        norm += amplitude;
        amplitude *= gain;
        point *= lacunarity;
    }
    sum / norm
}

fn drift(time: f32, flow: f32) -> Vec3 {
    let t = time * flow;
    Vec3::new(t, t * 0.73, t * -0.41)
}

/// Scalar displacement along the surface normal at `position`.
pub fn displace(position: Vec3, time: f32, params: &FieldParams) -> f32 {
    let p = position * params.frequency + drift(time, params.flow);

    let mix = params.ridge_mix.clamp(0.0, 1.0);
    let smooth = if mix < 1.0 {
        fbm(p, params.octaves, params.lacunarity, params.gain)
    } else {
        0.0
    };
    let ridged = if mix > 0.0 {
        // Re-centre so both families share the [-1, 1] range.
        ridged_fbm(
            p,
            params.octaves,
            params.lacunarity,
            params.gain,
            params.sharpness,
        ) * 2.0
            - 1.0
    } else {
        0.0
    };

    let mut value = params.amplitude * lerp(smooth, ridged, mix);
    if params.tremor > 0.0 {
        let jitter = gradient_noise(position * 9.0 + Vec3::splat(time * 4.0));
        value += params.tremor * jitter;
    }
    value
}

/// Evaluates [`displace`] for many positions in parallel.
pub fn displace_batch(positions: &[Vec3], time: f32, params: &FieldParams) -> Vec<f32> {
    positions
        .par_iter()
        .map(|position| displace(*position, time, params))
        .collect()
}

/// Orthonormal tangent and bitangent with `tangent x bitangent = normal`.
pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    let helper = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let tangent = normal.cross(helper).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

/// Reconstructs the normal of the displaced surface from three samples of the
/// field. Offset points are displaced along the base normal of the vertex.
pub fn reconstruct_normal(
    position: Vec3,
    normal: Vec3,
    time: f32,
    params: &FieldParams,
    epsilon: f32,
) -> Vec3 {
    reconstruct_normal_with(position, normal, |_| normal, time, params, epsilon)
}

/// Like [`reconstruct_normal`], but each offset point is displaced along the
/// base-surface normal returned by `normal_at`.
pub fn reconstruct_normal_with(
    position: Vec3,
    normal: Vec3,
    normal_at: impl Fn(Vec3) -> Vec3,
    time: f32,
    params: &FieldParams,
    epsilon: f32,
) -> Vec3 {
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return Vec3::ZERO;
    }

    let (tangent, bitangent) = tangent_basis(normal);
    let neighbour_t = position + tangent * epsilon;
    let neighbour_b = position + bitangent * epsilon;

    let displaced = position + normal * displace(position, time, params);
    let displaced_t = neighbour_t
        + normal_at(neighbour_t).normalize_or_zero() * displace(neighbour_t, time, params);
    let displaced_b = neighbour_b
        + normal_at(neighbour_b).normalize_or_zero() * displace(neighbour_b, time, params);

    let reconstructed = (displaced_t - displaced).cross(displaced_b - displaced);
    let reconstructed = reconstructed.normalize_or_zero();
    if reconstructed == Vec3::ZERO {
        normal
    } else {
        reconstructed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn active_params() -> FieldParams {
        FieldParams {
            amplitude: 0.3,
            frequency: 1.5,
            sharpness: 3.0,
            ridge_mix: 0.6,
            tremor: 0.02,
            flow: 0.4,
            octaves: 4,
            lacunarity: 2.0,
            gain: 0.5,
        }
    }

    #[test]
    fn permutation_is_a_permutation() {
        let mut seen = [false; 256];
        for value in &PERM[..256] {
            seen[*value as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(PERM[..256], PERM[256..]);
    }

    #[test]
    fn noise_vanishes_on_lattice_points() {
        for point in [Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 7.0, -1.0)] {
            assert_eq!(gradient_noise(point), 0.0);
        }
    }

    #[test]
    fn noise_stays_bounded() {
        let mut point = Vec3::new(0.13, 0.71, 0.37);
        for _ in 0..2_000 {
            let value = gradient_noise(point);
            assert!(value.abs() <= 1.1, "noise {value} out of range at {point}");
            point += Vec3::new(0.173, 0.291, 0.117);
        }
    }

    #[test]
    fn ridge_peaks_at_zero_crossings() {
        assert_eq!(ridge(0.0, 4.0), 1.0);
        assert_eq!(ridge(1.0, 4.0), 0.0);
        assert!(ridge(0.5, 4.0) < ridge(0.5, 1.0));
    }

    #[test]
    fn zero_amplitude_is_flat() {
        let params = FieldParams::default();
        assert_eq!(displace(Vec3::new(0.3, -0.2, 0.9), 12.5, &params), 0.0);
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let params = active_params();
        let positions: Vec<Vec3> = (0..64)
            .map(|i| Vec3::new(i as f32 * 0.1, (i as f32 * 0.37).sin(), 0.5))
            .collect();
        let batch = displace_batch(&positions, 3.0, &params);
        for (position, value) in positions.iter().zip(batch) {
            assert_eq!(displace(*position, 3.0, &params).to_bits(), value.to_bits());
        }
    }

    #[test]
    fn flat_field_keeps_base_normal() {
        let params = FieldParams::default();
        let normal = Vec3::new(0.0, 0.6, 0.8);
        let reconstructed =
            reconstruct_normal(Vec3::new(1.0, 2.0, 3.0), normal, 1.0, &params, 0.01);
        assert!((reconstructed - normal).length() < 1e-4);
    }

    #[test]
    fn sphere_normals_follow_radial_direction_when_flat() {
        let params = FieldParams::default();
        let position = Vec3::new(0.3, 0.4, 0.5).normalize();
        let reconstructed =
            reconstruct_normal_with(position, position, |p| p, 0.0, &params, 0.001);
        assert!(reconstructed.dot(position) > 0.999);
    }

    #[test]
    fn displaced_normals_stay_outward() {
        let params = active_params();
        for i in 0..50 {
            let angle = i as f32 * 0.37;
            let position = Vec3::new(angle.cos(), angle.sin() * 0.5, 0.4).normalize();
            let normal = reconstruct_normal_with(position, position, |p| p, 2.0, &params, 0.01);
            assert!((normal.length() - 1.0).abs() < 1e-4);
            assert!(normal.dot(position) > 0.0);
        }
    }

    proptest! {
        #[test]
        fn displacement_is_deterministic(
            x in -10.0f32..10.0,
            y in -10.0f32..10.0,
            z in -10.0f32..10.0,
            time in 0.0f32..1000.0,
            mix in 0.0f32..=1.0,
        ) {
            let params = FieldParams { ridge_mix: mix, ..active_params() };
            let position = Vec3::new(x, y, z);
            let first = displace(position, time, &params);
            let second = displace(position, time, &params);
            prop_assert_eq!(first.to_bits(), second.to_bits());
            prop_assert!(first.is_finite());
        }
    }
}
