use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rayon::prelude::*;

use crate::{field, AnimationSnapshot, Result};

/// Consumer of per-frame snapshots, typically a GPU renderer that uploads
/// the values as uniforms and evaluates the field per vertex.
pub trait RenderBackend {
    fn submit(&mut self, snapshot: &AnimationSnapshot) -> Result<()>;
}

/// In-memory backend that keeps the most recent snapshot.
#[derive(Debug, Default)]
pub struct RenderGraph {
    last: Option<AnimationSnapshot>,
    submitted: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_snapshot(&self) -> Option<&AnimationSnapshot> {
        self.last.as_ref()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

impl RenderBackend for RenderGraph {
    fn submit(&mut self, snapshot: &AnimationSnapshot) -> Result<()> {
        self.last = Some(*snapshot);
        self.submitted += 1;
        Ok(())
    }
}

/// Vertex of a displaced surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Summary of one evaluated frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceStats {
    pub min_displacement: f32,
    pub max_displacement: f32,
    pub mean_displacement: f32,
}

/// Unit UV sphere evaluated on the CPU. Serves as the reference for what a
/// GPU backend computes per vertex.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    base: Vec<Vec3>,
    normal_epsilon: f32,
}

impl SurfaceMesh {
    pub fn uv_sphere(rings: usize, segments: usize, normal_epsilon: f32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);
        let mut base = Vec::with_capacity((rings - 1) * segments + 2);

        base.push(Vec3::Y);
        for ring in 1..rings {
            let polar = PI * ring as f32 / rings as f32;
            for segment in 0..segments {
                let azimuth = TAU * segment as f32 / segments as f32;
                base.push(Vec3::new(
                    polar.sin() * azimuth.cos(),
                    polar.cos(),
                    polar.sin() * azimuth.sin(),
                ));
            }
        }
        base.push(Vec3::NEG_Y);

        Self {
            base,
            normal_epsilon,
        }
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn base_positions(&self) -> &[Vec3] {
        &self.base
    }

    /// Displaces every vertex for `snapshot` and reconstructs its normal.
    pub fn evaluate(&self, snapshot: &AnimationSnapshot) -> Vec<SurfaceVertex> {
        let time = snapshot.field_time();
        let params = snapshot.field;
        let epsilon = self.normal_epsilon;

        self.base
            .par_iter()
            .map(|&point| {
                let offset = field::displace(point, time, &params);
                SurfaceVertex {
                    position: point + point * offset,
                    normal: field::reconstruct_normal_with(
                        point,
                        point,
                        |p| p,
                        time,
                        &params,
                        epsilon,
                    ),
                }
            })
            .collect()
    }

    pub fn stats(&self, snapshot: &AnimationSnapshot) -> SurfaceStats {
        let offsets = field::displace_batch(&self.base, snapshot.field_time(), &snapshot.field);
        if offsets.is_empty() {
            return SurfaceStats::default();
        }

        let (min, max, sum) = offsets.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f32),
            |(min, max, sum), value| (min.min(*value), max.max(*value), sum + value),
        );

        SurfaceStats {
            min_displacement: min,
            max_displacement: max,
            mean_displacement: sum / offsets.len() as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{ChannelLevels, OrbConfig, ParameterEngine, PlaybackClock};

    fn snapshot(working: f32) -> AnimationSnapshot {
        let mut engine = ParameterEngine::new(&OrbConfig::default());
        let mut clock = PlaybackClock::new();
        let levels = ChannelLevels {
            working,
            ..Default::default()
        };
        let mut last = None;
        for _ in 0..600 {
            clock.advance(Duration::from_millis(16));
            last = Some(engine.update(levels, &clock, Duration::from_millis(16)));
        }
        last.unwrap()
    }

    #[test]
    fn records_submitted_snapshots() {
        let mut graph = RenderGraph::new();
        let frame = snapshot(0.0);
        graph.submit(&frame).unwrap();
        graph.submit(&frame).unwrap();
        assert_eq!(graph.submitted(), 2);
        assert_eq!(graph.last_snapshot(), Some(&frame));
    }

    #[test]
    fn sphere_vertices_lie_on_unit_sphere() {
        let mesh = SurfaceMesh::uv_sphere(8, 12, 0.01);
        assert_eq!(mesh.len(), 7 * 12 + 2);
        assert!(mesh
            .base_positions()
            .iter()
            .all(|p| (p.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn evaluated_normals_are_unit_and_outward() {
        let mesh = SurfaceMesh::uv_sphere(12, 16, 0.01);
        let frame = snapshot(1.0);
        let vertices = mesh.evaluate(&frame);
        assert_eq!(vertices.len(), mesh.len());
        for (vertex, base) in vertices.iter().zip(mesh.base_positions()) {
            assert!((vertex.normal.length() - 1.0).abs() < 1e-3);
            assert!(vertex.normal.dot(*base) > 0.0);
        }
    }

    #[test]
    fn activity_widens_displacement() {
        let mesh = SurfaceMesh::uv_sphere(16, 24, 0.01);
        let calm = mesh.stats(&snapshot(0.0));
        let busy = mesh.stats(&snapshot(1.0));
        let calm_span = calm.max_displacement - calm.min_displacement;
        let busy_span = busy.max_displacement - busy.min_displacement;
        assert!(busy_span > calm_span);
    }
}
