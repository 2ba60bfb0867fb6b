use glam::Vec3;
use rand::prelude::*;

use crate::config::VisualConfig;
use crate::constants::{VARIANCE_MAX, VARIANCE_MIN};

/// Quasi-uniform points on a sphere of `radius` using the golden-angle spiral.
pub fn fibonacci_sphere(count: usize, radius: f32) -> Vec<Vec3> {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let n = count.max(1) as f32;
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / n;
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden_angle * i as f32;
            Vec3::new(theta.cos() * r, y, theta.sin() * r) * radius
        })
        .collect()
}

/// Immutable per-slot drawing attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SlotVisual {
    pub color: [f32; 3],
    pub size: f32,
    /// Shimmer phase seed in [0, 1).
    pub seed: f32,
}

/// Home positions (xyz) with stiffness variance in `w`, plus static visuals.
#[derive(Clone, Debug)]
pub struct HomePositionField {
    pub width: u32,
    pub texels: Vec<[f32; 4]>,
    pub visuals: Vec<SlotVisual>,
}

impl HomePositionField {
    pub fn generate(config: &VisualConfig) -> Self {
        let capacity = config.capacity();
        let points = fibonacci_sphere(capacity, config.expanded_radius);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let texels = points
            .iter()
            .map(|p| {
                let variance = rng.gen_range(VARIANCE_MIN..=VARIANCE_MAX);
                [p.x, p.y, p.z, variance]
            })
            .collect::<Vec<_>>();
        let visuals = (0..capacity)
            .map(|_| {
                let warmth = rng.gen_range(-0.06..0.06);
                let [r, g, b] = config.particle_color;
                SlotVisual {
                    color: [
                        (r + warmth).clamp(0.0, 1.0),
                        g,
                        (b - warmth).clamp(0.0, 1.0),
                    ],
                    size: config.point_size * rng.gen_range(0.7..1.3),
                    seed: rng.gen::<f32>(),
                }
            })
            .collect::<Vec<_>>();
        log::debug!("[home] generated {} slots on r={:.2}", capacity, config.expanded_radius);
        Self {
            width: config.grid_width,
            texels,
            visuals,
        }
    }

    pub fn capacity(&self) -> usize {
        self.texels.len()
    }

    pub fn variance(&self, slot: usize) -> f32 {
        self.texels[slot][3]
    }

    /// Initial position texture: every slot parked at home with life 0.
    pub fn initial_positions(&self) -> Vec<[f32; 4]> {
        self.texels.iter().map(|t| [t[0], t[1], t[2], 0.0]).collect()
    }

    pub fn initial_velocities(&self) -> Vec<[f32; 4]> {
        vec![[0.0; 4]; self.capacity()]
    }
}
