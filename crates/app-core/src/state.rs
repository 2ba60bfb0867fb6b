use glam::{Mat4, Vec3};

use crate::constants::{
    SHIMMER_DEPTH, SHIMMER_RATE, SPARK_BOOST, VISIBILITY_THRESHOLD,
};
use crate::home::SlotVisual;

/// Simple right-handed camera description with perspective projection.
#[derive(Clone, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn looking_at_origin(distance: f32, aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, distance),
            target: Vec3::ZERO,
            up: Vec3::Y,
            aspect,
            fovy_radians: std::f32::consts::FRAC_PI_4,
            znear: 0.1,
            zfar: 100.0,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect, self.znear, self.zfar)
    }
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

/// Life-driven slot state. Continuous underneath; this is only a label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Inactive,
    Spawning,
    Active,
    Despawning,
}

impl SlotState {
    pub fn classify(life: f32, target: f32) -> Self {
        const EPS: f32 = 1e-3;
        if target >= 0.5 {
            if life >= 1.0 - EPS {
                SlotState::Active
            } else {
                SlotState::Spawning
            }
        } else if life <= EPS {
            SlotState::Inactive
        } else {
            SlotState::Despawning
        }
    }
}

#[inline]
pub fn is_visible(life: f32) -> bool {
    life >= VISIBILITY_THRESHOLD
}

#[inline]
pub fn point_size(base: f32, life: f32) -> f32 {
    if is_visible(life) {
        base * life.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
pub fn shimmer(time: f32, seed: f32) -> f32 {
    1.0 - SHIMMER_DEPTH + SHIMMER_DEPTH * (time * SHIMMER_RATE + seed * std::f32::consts::TAU).sin()
}

/// Warmer and brighter while contracted.
pub fn breath_tint(color: [f32; 3], breath_value: f32) -> [f32; 3] {
    let b = breath_value.clamp(0.0, 1.0);
    let brightness = 0.75 + 0.35 * b;
    [
        (color[0] * brightness + 0.08 * b).min(1.0),
        (color[1] * brightness + 0.03 * b).min(1.0),
        (color[2] * brightness - 0.04 * b).clamp(0.0, 1.0),
    ]
}

/// Build a drawable instance for one grid slot (CPU fallback path).
pub fn slot_instance(
    texel: [f32; 4],
    visual: &SlotVisual,
    breath_value: f32,
    time: f32,
    spark: f32,
) -> Option<PointInstance> {
    let life = texel[3];
    if !is_visible(life) {
        return None;
    }
    let tint = breath_tint(visual.color, breath_value);
    let glow = shimmer(time, visual.seed) * (1.0 + SPARK_BOOST * spark.clamp(0.0, 1.0));
    Some(PointInstance {
        position: [texel[0], texel[1], texel[2]],
        size: point_size(visual.size, life),
        color: [tint[0] * glow, tint[1] * glow, tint[2] * glow, life],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invisible_slots_have_no_size() {
        assert_eq!(point_size(1.0, 0.0), 0.0);
        assert_eq!(point_size(1.0, VISIBILITY_THRESHOLD * 0.5), 0.0);
        assert_eq!(point_size(2.0, 0.5), 1.0);
    }

    #[test]
    fn slot_states_follow_life_and_target() {
        assert_eq!(SlotState::classify(0.0, 0.0), SlotState::Inactive);
        assert_eq!(SlotState::classify(0.3, 1.0), SlotState::Spawning);
        assert_eq!(SlotState::classify(1.0, 1.0), SlotState::Active);
        assert_eq!(SlotState::classify(0.3, 0.0), SlotState::Despawning);
    }

    #[test]
    fn shimmer_stays_in_band() {
        for i in 0..200 {
            let s = shimmer(i as f32 * 0.1, 0.37);
            assert!((1.0 - 2.0 * SHIMMER_DEPTH - 1e-5..=1.0 + 1e-5).contains(&s));
        }
    }
}
