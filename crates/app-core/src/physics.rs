use glam::Vec3;

use crate::breath::BreathSample;
use crate::config::VisualConfig;
use crate::constants::{MAX_DELTA_TIME, VARIANCE_RADIUS_WEIGHT};

/// Per-tick uniform block shared by the velocity and position passes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PhysicsUniforms {
    pub time: f32,
    pub delta_time: f32,
    pub breath_value: f32,
    pub phase_type: u32,
    pub target_radius: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub noise_strength: f32,
    pub life_step: f32,
    pub variance_weight: f32,
    pub grid_width: u32,
    pub _pad0: u32,
}

impl PhysicsUniforms {
    pub fn new(config: &VisualConfig, time: f32, raw_dt: f32, breath: BreathSample) -> Self {
        let breath_value = breath.breath_value();
        Self {
            time,
            delta_time: clamp_delta_time(raw_dt),
            breath_value,
            phase_type: breath.phase.code(),
            target_radius: target_radius(
                config.contracted_radius,
                config.expanded_radius,
                breath_value,
            ),
            stiffness: config.spring_stiffness,
            damping: config.damping,
            noise_strength: config.noise_strength,
            life_step: config.life_step,
            variance_weight: VARIANCE_RADIUS_WEIGHT,
            grid_width: config.grid_width,
            _pad0: 0,
        }
    }
}

#[inline]
pub fn clamp_delta_time(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, MAX_DELTA_TIME)
    } else {
        0.0
    }
}

/// Sphere radius for the current breath; contracted at 1, expanded at 0.
#[inline]
pub fn target_radius(contracted: f32, expanded: f32, breath_value: f32) -> f32 {
    let b = breath_value.clamp(0.0, 1.0);
    contracted + (expanded - contracted) * (1.0 - b)
}

/// Move `life` toward `target` by at most `step`, staying in [0, 1].
#[inline]
pub fn ease_life(life: f32, target: f32, step: f32) -> f32 {
    let life = if life.is_finite() { life } else { 0.0 };
    (life + (target - life).clamp(-step, step)).clamp(0.0, 1.0)
}

/// Deterministic trig-sum turbulence, roughly in [-1, 1] per axis.
pub fn noise(p: Vec3, t: f32) -> Vec3 {
    let x = (p.y * 1.7 + t * 0.9).sin() + 0.5 * (p.z * 2.3 + t * 1.3).sin();
    let y = (p.z * 1.9 + t * 1.1).sin() + 0.5 * (p.x * 2.1 + t * 0.7).sin();
    let z = (p.x * 1.5 + t * 1.2).sin() + 0.5 * (p.y * 2.7 + t * 0.8).sin();
    Vec3::new(x, y, z) / 1.5
}

pub fn velocity_step(
    position: Vec3,
    velocity: Vec3,
    home: Vec3,
    variance: f32,
    u: &PhysicsUniforms,
) -> Vec3 {
    let dir = home.normalize_or_zero();
    let radius_mul = 1.0 + (variance - 1.0) * u.variance_weight;
    let target = dir * u.target_radius * radius_mul;
    let spring = (target - position) * u.stiffness * variance;
    let turbulence = noise(home + position * 0.3, u.time)
        * u.noise_strength
        * (1.0 - u.breath_value);
    velocity * u.damping + (spring + turbulence) * u.delta_time
}

pub fn position_step(position: [f32; 4], velocity: Vec3, target_life: f32, u: &PhysicsUniforms) -> [f32; 4] {
    let p = Vec3::new(position[0], position[1], position[2]) + velocity * u.delta_time;
    let life = ease_life(position[3], target_life, u.life_step);
    [p.x, p.y, p.z, life]
}

/// Host-side data the CPU kernels read besides their graph inputs.
#[derive(Clone, Debug, Default)]
pub struct PhysicsParams {
    pub uniforms: PhysicsUniforms,
    pub home: Vec<[f32; 4]>,
    pub target_life: Vec<f32>,
}

/// Velocity kernel; inputs are `[position, velocity]`.
pub fn velocity_kernel(params: &PhysicsParams, texel: usize, inputs: &[&[[f32; 4]]]) -> [f32; 4] {
    let pos = inputs[0][texel];
    let vel = inputs[1][texel];
    let home = params.home.get(texel).copied().unwrap_or([0.0, 1.0, 0.0, 1.0]);
    let v = velocity_step(
        Vec3::new(pos[0], pos[1], pos[2]),
        Vec3::new(vel[0], vel[1], vel[2]),
        Vec3::new(home[0], home[1], home[2]),
        home[3],
        &params.uniforms,
    );
    [v.x, v.y, v.z, 0.0]
}

/// Position kernel; inputs are `[position, velocity]`.
pub fn position_kernel(params: &PhysicsParams, texel: usize, inputs: &[&[[f32; 4]]]) -> [f32; 4] {
    let pos = inputs[0][texel];
    let vel = inputs[1][texel];
    let target = params.target_life.get(texel).copied().unwrap_or(0.0);
    position_step(pos, Vec3::new(vel[0], vel[1], vel[2]), target, &params.uniforms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breath::BreathPhase;

    fn uniforms_at(phase: BreathPhase, progress: f32) -> PhysicsUniforms {
        let cfg = VisualConfig {
            spring_stiffness: 0.0,
            ..Default::default()
        };
        PhysicsUniforms::new(&cfg, 3.7, 0.016, BreathSample { phase, progress })
    }

    #[test]
    fn delta_time_is_clamped() {
        assert_eq!(clamp_delta_time(5.0), MAX_DELTA_TIME);
        assert_eq!(clamp_delta_time(-1.0), 0.0);
        assert_eq!(clamp_delta_time(f32::NAN), 0.0);
        assert_eq!(clamp_delta_time(0.016), 0.016);
    }

    #[test]
    fn target_radius_spans_contracted_to_expanded() {
        assert_eq!(target_radius(1.0, 3.0, 1.0), 1.0);
        assert_eq!(target_radius(1.0, 3.0, 0.0), 3.0);
        assert_eq!(target_radius(1.0, 3.0, 0.5), 2.0);
        assert_eq!(target_radius(1.0, 3.0, 7.0), 1.0);
    }

    #[test]
    fn ease_life_never_overshoots() {
        assert_eq!(ease_life(0.0, 1.0, 0.015), 0.015);
        assert_eq!(ease_life(0.995, 1.0, 0.015), 1.0);
        assert_eq!(ease_life(0.01, 0.0, 0.015), 0.0);
        assert_eq!(ease_life(f32::NAN, 1.0, 0.015), 0.015);
    }

    #[test]
    fn spring_pulls_toward_target_radius() {
        let cfg = VisualConfig::default();
        let breath = BreathSample {
            phase: BreathPhase::HoldIn,
            progress: 0.5,
        };
        let u = PhysicsUniforms::new(&cfg, 0.0, 0.016, breath);
        let home = Vec3::new(0.0, cfg.expanded_radius, 0.0);
        // Far outside the contracted radius: velocity must point inward.
        let v = velocity_step(home * 2.0, Vec3::ZERO, home, 1.0, &u);
        assert!(v.y < 0.0);
        assert_eq!(u.breath_value, 1.0);
        assert_eq!(u.target_radius, cfg.contracted_radius);
    }

    #[test]
    fn contracted_breath_has_no_turbulence() {
        let u = uniforms_at(BreathPhase::HoldIn, 0.3);
        assert_eq!(u.breath_value, 1.0);
        let vel = Vec3::new(0.3, -0.2, 0.1);
        let home = Vec3::new(0.4, 1.1, -0.7);
        let v = velocity_step(home * 1.3, vel, home, 1.1, &u);
        assert_eq!(v, vel * u.damping);
    }

    #[test]
    fn turbulence_depends_only_on_breath_value() {
        let home = Vec3::new(0.4, 1.1, -0.7);
        let pos = home * 0.9;
        // Both sides of the exhale -> hold-out edge sit at breath value 0.
        let hold = uniforms_at(BreathPhase::HoldOut, 0.5);
        let exhale = uniforms_at(BreathPhase::Exhale, 1.0);
        assert_eq!(hold.breath_value, exhale.breath_value);
        assert_eq!(
            velocity_step(pos, Vec3::ZERO, home, 1.0, &hold),
            velocity_step(pos, Vec3::ZERO, home, 1.0, &exhale)
        );

        let mut u = uniforms_at(BreathPhase::Inhale, 0.5);
        let reference = velocity_step(pos, Vec3::ZERO, home, 1.0, &u);
        assert_ne!(reference, Vec3::ZERO);
        for phase in BreathPhase::ALL {
            u.phase_type = phase.code();
            assert_eq!(velocity_step(pos, Vec3::ZERO, home, 1.0, &u), reference);
        }
    }

    #[test]
    fn velocity_is_damped_then_integrated() {
        let u = PhysicsUniforms {
            delta_time: 0.1,
            stiffness: 2.0,
            damping: 0.5,
            target_radius: 1.0,
            ..Default::default()
        };
        // target (0,1,0), spring (0,-4,0): 0.5 * (1,0,0) + 0.1 * (0,-4,0)
        let v = velocity_step(
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::X,
            Vec3::new(0.0, 2.0, 0.0),
            1.0,
            &u,
        );
        assert!((v - Vec3::new(0.5, -0.4, 0.0)).length() < 1e-6, "{v:?}");
    }
}
