use crate::constants::*;
use crate::error::{EngineError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct VisualConfig {
    /// Grid side length; fixed for the lifetime of an engine instance.
    pub grid_width: u32,
    pub contracted_radius: f32,
    pub expanded_radius: f32,
    pub spring_stiffness: f32,
    pub damping: f32,
    pub noise_strength: f32,
    /// Maximum life change per tick, applied in both directions.
    pub life_step: f32,
    pub point_size: f32,
    pub particle_color: [f32; 3],
    pub mood_colors: Vec<[f32; 3]>,
    pub spark_duration: f32,
    pub firefly_cap: usize,
    pub firefly_fade_in: f32,
    pub firefly_fade_out: f32,
    pub seed: u64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            grid_width: DEFAULT_GRID_WIDTH,
            contracted_radius: CONTRACTED_RADIUS,
            expanded_radius: EXPANDED_RADIUS,
            spring_stiffness: SPRING_STIFFNESS,
            damping: VELOCITY_DAMPING,
            noise_strength: NOISE_STRENGTH,
            life_step: LIFE_STEP,
            point_size: BASE_POINT_SIZE,
            particle_color: PARTICLE_BASE_COLOR,
            mood_colors: DEFAULT_MOOD_COLORS.to_vec(),
            spark_duration: SPARK_DURATION_SEC,
            firefly_cap: FIREFLY_CAP,
            firefly_fade_in: FIREFLY_FADE_IN_SEC,
            firefly_fade_out: FIREFLY_FADE_OUT_SEC,
            seed: 42,
        }
    }
}

impl VisualConfig {
    pub fn capacity(&self) -> usize {
        (self.grid_width as usize) * (self.grid_width as usize)
    }

    pub fn mood_color(&self, mood: u8) -> [f32; 3] {
        if self.mood_colors.is_empty() {
            return self.particle_color;
        }
        self.mood_colors[mood as usize % self.mood_colors.len()]
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_width == 0 || self.grid_width > MAX_GRID_WIDTH {
            return Err(EngineError::InvalidConfig(format!(
                "grid_width must be in 1..={MAX_GRID_WIDTH}, got {}",
                self.grid_width
            )));
        }
        if !(self.contracted_radius > 0.0 && self.expanded_radius >= self.contracted_radius) {
            return Err(EngineError::InvalidConfig(format!(
                "radii must satisfy 0 < contracted <= expanded, got {} / {}",
                self.contracted_radius, self.expanded_radius
            )));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(EngineError::InvalidConfig(format!(
                "damping must be in [0, 1), got {}",
                self.damping
            )));
        }
        if !(self.life_step > 0.0 && self.life_step <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "life_step must be in (0, 1], got {}",
                self.life_step
            )));
        }
        if self.spring_stiffness < 0.0 || self.noise_strength < 0.0 {
            return Err(EngineError::InvalidConfig(
                "stiffness and noise strength must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
