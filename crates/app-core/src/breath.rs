use crate::error::{EngineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BreathPhase {
    Inhale,
    HoldIn,
    Exhale,
    HoldOut,
}

impl BreathPhase {
    pub const ALL: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::HoldIn,
        BreathPhase::Exhale,
        BreathPhase::HoldOut,
    ];

    pub fn code(self) -> u32 {
        match self {
            BreathPhase::Inhale => 0,
            BreathPhase::HoldIn => 1,
            BreathPhase::Exhale => 2,
            BreathPhase::HoldOut => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreathSample {
    pub phase: BreathPhase,
    /// Progress within the current phase, 0..=1.
    pub progress: f32,
}

impl BreathSample {
    /// 1 = fully contracted (inhaled), 0 = fully expanded.
    pub fn breath_value(&self) -> f32 {
        let p = self.progress.clamp(0.0, 1.0);
        let v = match self.phase {
            BreathPhase::Inhale => smoothstep(p),
            BreathPhase::HoldIn => 1.0,
            BreathPhase::Exhale => 1.0 - smoothstep(p),
            BreathPhase::HoldOut => 0.0,
        };
        v.clamp(0.0, 1.0)
    }
}

#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Phase durations in seconds. Zero-length holds are skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreathPattern {
    pub inhale: f32,
    pub hold_in: f32,
    pub exhale: f32,
    pub hold_out: f32,
}

impl Default for BreathPattern {
    fn default() -> Self {
        Self::BOX
    }
}

impl BreathPattern {
    pub const BOX: BreathPattern = BreathPattern {
        inhale: 4.0,
        hold_in: 4.0,
        exhale: 4.0,
        hold_out: 4.0,
    };
    pub const RELAXING: BreathPattern = BreathPattern {
        inhale: 4.0,
        hold_in: 7.0,
        exhale: 8.0,
        hold_out: 0.0,
    };
    pub const COHERENT: BreathPattern = BreathPattern {
        inhale: 5.5,
        hold_in: 0.0,
        exhale: 5.5,
        hold_out: 0.0,
    };

    pub fn new(inhale: f32, hold_in: f32, exhale: f32, hold_out: f32) -> Result<Self> {
        let pattern = Self {
            inhale,
            hold_in,
            exhale,
            hold_out,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "box" => Some(Self::BOX),
            "relaxing" | "4-7-8" => Some(Self::RELAXING),
            "coherent" => Some(Self::COHERENT),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let all = self.durations();
        if all.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(EngineError::InvalidPattern(format!(
                "durations must be finite and non-negative: {:?}",
                all
            )));
        }
        if self.inhale <= 0.0 || self.exhale <= 0.0 {
            return Err(EngineError::InvalidPattern(
                "inhale and exhale must be longer than zero".into(),
            ));
        }
        Ok(())
    }

    fn durations(&self) -> [f32; 4] {
        [self.inhale, self.hold_in, self.exhale, self.hold_out]
    }

    pub fn cycle_seconds(&self) -> f32 {
        self.durations().iter().sum()
    }

    /// Anchored at the epoch: depends on nothing but `unix_ms`.
    pub fn sample_at(&self, unix_ms: f64) -> BreathSample {
        let cycle_ms = self.cycle_seconds() as f64 * 1000.0;
        if !(cycle_ms > 0.0) || !unix_ms.is_finite() {
            return BreathSample {
                phase: BreathPhase::Inhale,
                progress: 0.0,
            };
        }
        let mut t = unix_ms.rem_euclid(cycle_ms);
        for (phase, secs) in BreathPhase::ALL.iter().zip(self.durations()) {
            let len = secs as f64 * 1000.0;
            if len <= 0.0 {
                continue;
            }
            if t < len {
                return BreathSample {
                    phase: *phase,
                    progress: (t / len).clamp(0.0, 1.0) as f32,
                };
            }
            t -= len;
        }
        // Float residue at the very end of the cycle
        BreathSample {
            phase: self.last_phase(),
            progress: 1.0,
        }
    }

    fn last_phase(&self) -> BreathPhase {
        BreathPhase::ALL
            .iter()
            .zip(self.durations())
            .filter(|(_, d)| *d > 0.0)
            .map(|(p, _)| *p)
            .last()
            .unwrap_or(BreathPhase::Exhale)
    }
}

pub trait Clock {
    fn now_unix_ms(&self) -> f64;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now_unix_ms(&self) -> f64 {
        self.0
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_unix_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

#[derive(Clone, Debug)]
pub struct BreathClock<C: Clock> {
    pub pattern: BreathPattern,
    clock: C,
}

impl<C: Clock> BreathClock<C> {
    pub fn new(pattern: BreathPattern, clock: C) -> Self {
        Self { pattern, clock }
    }

    pub fn now_unix_ms(&self) -> f64 {
        self.clock.now_unix_ms()
    }

    pub fn sample(&self) -> BreathSample {
        self.pattern.sample_at(self.clock.now_unix_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_pattern_walks_all_phases() {
        let p = BreathPattern::BOX;
        let s = p.sample_at(1_000.0);
        assert_eq!(s.phase, BreathPhase::Inhale);
        assert!((s.progress - 0.25).abs() < 1e-6);
        assert_eq!(p.sample_at(5_000.0).phase, BreathPhase::HoldIn);
        assert_eq!(p.sample_at(9_000.0).phase, BreathPhase::Exhale);
        assert_eq!(p.sample_at(13_000.0).phase, BreathPhase::HoldOut);
        assert_eq!(p.sample_at(16_000.0).phase, BreathPhase::Inhale);
    }

    #[test]
    fn zero_length_holds_are_skipped() {
        let p = BreathPattern::COHERENT;
        for ms in (0..11_000).step_by(250) {
            let s = p.sample_at(ms as f64);
            assert!(matches!(s.phase, BreathPhase::Inhale | BreathPhase::Exhale));
        }
    }

    #[test]
    fn breath_value_is_continuous_across_phase_edges() {
        let p = BreathPattern::BOX;
        let before = p.sample_at(3_999.0).breath_value();
        let after = p.sample_at(4_001.0).breath_value();
        assert!((before - after).abs() < 1e-3);
        let before = p.sample_at(11_999.0).breath_value();
        let after = p.sample_at(12_001.0).breath_value();
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(BreathPattern::new(0.0, 1.0, 4.0, 0.0).is_err());
        assert!(BreathPattern::new(4.0, -1.0, 4.0, 0.0).is_err());
        assert!(BreathPattern::new(4.0, f32::NAN, 4.0, 0.0).is_err());
        assert!(BreathPattern::new(4.0, 0.0, 4.0, 0.0).is_ok());
    }

    #[test]
    fn phase_codes_round_trip() {
        for phase in BreathPhase::ALL {
            assert_eq!(BreathPhase::from_code(phase.code()), Some(phase));
        }
        assert_eq!(BreathPhase::from_code(4), None);
    }
}
