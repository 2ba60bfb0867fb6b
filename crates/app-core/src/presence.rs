use std::collections::BTreeMap;

use crate::config::VisualConfig;
use crate::firefly::FireflySampler;

pub type MoodCounts = BTreeMap<u8, u32>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresenceUser {
    pub id: String,
    pub mood: u8,
}

/// `None` for moods/users means "unchanged since the last good reading".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresenceSnapshot {
    pub count: f64,
    pub moods: Option<MoodCounts>,
    pub users: Option<Vec<PresenceUser>>,
}

/// `clamp(floor(count), 1, capacity)`; anything non-finite or below one shows one particle.
pub fn active_count(count: f64, capacity: usize) -> usize {
    let capacity = capacity.max(1);
    if !count.is_finite() || count < 1.0 {
        return 1;
    }
    let floored = count.floor();
    if floored >= capacity as f64 {
        capacity
    } else {
        floored as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationChange {
    Grew { from: usize, to: usize },
    Shrank { from: usize, to: usize },
}

/// Short-lived emphasis for freshly activated slots. Not persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spark {
    pub first_slot: u32,
    pub end_slot: u32,
    pub started_at: f32,
    pub duration: f32,
}

impl Spark {
    pub fn strength(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        let age = now - self.started_at;
        if !(0.0..self.duration).contains(&age) {
            return 0.0;
        }
        1.0 - age / self.duration
    }
}

#[derive(Clone, Debug)]
pub struct ActivationTargets {
    targets: Vec<f32>,
    active: usize,
    dirty: bool,
}

impl ActivationTargets {
    pub fn new(capacity: usize) -> Self {
        Self {
            targets: vec![0.0; capacity],
            active: 0,
            dirty: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.targets.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.targets
    }

    /// Returns true once per batch of changes; the caller uploads then.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Retarget the contiguous prefix `[0, active)`.
    pub fn set_active(&mut self, active: usize) -> Option<ActivationChange> {
        let active = active.min(self.targets.len());
        let prev = self.active;
        if active == prev {
            return None;
        }
        self.active = active;
        self.dirty = true;
        if active > prev {
            self.targets[prev..active].fill(1.0);
            Some(ActivationChange::Grew {
                from: prev,
                to: active,
            })
        } else {
            self.targets[active..prev].fill(0.0);
            Some(ActivationChange::Shrank {
                from: prev,
                to: active,
            })
        }
    }
}

pub struct PresenceMapper {
    targets: ActivationTargets,
    spark: Option<Spark>,
    spark_duration: f32,
    last_moods: MoodCounts,
    last_users: Vec<PresenceUser>,
    fireflies: FireflySampler,
}

impl PresenceMapper {
    pub fn new(config: &VisualConfig) -> Self {
        let mut targets = ActivationTargets::new(config.capacity());
        // The engine always shows at least one particle.
        targets.set_active(1);
        Self {
            targets,
            spark: None,
            spark_duration: config.spark_duration,
            last_moods: MoodCounts::new(),
            last_users: Vec::new(),
            fireflies: FireflySampler::new(config),
        }
    }

    pub fn targets(&self) -> &ActivationTargets {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut ActivationTargets {
        &mut self.targets
    }

    pub fn active(&self) -> usize {
        self.targets.active()
    }

    pub fn spark(&self) -> Option<&Spark> {
        self.spark.as_ref()
    }

    pub fn fireflies(&self) -> &FireflySampler {
        &self.fireflies
    }

    pub fn moods(&self) -> &MoodCounts {
        &self.last_moods
    }

    /// Fold one presence reading in; `now` is the engine clock in seconds.
    pub fn apply(&mut self, snapshot: &PresenceSnapshot, now: f32) -> Option<ActivationChange> {
        let wanted = active_count(snapshot.count, self.targets.capacity());
        let change = self.targets.set_active(wanted);
        match change {
            Some(ActivationChange::Grew { from, to }) => {
                // A still-glowing range folds into the new one instead of dropping out.
                let first = match &self.spark {
                    Some(live) if live.strength(now) > 0.0 => live.first_slot.min(from as u32),
                    _ => from as u32,
                };
                self.spark = Some(Spark {
                    first_slot: first,
                    end_slot: to as u32,
                    started_at: now,
                    duration: self.spark_duration,
                });
                log::debug!("[presence] active {} -> {}", from, to);
            }
            Some(ActivationChange::Shrank { from, to }) => {
                log::debug!("[presence] active {} -> {}", from, to);
            }
            None => {}
        }

        let mut sample_inputs_changed = false;
        if let Some(moods) = &snapshot.moods {
            if *moods != self.last_moods {
                self.last_moods = moods.clone();
                sample_inputs_changed = true;
            }
        }
        if let Some(users) = &snapshot.users {
            if *users != self.last_users {
                self.last_users = users.clone();
                sample_inputs_changed = true;
            }
        }
        if sample_inputs_changed {
            self.fireflies
                .resample(&self.last_users, &self.last_moods, now);
        }
        change
    }

    pub fn tick(&mut self, now: f32) {
        if let Some(spark) = &self.spark {
            if spark.strength(now) <= 0.0 && now >= spark.started_at {
                self.spark = None;
            }
        }
        self.fireflies.prune(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_count_clamps_malformed_input() {
        assert_eq!(active_count(-5.0, 1024), 1);
        assert_eq!(active_count(0.0, 1024), 1);
        assert_eq!(active_count(f64::NAN, 1024), 1);
        assert_eq!(active_count(f64::INFINITY, 1024), 1);
        assert_eq!(active_count(50.0, 1024), 50);
        assert_eq!(active_count(50.9, 1024), 50);
        assert_eq!(active_count(2000.0, 1024), 1024);
    }

    #[test]
    fn set_active_retargets_only_the_changed_range() {
        let mut t = ActivationTargets::new(16);
        assert_eq!(
            t.set_active(10),
            Some(ActivationChange::Grew { from: 0, to: 10 })
        );
        assert!(t.as_slice()[..10].iter().all(|&v| v == 1.0));
        assert!(t.as_slice()[10..].iter().all(|&v| v == 0.0));
        assert!(t.take_dirty());
        assert!(!t.take_dirty());
        assert_eq!(t.set_active(10), None);
        assert_eq!(
            t.set_active(4),
            Some(ActivationChange::Shrank { from: 10, to: 4 })
        );
        assert!(t.as_slice()[4..].iter().all(|&v| v == 0.0));
        assert_eq!(t.set_active(99), Some(ActivationChange::Grew { from: 4, to: 16 }));
    }

    #[test]
    fn growth_starts_a_spark_that_fades() {
        let cfg = VisualConfig {
            grid_width: 4,
            ..Default::default()
        };
        let mut m = PresenceMapper::new(&cfg);
        let snap = PresenceSnapshot {
            count: 5.0,
            ..Default::default()
        };
        m.apply(&snap, 10.0);
        let spark = *m.spark().expect("spark after growth");
        assert_eq!((spark.first_slot, spark.end_slot), (1, 5));
        assert_eq!(spark.strength(10.0), 1.0);
        assert!(spark.strength(10.0 + cfg.spark_duration * 0.5) < 1.0);
        m.tick(10.0 + cfg.spark_duration + 0.1);
        assert!(m.spark().is_none());
    }

    #[test]
    fn growth_during_a_spark_extends_it() {
        let cfg = VisualConfig {
            grid_width: 8,
            ..Default::default()
        };
        let mut m = PresenceMapper::new(&cfg);
        let count = |count| PresenceSnapshot {
            count,
            ..Default::default()
        };
        m.apply(&count(5.0), 0.0);
        let mid = cfg.spark_duration * 0.5;
        m.apply(&count(9.0), mid);
        let spark = *m.spark().expect("spark after second growth");
        assert_eq!((spark.first_slot, spark.end_slot), (1, 9));
        // Slots from the first growth keep glowing.
        assert!(spark.strength(mid) >= 0.5);

        // Once the first spark is gone, a new one covers only the new slots.
        m.tick(mid + cfg.spark_duration + 0.1);
        m.apply(&count(12.0), mid + cfg.spark_duration + 0.2);
        let spark = *m.spark().expect("spark after third growth");
        assert_eq!((spark.first_slot, spark.end_slot), (9, 12));
    }
}
