// Presence mapping driven end to end through the CPU physics graph.

use app_core::{
    active_count, ActivationChange, BreathPattern, CpuBreathPhysics, FixedClock, BreathClock,
    HomePositionField, PhysicsUniforms, PresenceMapper, PresenceSnapshot, SlotState,
    VisualConfig, LIFE_STEP,
};

const EPS: f32 = 1e-6;

fn full_grid() -> VisualConfig {
    VisualConfig {
        grid_width: 32,
        ..Default::default()
    }
}

struct Rig {
    config: VisualConfig,
    mapper: PresenceMapper,
    physics: CpuBreathPhysics,
    time: f32,
}

impl Rig {
    fn new(config: VisualConfig) -> Self {
        let home = HomePositionField::generate(&config);
        let mut physics = CpuBreathPhysics::new(&home).unwrap();
        let mut mapper = PresenceMapper::new(&config);
        mapper.targets_mut().take_dirty();
        physics.set_target_life(mapper.targets().as_slice());
        Self {
            config,
            mapper,
            physics,
            time: 0.0,
        }
    }

    fn present(&mut self, count: f64) -> Option<ActivationChange> {
        let snapshot = PresenceSnapshot {
            count,
            ..Default::default()
        };
        self.mapper.apply(&snapshot, self.time)
    }

    /// One frame; returns the life of every slot before and after.
    fn tick(&mut self) -> (Vec<f32>, Vec<f32>) {
        let before: Vec<f32> = self.physics.positions().iter().map(|t| t[3]).collect();
        if self.mapper.targets_mut().take_dirty() {
            self.physics
                .set_target_life(self.mapper.targets().as_slice());
        }
        let clock = BreathClock::new(BreathPattern::BOX, FixedClock(self.time as f64 * 1000.0));
        let uniforms = PhysicsUniforms::new(&self.config, self.time, 1.0 / 60.0, clock.sample());
        self.physics.step(uniforms).unwrap();
        self.mapper.tick(self.time);
        self.time += 1.0 / 60.0;
        let after: Vec<f32> = self.physics.positions().iter().map(|t| t[3]).collect();
        (before, after)
    }

    fn settle(&mut self) {
        let ticks = (1.0 / LIFE_STEP).ceil() as usize + 2;
        for _ in 0..ticks {
            let (before, after) = self.tick();
            assert_easing(&before, &after, self.mapper.targets().as_slice());
        }
    }

    fn visible(&self) -> usize {
        self.physics
            .positions()
            .iter()
            .filter(|t| t[3] >= 0.5)
            .count()
    }
}

fn assert_easing(before: &[f32], after: &[f32], targets: &[f32]) {
    for (slot, ((b, a), t)) in before.iter().zip(after).zip(targets).enumerate() {
        assert!(a.is_finite(), "slot {slot} life is {a}");
        assert!((0.0..=1.0).contains(a), "slot {slot} life {a} out of range");
        assert!(
            (a - b).abs() <= LIFE_STEP + EPS,
            "slot {slot} jumped {b} -> {a}"
        );
        // Never moves away from its target.
        assert!((t - a).abs() <= (t - b).abs() + EPS, "slot {slot} overshot");
    }
}

#[test]
fn activation_count_is_clamped() {
    let got: Vec<usize> = [-5.0, 0.0, f64::NAN, 50.0, 2000.0]
        .into_iter()
        .map(|c| active_count(c, 1024))
        .collect();
    assert_eq!(got, vec![1, 1, 1, 50, 1024]);
}

#[test]
fn population_changes_ease_every_slot() {
    let mut rig = Rig::new(full_grid());
    assert_eq!(rig.mapper.targets().capacity(), 1024);

    for (count, expect) in [(0.0, 1), (50.0, 50), (2000.0, 1024), (10.0, 10)] {
        rig.present(count);
        assert_eq!(rig.mapper.active(), expect, "count {count}");
        rig.settle();
        assert_eq!(rig.visible(), expect, "visible after count {count}");
        let lives: Vec<f32> = rig.physics.positions().iter().map(|t| t[3]).collect();
        assert!(lives[..expect].iter().all(|l| (*l - 1.0).abs() < EPS));
        assert!(lives[expect..].iter().all(|l| l.abs() < EPS));
    }
}

#[test]
fn retargeting_a_fading_slot_reverses_smoothly() {
    let mut rig = Rig::new(VisualConfig {
        grid_width: 4,
        ..Default::default()
    });
    rig.present(8.0);
    rig.settle();
    let slot = 6;
    assert!((rig.physics.positions()[slot][3] - 1.0).abs() < EPS);

    rig.present(2.0);
    for _ in 0..10 {
        rig.tick();
    }
    let fading = rig.physics.positions()[slot][3];
    assert!(fading < 1.0 && fading > 0.0);
    assert_eq!(
        SlotState::classify(fading, rig.mapper.targets().as_slice()[slot]),
        SlotState::Despawning
    );

    rig.present(8.0);
    let (before, after) = rig.tick();
    assert!(after[slot] > before[slot], "slot must turn around");
    assert!(after[slot] - before[slot] <= LIFE_STEP + EPS);
    assert_eq!(
        SlotState::classify(after[slot], rig.mapper.targets().as_slice()[slot]),
        SlotState::Spawning
    );
}

#[test]
fn missing_moods_and_users_keep_the_last_good_values() {
    let config = VisualConfig {
        grid_width: 4,
        ..Default::default()
    };
    let mut mapper = PresenceMapper::new(&config);
    let moods = [(0u8, 3u32), (2, 1)].into_iter().collect();
    mapper.apply(
        &PresenceSnapshot {
            count: 4.0,
            moods: Some(moods),
            users: None,
        },
        0.0,
    );
    mapper.apply(
        &PresenceSnapshot {
            count: 3.0,
            ..Default::default()
        },
        1.0,
    );
    assert_eq!(mapper.active(), 3);
    assert_eq!(mapper.moods().get(&0), Some(&3));
    assert_eq!(mapper.moods().get(&2), Some(&1));
}

#[test]
fn shrinking_does_not_spark() {
    let config = VisualConfig {
        grid_width: 4,
        ..Default::default()
    };
    let mut mapper = PresenceMapper::new(&config);
    mapper.apply(
        &PresenceSnapshot {
            count: 6.0,
            ..Default::default()
        },
        0.0,
    );
    mapper.tick(config.spark_duration + 1.0);
    assert!(mapper.spark().is_none());
    let change = mapper.apply(
        &PresenceSnapshot {
            count: 2.0,
            ..Default::default()
        },
        5.0,
    );
    assert_eq!(change, Some(ActivationChange::Shrank { from: 6, to: 2 }));
    assert!(mapper.spark().is_none());
}
