// Wall-clock breath cycle as seen from two independent viewers.

use app_core::{BreathClock, BreathPattern, BreathPhase, FixedClock};

#[test]
fn viewers_at_the_same_instant_agree() {
    let instant = 1_700_000_123_456.0;
    let a = BreathClock::new(BreathPattern::RELAXING, FixedClock(instant));
    let b = BreathClock::new(BreathPattern::RELAXING, FixedClock(instant));
    assert_eq!(a.sample(), b.sample());

    // One full cycle later the sample repeats.
    let cycle_ms = BreathPattern::RELAXING.cycle_seconds() as f64 * 1000.0;
    let later = BreathClock::new(BreathPattern::RELAXING, FixedClock(instant + cycle_ms));
    let (s, t) = (a.sample(), later.sample());
    assert_eq!(s.phase, t.phase);
    assert!((s.progress - t.progress).abs() < 1e-3);
}

#[test]
fn breath_value_stays_in_unit_range_over_a_cycle() {
    for pattern in [
        BreathPattern::BOX,
        BreathPattern::RELAXING,
        BreathPattern::COHERENT,
    ] {
        let cycle_ms = (pattern.cycle_seconds() * 1000.0) as i64;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for ms in (0..cycle_ms).step_by(37) {
            let v = pattern.sample_at(ms as f64).breath_value();
            assert!((0.0..=1.0).contains(&v), "{pattern:?} at {ms}ms gave {v}");
            min = min.min(v);
            max = max.max(v);
        }
        assert!(min < 0.01 && max > 0.99, "{pattern:?} never spans the range");
    }
}

#[test]
fn relaxing_pattern_skips_the_empty_hold() {
    let p = BreathPattern::RELAXING;
    // inhale 4s, hold 7s, exhale 8s, no hold out
    assert_eq!(p.sample_at(2_000.0).phase, BreathPhase::Inhale);
    assert_eq!(p.sample_at(6_000.0).phase, BreathPhase::HoldIn);
    assert_eq!(p.sample_at(18_900.0).phase, BreathPhase::Exhale);
    assert_eq!(p.sample_at(19_000.0).phase, BreathPhase::Inhale);
    for ms in (0..19_000).step_by(100) {
        assert_ne!(p.sample_at(ms as f64).phase, BreathPhase::HoldOut);
    }
}

#[test]
fn timestamps_before_the_epoch_still_sample() {
    let s = BreathPattern::BOX.sample_at(-1_000.0);
    assert_eq!(s.phase, BreathPhase::HoldOut);
    assert!((s.progress - 0.75).abs() < 1e-6);
    let s = BreathPattern::BOX.sample_at(f64::NAN);
    assert_eq!(s.phase, BreathPhase::Inhale);
}

#[test]
fn named_patterns_resolve() {
    assert_eq!(BreathPattern::by_name("box"), Some(BreathPattern::BOX));
    assert_eq!(BreathPattern::by_name("4-7-8"), Some(BreathPattern::RELAXING));
    assert_eq!(BreathPattern::by_name("coherent"), Some(BreathPattern::COHERENT));
    assert_eq!(BreathPattern::by_name("square"), None);
}
