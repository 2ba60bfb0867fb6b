use std::collections::BTreeMap;
use std::hash::Hasher;

use fnv::FnvHasher;
use glam::Vec3;
use rand::prelude::*;

use crate::config::VisualConfig;
use crate::presence::{MoodCounts, PresenceUser};
use crate::state::PointInstance;

const TAU: f32 = std::f32::consts::TAU;

#[derive(Clone, Debug, PartialEq)]
pub struct FireflySample {
    pub user_id: String,
    pub mood: u8,
    /// Radians around the ring.
    pub angle: f32,
    /// Radians; stable for a given sample index.
    pub phase_offset: f32,
    pub color: [f32; 3],
    pub born_at: f32,
    pub retired_at: Option<f32>,
}

impl FireflySample {
    pub fn opacity(&self, now: f32, fade_in: f32, fade_out: f32) -> f32 {
        let rise = if fade_in > 0.0 {
            ((now - self.born_at) / fade_in).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let fall = match self.retired_at {
            Some(t) if fade_out > 0.0 => 1.0 - ((now - t) / fade_out).clamp(0.0, 1.0),
            Some(_) => 0.0,
            None => 1.0,
        };
        rise * fall
    }
}

/// Phase offset for the `index`-th sample.
pub fn phase_offset_for(index: usize) -> f32 {
    let mix = (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(mix).gen::<f32>() * TAU
}

pub struct FireflySampler {
    cap: usize,
    fade_in: f32,
    fade_out: f32,
    palette: Vec<[f32; 3]>,
    fallback_color: [f32; 3],
    current: Vec<FireflySample>,
    retiring: Vec<FireflySample>,
    signature: Option<u64>,
}

impl FireflySampler {
    pub fn new(config: &VisualConfig) -> Self {
        Self {
            cap: config.firefly_cap,
            fade_in: config.firefly_fade_in,
            fade_out: config.firefly_fade_out,
            palette: config.mood_colors.clone(),
            fallback_color: config.particle_color,
            current: Vec::new(),
            retiring: Vec::new(),
            signature: None,
        }
    }

    pub fn current(&self) -> &[FireflySample] {
        &self.current
    }

    pub fn retiring(&self) -> &[FireflySample] {
        &self.retiring
    }

    fn color_for(&self, mood: u8) -> [f32; 3] {
        if self.palette.is_empty() {
            self.fallback_color
        } else {
            self.palette[mood as usize % self.palette.len()]
        }
    }

    /// Replace the sample wholesale if the inputs changed. Returns whether it did.
    pub fn resample(&mut self, users: &[PresenceUser], moods: &MoodCounts, now: f32) -> bool {
        let sig = signature(users, moods);
        if self.signature == Some(sig) {
            return false;
        }
        self.signature = Some(sig);

        for mut old in self.current.drain(..) {
            old.retired_at = Some(now);
            self.retiring.push(old);
        }

        let picked = stratified_pick(users, moods, self.cap);
        let arcs = mood_arcs(&picked, moods);
        let mut per_mood_seen: BTreeMap<u8, usize> = BTreeMap::new();
        let mut per_mood_total: BTreeMap<u8, usize> = BTreeMap::new();
        for u in &picked {
            *per_mood_total.entry(u.mood).or_default() += 1;
        }
        let mut next = Vec::with_capacity(picked.len());
        for (index, user) in picked.iter().enumerate() {
            let (start, share) = arcs.get(&user.mood).copied().unwrap_or((0.0, 1.0));
            let k = per_mood_total[&user.mood];
            let j = per_mood_seen.entry(user.mood).or_default();
            let angle = TAU * (start + share * (*j as f32 + 0.5) / k as f32);
            *j += 1;
            next.push(FireflySample {
                user_id: user.id.clone(),
                mood: user.mood,
                angle,
                phase_offset: phase_offset_for(index),
                color: self.color_for(user.mood),
                born_at: now,
                retired_at: None,
            });
        }
        log::debug!(
            "[firefly] resampled {} of {} users ({} retiring)",
            next.len(),
            users.len(),
            self.retiring.len()
        );
        self.current = next;
        true
    }

    /// Forget samples whose fade-out has finished.
    pub fn prune(&mut self, now: f32) {
        let fade_out = self.fade_out;
        self.retiring
            .retain(|s| s.retired_at.map_or(true, |t| now - t < fade_out));
    }

    /// Drawable instances for the ring at `ring_radius`.
    pub fn instances(&self, now: f32, ring_radius: f32, size: f32) -> Vec<PointInstance> {
        self.current
            .iter()
            .chain(self.retiring.iter())
            .filter_map(|s| {
                let opacity = s.opacity(now, self.fade_in, self.fade_out);
                if opacity <= 0.0 {
                    return None;
                }
                let a = s.angle + now * 0.05;
                let bob = (now * 0.8 + s.phase_offset).sin() * 0.12 * ring_radius;
                let pos = Vec3::new(a.cos() * ring_radius, bob, a.sin() * ring_radius);
                let flicker = 0.8 + 0.2 * (now * 2.3 + s.phase_offset).sin();
                Some(PointInstance {
                    position: pos.to_array(),
                    size: size * (0.6 + 0.4 * opacity),
                    color: [s.color[0], s.color[1], s.color[2], opacity * flicker],
                })
            })
            .collect()
    }
}

fn signature(users: &[PresenceUser], moods: &MoodCounts) -> u64 {
    let mut h = FnvHasher::default();
    for u in users {
        h.write(u.id.as_bytes());
        h.write_u8(0xff);
        h.write_u8(u.mood);
    }
    h.write_u8(0xfe);
    for (mood, count) in moods {
        h.write_u8(*mood);
        h.write_u32(*count);
    }
    h.finish()
}

/// Choose up to `cap` users, allotting seats per mood by largest remainder.
fn stratified_pick<'a>(
    users: &'a [PresenceUser],
    moods: &MoodCounts,
    cap: usize,
) -> Vec<&'a PresenceUser> {
    let mut groups: BTreeMap<u8, Vec<&PresenceUser>> = BTreeMap::new();
    for u in users {
        groups.entry(u.mood).or_default().push(u);
    }
    if users.len() <= cap {
        return groups.into_values().flatten().collect();
    }
    let weight = |mood: u8, group_len: usize| -> f64 {
        match moods.get(&mood) {
            Some(&c) if c > 0 => c as f64,
            _ => group_len as f64,
        }
    };
    let total: f64 = groups.iter().map(|(m, g)| weight(*m, g.len())).sum();
    let mut seats: BTreeMap<u8, usize> = BTreeMap::new();
    let mut remainders: Vec<(f64, u8)> = Vec::new();
    for (mood, group) in &groups {
        let exact = cap as f64 * weight(*mood, group.len()) / total;
        let floor = (exact.floor() as usize).min(group.len());
        seats.insert(*mood, floor);
        remainders.push((exact - exact.floor(), *mood));
    }
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut left = cap - seats.values().sum::<usize>();
    // Largest remainders first, then any group with spare members.
    let order: Vec<u8> = remainders
        .iter()
        .map(|(_, m)| *m)
        .chain(groups.keys().copied().cycle().take(groups.len() * cap))
        .collect();
    for mood in order {
        if left == 0 {
            break;
        }
        let have = seats[&mood];
        if have < groups[&mood].len() {
            seats.insert(mood, have + 1);
            left -= 1;
        }
    }
    groups
        .into_iter()
        .flat_map(|(mood, group)| group.into_iter().take(seats[&mood]))
        .collect()
}

/// `(start, share)` of each mood's arc as fractions of a full turn.
fn mood_arcs(picked: &[&PresenceUser], moods: &MoodCounts) -> BTreeMap<u8, (f32, f32)> {
    let mut weights: BTreeMap<u8, f64> = moods
        .iter()
        .filter(|(_, c)| **c > 0)
        .map(|(m, c)| (*m, *c as f64))
        .collect();
    for u in picked {
        weights.entry(u.mood).or_insert(0.0);
    }
    let sampled = |mood: u8| picked.iter().filter(|u| u.mood == mood).count() as f64;
    for (mood, w) in weights.iter_mut() {
        if *w == 0.0 {
            *w = sampled(*mood);
        }
    }
    let total: f64 = weights.values().sum();
    let mut arcs = BTreeMap::new();
    if total <= 0.0 {
        return arcs;
    }
    let mut start = 0.0f64;
    for (mood, w) in weights {
        let share = w / total;
        arcs.insert(mood, (start as f32, share as f32));
        start += share;
    }
    arcs
}
