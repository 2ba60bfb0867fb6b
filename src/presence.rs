//! Presence inbox: JS pushes readings in, the frame loop drains them.

use std::cell::RefCell;

use app_core::{MoodCounts, PresenceSnapshot, PresenceUser};
use wasm_bindgen::prelude::*;

#[derive(Default)]
struct PresenceInbox {
    pending: Option<PresenceSnapshot>,
    last_count: f64,
}

thread_local! {
    static INBOX: RefCell<PresenceInbox> = RefCell::new(PresenceInbox::default());
}

fn with_pending(f: impl FnOnce(&mut PresenceSnapshot)) {
    INBOX.with(|inbox| {
        let mut inbox = inbox.borrow_mut();
        let last = inbox.last_count;
        let snapshot = inbox.pending.get_or_insert_with(|| PresenceSnapshot {
            count: last,
            moods: None,
            users: None,
        });
        f(snapshot);
    });
}

/// Aggregate reading. `mood_counts[i]` is the number of people in mood `i`.
#[wasm_bindgen]
pub fn set_presence(count: f64, mood_counts: &[u32]) {
    let moods: MoodCounts = mood_counts
        .iter()
        .enumerate()
        .filter(|(mood, c)| **c > 0 && *mood <= u8::MAX as usize)
        .map(|(mood, c)| (mood as u8, *c))
        .collect();
    INBOX.with(|inbox| inbox.borrow_mut().last_count = count);
    with_pending(|snapshot| {
        snapshot.count = count;
        snapshot.moods = Some(moods);
    });
}

/// Sampled individuals, parallel arrays of ids and mood ids.
#[wasm_bindgen]
pub fn set_sampled_users(ids: js_sys::Array, moods: &[u8]) {
    if ids.length() as usize != moods.len() {
        log::warn!(
            "[presence] {} ids but {} moods; extra entries dropped",
            ids.length(),
            moods.len()
        );
    }
    let users: Vec<PresenceUser> = ids
        .iter()
        .zip(moods.iter())
        .filter_map(|(id, mood)| {
            id.as_string().map(|id| PresenceUser { id, mood: *mood })
        })
        .collect();
    with_pending(|snapshot| snapshot.users = Some(users));
}

/// Most recent unread reading, if any arrived since the last call.
pub fn take_pending() -> Option<PresenceSnapshot> {
    INBOX.with(|inbox| inbox.borrow_mut().pending.take())
}

pub fn last_count() -> f64 {
    INBOX.with(|inbox| inbox.borrow().last_count)
}
