//! DOM fallback shown when the GPU path is unavailable or has failed.

use web_sys as web;

use crate::constants::{FALLBACK_ID, STATUS_ID};

#[inline]
pub fn show_fallback(document: &web::Document, reason: &str) {
    if let Some(el) = document.get_element_by_id(FALLBACK_ID) {
        _ = el.class_list().remove_1("hidden");
        // environments without the stylesheet
        _ = el.set_attribute("style", "");
        _ = el.set_attribute("data-reason", reason);
    }
}

#[inline]
pub fn hide_fallback(document: &web::Document) {
    if let Some(el) = document.get_element_by_id(FALLBACK_ID) {
        _ = el.class_list().add_1("hidden");
        _ = el.set_attribute("style", "display:none");
    }
}

/// Plain-text presence line; also what the fallback shows in place of particles.
pub fn update_status(document: &web::Document, active: usize, breath_label: &str) {
    if let Some(el) = document.get_element_by_id(STATUS_ID) {
        let people = if active == 1 { "person" } else { "people" };
        el.set_text_content(Some(&format!("{} {} breathing · {}", active, people, breath_label)));
    }
}
