#![cfg(target_arch = "wasm32")]
use std::cell::RefCell;
use std::rc::Rc;

use app_core::{BreathClock, BreathPattern, VisualConfig};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;

mod constants;
mod dom;
mod frame;
mod overlay;
mod presence;
mod render;

pub use presence::{set_presence, set_sampled_users};

use constants::{CANVAS_ID, DEFAULT_PATTERN, GRID_WIDTH_ATTR, PATTERN_ATTR};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("app-web starting");

    spawn_local(async move {
        if let Err(e) = init().await {
            log::error!("init error: {:?}", e);
            if let Some(document) = dom::window_document() {
                overlay::show_fallback(&document, &e.to_string());
            }
        }
    });
    Ok(())
}

fn pattern_from(canvas: &web::HtmlCanvasElement) -> BreathPattern {
    let name = canvas
        .get_attribute(PATTERN_ATTR)
        .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
    BreathPattern::by_name(&name).unwrap_or_else(|| {
        log::warn!("unknown breath pattern `{}`, using {}", name, DEFAULT_PATTERN);
        BreathPattern::BOX
    })
}

fn visual_config_from(canvas: &web::HtmlCanvasElement) -> VisualConfig {
    let mut config = VisualConfig::default();
    if let Some(width) = canvas
        .get_attribute(GRID_WIDTH_ATTR)
        .and_then(|v| v.parse::<u32>().ok())
    {
        config.grid_width = width;
    }
    if let Err(e) = config.validate() {
        log::warn!("{}; using defaults", e);
        config = VisualConfig::default();
    }
    config
}

async fn init() -> anyhow::Result<()> {
    let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| anyhow::anyhow!("no document"))?;

    let canvas_el = document
        .get_element_by_id(CANVAS_ID)
        .ok_or_else(|| anyhow::anyhow!("missing #{}", CANVAS_ID))?;
    let canvas: web::HtmlCanvasElement = canvas_el
        .dyn_into::<web::HtmlCanvasElement>()
        .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;

    // Maintain canvas internal pixel size to match CSS size * devicePixelRatio
    dom::wire_canvas_resize(&canvas);

    let pattern = pattern_from(&canvas);
    let visual = visual_config_from(&canvas);
    log::info!(
        "[init] pattern {:?}, {} particle slots",
        pattern,
        visual.capacity()
    );

    let gpu = frame::init_gpu(&canvas, &document, visual).await;
    let frame_ctx = Rc::new(RefCell::new(frame::FrameContext::new(
        canvas,
        document,
        gpu,
        BreathClock::new(pattern, frame::DateClock),
    )));
    frame::start_loop(frame_ctx);
    Ok(())
}
