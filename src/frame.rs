use std::cell::RefCell;
use std::rc::Rc;

use app_core::{active_count, BreathClock, BreathPhase, Clock, VisualConfig};
use app_render::FrameInput;
use instant::Instant;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::render::{GpuInitError, GpuState};
use crate::{dom, overlay, presence};

/// Wall clock shared by every viewer: `Date.now()`.
pub struct DateClock;

impl Clock for DateClock {
    fn now_unix_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

pub struct FrameContext {
    pub canvas: web::HtmlCanvasElement,
    pub document: web::Document,
    pub gpu: Option<GpuState>,
    pub clock: BreathClock<DateClock>,
    pub start_ms: f64,
    pub last_instant: Instant,
    pub stopped: bool,
}

impl FrameContext {
    pub fn new(
        canvas: web::HtmlCanvasElement,
        document: web::Document,
        gpu: Option<GpuState>,
        clock: BreathClock<DateClock>,
    ) -> Self {
        Self {
            canvas,
            document,
            gpu,
            start_ms: clock.now_unix_ms(),
            clock,
            last_instant: Instant::now(),
            stopped: false,
        }
    }

    pub fn frame(&mut self) {
        if self.stopped {
            return;
        }
        let now = Instant::now();
        let dt_sec = (now - self.last_instant).as_secs_f32();
        self.last_instant = now;

        let breath = self.clock.sample();
        let time = ((self.clock.now_unix_ms() - self.start_ms) / 1000.0) as f32;
        let snapshot = presence::take_pending();

        let Some(gpu) = &mut self.gpu else {
            // DOM fallback keeps the count and the breath label current.
            overlay::update_status(
                &self.document,
                active_count(presence::last_count(), usize::MAX),
                phase_label(breath.phase),
            );
            return;
        };
        gpu.resize_if_needed(self.canvas.width(), self.canvas.height());
        let result = gpu.render(FrameInput {
            breath,
            time,
            dt: dt_sec,
            presence: snapshot.as_ref(),
            viewport: (self.canvas.width(), self.canvas.height()),
        });
        match result {
            Ok(()) => {
                if snapshot.is_some() {
                    overlay::update_status(
                        &self.document,
                        gpu.scene().active_count(),
                        phase_label(breath.phase),
                    );
                }
            }
            Err(e) => {
                log::error!("render error: {:#}", e);
                self.fall_back(&format!("{:#}", e));
            }
        }
    }

    /// Release the GPU path and switch the page to the DOM fallback.
    pub fn fall_back(&mut self, reason: &str) {
        if let Some(mut gpu) = self.gpu.take() {
            gpu.dispose();
        }
        overlay::show_fallback(&self.document, reason);
    }

    /// Final teardown; no frames run afterwards.
    pub fn stop(&mut self) {
        if let Some(mut gpu) = self.gpu.take() {
            gpu.dispose();
        }
        self.stopped = true;
        log::info!("[frame] stopped");
    }
}

pub fn phase_label(phase: BreathPhase) -> &'static str {
    match phase {
        BreathPhase::Inhale => "breathe in",
        BreathPhase::HoldIn | BreathPhase::HoldOut => "hold",
        BreathPhase::Exhale => "breathe out",
    }
}

pub async fn init_gpu(
    canvas: &web::HtmlCanvasElement,
    document: &web::Document,
    visual: VisualConfig,
) -> Option<GpuState> {
    match GpuState::new(canvas, visual).await {
        Ok(g) => {
            overlay::hide_fallback(document);
            Some(g)
        }
        Err(GpuInitError::Capability(msg)) => {
            log::warn!("[gpu] capability check failed: {}", msg);
            overlay::show_fallback(document, &msg);
            None
        }
        Err(e) => {
            log::error!("WebGPU init error: {}", e);
            overlay::show_fallback(document, &e.to_string());
            None
        }
    }
}

pub fn start_loop(frame_ctx: Rc<RefCell<FrameContext>>) {
    let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let tick_clone = tick.clone();
    let frame_ctx_tick = frame_ctx.clone();
    *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let stopped = {
            let mut ctx = frame_ctx_tick.borrow_mut();
            ctx.frame();
            ctx.stopped
        };
        if !stopped {
            request_frame(&tick_clone);
        }
    }) as Box<dyn FnMut()>));
    request_frame(&tick);

    let ctx_hide = frame_ctx;
    dom::add_window_listener("pagehide", move || ctx_hide.borrow_mut().stop());
}

fn request_frame(tick: &Rc<RefCell<Option<Closure<dyn FnMut()>>>>) {
    if let (Some(w), Some(cb)) = (web::window(), tick.borrow().as_ref()) {
        _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}
