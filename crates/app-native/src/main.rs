use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use winit::{event::*, event_loop::EventLoop, window::WindowBuilder};

use app_core::{
    BreathClock, BreathPattern, EngineError, MoodCounts, PresenceSnapshot, PresenceUser,
    SystemClock, VisualConfig,
};
use app_render::{capabilities_for, FrameInput, ParticleScene};
use rand::prelude::*;

const PRESENCE_INTERVAL: Duration = Duration::from_millis(1500);
const SYNTHETIC_MOODS: u8 = 4;
const SYNTHETIC_START: f64 = 12.0;

type PresenceSlot = Arc<Mutex<Option<PresenceSnapshot>>>;

struct GpuState<'w> {
    window: &'w winit::window::Window,
    surface: wgpu::Surface<'w>,
    device: wgpu::Device,
    config: wgpu::SurfaceConfiguration,
    scene: ParticleScene,
    clock: BreathClock<SystemClock>,
    start: Instant,
    last_frame: Instant,
    presence: PresenceSlot,
    device_lost: Arc<AtomicBool>,
}

impl<'w> GpuState<'w> {
    async fn new(
        window: &'w winit::window::Window,
        pattern: BreathPattern,
        visual: VisualConfig,
        force_cpu: bool,
        presence: PresenceSlot,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await?;

        let device_lost = Arc::new(AtomicBool::new(false));
        {
            let flag = Arc::clone(&device_lost);
            device.set_device_lost_callback(move |reason, message| {
                log::error!("[gpu] device lost ({:?}): {}", reason, message);
                flag.store(true, Ordering::SeqCst);
            });
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            desired_maximum_frame_latency: 2,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let caps = capabilities_for(&adapter, &device);
        let gpu_scene = if force_cpu {
            Err(EngineError::Capability("CPU simulation requested".into()))
        } else {
            ParticleScene::new(&device, &queue, caps, format, visual.clone())
        };
        let scene = match gpu_scene {
            Ok(scene) => scene,
            Err(EngineError::Capability(msg)) => {
                log::warn!("[native] {}; falling back to CPU physics", msg);
                ParticleScene::with_cpu_physics(&device, &queue, format, visual)?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            window,
            surface,
            device,
            config,
            scene,
            clock: BreathClock::new(pattern, SystemClock),
            start: Instant::now(),
            last_frame: Instant::now(),
            presence,
            device_lost,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn render(&mut self) -> anyhow::Result<()> {
        if self.device_lost.load(Ordering::SeqCst) {
            anyhow::bail!("GPU device lost");
        }
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.resize(self.window.inner_size());
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(anyhow::anyhow!("surface error: {:?}", e)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let snapshot = self
            .presence
            .lock()
            .map_err(|_| anyhow::anyhow!("presence source poisoned"))?
            .take();
        self.scene.render(
            &view,
            FrameInput {
                breath: self.clock.sample(),
                time: self.start.elapsed().as_secs_f32(),
                dt: dt.as_secs_f32(),
                presence: snapshot.as_ref(),
                viewport: (self.config.width, self.config.height),
            },
        )?;
        frame.present();
        Ok(())
    }
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let pattern_name = std::env::var("BREATH_PATTERN").unwrap_or_else(|_| "box".into());
    let pattern = BreathPattern::by_name(&pattern_name)
        .ok_or_else(|| anyhow::anyhow!("unknown breath pattern `{}`", pattern_name))?;
    let force_cpu = std::env::var("BREATHE_CPU").map_or(false, |v| v == "1");
    let visual = VisualConfig::default();
    visual.validate()?;

    let presence: PresenceSlot = Arc::new(Mutex::new(None));
    start_synthetic_presence(Arc::clone(&presence), visual.seed);

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("breathe-sphere (native)")
        .build(&event_loop)?;

    let mut state = pollster::block_on(GpuState::new(
        &window,
        pattern,
        visual,
        force_cpu,
        Arc::clone(&presence),
    ))?;
    log::info!(
        "[native] pattern {} ({:.1}s cycle), {} simulation",
        pattern_name,
        pattern.cycle_seconds(),
        if state.scene.is_gpu() { "gpu" } else { "cpu" }
    );

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::Resized(size),
            ..
        } => state.resize(size),
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            state.scene.dispose();
            elwt.exit();
        }
        Event::AboutToWait => {
            if state.scene.is_disposed() {
                return;
            }
            match state.render() {
                Ok(_) => state.window.request_redraw(),
                Err(e) => {
                    log::error!("render error: {:#}", e);
                    state.scene.dispose();
                    elwt.exit();
                }
            }
        }
        _ => {}
    })?;
    Ok(())
}

// ---------------- Synthetic presence ----------------

/// Random-walk stand-in for a presence service, publishing every interval.
fn start_synthetic_presence(slot: PresenceSlot, seed: u64) {
    thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED);
        let mut count = SYNTHETIC_START;
        let mut next_id = 0u32;
        let mut users: Vec<PresenceUser> = Vec::new();
        loop {
            count = (count + rng.gen_range(-3.0..4.0)).clamp(0.0, 400.0);
            let target = count.floor() as usize;
            while users.len() < target.min(64) {
                users.push(PresenceUser {
                    id: format!("guest-{next_id}"),
                    mood: rng.gen_range(0..SYNTHETIC_MOODS),
                });
                next_id += 1;
            }
            users.truncate(target.min(64));

            let mut moods = MoodCounts::new();
            for u in &users {
                *moods.entry(u.mood).or_insert(0) += 1;
            }
            // people beyond the sampled list are spread over the moods
            for _ in users.len()..target {
                *moods.entry(rng.gen_range(0..SYNTHETIC_MOODS)).or_insert(0) += 1;
            }

            let snapshot = PresenceSnapshot {
                count,
                moods: Some(moods),
                users: Some(users.clone()),
            };
            match slot.lock() {
                Ok(mut guard) => *guard = Some(snapshot),
                Err(_) => return,
            }
            thread::sleep(PRESENCE_INTERVAL);
        }
    });
}
