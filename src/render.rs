use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use app_core::{EngineError, VisualConfig};
use app_render::{capabilities_for, FrameInput, ParticleScene};
use web_sys as web;

use crate::constants::PREFERRED_FORMATS;

/// Why the GPU path could not be brought up.
pub enum GpuInitError {
    /// The device works but cannot run the particle engine.
    Capability(String),
    Other(anyhow::Error),
}

impl From<anyhow::Error> for GpuInitError {
    fn from(e: anyhow::Error) -> Self {
        GpuInitError::Other(e)
    }
}

impl std::fmt::Display for GpuInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuInitError::Capability(msg) => write!(f, "unsupported GPU: {}", msg),
            GpuInitError::Other(e) => write!(f, "{:#}", e),
        }
    }
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    config: wgpu::SurfaceConfiguration,
    scene: ParticleScene,
    device_lost: Arc<AtomicBool>,
}

impl GpuState {
    pub async fn new(
        canvas: &web::HtmlCanvasElement,
        visual: VisualConfig,
    ) -> Result<Self, GpuInitError> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| anyhow::anyhow!("create_surface error: {:?}", e))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No WebGPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    // Use default limits on web to avoid passing unknown fields to older WebGPU impls
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;

        let device_lost = Arc::new(AtomicBool::new(false));
        {
            let flag = device_lost.clone();
            device.set_device_lost_callback(move |reason, message| {
                log::error!("[gpu] device lost ({:?}): {}", reason, message);
                flag.store(true, Ordering::SeqCst);
            });
        }

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| PREFERRED_FORMATS.contains(f))
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let gpu_caps = capabilities_for(&adapter, &device);
        let scene = match ParticleScene::new(&device, &queue, gpu_caps, format, visual) {
            Ok(scene) => scene,
            Err(EngineError::Capability(msg)) => return Err(GpuInitError::Capability(msg)),
            Err(e) => return Err(anyhow::Error::new(e).context("particle scene").into()),
        };

        Ok(Self {
            surface,
            device,
            config,
            scene,
            device_lost,
        })
    }

    pub fn scene(&self) -> &ParticleScene {
        &self.scene
    }

    pub fn resize_if_needed(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width != self.config.width || height != self.config.height {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn render(&mut self, input: FrameInput) -> anyhow::Result<()> {
        if self.device_lost.load(Ordering::SeqCst) {
            anyhow::bail!("GPU device lost");
        }
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                // reconfigure and skip this frame
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(anyhow::anyhow!("surface error: {:?}", e)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.scene.render(
            &view,
            FrameInput {
                viewport: (self.config.width, self.config.height),
                ..input
            },
        )?;
        frame.present();
        Ok(())
    }

    pub fn dispose(&mut self) {
        self.scene.dispose();
    }
}
