//! wgpu implementation of the compute graph backend.
//!
//! Targets are Rgba32Float render targets; each pass is a full-screen
//! triangle whose fragment shader writes one texel per slot. All passes of a
//! `compute()` batch share one command encoder, submitted at the end.

use app_core::{ComputeBackend, GpuCapabilities};

use crate::helpers::{self, SIM_FORMAT};

/// Vertex-stage textures the point pass samples (the position texture).
pub const VERTEX_TEXTURES_NEEDED: u32 = 1;

pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Uncompiled pass: WGSL module plus the resources bound after the inputs.
///
/// Bindings are laid out as: inputs `0..n`, then `statics`, then `uniforms`.
pub struct PassShader {
    pub wgsl: &'static str,
    pub entry_point: &'static str,
    pub statics: Vec<wgpu::TextureView>,
    pub uniforms: Option<wgpu::Buffer>,
}

pub struct GpuPass {
    label: String,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    statics: Vec<wgpu::TextureView>,
    uniforms: Option<wgpu::Buffer>,
}

struct CopyPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: GpuCapabilities,
    copy: CopyPipeline,
    encoder: Option<wgpu::CommandEncoder>,
    live_targets: usize,
}

/// Query the facts `GpuCapabilities::check` needs from a live adapter/device.
pub fn capabilities_for(adapter: &wgpu::Adapter, device: &wgpu::Device) -> GpuCapabilities {
    let features = adapter.get_texture_format_features(SIM_FORMAT);
    let needed = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let limits = device.limits();
    GpuCapabilities {
        float_render_targets: features.allowed_usages.contains(needed),
        max_vertex_textures: limits.max_sampled_textures_per_shader_stage,
        max_texture_size: limits.max_texture_dimension_2d,
    }
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, caps: GpuCapabilities) -> Self {
        let copy = create_copy_pipeline(&device);
        Self {
            device,
            queue,
            caps,
            copy,
            encoder: None,
            live_targets: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn live_targets(&self) -> usize {
        self.live_targets
    }

    /// Upload an initial texture for `add_variable`.
    pub fn upload(&self, label: &str, width: u32, texels: &[[f32; 4]]) -> GpuTarget {
        let (texture, view) = helpers::create_data_texture(
            &self.device,
            &self.queue,
            label,
            width,
            SIM_FORMAT,
            bytemuck::cast_slice(texels),
        );
        GpuTarget { texture, view }
    }
}

fn create_copy_pipeline(device: &wgpu::Device) -> CopyPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("passthrough_shader"),
        source: wgpu::ShaderSource::Wgsl(crate::PASSTHROUGH_WGSL.into()),
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("passthrough_bgl"),
        entries: &[helpers::sim_texture_entry(0, wgpu::ShaderStages::FRAGMENT)],
    });
    let pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("passthrough_pl"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = helpers::make_fullscreen_pipeline(
        device,
        "passthrough_pipeline",
        &pl,
        &shader,
        "fs_copy",
        SIM_FORMAT,
    );
    CopyPipeline { pipeline, layout }
}

impl ComputeBackend for WgpuBackend {
    type Target = GpuTarget;
    type Source = GpuTarget;
    type Shader = PassShader;
    type Pass = GpuPass;

    fn check_capabilities(&self, width: u32) -> Result<(), String> {
        self.caps.check(width, VERTEX_TEXTURES_NEEDED)
    }

    fn create_target(&mut self, label: &str, width: u32) -> GpuTarget {
        let (texture, view) = helpers::create_color_texture_device(
            &self.device,
            label,
            width,
            width,
            SIM_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        self.live_targets += 1;
        GpuTarget { texture, view }
    }

    fn seed_target(&mut self, source: &GpuTarget, target: &mut GpuTarget) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("passthrough_bg"),
            layout: &self.copy.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&source.view),
            }],
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("seed_encoder"),
            });
        helpers::blit(
            &mut encoder,
            "seed_pass",
            &target.view,
            &self.copy.pipeline,
            &bind_group,
        );
        self.queue.submit(Some(encoder.finish()));
    }

    fn create_pass(&mut self, label: &str, shader: PassShader, input_count: usize) -> GpuPass {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shader.wgsl.into()),
            });
        let texture_count = input_count + shader.statics.len();
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..texture_count as u32)
            .map(|b| helpers::sim_texture_entry(b, wgpu::ShaderStages::FRAGMENT))
            .collect();
        if shader.uniforms.is_some() {
            entries.push(helpers::uniform_entry(
                texture_count as u32,
                wgpu::ShaderStages::FRAGMENT,
            ));
        }
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            });
        let pl = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline = helpers::make_fullscreen_pipeline(
            &self.device,
            label,
            &pl,
            &module,
            shader.entry_point,
            SIM_FORMAT,
        );
        GpuPass {
            label: label.to_string(),
            pipeline,
            layout,
            statics: shader.statics,
            uniforms: shader.uniforms,
        }
    }

    fn begin_batch(&mut self) {
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("compute_encoder"),
                }),
        );
    }

    fn run_pass(&mut self, pass: &GpuPass, inputs: &[&GpuTarget], output: &mut GpuTarget) {
        let mut entries: Vec<wgpu::BindGroupEntry> = inputs
            .iter()
            .map(|t| &t.view)
            .chain(pass.statics.iter())
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        if let Some(buf) = &pass.uniforms {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: buf.as_entire_binding(),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&pass.label),
            layout: &pass.layout,
            entries: &entries,
        });
        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_encoder"),
            })
        });
        helpers::blit(encoder, &pass.label, &output.view, &pass.pipeline, &bind_group);
    }

    fn end_batch(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn release_target(&mut self, target: GpuTarget) {
        target.texture.destroy();
        self.live_targets = self.live_targets.saturating_sub(1);
    }

    fn release_pass(&mut self, _pass: GpuPass) {}

    fn release_source(&mut self, source: GpuTarget) {
        source.texture.destroy();
    }
}
