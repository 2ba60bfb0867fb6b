//! Instanced point sprites for the particle grid and CPU-built instances.

use app_core::{PointInstance, SlotVisual};

use crate::helpers;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub time: f32,
    pub breath_value: f32,
    pub spark_first: u32,
    pub spark_end: u32,
    pub spark_strength: f32,
    pub grid_width: u32,
}

const QUAD_VERTICES: u32 = 6;
const MIN_INSTANCE_CAPACITY: usize = 64;

const SLOT_VISUAL_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32];
const POINT_INSTANCE_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32x4];

pub struct RenderPass {
    grid_pipeline: wgpu::RenderPipeline,
    instance_pipeline: wgpu::RenderPipeline,
    grid_bgl: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    visual_buffer: wgpu::Buffer,
    slot_count: u32,
    // one per compute bank; the position targets never move
    grid_bind_groups: [Option<wgpu::BindGroup>; 2],
    instance_bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instance_count: u32,
}

fn additive_target(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        }),
        write_mask: wgpu::ColorWrites::ALL,
    }
}

fn create_point_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    vs_entry: &str,
    instance_layout: wgpu::VertexBufferLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs_entry),
            buffers: &[instance_layout],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_point"),
            targets: &[Some(additive_target(format))],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        cache: None,
        multiview: None,
    })
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("point_instances"),
        size: (capacity * std::mem::size_of::<PointInstance>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        visuals: &[SlotVisual],
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("points_shader"),
            source: wgpu::ShaderSource::Wgsl(crate::POINTS_WGSL.into()),
        });
        let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let grid_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("points_grid_bgl"),
            entries: &[
                helpers::sim_texture_entry(0, wgpu::ShaderStages::VERTEX),
                helpers::uniform_entry(1, stages),
            ],
        });
        let instance_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("points_instance_bgl"),
            entries: &[helpers::uniform_entry(1, stages)],
        });
        let grid_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("points_grid_pl"),
            bind_group_layouts: &[&grid_bgl],
            push_constant_ranges: &[],
        });
        let instance_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("points_instance_pl"),
            bind_group_layouts: &[&instance_bgl],
            push_constant_ranges: &[],
        });
        let grid_pipeline = create_point_pipeline(
            device,
            "points_grid_pipeline",
            &shader,
            &grid_pl,
            "vs_grid",
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SlotVisual>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &SLOT_VISUAL_ATTRS,
            },
            format,
        );
        let instance_pipeline = create_point_pipeline(
            device,
            "points_instance_pipeline",
            &shader,
            &instance_pl,
            "vs_instance",
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<PointInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &POINT_INSTANCE_ATTRS,
            },
            format,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point_uniforms"),
            size: std::mem::size_of::<PointUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let visual_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("slot_visuals"),
            size: (visuals.len().max(1) * std::mem::size_of::<SlotVisual>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !visuals.is_empty() {
            queue.write_buffer(&visual_buffer, 0, bytemuck::cast_slice(visuals));
        }
        let instance_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("points_instance_bg"),
            layout: &instance_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 1,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            grid_pipeline,
            instance_pipeline,
            grid_bgl,
            uniform_buffer,
            visual_buffer,
            slot_count: visuals.len() as u32,
            grid_bind_groups: [None, None],
            instance_bind_group,
            instance_buffer: create_instance_buffer(device, MIN_INSTANCE_CAPACITY),
            instance_capacity: MIN_INSTANCE_CAPACITY,
            instance_count: 0,
        }
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &PointUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Upload CPU-built instances, growing the buffer when needed.
    pub fn set_instances(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        instances: &[PointInstance],
    ) {
        if instances.len() > self.instance_capacity {
            let capacity = instances.len().next_power_of_two();
            self.instance_buffer.destroy();
            self.instance_buffer = create_instance_buffer(device, capacity);
            self.instance_capacity = capacity;
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(instances));
        }
        self.instance_count = instances.len() as u32;
    }

    fn ensure_grid_bind_group(
        &mut self,
        device: &wgpu::Device,
        bank: usize,
        positions: &wgpu::TextureView,
    ) {
        if self.grid_bind_groups[bank].is_some() {
            return;
        }
        let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("points_grid_bg"),
            layout: &self.grid_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(positions),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        self.grid_bind_groups[bank] = Some(bg);
    }

    /// Clear `target` and draw the grid (if `positions` is given) then the
    /// uploaded instances.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clear_color: wgpu::Color,
        positions: Option<(usize, &wgpu::TextureView)>,
    ) {
        if let Some((bank, view)) = positions {
            self.ensure_grid_bind_group(device, bank & 1, view);
        }
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("points_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some((bank, _)) = positions {
            if let Some(bg) = &self.grid_bind_groups[bank & 1] {
                rpass.set_pipeline(&self.grid_pipeline);
                rpass.set_bind_group(0, bg, &[]);
                rpass.set_vertex_buffer(0, self.visual_buffer.slice(..));
                rpass.draw(0..QUAD_VERTICES, 0..self.slot_count);
            }
        }
        if self.instance_count > 0 {
            rpass.set_pipeline(&self.instance_pipeline);
            rpass.set_bind_group(0, &self.instance_bind_group, &[]);
            rpass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            rpass.draw(0..QUAD_VERTICES, 0..self.instance_count);
        }
    }

    pub fn release(&mut self) {
        self.grid_bind_groups = [None, None];
        self.instance_count = 0;
        self.uniform_buffer.destroy();
        self.visual_buffer.destroy();
        self.instance_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{
        SHIMMER_DEPTH, SHIMMER_RATE, SIZE_ATTENUATION, SPARK_BOOST, VISIBILITY_THRESHOLD,
    };

    fn wgsl_const(name: &str) -> f32 {
        let prefix = format!("const {name}: f32 = ");
        crate::POINTS_WGSL
            .lines()
            .find_map(|l| l.strip_prefix(prefix.as_str()))
            .and_then(|v| v.trim_end_matches(';').trim().parse().ok())
            .unwrap_or_else(|| panic!("{name} missing from points.wgsl"))
    }

    #[test]
    fn shader_constants_match_the_host_side() {
        assert_eq!(wgsl_const("VISIBILITY_THRESHOLD"), VISIBILITY_THRESHOLD);
        assert_eq!(wgsl_const("SIZE_ATTENUATION"), SIZE_ATTENUATION);
        assert_eq!(wgsl_const("SHIMMER_RATE"), SHIMMER_RATE);
        assert_eq!(wgsl_const("SHIMMER_DEPTH"), SHIMMER_DEPTH);
        assert_eq!(wgsl_const("SPARK_BOOST"), SPARK_BOOST);
    }

    #[test]
    fn uniform_block_matches_the_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PointUniforms>(), 96);
    }
}
