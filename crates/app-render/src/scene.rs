//! Per-frame orchestration: presence, physics, then drawing.

use app_core::{
    slot_instance, BreathSample, Camera, ComputeGraph, CpuBreathPhysics, EngineError,
    GpuCapabilities, HomePositionField, PhysicsUniforms, PointInstance, PresenceMapper,
    PresenceSnapshot, SlotVisual, VisualConfig, FIREFLY_RING_SCALE, FIREFLY_SIZE,
};

use crate::backend::{WgpuBackend, VERTEX_TEXTURES_NEEDED};
use crate::physics::BreathPhysicsPass;
use crate::points::{PointUniforms, RenderPass};

pub const CAMERA_DISTANCE: f32 = 7.0;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.03,
    b: 0.07,
    a: 1.0,
};

/// Everything that changes from one frame to the next.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub breath: BreathSample,
    /// Seconds since the scene started.
    pub time: f32,
    /// Raw frame delta in seconds; clamped before integration.
    pub dt: f32,
    pub presence: Option<&'a PresenceSnapshot>,
    pub viewport: (u32, u32),
}

enum Simulation {
    Gpu {
        graph: ComputeGraph<WgpuBackend>,
        physics: BreathPhysicsPass,
    },
    Cpu {
        physics: CpuBreathPhysics,
        visuals: Vec<SlotVisual>,
    },
}

pub struct ParticleScene {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: VisualConfig,
    sim: Simulation,
    points: RenderPass,
    mapper: PresenceMapper,
    disposed: bool,
}

impl ParticleScene {
    /// Build the GPU-resident scene. Fails with `EngineError::Capability`
    /// when the device cannot run the compute graph.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        caps: GpuCapabilities,
        surface_format: wgpu::TextureFormat,
        config: VisualConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        caps.check(config.grid_width, VERTEX_TEXTURES_NEEDED)
            .map_err(EngineError::Capability)?;
        let home = HomePositionField::generate(&config);
        let backend = WgpuBackend::new(device.clone(), queue.clone(), caps);
        let mut graph = ComputeGraph::new(config.grid_width, backend);
        let mut physics = BreathPhysicsPass::register(&mut graph, &home)?;
        if let Err(e) = graph.init() {
            physics.release();
            return Err(e);
        }
        let points = RenderPass::new(device, queue, surface_format, &home.visuals);
        log::info!(
            "[scene] gpu simulation ready, {} slots",
            config.capacity()
        );
        Ok(Self::assemble(
            device,
            queue,
            config,
            Simulation::Gpu { graph, physics },
            points,
        ))
    }

    /// Fallback scene: physics on the CPU, every visible slot uploaded as an
    /// instance.
    pub fn with_cpu_physics(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        config: VisualConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let home = HomePositionField::generate(&config);
        let physics = CpuBreathPhysics::new(&home)?;
        let points = RenderPass::new(device, queue, surface_format, &[]);
        log::info!(
            "[scene] cpu simulation ready, {} slots",
            config.capacity()
        );
        Ok(Self::assemble(
            device,
            queue,
            config,
            Simulation::Cpu {
                physics,
                visuals: home.visuals,
            },
            points,
        ))
    }

    fn assemble(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: VisualConfig,
        sim: Simulation,
        points: RenderPass,
    ) -> Self {
        let mapper = PresenceMapper::new(&config);
        Self {
            device: device.clone(),
            queue: queue.clone(),
            config,
            sim,
            points,
            mapper,
            disposed: false,
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self.sim, Simulation::Gpu { .. })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    pub fn mapper(&self) -> &PresenceMapper {
        &self.mapper
    }

    pub fn active_count(&self) -> usize {
        self.mapper.active()
    }

    /// Advance one tick and draw it into `target`.
    pub fn render(&mut self, target: &wgpu::TextureView, input: FrameInput) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        if let Some(snapshot) = input.presence {
            if let Some(change) = self.mapper.apply(snapshot, input.time) {
                log::info!("[scene] {:?}", change);
            }
        }
        self.mapper.tick(input.time);
        let dirty = self.mapper.targets_mut().take_dirty();
        let uniforms = PhysicsUniforms::new(&self.config, input.time, input.dt, input.breath);

        let mut instances: Vec<PointInstance> = Vec::new();
        match &mut self.sim {
            Simulation::Gpu { graph, physics } => {
                if dirty {
                    physics.upload_targets(&self.queue, self.mapper.targets().as_slice());
                }
                physics.write_uniforms(&self.queue, &uniforms);
                graph.compute()?;
            }
            Simulation::Cpu { physics, visuals } => {
                if dirty {
                    physics.set_target_life(self.mapper.targets().as_slice());
                }
                physics.step(uniforms)?;
                let spark = self.mapper.spark();
                instances.extend(
                    physics
                        .positions()
                        .iter()
                        .zip(visuals.iter())
                        .enumerate()
                        .filter_map(|(slot, (texel, visual))| {
                            let boost = spark
                                .filter(|s| (s.first_slot..s.end_slot).contains(&(slot as u32)))
                                .map_or(0.0, |s| s.strength(input.time));
                            slot_instance(*texel, visual, uniforms.breath_value, input.time, boost)
                        }),
                );
            }
        }

        let ring_radius = self.config.expanded_radius * FIREFLY_RING_SCALE;
        instances.extend(
            self.mapper
                .fireflies()
                .instances(input.time, ring_radius, FIREFLY_SIZE),
        );
        self.points.set_instances(&self.device, &self.queue, &instances);
        self.points
            .write_uniforms(&self.queue, &self.point_uniforms(&input, uniforms.breath_value));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });
        let positions = match &self.sim {
            Simulation::Gpu { graph, physics } => graph
                .current_target(physics.position)
                .map(|t| (graph.current_index(), &t.view)),
            Simulation::Cpu { .. } => None,
        };
        self.points
            .draw(&self.device, &mut encoder, target, CLEAR_COLOR, positions);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn point_uniforms(&self, input: &FrameInput, breath_value: f32) -> PointUniforms {
        let (w, h) = input.viewport;
        let aspect = w.max(1) as f32 / h.max(1) as f32;
        let camera = Camera::looking_at_origin(CAMERA_DISTANCE, aspect);
        let (spark_first, spark_end, spark_strength) = self
            .mapper
            .spark()
            .map_or((0, 0, 0.0), |s| (s.first_slot, s.end_slot, s.strength(input.time)));
        PointUniforms {
            view_proj: camera.view_proj().to_cols_array_2d(),
            viewport: [w.max(1) as f32, h.max(1) as f32],
            time: input.time,
            breath_value,
            spark_first,
            spark_end,
            spark_strength,
            grid_width: self.config.grid_width,
        }
    }

    /// Release every GPU resource. Later `render` calls return `Disposed`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        match &mut self.sim {
            Simulation::Gpu { graph, physics } => {
                graph.dispose();
                physics.release();
            }
            Simulation::Cpu { physics, .. } => physics.dispose(),
        }
        self.points.release();
        self.disposed = true;
        log::info!("[scene] disposed");
    }
}

impl Drop for ParticleScene {
    fn drop(&mut self) {
        self.dispose();
    }
}
