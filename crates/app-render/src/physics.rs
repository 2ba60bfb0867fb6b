//! Breath physics as two graph variables: `velocity` then `position`.

use app_core::{ComputeGraph, EngineError, HomePositionField, PhysicsUniforms, VariableId};

use crate::backend::{GpuTarget, PassShader, WgpuBackend};
use crate::helpers;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

pub struct BreathPhysicsPass {
    pub position: VariableId,
    pub velocity: VariableId,
    width: u32,
    home: GpuTarget,
    targets: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    released: bool,
}

impl BreathPhysicsPass {
    /// Upload the home field and register both physics variables on `graph`.
    ///
    /// Both passes read `[position, velocity]` from the previous bank, so the
    /// position pass integrates with last tick's velocity.
    pub fn register(
        graph: &mut ComputeGraph<WgpuBackend>,
        home: &HomePositionField,
    ) -> Result<Self, EngineError> {
        let width = graph.width();
        if home.width != width {
            return Err(EngineError::InvalidConfig(format!(
                "home field width {} does not match graph width {}",
                home.width, width
            )));
        }
        let backend = graph.backend();
        let device = backend.device();
        let home_tex = backend.upload("home_positions", width, &home.texels);
        let zeros = vec![0.0f32; home.capacity()];
        let (targets, targets_view) = helpers::create_data_texture(
            device,
            backend.queue(),
            "activation_targets",
            width,
            TARGET_FORMAT,
            bytemuck::cast_slice(&zeros),
        );
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("physics_uniforms"),
            size: std::mem::size_of::<PhysicsUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let initial_velocity = backend.upload("velocity_init", width, &home.initial_velocities());
        let initial_position = backend.upload("position_init", width, &home.initial_positions());

        let velocity = graph.add_variable(
            "velocity",
            PassShader {
                wgsl: crate::BREATH_PHYSICS_WGSL,
                entry_point: "fs_velocity",
                statics: vec![home_tex.view.clone()],
                uniforms: Some(uniform_buffer.clone()),
            },
            initial_velocity,
        )?;
        let position = graph.add_variable(
            "position",
            PassShader {
                wgsl: crate::BREATH_PHYSICS_WGSL,
                entry_point: "fs_position",
                statics: vec![targets_view],
                uniforms: Some(uniform_buffer.clone()),
            },
            initial_position,
        )?;
        graph.set_dependencies(velocity, &[position, velocity])?;
        graph.set_dependencies(position, &[position, velocity])?;

        Ok(Self {
            position,
            velocity,
            width,
            home: home_tex,
            targets,
            uniform_buffer,
            released: false,
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &PhysicsUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Replace the per-slot target life texture.
    pub fn upload_targets(&self, queue: &wgpu::Queue, targets: &[f32]) {
        let capacity = (self.width * self.width) as usize;
        if targets.len() != capacity {
            log::warn!(
                "[physics] ignoring {} activation targets for {} slots",
                targets.len(),
                capacity
            );
            return;
        }
        helpers::write_square_texture(
            queue,
            &self.targets,
            self.width,
            4,
            bytemuck::cast_slice(targets),
        );
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.home.texture.destroy();
        self.targets.destroy();
        self.uniform_buffer.destroy();
        self.released = true;
    }
}
