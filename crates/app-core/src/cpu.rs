use crate::graph::{ComputeBackend, ComputeGraph, VariableId};
use crate::error::Result;
use crate::home::HomePositionField;
use crate::physics::{position_kernel, velocity_kernel, PhysicsParams, PhysicsUniforms};

pub type CpuKernel<P> = Box<dyn Fn(&P, usize, &[&[[f32; 4]]]) -> [f32; 4]>;

#[derive(Clone, Debug, PartialEq)]
pub struct CpuTarget {
    pub texels: Vec<[f32; 4]>,
}

pub struct CpuPass<P> {
    kernel: CpuKernel<P>,
    input_count: usize,
}

/// Host backend parameterised by the side data its kernels read.
pub struct CpuBackend<P> {
    pub params: P,
    allocated: usize,
    released: usize,
    passes_run: u64,
}

impl<P> CpuBackend<P> {
    pub fn new(params: P) -> Self {
        Self {
            params,
            allocated: 0,
            released: 0,
            passes_run: 0,
        }
    }

    pub fn targets_allocated(&self) -> usize {
        self.allocated
    }

    pub fn targets_released(&self) -> usize {
        self.released
    }

    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }
}

impl<P> ComputeBackend for CpuBackend<P> {
    type Target = CpuTarget;
    type Source = Vec<[f32; 4]>;
    type Shader = CpuKernel<P>;
    type Pass = CpuPass<P>;

    fn check_capabilities(&self, width: u32) -> std::result::Result<(), String> {
        if width == 0 {
            return Err("grid width must be non-zero".into());
        }
        Ok(())
    }

    fn create_target(&mut self, _label: &str, width: u32) -> CpuTarget {
        self.allocated += 1;
        CpuTarget {
            texels: vec![[0.0; 4]; (width as usize) * (width as usize)],
        }
    }

    fn seed_target(&mut self, source: &Vec<[f32; 4]>, target: &mut CpuTarget) {
        let n = target.texels.len().min(source.len());
        target.texels[..n].copy_from_slice(&source[..n]);
    }

    fn create_pass(&mut self, _label: &str, shader: CpuKernel<P>, input_count: usize) -> CpuPass<P> {
        CpuPass {
            kernel: shader,
            input_count,
        }
    }

    fn run_pass(&mut self, pass: &CpuPass<P>, inputs: &[&CpuTarget], output: &mut CpuTarget) {
        debug_assert_eq!(inputs.len(), pass.input_count);
        let views: Vec<&[[f32; 4]]> = inputs.iter().map(|t| t.texels.as_slice()).collect();
        for (texel, out) in output.texels.iter_mut().enumerate() {
            *out = (pass.kernel)(&self.params, texel, &views);
        }
        self.passes_run += 1;
    }

    fn release_target(&mut self, _target: CpuTarget) {
        self.released += 1;
    }

    fn release_pass(&mut self, _pass: CpuPass<P>) {}

    fn release_source(&mut self, _source: Vec<[f32; 4]>) {}
}

/// Breath physics wired onto a CPU graph: "velocity" then "position".
pub struct CpuBreathPhysics {
    pub graph: ComputeGraph<CpuBackend<PhysicsParams>>,
    pub position: VariableId,
    pub velocity: VariableId,
}

impl CpuBreathPhysics {
    pub fn new(home: &HomePositionField) -> Result<Self> {
        let params = PhysicsParams {
            uniforms: PhysicsUniforms::default(),
            home: home.texels.clone(),
            target_life: vec![0.0; home.capacity()],
        };
        let mut graph = ComputeGraph::new(home.width, CpuBackend::new(params));
        let velocity = graph.add_variable(
            "velocity",
            Box::new(velocity_kernel),
            home.initial_velocities(),
        )?;
        let position = graph.add_variable(
            "position",
            Box::new(position_kernel),
            home.initial_positions(),
        )?;
        graph.set_dependencies(velocity, &[position, velocity])?;
        graph.set_dependencies(position, &[position, velocity])?;
        graph.init()?;
        Ok(Self {
            graph,
            position,
            velocity,
        })
    }

    pub fn set_target_life(&mut self, targets: &[f32]) {
        let dst = &mut self.graph.backend_mut().params.target_life;
        let n = dst.len().min(targets.len());
        dst[..n].copy_from_slice(&targets[..n]);
    }

    pub fn step(&mut self, uniforms: PhysicsUniforms) -> Result<()> {
        self.graph.backend_mut().params.uniforms = uniforms;
        self.graph.compute()
    }

    /// Latest position + life texels.
    pub fn positions(&self) -> &[[f32; 4]] {
        self.graph
            .current_target(self.position)
            .map(|t| t.texels.as_slice())
            .unwrap_or(&[])
    }

    pub fn velocities(&self) -> &[[f32; 4]] {
        self.graph
            .current_target(self.velocity)
            .map(|t| t.texels.as_slice())
            .unwrap_or(&[])
    }

    pub fn dispose(&mut self) {
        self.graph.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualConfig;

    #[test]
    fn breath_physics_accounts_for_every_target() {
        let cfg = VisualConfig {
            grid_width: 4,
            ..Default::default()
        };
        let mut physics = CpuBreathPhysics::new(&HomePositionField::generate(&cfg)).unwrap();
        // position and velocity, two banks each
        assert_eq!(physics.graph.backend().targets_allocated(), 4);
        for _ in 0..3 {
            physics.step(PhysicsUniforms::default()).unwrap();
        }
        assert_eq!(physics.graph.backend().passes_run(), 6);
        assert_eq!(physics.positions().len(), 16);

        physics.dispose();
        physics.dispose();
        assert_eq!(physics.graph.backend().targets_released(), 4);
        assert!(physics.positions().is_empty());
        assert!(physics.step(PhysicsUniforms::default()).is_err());
    }
}
