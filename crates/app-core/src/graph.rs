use smallvec::SmallVec;

use crate::error::{EngineError, Result};

/// Storage and execution provider for a [`ComputeGraph`].
pub trait ComputeBackend {
    type Target;
    type Source;
    type Shader;
    type Pass;

    fn check_capabilities(&self, width: u32) -> std::result::Result<(), String>;
    fn create_target(&mut self, label: &str, width: u32) -> Self::Target;
    /// Copy `source` into `target` with a pass-through pass.
    fn seed_target(&mut self, source: &Self::Source, target: &mut Self::Target);
    fn create_pass(&mut self, label: &str, shader: Self::Shader, input_count: usize) -> Self::Pass;
    fn begin_batch(&mut self) {}
    fn run_pass(&mut self, pass: &Self::Pass, inputs: &[&Self::Target], output: &mut Self::Target);
    fn end_batch(&mut self) {}
    fn release_target(&mut self, target: Self::Target);
    fn release_pass(&mut self, pass: Self::Pass);
    fn release_source(&mut self, source: Self::Source);
}

/// Handle to a registered variable; index into the graph's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VariableId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
    Building,
    Ready,
    Failed,
    Disposed,
}

struct ComputeVariable<B: ComputeBackend> {
    name: String,
    dependencies: SmallVec<[VariableId; 4]>,
    shader: Option<B::Shader>,
    pass: Option<B::Pass>,
    initial: Option<B::Source>,
}

// Two banks of targets, one per variable each. `compute()` reads the current
// bank, writes the other and flips `current`, so a pass never samples its output.
pub struct ComputeGraph<B: ComputeBackend> {
    backend: B,
    width: u32,
    variables: Vec<ComputeVariable<B>>,
    banks: [Vec<B::Target>; 2],
    current: usize,
    state: GraphState,
}

impl<B: ComputeBackend> ComputeGraph<B> {
    pub fn new(width: u32, backend: B) -> Self {
        Self {
            backend,
            width,
            variables: Vec::new(),
            banks: [Vec::new(), Vec::new()],
            current: 0,
            state: GraphState::Building,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == GraphState::Ready
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_name(&self, id: VariableId) -> Option<&str> {
        self.variables.get(id.0).map(|v| v.name.as_str())
    }

    pub fn find_variable(&self, name: &str) -> Option<VariableId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VariableId)
    }

    pub fn add_variable(
        &mut self,
        name: &str,
        shader: B::Shader,
        initial: B::Source,
    ) -> Result<VariableId> {
        match self.state {
            GraphState::Building => {}
            GraphState::Disposed => return Err(EngineError::Disposed),
            _ => return Err(EngineError::AlreadyInitialized),
        }
        if self.find_variable(name).is_some() {
            return Err(EngineError::DuplicateVariable(name.to_string()));
        }
        let mut a = self.backend.create_target(&format!("{name}_a"), self.width);
        let mut b = self.backend.create_target(&format!("{name}_b"), self.width);
        self.backend.seed_target(&initial, &mut a);
        self.backend.seed_target(&initial, &mut b);
        self.banks[0].push(a);
        self.banks[1].push(b);
        self.variables.push(ComputeVariable {
            name: name.to_string(),
            dependencies: SmallVec::new(),
            shader: Some(shader),
            pass: None,
            initial: Some(initial),
        });
        Ok(VariableId(self.variables.len() - 1))
    }

    pub fn set_dependencies(&mut self, variable: VariableId, deps: &[VariableId]) -> Result<()> {
        if self.state == GraphState::Disposed {
            return Err(EngineError::Disposed);
        }
        if self.state != GraphState::Building {
            return Err(EngineError::AlreadyInitialized);
        }
        let var = self
            .variables
            .get_mut(variable.0)
            .ok_or(EngineError::UnknownVariable(variable.0))?;
        var.dependencies = deps.iter().copied().collect();
        Ok(())
    }

    /// On error the graph refuses to compute and callers switch to a fallback.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            GraphState::Ready => return Ok(()),
            GraphState::Disposed => return Err(EngineError::Disposed),
            GraphState::Failed => return Err(EngineError::NotReady),
            GraphState::Building => {}
        }
        if let Err(msg) = self.backend.check_capabilities(self.width) {
            log::warn!("[graph] capability check failed: {}", msg);
            self.state = GraphState::Failed;
            return Err(EngineError::Capability(msg));
        }
        if let Err(e) = self.validate_dependencies() {
            self.state = GraphState::Failed;
            return Err(e);
        }
        for var in &mut self.variables {
            if let Some(shader) = var.shader.take() {
                let pass = self
                    .backend
                    .create_pass(&var.name, shader, var.dependencies.len());
                var.pass = Some(pass);
            }
        }
        self.state = GraphState::Ready;
        log::info!(
            "[graph] ready: {} variables at {}x{}",
            self.variables.len(),
            self.width,
            self.width
        );
        Ok(())
    }

    // Mutual dependencies are fine: every read comes from the previous bank.
    fn validate_dependencies(&self) -> Result<()> {
        let count = self.variables.len();
        for var in &self.variables {
            for (i, dep) in var.dependencies.iter().enumerate() {
                if dep.0 >= count {
                    return Err(EngineError::InvalidDependency {
                        variable: var.name.clone(),
                        reason: format!("id {} is not registered in this graph", dep.0),
                    });
                }
                if var.dependencies[..i].contains(dep) {
                    return Err(EngineError::InvalidDependency {
                        variable: var.name.clone(),
                        reason: format!("`{}` listed twice", self.variables[dep.0].name),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn compute(&mut self) -> Result<()> {
        match self.state {
            GraphState::Ready => {}
            GraphState::Disposed => return Err(EngineError::Disposed),
            _ => return Err(EngineError::NotReady),
        }
        let Self {
            backend,
            variables,
            banks,
            current,
            ..
        } = self;
        let (bank0, bank1) = banks.split_at_mut(1);
        let (read, write) = if *current == 0 {
            (&bank0[0], &mut bank1[0])
        } else {
            (&bank1[0], &mut bank0[0])
        };
        backend.begin_batch();
        for (idx, var) in variables.iter().enumerate() {
            let Some(pass) = var.pass.as_ref() else {
                continue;
            };
            let inputs: SmallVec<[&B::Target; 4]> =
                var.dependencies.iter().map(|d| &read[d.0]).collect();
            backend.run_pass(pass, &inputs, &mut write[idx]);
        }
        backend.end_batch();
        *current ^= 1;
        Ok(())
    }

    /// Latest result of `variable`; valid between `compute()` calls.
    pub fn current_target(&self, variable: VariableId) -> Option<&B::Target> {
        self.banks[self.current].get(variable.0)
    }

    /// Release every target, pass and initial source. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.state == GraphState::Disposed {
            return;
        }
        for bank in &mut self.banks {
            for target in bank.drain(..) {
                self.backend.release_target(target);
            }
        }
        for var in &mut self.variables {
            if let Some(pass) = var.pass.take() {
                self.backend.release_pass(pass);
            }
            if let Some(source) = var.initial.take() {
                self.backend.release_source(source);
            }
            var.shader = None;
        }
        self.state = GraphState::Disposed;
        log::info!("[graph] disposed {} variables", self.variables.len());
    }
}

impl<B: ComputeBackend> Drop for ComputeGraph<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
