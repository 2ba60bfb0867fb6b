pub mod backend;
pub mod helpers;
pub mod physics;
pub mod points;
pub mod scene;

pub use backend::{capabilities_for, GpuPass, GpuTarget, PassShader, WgpuBackend};
pub use physics::BreathPhysicsPass;
pub use points::{PointUniforms, RenderPass};
pub use scene::{FrameInput, ParticleScene, CAMERA_DISTANCE};

pub static PASSTHROUGH_WGSL: &str = include_str!("../shaders/passthrough.wgsl");
pub static BREATH_PHYSICS_WGSL: &str = include_str!("../shaders/breath_physics.wgsl");
pub static POINTS_WGSL: &str = include_str!("../shaders/points.wgsl");
