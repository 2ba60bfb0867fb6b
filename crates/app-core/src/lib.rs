pub mod breath;
pub mod capability;
pub mod config;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod firefly;
pub mod graph;
pub mod home;
pub mod physics;
pub mod presence;
pub mod state;

pub use breath::*;
pub use capability::*;
pub use config::*;
pub use constants::*;
pub use cpu::*;
pub use error::EngineError;
pub use firefly::*;
pub use graph::*;
pub use home::*;
pub use physics::*;
pub use presence::*;
pub use state::*;
