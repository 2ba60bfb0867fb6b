use thiserror::Error;

/// Errors reported by the simulation core.
///
/// Capability failures come back from [`crate::ComputeGraph::init`] exactly
/// once; the caller is expected to stop using the graph and switch to its
/// fallback path. Everything else is a misuse of the API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("GPU capability missing: {0}")]
    Capability(String),
    #[error("compute graph is not initialized")]
    NotReady,
    #[error("compute graph has been disposed")]
    Disposed,
    #[error("compute graph is already initialized")]
    AlreadyInitialized,
    #[error("variable `{0}` is already registered")]
    DuplicateVariable(String),
    #[error("unknown variable id {0}")]
    UnknownVariable(usize),
    #[error("variable `{variable}` has an invalid dependency: {reason}")]
    InvalidDependency { variable: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid breathing pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
