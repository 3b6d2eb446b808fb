use thiserror::Error;

/// Failures raised by the parameter store and the graphics collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LabError {
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{name}` expects a {expected} value")]
    ValueKindMismatch { name: String, expected: &'static str },
    #[error("parameter `{0}` only accepts finite values")]
    NonFiniteValue(String),
    #[error("failed to acquire drawing surface: {0}")]
    SurfaceAcquisition(String),
    #[error("draw call failed: {0}")]
    Draw(String),
    #[error("failed to compile shader program `{label}`: {reason}")]
    ProgramCompilation { label: String, reason: String },
    #[error("failed to load environment `{label}`: {reason}")]
    EnvironmentLoad { label: String, reason: String },
    #[error("failed to upload mesh `{label}`: {reason}")]
    MeshUpload { label: String, reason: String },
}
