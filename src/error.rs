//! Host-side error type.
//!
//! Nothing in here is visible to the shaders: a bad address on the GPU side
//! produces garbage pixels, not an error. These variants cover the places
//! where the host can still notice a problem before a frame is submitted.

use thiserror::Error;

/// Result type for fallible host-side operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while packing, generating shaders, or talking to a backend.
#[derive(Debug, Error)]
pub enum Error {
    /// A shader stage failed to compile.
    #[error("shader compile error in {stage}: {log}")]
    ShaderCompile {
        /// `"vertex"` or `"fragment"`.
        stage: &'static str,
        /// Driver info log.
        log: String,
    },

    /// A program failed to link.
    #[error("program link error: {0}")]
    ProgramLink(String),

    /// A uniform the program is expected to expose was optimized out or
    /// misnamed.
    #[error("uniform `{0}` missing from program")]
    MissingUniform(&'static str),

    /// A GL object could not be created.
    #[error("gl error: {0}")]
    Gl(String),

    /// The cache would need more rows than the configured maximum.
    #[error("resource cache full: {requested} rows requested, {max_rows} allowed")]
    CacheFull {
        /// Rows required to hold the allocation.
        requested: usize,
        /// Configured row limit.
        max_rows: usize,
    },

    /// A record wider than one texture row cannot be addressed.
    #[error("record of {0} texel-quads does not fit in a single row")]
    RecordTooWide(usize),

    /// A layer transform has no inverse.
    #[error("layer transform is not invertible")]
    SingularTransform,

    /// A gradient needs at least two stops.
    #[error("gradient needs at least two stops, got {0}")]
    NotEnoughStops(usize),

    /// Two mutually exclusive shader features were requested together.
    #[error("conflicting shader features: {0} and {1}")]
    ConflictingFeatures(&'static str, &'static str),

    /// The requested combination has no implementation.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Gl(message)
    }
}
