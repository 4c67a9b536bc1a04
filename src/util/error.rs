//! Error types for the box tracer.

use thiserror::Error;

/// Main error type for pipeline and backend operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No camera was active when the cycle started
    #[error("No active camera: frame skipped")]
    NoActiveCamera,

    /// Presentation target has zero width or height
    #[error("Presentation target is empty: frame skipped")]
    EmptySurface,

    /// Tracer or resolver program is missing or failed to build
    #[error("Program unavailable: {0}")]
    ProgramUnavailable(String),

    /// A transient image was released that the pool does not consider outstanding
    #[error("Transient image #{0} is not outstanding in this pool")]
    UnknownTransient(u64),

    /// More transient images requested than the pool allows at once
    #[error("Transient pool exhausted: {limit} images already outstanding")]
    PoolExhausted { limit: usize },

    /// Settings value outside its documented range
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Scene description is malformed
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// Rendering device reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid scene error.
    pub fn scene(msg: impl Into<String>) -> Self {
        Self::InvalidScene(msg.into())
    }

    /// Whether the error only affects the current cycle.
    ///
    /// Callers driving a render loop skip the frame and keep going on these.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::NoActiveCamera | Self::EmptySurface)
    }
}

/// Result type alias for box tracer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::PoolExhausted { limit: 4 };
        assert!(e.to_string().contains("4"));

        let e = Error::UnknownTransient(17);
        assert!(e.to_string().contains("#17"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_frame_local() {
        assert!(Error::NoActiveCamera.is_frame_local());
        assert!(Error::EmptySurface.is_frame_local());
        assert!(!Error::ProgramUnavailable("tracer".into()).is_frame_local());
    }
}
