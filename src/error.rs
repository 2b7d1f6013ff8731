// ============================================================================
// ERRORS — failures of individual mask / SDF build steps
// ============================================================================
//
// None of these escape the public engine API: the engine logs them and leaves
// the affected region inert for the frame.

#[derive(Debug)]
pub enum MaskError {
    /// Region bounds collapsed to zero or non-finite extents.
    InvalidBounds(String),
    /// Region has no non-empty solid shapes.
    EmptyGeometry,
    /// No render device attached to the engine.
    NoDevice,
    Gpu(String),
    Io(std::io::Error),
    Scene(String),
}

impl std::fmt::Display for MaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskError::InvalidBounds(b) => write!(f, "invalid bounds: {}", b),
            MaskError::EmptyGeometry => write!(f, "region has no solid geometry"),
            MaskError::NoDevice => write!(f, "no render device available"),
            MaskError::Gpu(e) => write!(f, "GPU error: {}", e),
            MaskError::Io(e) => write!(f, "I/O error: {}", e),
            MaskError::Scene(e) => write!(f, "invalid scene description: {}", e),
        }
    }
}

impl std::error::Error for MaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaskError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaskError {
    fn from(e: std::io::Error) -> Self {
        MaskError::Io(e)
    }
}

impl From<serde_json::Error> for MaskError {
    fn from(e: serde_json::Error) -> Self {
        MaskError::Scene(e.to_string())
    }
}
