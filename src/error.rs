//! Error taxonomy for map loading and selection-function queries.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SfError {
    /// Construction was asked for a resolution no packaged map exists at.
    #[error("unsupported nside {0}: must be 8 or 32")]
    UnsupportedNside(u32),

    /// The map file was readable but its contents are not a valid
    /// completeness map.
    #[error("malformed map file: {0}")]
    MalformedMap(String),

    /// A sky-slice request outside the stored magnitude range. Point
    /// queries clamp instead; slices fail loudly.
    #[error("magnitude {mag} outside stored range [{min}, {max}]")]
    MagnitudeOutOfRange { mag: f64, min: f64, max: f64 },

    /// Query input slices must all have the same length.
    #[error("input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
