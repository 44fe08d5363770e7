use thiserror::Error;

/// Errors raised while constructing authoring-side geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A NURBS curve or surface with inconsistent degree, point, weight or knot data.
    #[error("invalid nurbs data: {0}")]
    InvalidNurbs(String),
    /// Fewer points than the primitive needs.
    #[error("{kind} requires at least {required} points, got {actual}")]
    TooFewPoints {
        kind: &'static str,
        required: usize,
        actual: usize,
    },
    /// A face, loop or trim refers to something that does not exist.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    /// Non-finite or degenerate input.
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}
