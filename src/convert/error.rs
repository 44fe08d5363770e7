use thiserror::Error;

use crate::host::HostError;

pub use crate::host::interchange::InterchangeError;

/// Failure of a whole `encode`/`decode` call. Anything recoverable is
/// reported as a [`super::Diagnostic`] instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("unsupported {kind}: {reason}")]
    UnsupportedGeometry { kind: &'static str, reason: String },
    #[error("host platform failure: {0}")]
    HostPlatform(#[from] HostError),
    #[error("tolerances are not available before the host is initialized")]
    ToleranceUnavailable,
    #[error("nothing could be produced from {kind}")]
    NothingProduced { kind: &'static str },
}

impl ConversionError {
    pub(crate) fn unsupported(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::UnsupportedGeometry {
            kind,
            reason: reason.into(),
        }
    }
}
