//! Conversion between authoring geometry and the host kernel.
//!
//! [`ConversionSession`] is the entry point. Values are scaled to host units,
//! looked up in the content cache, and dispatched by kind: curves go through
//! the segmenter, solids through the assembler (with the interchange file as
//! a fallback) and meshes through the mesh adapter. Problems that do not stop
//! a conversion are reported as [`Diagnostic`]s rather than errors.

mod assembler;
mod cache;
mod config;
mod context;
mod decoder;
mod diagnostics;
mod error;
mod interchange;
mod mesh;
mod segmenter;
mod session;
mod signature;

pub use assembler::{Assembler, Assembly, brep_kind, host_surface};
pub use cache::{CacheStats, GeometryCache};
pub use config::{CachePolicy, ConfigError, EngineConfig, NgonConfig};
pub use context::ConversionContext;
pub use decoder::{decode_geometry, decode_solid};
pub use diagnostics::{Diagnostic, DiagnosticCallback, DiagnosticKind, Diagnostics, Severity};
pub use error::{ConversionError, InterchangeError};
pub use interchange::{export_brep, import_through_file};
pub use mesh::{decode_mesh, encode_mesh};
pub use segmenter::{Segmentation, Segmenter};
pub use session::{ContextScope, ConversionSession, KeepAliveRegion, SessionStats};
pub use signature::GeometrySignature;

#[cfg(test)]
mod tests;
