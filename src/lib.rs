#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Geometry interchange between an authoring NURBS kernel and a host B-Rep
//! kernel.
//!
//! Source geometry ([`geom`]) is scaled into host units ([`units`]), cleaned
//! up for the host's stricter rules ([`knots`]) and rebuilt through the host
//! kernel interface ([`host`]) by a [`convert::ConversionSession`]. The same
//! session decodes host geometry back into source geometry.

pub mod convert;
pub mod geom;
pub mod host;
pub mod knots;
pub mod units;

pub use convert::{ConversionError, ConversionSession, EngineConfig};
pub use geom::GeometryValue;
pub use host::{HostGeometry, HostKernel};
