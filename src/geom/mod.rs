//! Authoring-side geometry model.
//!
//! Everything submitted for conversion is expressed with these types; the
//! host-side counterparts live in [`crate::host`].

mod brep;
mod core;
mod curve;
mod error;
mod extrusion;
mod mesh;
mod subd;
mod surface;
mod value;

pub use brep::{Brep, BrepEdge, BrepFace, BrepLoop, BrepTrim, LoopKind, SolidOrientation, TrimKind};
pub use core::{BBox, Point3, Tolerance, Vec3};
pub use curve::{Arc3, Conic, Curve, Curve3, Ellipse3, Line3, NurbsCurve3, Polyline3};
pub use error::GeometryError;
pub use extrusion::Extrusion;
pub use mesh::{Mesh, MeshFace, Ngon};
pub use subd::SubD;
pub use surface::{NurbsSurface, PlaneSurface, Surface};
pub use value::GeometryValue;

pub(crate) use brep::newell_normal;

#[cfg(test)]
mod tests;
