use super::brep::Brep;
use super::core::{BBox, Point3};
use super::curve::{Curve, Curve3};
use super::extrusion::Extrusion;
use super::mesh::Mesh;
use super::subd::SubD;
use super::surface::Surface;

/// Any piece of authoring-side geometry submitted for conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryValue {
    Point(Point3),
    Curve(Curve),
    Surface(Surface),
    Brep(Brep),
    Mesh(Mesh),
    SubD(SubD),
    Extrusion(Extrusion),
    PointCloud(Vec<Point3>),
}

impl GeometryValue {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Curve(_) => "curve",
            Self::Surface(_) => "surface",
            Self::Brep(_) => "brep",
            Self::Mesh(_) => "mesh",
            Self::SubD(_) => "subd",
            Self::Extrusion(_) => "extrusion",
            Self::PointCloud(_) => "point cloud",
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BBox> {
        match self {
            Self::Point(p) => Some(BBox::new(*p, *p)),
            Self::Curve(curve) => {
                let (a, b) = curve.domain();
                BBox::from_points((0..=16).map(|i| curve.point_at(a + (b - a) * f64::from(i) / 16.0)))
            }
            Self::Surface(surface) => BBox::from_points(surface.sample_points()),
            Self::Brep(brep) => brep.bounding_box(),
            Self::Mesh(mesh) => mesh.bounding_box(),
            Self::SubD(subd) => subd.bounding_box(),
            Self::Extrusion(extrusion) => {
                let (a, b) = extrusion.profile.domain();
                let base: Vec<Point3> = (0..=16)
                    .map(|i| extrusion.profile.point_at(a + (b - a) * f64::from(i) / 16.0))
                    .collect();
                let lifted = base.iter().map(|p| *p + extrusion.direction);
                BBox::from_points(base.iter().copied().chain(lifted))
            }
            Self::PointCloud(points) => BBox::from_points(points.iter().copied()),
        }
    }
}

macro_rules! impl_from_geometry {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for GeometryValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_geometry!(
    Point(Point3),
    Curve(Curve),
    Surface(Surface),
    Brep(Brep),
    Mesh(Mesh),
    SubD(SubD),
    Extrusion(Extrusion),
);
