//! The host platform's native geometry and the services its kernel offers.
//!
//! The engine only ever talks to the host through [`HostKernel`]. The kernel
//! validates everything it is given against its own structural rules and
//! hands back immutable geometry; solids and meshes are assembled through the
//! builder traits. [`reference::ReferenceKernel`] is an in-process
//! implementation that enforces the same rules.
//!
//! All host geometry is expressed in host internal units (feet).

pub mod interchange;
pub mod reference;

use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::geom::{Arc3, Curve, Curve3, Ellipse3, Line3, NurbsCurve3, NurbsSurface, Point3, Vec3};
use crate::units::GeometryTolerance;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphicsStyleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub usize);

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Rejections raised by host kernel services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("invalid curve: {0}")]
    InvalidCurve(String),
    #[error("invalid knot vector: {0}")]
    InvalidKnots(String),
    #[error("invalid surface: {0}")]
    InvalidSurface(String),
    #[error("loop is not closed: gap of {gap} at coedge {coedge}")]
    LoopNotClosed { coedge: usize, gap: f64 },
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("interchange import failed: {0}")]
    Import(String),
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded, open curve primitives the host accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCurve {
    Line(Line3),
    Arc(Arc3),
    Ellipse(Ellipse3),
    NurbSpline(NurbsCurve3),
}

impl HostCurve {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Line(_) => "line",
            Self::Arc(_) => "arc",
            Self::Ellipse(_) => "ellipse",
            Self::NurbSpline(_) => "nurb spline",
        }
    }

    /// The same curve as authoring-side geometry.
    #[must_use]
    pub fn to_curve(&self) -> Curve {
        match self {
            Self::Line(line) => Curve::Line(*line),
            Self::Arc(arc) => Curve::Arc(*arc),
            Self::Ellipse(ellipse) => Curve::Ellipse(*ellipse),
            Self::NurbSpline(nurbs) => Curve::Nurbs(nurbs.clone()),
        }
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        match self {
            Self::Line(line) => Self::Line(line.reversed()),
            Self::Arc(arc) => Self::Arc(arc.reversed()),
            Self::Ellipse(ellipse) => Self::Ellipse(ellipse.reversed()),
            Self::NurbSpline(nurbs) => Self::NurbSpline(nurbs.reversed()),
        }
    }
}

impl Curve3 for HostCurve {
    fn point_at(&self, t: f64) -> Point3 {
        match self {
            Self::Line(c) => c.point_at(t),
            Self::Arc(c) => c.point_at(t),
            Self::Ellipse(c) => c.point_at(t),
            Self::NurbSpline(c) => c.point_at(t),
        }
    }

    fn domain(&self) -> (f64, f64) {
        match self {
            Self::Line(c) => c.domain(),
            Self::Arc(c) => c.domain(),
            Self::Ellipse(c) => c.domain(),
            Self::NurbSpline(c) => c.domain(),
        }
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        match self {
            Self::Line(c) => c.derivative_at(t),
            Self::Arc(c) => c.derivative_at(t),
            Self::Ellipse(c) => c.derivative_at(t),
            Self::NurbSpline(c) => c.derivative_at(t),
        }
    }

    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        match self {
            Self::Line(c) => c.length_between(t0, t1),
            Self::Arc(c) => c.length_between(t0, t1),
            Self::Ellipse(c) => c.length_between(t0, t1),
            Self::NurbSpline(c) => c.length_between(t0, t1),
        }
    }
}

/// Unbounded plane with orthonormal in-plane axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPlane {
    pub origin: Point3,
    pub x_dir: Vec3,
    pub y_dir: Vec3,
}

impl HostPlane {
    /// Plane with the given normal; the x axis is chosen arbitrarily.
    #[must_use]
    pub fn from_normal(origin: Point3, normal: Vec3) -> Option<Self> {
        let normal = normal.normalized()?;
        let x_dir = normal.any_perpendicular();
        Some(Self {
            origin,
            x_dir,
            y_dir: normal.cross(x_dir),
        })
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.x_dir.cross(self.y_dir)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostSurface {
    Plane(HostPlane),
    Nurbs(NurbsSurface),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrepKind {
    Solid,
    Void,
    OpenShell,
}

impl BrepKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Void => "void",
            Self::OpenShell => "open-shell",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "solid" => Some(Self::Solid),
            "void" => Some(Self::Void),
            "open-shell" => Some(Self::OpenShell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCoedge {
    pub edge: usize,
    pub reversed: bool,
}

/// Loops run counter-clockwise around the face normal, which is the surface
/// normal flipped when `reversed` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct HostFace {
    pub surface: HostSurface,
    pub reversed: bool,
    pub loops: Vec<Vec<HostCoedge>>,
    pub material: Option<MaterialId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostSolid {
    pub kind: BrepKind,
    pub edges: Vec<HostCurve>,
    pub faces: Vec<HostFace>,
}

impl HostSolid {
    /// Oriented curve of one coedge.
    #[must_use]
    pub fn coedge_curve(&self, coedge: &HostCoedge) -> Option<HostCurve> {
        let curve = self.edges.get(coedge.edge)?;
        Some(if coedge.reversed { curve.reversed() } else { curve.clone() })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostMesh {
    pub vertices: Vec<Point3>,
    pub triangles: Vec<[u32; 3]>,
    /// One entry per triangle.
    pub materials: Vec<Option<MaterialId>>,
}

/// Native geometry produced by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostGeometry {
    Point(Point3),
    Points(Vec<Point3>),
    Curves(Vec<HostCurve>),
    Solid(HostSolid),
    Mesh(HostMesh),
}

impl HostGeometry {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Points(_) => "points",
            Self::Curves(_) => "curves",
            Self::Solid(_) => "solid",
            Self::Mesh(_) => "mesh",
        }
    }
}

/// Shared handle to converted geometry; the conversion cache holds these weakly.
pub type HostHandle = Rc<HostGeometry>;

// ─────────────────────────────────────────────────────────────────────────────
// Scratch document
// ─────────────────────────────────────────────────────────────────────────────

/// Disposable document the interchange importer writes into.
#[derive(Debug, Default)]
pub struct ScratchDocument {
    elements: Vec<(ElementId, HostSolid)>,
    next_id: u64,
}

impl ScratchDocument {
    pub fn insert(&mut self, solid: HostSolid) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        self.elements.push((id, solid));
        id
    }

    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&HostSolid> {
        self.elements.iter().find(|(e, _)| *e == id).map(|(_, solid)| solid)
    }

    /// Deletes every element.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Kernel services
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`BrepBuilder::finish`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// Every face made it into a solid of the requested kind.
    Success(HostSolid),
    /// A usable result, but some geometry was discarded.
    Salvaged(HostSolid),
    /// Nothing usable.
    Nothing,
}

/// Incremental boundary-representation builder.
///
/// Faces own loops; loops own coedges that reference edges added with
/// [`BrepBuilder::add_edge`]. A face only becomes part of the result after
/// [`BrepBuilder::finish_face`].
pub trait BrepBuilder {
    fn add_face(&mut self, surface: HostSurface, reversed: bool) -> Result<FaceId, HostError>;
    fn set_face_material(&mut self, face: FaceId, material: MaterialId);
    fn add_loop(&mut self, face: FaceId) -> Result<LoopId, HostError>;
    fn add_edge(&mut self, curve: HostCurve) -> Result<EdgeId, HostError>;
    fn add_coedge(&mut self, loop_id: LoopId, edge: EdgeId, reversed: bool) -> Result<(), HostError>;
    fn finish_loop(&mut self, loop_id: LoopId) -> Result<(), HostError>;
    fn finish_face(&mut self, face: FaceId) -> Result<(), HostError>;
    /// Drops a face and its loops, finished or not.
    fn remove_face(&mut self, face: FaceId);
    fn finish(self: Box<Self>) -> BuildOutcome;
}

/// Builds a triangle mesh from polygonal facets.
pub trait MeshBuilder {
    fn add_facet(&mut self, vertices: &[Point3], material: Option<MaterialId>) -> Result<(), HostError>;
    fn finish(self: Box<Self>) -> Result<HostMesh, HostError>;
}

/// The host platform's geometry kernel.
pub trait HostKernel {
    /// Base tolerances in host units.
    fn tolerances(&self) -> GeometryTolerance;

    fn create_point(&self, point: Point3) -> Result<Point3, HostError>;

    /// Validates a curve against the host's rules and returns it.
    fn create_curve(&self, curve: HostCurve) -> Result<HostCurve, HostError>;

    fn create_surface(&self, surface: HostSurface) -> Result<HostSurface, HostError>;

    fn brep_builder(&self, kind: BrepKind) -> Box<dyn BrepBuilder + '_>;

    fn mesh_builder(&self) -> Box<dyn MeshBuilder + '_>;

    /// Imports a neutral interchange file into `scratch`, returning the new
    /// elements.
    fn import_interchange(&self, path: &Path, scratch: &mut ScratchDocument) -> Result<Vec<ElementId>, HostError>;
}
