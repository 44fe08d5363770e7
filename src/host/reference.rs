//! In-process host kernel enforcing the host's structural rules.
//!
//! Curves must be bounded, open, at least one short-curve tolerance long and,
//! for NURBS, carry bit-exact knot repeats, a single span below degree three
//! and no interior kink. Loops must close within the short-curve tolerance,
//! and a closed solid must use every edge twice in opposite directions.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use crate::geom::{Curve3, Line3, NurbsCurve3, NurbsSurface, Point3, Tolerance, newell_normal};
use crate::units::GeometryTolerance;

use super::interchange::InterchangeDocument;
use super::{
    BrepBuilder, BrepKind, BuildOutcome, EdgeId, ElementId, FaceId, HostCoedge, HostCurve, HostError, HostFace,
    HostKernel, HostMesh, HostPlane, HostSolid, HostSurface, LoopId, MaterialId, MeshBuilder, ScratchDocument,
};

/// Adjacent knots closer than this, but not equal, are rejected.
const KNOT_RESOLUTION: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ReferenceKernel {
    tolerances: GeometryTolerance,
}

impl Default for ReferenceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceKernel {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tolerances: GeometryTolerance::host_defaults(),
        }
    }

    #[must_use]
    pub const fn with_tolerances(tolerances: GeometryTolerance) -> Self {
        Self { tolerances }
    }

    fn check_knots(knots: &[f64], degree: usize, count: usize, max_interior: usize) -> Result<(), HostError> {
        if knots.len() != count + degree + 1 {
            return Err(HostError::InvalidKnots(format!(
                "expected {} knots, got {}",
                count + degree + 1,
                knots.len()
            )));
        }
        let mut run = 1;
        for (i, w) in knots.windows(2).enumerate() {
            let gap = w[1] - w[0];
            if gap < 0.0 || !gap.is_finite() {
                return Err(HostError::InvalidKnots(format!("knot {} decreases", i + 1)));
            }
            if gap > 0.0 && gap <= KNOT_RESOLUTION * w[0].abs().max(1.0) {
                return Err(HostError::InvalidKnots(format!(
                    "knots {i} and {} are nearly but not exactly equal",
                    i + 1
                )));
            }
            run = if gap == 0.0 { run + 1 } else { 1 };
            let interior = i + 1 > degree && i + 1 < count;
            if interior && run > max_interior {
                return Err(HostError::InvalidKnots(format!(
                    "interior knot {} has multiplicity {run}",
                    w[1]
                )));
            }
        }
        Ok(())
    }

    fn check_nurb_spline(nurbs: &NurbsCurve3) -> Result<(), HostError> {
        let p = nurbs.degree;
        let n = nurbs.control_points.len();
        if p == 0 || n <= p {
            return Err(HostError::InvalidCurve(format!("degree {p} with {n} control points")));
        }
        Self::check_knots(&nurbs.knots, p, n, p.saturating_sub(1))?;
        if p < 3 && nurbs.span_count() > 1 {
            return Err(HostError::InvalidCurve(format!(
                "degree {p} splines must have a single span, got {}",
                nurbs.span_count()
            )));
        }
        if let Some(weights) = &nurbs.weights {
            if weights.len() != n || !weights.iter().all(|w| positive(*w)) {
                return Err(HostError::InvalidCurve("weights must be positive".to_owned()));
            }
        }
        Ok(())
    }

    fn check_surface_knots(surface: &NurbsSurface) -> Result<(), HostError> {
        Self::check_knots(&surface.knots_u, surface.degree_u, surface.u_count, surface.degree_u)
            .and_then(|()| Self::check_knots(&surface.knots_v, surface.degree_v, surface.v_count, surface.degree_v))
            .map_err(|e| HostError::InvalidSurface(e.to_string()))
    }
}

impl HostKernel for ReferenceKernel {
    fn tolerances(&self) -> GeometryTolerance {
        self.tolerances
    }

    fn create_point(&self, point: Point3) -> Result<Point3, HostError> {
        if point.is_finite() {
            Ok(point)
        } else {
            Err(HostError::InvalidCurve("point is not finite".to_owned()))
        }
    }

    fn create_curve(&self, curve: HostCurve) -> Result<HostCurve, HostError> {
        match &curve {
            HostCurve::Line(line) => {
                if !line.start.is_finite() || !line.end.is_finite() {
                    return Err(HostError::InvalidCurve("line is not bounded".to_owned()));
                }
            }
            HostCurve::Arc(arc) => {
                if !positive(arc.radius) || !positive(arc.sweep_angle) {
                    return Err(HostError::InvalidCurve("arc needs a positive radius and sweep".to_owned()));
                }
                if arc.sweep_angle >= TAU - Tolerance::DEFAULT.eps {
                    return Err(HostError::InvalidCurve("closed arcs are not supported".to_owned()));
                }
            }
            HostCurve::Ellipse(ellipse) => {
                if !positive(ellipse.radius_x) || !positive(ellipse.radius_y) || !positive(ellipse.sweep_angle) {
                    return Err(HostError::InvalidCurve("ellipse needs positive radii and sweep".to_owned()));
                }
                if ellipse.sweep_angle >= TAU - Tolerance::DEFAULT.eps {
                    return Err(HostError::InvalidCurve("closed ellipses are not supported".to_owned()));
                }
            }
            HostCurve::NurbSpline(nurbs) => Self::check_nurb_spline(nurbs)?,
        }

        let length = curve.length();
        if !(length >= self.tolerances.short_curve) {
            return Err(HostError::InvalidCurve(format!(
                "{} of length {length} is shorter than {}",
                curve.kind_name(),
                self.tolerances.short_curve
            )));
        }
        if curve.start_point().distance_to(curve.end_point()) <= self.tolerances.short_curve {
            return Err(HostError::InvalidCurve(format!("{} is closed", curve.kind_name())));
        }
        Ok(curve)
    }

    fn create_surface(&self, surface: HostSurface) -> Result<HostSurface, HostError> {
        match &surface {
            HostSurface::Plane(plane) => {
                let orthonormal = (plane.x_dir.length() - 1.0).abs() < 1e-9
                    && (plane.y_dir.length() - 1.0).abs() < 1e-9
                    && plane.x_dir.dot(plane.y_dir).abs() < 1e-9;
                if !orthonormal || !plane.origin.is_finite() {
                    return Err(HostError::InvalidSurface("plane axes must be orthonormal".to_owned()));
                }
            }
            HostSurface::Nurbs(nurbs) => {
                Self::check_surface_knots(nurbs)?;
                if nurbs.control_points.len() != nurbs.u_count * nurbs.v_count {
                    return Err(HostError::InvalidSurface("control net size mismatch".to_owned()));
                }
            }
        }
        Ok(surface)
    }

    fn brep_builder(&self, kind: BrepKind) -> Box<dyn BrepBuilder + '_> {
        Box::new(ReferenceBrepBuilder::new(self, kind))
    }

    fn mesh_builder(&self) -> Box<dyn MeshBuilder + '_> {
        Box::new(ReferenceMeshBuilder::default())
    }

    fn import_interchange(&self, path: &Path, scratch: &mut ScratchDocument) -> Result<Vec<ElementId>, HostError> {
        let text = fs::read_to_string(path)?;
        let document = InterchangeDocument::from_xml_str(&text).map_err(|e| HostError::Import(e.to_string()))?;
        log::debug!(
            "importing {} solid(s) from {}",
            document.solids.len(),
            path.display()
        );

        let mut ids = Vec::with_capacity(document.solids.len());
        for solid in &document.solids {
            let kind = solid
                .brep_kind()
                .ok_or_else(|| HostError::Import(format!("unknown solid kind {:?}", solid.kind)))?;
            let mut welder = Welder::new(self.tolerances.vertex);
            let mut faces = Vec::with_capacity(solid.faces.len());
            for face in &solid.faces {
                let chains: Vec<Vec<Point3>> = face
                    .loops
                    .iter()
                    .map(|l| l.points.iter().map(|p| Point3::from(*p)).collect())
                    .collect();
                let surface = match face.surface().map_err(|e| HostError::Import(e.to_string()))? {
                    Some(surface) => surface,
                    None => fitted_plane(&chains, self.tolerances.short_curve)?,
                };
                let loops = chains
                    .iter()
                    .map(|chain| welder.chain(chain))
                    .filter(|l| l.len() >= 2)
                    .collect();
                faces.push(HostFace {
                    surface,
                    reversed: face.reversed,
                    loops,
                    material: None,
                });
            }
            if faces.is_empty() {
                continue;
            }
            ids.push(scratch.insert(HostSolid {
                kind,
                edges: welder.edges,
                faces,
            }));
        }
        if ids.is_empty() {
            return Err(HostError::Import("document holds no geometry".to_owned()));
        }
        Ok(ids)
    }
}

/// Plane through the outer chain, for faces imported without a surface.
/// Chains that leave the plane by more than `tolerance` are refused.
fn fitted_plane(chains: &[Vec<Point3>], tolerance: f64) -> Result<HostSurface, HostError> {
    let outer = chains
        .first()
        .ok_or_else(|| HostError::Import("face without loops".to_owned()))?;
    let normal = newell_normal(outer).ok_or_else(|| HostError::Import("face loop has no area".to_owned()))?;
    let deviation = chains
        .iter()
        .flatten()
        .map(|p| (*p - outer[0]).dot(normal).abs())
        .fold(0.0, f64::max);
    if deviation > tolerance {
        return Err(HostError::Import(format!(
            "face has no surface and its loops leave their plane by {deviation}"
        )));
    }
    HostPlane::from_normal(outer[0], normal)
        .map(HostSurface::Plane)
        .ok_or_else(|| HostError::Import("face loop has no area".to_owned()))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Rebuilds shared straight edges from point chains.
struct Welder {
    tolerance: f64,
    vertices: Vec<Point3>,
    edges: Vec<HostCurve>,
    lookup: HashMap<(usize, usize), (usize, usize)>,
}

impl Welder {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            vertices: Vec::new(),
            edges: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn vertex(&mut self, p: Point3) -> usize {
        if let Some(i) = self.vertices.iter().position(|v| v.distance_to(p) <= self.tolerance) {
            return i;
        }
        self.vertices.push(p);
        self.vertices.len() - 1
    }

    fn chain(&mut self, points: &[Point3]) -> Vec<HostCoedge> {
        let mut ids: Vec<usize> = points.iter().map(|p| self.vertex(*p)).collect();
        ids.dedup();
        if ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        let mut coedges = Vec::with_capacity(ids.len());
        for k in 0..ids.len() {
            let (a, b) = (ids[k], ids[(k + 1) % ids.len()]);
            let key = (a.min(b), a.max(b));
            let (edge, start) = *self.lookup.entry(key).or_insert_with(|| {
                self.edges.push(HostCurve::Line(Line3::new(self.vertices[a], self.vertices[b])));
                (self.edges.len() - 1, a)
            });
            coedges.push(HostCoedge {
                edge,
                reversed: start != a,
            });
        }
        coedges
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Brep builder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct PendingFace {
    surface: HostSurface,
    reversed: bool,
    loops: Vec<usize>,
    material: Option<MaterialId>,
    finished: bool,
    removed: bool,
}

#[derive(Debug)]
struct PendingLoop {
    coedges: Vec<HostCoedge>,
    finished: bool,
}

struct ReferenceBrepBuilder<'k> {
    kernel: &'k ReferenceKernel,
    kind: BrepKind,
    edges: Vec<HostCurve>,
    faces: Vec<PendingFace>,
    loops: Vec<PendingLoop>,
}

impl<'k> ReferenceBrepBuilder<'k> {
    const fn new(kernel: &'k ReferenceKernel, kind: BrepKind) -> Self {
        Self {
            kernel,
            kind,
            edges: Vec::new(),
            faces: Vec::new(),
            loops: Vec::new(),
        }
    }

    fn face_mut(&mut self, face: FaceId) -> Result<&mut PendingFace, HostError> {
        self.faces
            .get_mut(face.0)
            .filter(|f| !f.removed)
            .ok_or_else(|| HostError::InvalidTopology(format!("unknown face {}", face.0)))
    }

    fn coedge_ends(&self, coedge: &HostCoedge) -> (Point3, Point3) {
        let curve = &self.edges[coedge.edge];
        let (s, e) = (curve.start_point(), curve.end_point());
        if coedge.reversed { (e, s) } else { (s, e) }
    }
}

impl BrepBuilder for ReferenceBrepBuilder<'_> {
    fn add_face(&mut self, surface: HostSurface, reversed: bool) -> Result<FaceId, HostError> {
        let surface = self.kernel.create_surface(surface)?;
        self.faces.push(PendingFace {
            surface,
            reversed,
            loops: Vec::new(),
            material: None,
            finished: false,
            removed: false,
        });
        Ok(FaceId(self.faces.len() - 1))
    }

    fn set_face_material(&mut self, face: FaceId, material: MaterialId) {
        if let Ok(face) = self.face_mut(face) {
            face.material = Some(material);
        }
    }

    fn add_loop(&mut self, face: FaceId) -> Result<LoopId, HostError> {
        let index = self.loops.len();
        let pending = self.face_mut(face)?;
        if pending.finished {
            return Err(HostError::InvalidTopology(format!("face {} is already finished", face.0)));
        }
        pending.loops.push(index);
        self.loops.push(PendingLoop {
            coedges: Vec::new(),
            finished: false,
        });
        Ok(LoopId(index))
    }

    fn add_edge(&mut self, curve: HostCurve) -> Result<EdgeId, HostError> {
        let curve = self.kernel.create_curve(curve)?;
        self.edges.push(curve);
        Ok(EdgeId(self.edges.len() - 1))
    }

    fn add_coedge(&mut self, loop_id: LoopId, edge: EdgeId, reversed: bool) -> Result<(), HostError> {
        if edge.0 >= self.edges.len() {
            return Err(HostError::InvalidTopology(format!("unknown edge {}", edge.0)));
        }
        let pending = self
            .loops
            .get_mut(loop_id.0)
            .filter(|l| !l.finished)
            .ok_or_else(|| HostError::InvalidTopology(format!("loop {} is not open", loop_id.0)))?;
        pending.coedges.push(HostCoedge {
            edge: edge.0,
            reversed,
        });
        Ok(())
    }

    fn finish_loop(&mut self, loop_id: LoopId) -> Result<(), HostError> {
        let pending = self
            .loops
            .get(loop_id.0)
            .ok_or_else(|| HostError::InvalidTopology(format!("unknown loop {}", loop_id.0)))?;
        if pending.coedges.is_empty() {
            return Err(HostError::InvalidTopology("loop has no coedges".to_owned()));
        }

        let tolerances = self.kernel.tolerances;
        let ends: Vec<(Point3, Point3)> = pending.coedges.iter().map(|c| self.coedge_ends(c)).collect();
        for (k, (_, end)) in ends.iter().enumerate() {
            let next = ends[(k + 1) % ends.len()].0;
            let gap = end.distance_to(next);
            if gap > tolerances.short_curve {
                return Err(HostError::LoopNotClosed { coedge: k, gap });
            }
        }

        // Seam loops legitimately revisit vertices.
        let mut seen_edges: Vec<usize> = pending.coedges.iter().map(|c| c.edge).collect();
        seen_edges.sort_unstable();
        let has_seam = seen_edges.windows(2).any(|w| w[0] == w[1]);
        if !has_seam {
            for (i, (a, _)) in ends.iter().enumerate() {
                if ends[i + 1..].iter().any(|(b, _)| a.distance_to(*b) <= tolerances.vertex) {
                    return Err(HostError::InvalidTopology(format!("loop self-intersects at coedge {i}")));
                }
            }
        }

        if let Some(l) = self.loops.get_mut(loop_id.0) {
            l.finished = true;
        }
        Ok(())
    }

    fn finish_face(&mut self, face: FaceId) -> Result<(), HostError> {
        let loops = self.face_mut(face)?.loops.clone();
        if loops.is_empty() {
            return Err(HostError::InvalidTopology(format!("face {} has no loops", face.0)));
        }
        if let Some(open) = loops.iter().find(|&&l| !self.loops[l].finished) {
            return Err(HostError::InvalidTopology(format!("loop {open} is not finished")));
        }
        self.face_mut(face)?.finished = true;
        Ok(())
    }

    fn remove_face(&mut self, face: FaceId) {
        if let Some(pending) = self.faces.get_mut(face.0) {
            pending.removed = true;
        }
    }

    fn finish(self: Box<Self>) -> BuildOutcome {
        let discarded = self.faces.iter().filter(|f| f.removed || !f.finished).count();
        let kept: Vec<&PendingFace> = self.faces.iter().filter(|f| f.finished && !f.removed).collect();
        if kept.is_empty() {
            log::debug!("brep builder produced no faces ({discarded} discarded)");
            return BuildOutcome::Nothing;
        }

        let mut remap: Vec<Option<usize>> = vec![None; self.edges.len()];
        let mut edges = Vec::new();
        let mut uses: Vec<Vec<bool>> = Vec::new();
        let mut faces = Vec::with_capacity(kept.len());
        for face in kept {
            let mut loops = Vec::with_capacity(face.loops.len());
            for &l in &face.loops {
                let mut coedges = Vec::with_capacity(self.loops[l].coedges.len());
                for coedge in &self.loops[l].coedges {
                    let edge = *remap[coedge.edge].get_or_insert_with(|| {
                        edges.push(self.edges[coedge.edge].clone());
                        uses.push(Vec::new());
                        edges.len() - 1
                    });
                    uses[edge].push(coedge.reversed);
                    coedges.push(HostCoedge {
                        edge,
                        reversed: coedge.reversed,
                    });
                }
                loops.push(coedges);
            }
            faces.push(HostFace {
                surface: face.surface.clone(),
                reversed: face.reversed,
                loops,
                material: face.material,
            });
        }

        let closed = uses.iter().all(|u| u.len() == 2 && u[0] != u[1]);
        let mut kind = self.kind;
        let mut salvaged = discarded > 0;
        if matches!(kind, BrepKind::Solid | BrepKind::Void) && !closed {
            log::debug!("requested {} is not closed, keeping an open shell", kind.as_str());
            kind = BrepKind::OpenShell;
            salvaged = true;
        }

        let solid = HostSolid { kind, edges, faces };
        if salvaged { BuildOutcome::Salvaged(solid) } else { BuildOutcome::Success(solid) }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mesh builder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ReferenceMeshBuilder {
    vertices: Vec<Point3>,
    lookup: HashMap<[u64; 3], u32>,
    triangles: Vec<[u32; 3]>,
    materials: Vec<Option<MaterialId>>,
}

impl ReferenceMeshBuilder {
    fn vertex(&mut self, p: Point3) -> u32 {
        let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = self.vertices.len() as u32;
        self.vertices.push(p);
        self.lookup.insert(key, index);
        index
    }
}

impl MeshBuilder for ReferenceMeshBuilder {
    fn add_facet(&mut self, vertices: &[Point3], material: Option<MaterialId>) -> Result<(), HostError> {
        if vertices.len() < 3 {
            return Err(HostError::InvalidTopology(format!("facet with {} vertices", vertices.len())));
        }
        if vertices.iter().any(|p| !p.is_finite()) {
            return Err(HostError::InvalidTopology("facet vertex is not finite".to_owned()));
        }
        let ids: Vec<u32> = vertices.iter().map(|p| self.vertex(*p)).collect();
        for k in 1..ids.len() - 1 {
            self.triangles.push([ids[0], ids[k], ids[k + 1]]);
            self.materials.push(material);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<HostMesh, HostError> {
        if self.triangles.is_empty() {
            return Err(HostError::InvalidTopology("mesh has no facets".to_owned()));
        }
        Ok(HostMesh {
            vertices: self.vertices,
            triangles: self.triangles,
            materials: self.materials,
        })
    }
}
