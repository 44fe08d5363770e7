//! Authoring-side boundary representation.
//!
//! A [`Brep`] owns its faces and edges directly. Faces reference edges by
//! index through their loops' trims, so an edge shared by two faces is stored
//! once and referenced twice. Trim direction is expressed relative to the
//! face's *surface* (outer loops run counter-clockwise around the surface
//! normal); a face whose `reversed` flag is set points its material side the
//! other way.

use std::collections::HashMap;

use super::core::{BBox, Point3, Vec3};
use super::curve::{Curve, Curve3, Line3};
use super::error::GeometryError;
use super::mesh::{Mesh, MeshFace};
use super::surface::{NurbsSurface, PlaneSurface, Surface};

/// Which side of a closed shell holds material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidOrientation {
    /// Closed, normals point out of the enclosed volume.
    Outward,
    /// Closed, normals point into the enclosed volume (a void).
    Inward,
    /// Not closed.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimKind {
    /// Trim on a naked edge.
    Boundary,
    /// Trim on an edge shared with another face.
    Mated,
    /// Trim on the seam of a closed surface.
    Seam,
    /// Collapsed trim at a surface pole; has no edge.
    Singular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Outer,
    Inner,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrepEdge {
    pub curve: Curve,
    /// The edge runs against its curve's parameterisation.
    pub reversed: bool,
    /// Largest distance between this edge and the faces using it.
    pub tolerance: f64,
}

impl BrepEdge {
    #[must_use]
    pub const fn new(curve: Curve) -> Self {
        Self {
            curve,
            reversed: false,
            tolerance: 0.0,
        }
    }

    /// Edge geometry in edge direction.
    #[must_use]
    pub fn oriented_curve(&self) -> Curve {
        if self.reversed { self.curve.reversed() } else { self.curve.clone() }
    }

    #[must_use]
    pub fn start_point(&self) -> Point3 {
        if self.reversed { self.curve.end_point() } else { self.curve.start_point() }
    }

    #[must_use]
    pub fn end_point(&self) -> Point3 {
        if self.reversed { self.curve.start_point() } else { self.curve.end_point() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrepTrim {
    pub edge: Option<usize>,
    /// The trim runs against its edge.
    pub reversed: bool,
    pub kind: TrimKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrepLoop {
    pub kind: LoopKind,
    pub trims: Vec<BrepTrim>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrepFace {
    pub surface: Surface,
    /// Face normal is opposite to the surface normal.
    pub reversed: bool,
    pub loops: Vec<BrepLoop>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Brep {
    pub faces: Vec<BrepFace>,
    pub edges: Vec<BrepEdge>,
    pub orientation: SolidOrientation,
}

impl Brep {
    /// Checks that every trim references an existing edge.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.faces.is_empty() {
            return Err(GeometryError::InvalidTopology("brep has no faces".to_owned()));
        }
        for (face_index, face) in self.faces.iter().enumerate() {
            for trim in face.loops.iter().flat_map(|l| &l.trims) {
                if let Some(edge) = trim.edge {
                    if edge >= self.edges.len() {
                        return Err(GeometryError::InvalidTopology(format!(
                            "face {face_index} references missing edge {edge}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BBox> {
        let edge_points = self.edges.iter().flat_map(|e| curve_samples(&e.curve, 8));
        let surface_points = self.faces.iter().flat_map(|f| f.surface.sample_points());
        BBox::from_points(edge_points.chain(surface_points))
    }

    /// Number of trims that reference each edge.
    #[must_use]
    pub fn edge_use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.edges.len()];
        for trim in self.faces.iter().flat_map(|f| &f.loops).flat_map(|l| &l.trims) {
            if let Some(edge) = trim.edge.filter(|e| *e < counts.len()) {
                counts[edge] += 1;
            }
        }
        counts
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        let counts = self.edge_use_counts();
        !counts.is_empty() && counts.iter().all(|&c| c == 2)
    }

    /// Oriented 3D curve of one trim.
    #[must_use]
    pub fn trim_curve(&self, trim: &BrepTrim) -> Option<Curve> {
        let edge = self.edges.get(trim.edge?)?;
        let curve = edge.oriented_curve();
        Some(if trim.reversed { curve.reversed() } else { curve })
    }

    /// Closed polygon approximating one loop, oriented along the face normal.
    #[must_use]
    pub fn loop_polygon(&self, face: &BrepFace, brep_loop: &BrepLoop, samples_per_edge: usize) -> Vec<Point3> {
        let mut polygon = Vec::new();
        for trim in &brep_loop.trims {
            if let Some(curve) = self.trim_curve(trim) {
                let pts = curve_samples(&curve, samples_per_edge);
                polygon.extend_from_slice(&pts[..pts.len() - 1]);
            }
        }
        if face.reversed {
            polygon.reverse();
        }
        polygon
    }

    /// Signed enclosed volume from the loop polygons. Exact for planar faces.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for face in &self.faces {
            for brep_loop in &face.loops {
                let polygon = self.loop_polygon(face, brep_loop, 16);
                if polygon.len() < 3 {
                    continue;
                }
                let p0 = polygon[0].to_vec3();
                for w in polygon[1..].windows(2) {
                    volume += p0.dot(w[0].to_vec3().cross(w[1].to_vec3())) / 6.0;
                }
            }
        }
        volume
    }

    /// Orientation derived from closedness and the sign of the volume.
    #[must_use]
    pub fn compute_orientation(&self) -> SolidOrientation {
        if !self.is_closed() {
            return SolidOrientation::None;
        }
        if self.signed_volume() >= 0.0 {
            SolidOrientation::Outward
        } else {
            SolidOrientation::Inward
        }
    }

    /// Builds a polyhedral Brep from planar polygons. Vertices closer than
    /// `weld_tolerance` are shared, and each vertex pair becomes one edge.
    pub fn from_planar_polygons(polygons: &[Vec<Point3>], weld_tolerance: f64) -> Result<Self, GeometryError> {
        let mut vertices: Vec<Point3> = Vec::new();
        let mut weld = |p: Point3| -> usize {
            if let Some(i) = vertices.iter().position(|v| v.distance_to(p) <= weld_tolerance) {
                return i;
            }
            vertices.push(p);
            vertices.len() - 1
        };

        let indexed: Vec<Vec<usize>> = polygons
            .iter()
            .map(|polygon| {
                let mut ids: Vec<usize> = polygon.iter().map(|p| weld(*p)).collect();
                ids.dedup();
                if ids.len() > 1 && ids.first() == ids.last() {
                    ids.pop();
                }
                ids
            })
            .collect();

        let mut edges = Vec::new();
        let mut edge_starts: Vec<usize> = Vec::new();
        let mut edge_lookup: HashMap<(usize, usize), usize> = HashMap::new();
        let mut faces = Vec::with_capacity(indexed.len());

        for (face_index, ids) in indexed.iter().enumerate() {
            if ids.len() < 3 {
                return Err(GeometryError::TooFewPoints {
                    kind: "planar face",
                    required: 3,
                    actual: ids.len(),
                });
            }
            let corners: Vec<Point3> = ids.iter().map(|&i| vertices[i]).collect();
            let normal = newell_normal(&corners).ok_or_else(|| {
                GeometryError::Degenerate(format!("polygon {face_index} has no area"))
            })?;
            let plane = PlaneSurface::fitted(corners[0], normal, &corners)?;

            let mut trims = Vec::with_capacity(ids.len());
            for k in 0..ids.len() {
                let (a, b) = (ids[k], ids[(k + 1) % ids.len()]);
                let key = (a.min(b), a.max(b));
                let (edge, reversed) = match edge_lookup.get(&key) {
                    Some(&edge) => (edge, edge_starts[edge] != a),
                    None => {
                        edges.push(BrepEdge::new(Curve::Line(Line3::new(vertices[a], vertices[b]))));
                        edge_starts.push(a);
                        edge_lookup.insert(key, edges.len() - 1);
                        (edges.len() - 1, false)
                    }
                };
                trims.push(BrepTrim {
                    edge: Some(edge),
                    reversed,
                    kind: TrimKind::Boundary,
                });
            }
            faces.push(BrepFace {
                surface: Surface::Plane(plane),
                reversed: false,
                loops: vec![BrepLoop {
                    kind: LoopKind::Outer,
                    trims,
                }],
            });
        }

        let mut brep = Self {
            faces,
            edges,
            orientation: SolidOrientation::None,
        };
        brep.refresh_trim_kinds();
        brep.orientation = brep.compute_orientation();
        Ok(brep)
    }

    /// Polyhedral Brep with one planar face per mesh face; non-planar quads
    /// are split into triangles first.
    pub fn from_mesh(mesh: &Mesh, weld_tolerance: f64) -> Result<Self, GeometryError> {
        let polygons: Vec<Vec<Point3>> = mesh
            .faces
            .iter()
            .flat_map(|face| match *face {
                MeshFace::Triangle(a, b, c) => vec![vec![a, b, c]],
                MeshFace::Quad(a, b, c, d) => {
                    if mesh.is_quad_planar(face, weld_tolerance) {
                        vec![vec![a, b, c, d]]
                    } else {
                        vec![vec![a, b, c], vec![a, c, d]]
                    }
                }
            })
            .map(|ids| ids.into_iter().map(|i| mesh.vertices[i as usize]).collect())
            .collect();
        Self::from_planar_polygons(&polygons, weld_tolerance)
    }

    /// Single open face bounded by the surface's own domain edges.
    pub fn from_surface(surface: Surface, degenerate_length: f64) -> Result<Self, GeometryError> {
        let boundary: Vec<Curve> = match &surface {
            Surface::Plane(plane) => {
                let (u0, u1) = plane.u_domain;
                let (v0, v1) = plane.v_domain;
                let c = [
                    plane.point_at(u0, v0),
                    plane.point_at(u1, v0),
                    plane.point_at(u1, v1),
                    plane.point_at(u0, v1),
                ];
                (0..4).map(|i| Curve::Line(Line3::new(c[i], c[(i + 1) % 4]))).collect()
            }
            Surface::Nurbs(nurbs) => nurbs_boundary(nurbs)?,
        };

        let mut edges = Vec::with_capacity(4);
        let mut trims = Vec::with_capacity(4);
        for curve in boundary {
            if curve.length() <= degenerate_length {
                trims.push(BrepTrim {
                    edge: None,
                    reversed: false,
                    kind: TrimKind::Singular,
                });
                continue;
            }
            edges.push(BrepEdge::new(curve));
            trims.push(BrepTrim {
                edge: Some(edges.len() - 1),
                reversed: false,
                kind: TrimKind::Boundary,
            });
        }

        Ok(Self {
            faces: vec![BrepFace {
                surface,
                reversed: false,
                loops: vec![BrepLoop {
                    kind: LoopKind::Outer,
                    trims,
                }],
            }],
            edges,
            orientation: SolidOrientation::None,
        })
    }

    /// Recomputes `Boundary`/`Mated` from edge use counts.
    pub fn refresh_trim_kinds(&mut self) {
        let counts = self.edge_use_counts();
        for trim in self.faces.iter_mut().flat_map(|f| &mut f.loops).flat_map(|l| &mut l.trims) {
            if let Some(edge) = trim.edge {
                if matches!(trim.kind, TrimKind::Boundary | TrimKind::Mated) {
                    trim.kind = if counts.get(edge).copied().unwrap_or(0) >= 2 {
                        TrimKind::Mated
                    } else {
                        TrimKind::Boundary
                    };
                }
            }
        }
    }

    /// Merges pairs of naked edges whose geometry coincides within
    /// `tolerance`, redirecting trims to the surviving edge. Returns the
    /// number of merged pairs.
    pub fn join_naked_edges(&mut self, tolerance: f64) -> usize {
        let counts = self.edge_use_counts();
        let naked: Vec<usize> = (0..self.edges.len()).filter(|&e| counts[e] == 1).collect();
        let mut replacement: HashMap<usize, (usize, bool)> = HashMap::new();

        for (i, &a) in naked.iter().enumerate() {
            if replacement.contains_key(&a) {
                continue;
            }
            for &b in &naked[i + 1..] {
                if replacement.contains_key(&b) || replacement.values().any(|(keep, _)| *keep == b) {
                    continue;
                }
                if let Some(flipped) = coincident_edges(&self.edges[a], &self.edges[b], tolerance) {
                    replacement.insert(b, (a, flipped));
                    break;
                }
            }
        }
        if replacement.is_empty() {
            return 0;
        }

        for trim in self.faces.iter_mut().flat_map(|f| &mut f.loops).flat_map(|l| &mut l.trims) {
            if let Some((keep, flipped)) = trim.edge.and_then(|e| replacement.get(&e)).copied() {
                trim.edge = Some(keep);
                trim.reversed ^= flipped;
            }
        }
        self.compact_edges();
        self.refresh_trim_kinds();
        replacement.len()
    }

    /// Drops edges no trim references and renumbers the rest.
    pub fn compact_edges(&mut self) {
        let counts = self.edge_use_counts();
        let mut remap = vec![None; self.edges.len()];
        let mut kept = Vec::with_capacity(self.edges.len());
        for (index, edge) in std::mem::take(&mut self.edges).into_iter().enumerate() {
            if counts[index] > 0 {
                remap[index] = Some(kept.len());
                kept.push(edge);
            }
        }
        self.edges = kept;
        for trim in self.faces.iter_mut().flat_map(|f| &mut f.loops).flat_map(|l| &mut l.trims) {
            trim.edge = trim.edge.and_then(|e| remap.get(e).copied().flatten());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Face splitting
// ─────────────────────────────────────────────────────────────────────────────

/// Local side of a grid cell, counter-clockwise from `v = v0`.
#[derive(Clone, Copy)]
enum CellSide {
    Bottom,
    Right,
    Top,
    Left,
}

impl Brep {
    /// Splits an untrimmed NURBS face along interior iso-parameters into a
    /// grid of faces. Boundary edges are split where the grid meets them, in
    /// every face that uses them, so neighbouring faces stay mated. The first
    /// piece replaces the face and the others are appended; the returned
    /// indices list all pieces.
    pub fn split_face(
        &mut self,
        index: usize,
        u_params: &[f64],
        v_params: &[f64],
        tolerance: f64,
    ) -> Result<Vec<usize>, GeometryError> {
        let face = self
            .faces
            .get(index)
            .ok_or_else(|| GeometryError::InvalidTopology(format!("no face {index}")))?;
        let Surface::Nurbs(surface) = &face.surface else {
            return Err(GeometryError::InvalidTopology("only nurbs faces are split".to_owned()));
        };
        if face.loops.len() != 1 || face.loops[0].trims.iter().any(|t| t.edge.is_none()) {
            return Err(GeometryError::InvalidTopology(
                "only untrimmed faces without poles can be split".to_owned(),
            ));
        }
        let surface = surface.clamped();
        let reversed = face.reversed;
        let us = grid_breaks(surface.domain_u(), u_params);
        let vs = grid_breaks(surface.domain_v(), v_params);
        let (m, n) = (us.len() - 1, vs.len() - 1);
        if m == 1 && n == 1 {
            return Ok(vec![index]);
        }

        let cells: Vec<Vec<NurbsSurface>> = surface
            .split_u(&us[1..m])
            .iter()
            .map(|column| column.split_v(&vs[1..n]))
            .collect();
        if cells.len() != m || cells.iter().any(|column| column.len() != n) {
            return Err(GeometryError::InvalidNurbs("surface split produced an uneven grid".to_owned()));
        }

        // Boundary grid nodes, counter-clockwise from (u0, v0).
        let (u0, u1) = (us[0], us[m]);
        let (v0, v1) = (vs[0], vs[n]);
        let mut nodes = Vec::with_capacity(2 * (m + n));
        nodes.extend((0..m).map(|i| surface.point_at(us[i], v0)));
        nodes.extend((0..n).map(|j| surface.point_at(u1, vs[j])));
        nodes.extend((1..=m).rev().map(|i| surface.point_at(us[i], v1)));
        nodes.extend((1..=n).rev().map(|j| surface.point_at(u0, vs[j])));
        if (0..nodes.len()).any(|k| nodes[k].distance_to(nodes[(k + 1) % nodes.len()]) <= tolerance) {
            return Err(GeometryError::Degenerate("surface has a collapsed side".to_owned()));
        }

        for node in &nodes {
            self.split_face_edge_at(index, *node, tolerance)?;
        }
        let sides = self.boundary_sides(index, &nodes, tolerance)?;

        // Interior edges: `vertical[i][j]` runs along v at u = us[i + 1],
        // `horizontal[i][j]` along u at v = vs[j + 1].
        let mut vertical = vec![vec![0; n]; m - 1];
        for (i, row) in vertical.iter_mut().enumerate() {
            for (j, slot) in row.iter_mut().enumerate() {
                let curve = nurbs_boundary(&cells[i][j])?.swap_remove(1);
                self.edges.push(BrepEdge::new(curve));
                *slot = self.edges.len() - 1;
            }
        }
        let mut horizontal = vec![vec![0; n - 1]; m];
        for (i, row) in horizontal.iter_mut().enumerate() {
            for (j, slot) in row.iter_mut().enumerate() {
                let curve = nurbs_boundary(&cells[i][j])?.swap_remove(2).reversed();
                self.edges.push(BrepEdge::new(curve));
                *slot = self.edges.len() - 1;
            }
        }

        let interior = |edge: usize, reversed: bool| {
            vec![BrepTrim {
                edge: Some(edge),
                reversed,
                kind: TrimKind::Mated,
            }]
        };
        let side_trims = |i: usize, j: usize, side: CellSide| -> Vec<BrepTrim> {
            match side {
                CellSide::Bottom if j == 0 => sides[i].clone(),
                CellSide::Bottom => interior(horizontal[i][j - 1], false),
                CellSide::Right if i == m - 1 => sides[m + j].clone(),
                CellSide::Right => interior(vertical[i][j], false),
                CellSide::Top if j == n - 1 => sides[m + n + (m - 1 - i)].clone(),
                CellSide::Top => interior(horizontal[i][j], true),
                CellSide::Left if i == 0 => sides[2 * m + n + (n - 1 - j)].clone(),
                CellSide::Left => interior(vertical[i - 1][j], true),
            }
        };

        let mut pieces = Vec::with_capacity(m * n);
        for (i, column) in cells.into_iter().enumerate() {
            for (j, cell) in column.into_iter().enumerate() {
                let trims = [CellSide::Bottom, CellSide::Right, CellSide::Top, CellSide::Left]
                    .into_iter()
                    .flat_map(|side| side_trims(i, j, side))
                    .collect();
                pieces.push(BrepFace {
                    surface: Surface::Nurbs(cell),
                    reversed,
                    loops: vec![BrepLoop {
                        kind: LoopKind::Outer,
                        trims,
                    }],
                });
            }
        }

        let mut pieces = pieces.into_iter();
        let mut indices = vec![index];
        if let Some(first) = pieces.next() {
            self.faces[index] = first;
        }
        for piece in pieces {
            self.faces.push(piece);
            indices.push(self.faces.len() - 1);
        }
        self.refresh_trim_kinds();
        Ok(indices)
    }

    /// Makes `node` a vertex of the face's outer loop, splitting the edge it
    /// lies on when it is not one already.
    fn split_face_edge_at(&mut self, face: usize, node: Point3, tolerance: f64) -> Result<(), GeometryError> {
        let mut candidates: Vec<usize> = self.faces[face].loops[0].trims.iter().filter_map(|t| t.edge).collect();
        candidates.sort_unstable();
        candidates.dedup();

        let at_vertex = candidates.iter().any(|&e| {
            let edge = &self.edges[e];
            edge.start_point().distance_to(node) <= tolerance || edge.end_point().distance_to(node) <= tolerance
        });
        if at_vertex {
            return Ok(());
        }
        let nearest = candidates
            .iter()
            .map(|&e| {
                let t = self.edges[e].curve.closest_parameter(node);
                (e, t, self.edges[e].curve.point_at(t).distance_to(node))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));
        match nearest {
            Some((edge, t, distance)) if distance <= tolerance => self.split_edge(edge, t),
            _ => Err(GeometryError::InvalidTopology(
                "face boundary does not follow its surface".to_owned(),
            )),
        }
    }

    /// Splits edge `index` at curve parameter `t`, updating every trim that
    /// uses it. The first half keeps the index; the second is appended.
    fn split_edge(&mut self, index: usize, t: f64) -> Result<(), GeometryError> {
        let edge = &self.edges[index];
        let (head, tail) = edge
            .curve
            .split_at(t)
            .ok_or_else(|| GeometryError::Degenerate(format!("edge {index} cannot be split at {t}")))?;
        let reversed = edge.reversed;
        let tolerance = edge.tolerance;
        self.edges[index] = BrepEdge {
            curve: head,
            reversed,
            tolerance,
        };
        self.edges.push(BrepEdge {
            curve: tail,
            reversed,
            tolerance,
        });
        let added = self.edges.len() - 1;
        // In edge direction a reversed edge meets its tail first.
        let (first, second) = if reversed { (added, index) } else { (index, added) };

        for brep_loop in self.faces.iter_mut().flat_map(|f| &mut f.loops) {
            let mut trims = Vec::with_capacity(brep_loop.trims.len() + 1);
            for trim in brep_loop.trims.drain(..) {
                if trim.edge != Some(index) {
                    trims.push(trim);
                    continue;
                }
                let (a, b) = if trim.reversed { (second, first) } else { (first, second) };
                trims.push(BrepTrim { edge: Some(a), ..trim });
                trims.push(BrepTrim { edge: Some(b), ..trim });
            }
            brep_loop.trims = trims;
        }
        Ok(())
    }

    /// Groups the outer-loop trims of `face` into the runs between
    /// consecutive `nodes`.
    fn boundary_sides(&self, face: usize, nodes: &[Point3], tolerance: f64) -> Result<Vec<Vec<BrepTrim>>, GeometryError> {
        let broken = || GeometryError::InvalidTopology("face boundary does not follow its surface".to_owned());
        let trims = &self.faces[face].loops[0].trims;
        let ends: Vec<(Point3, Point3)> = trims
            .iter()
            .map(|trim| self.trim_curve(trim).map(|c| (c.start_point(), c.end_point())))
            .collect::<Option<_>>()
            .ok_or_else(broken)?;
        let start = ends
            .iter()
            .position(|(p, _)| p.distance_to(nodes[0]) <= tolerance)
            .ok_or_else(broken)?;

        let mut sides = vec![Vec::new(); nodes.len()];
        let mut side = 0;
        for k in 0..trims.len() {
            let at = (start + k) % trims.len();
            if side == nodes.len() {
                return Err(broken());
            }
            sides[side].push(trims[at]);
            if ends[at].1.distance_to(nodes[(side + 1) % nodes.len()]) <= tolerance {
                side += 1;
            }
        }
        if side == nodes.len() { Ok(sides) } else { Err(broken()) }
    }
}

/// Sorted interior parameters of `domain` with both ends added.
fn grid_breaks(domain: (f64, f64), params: &[f64]) -> Vec<f64> {
    let (a, b) = domain;
    let mut breaks: Vec<f64> = params.iter().copied().filter(|t| *t > a && *t < b).collect();
    breaks.sort_by(f64::total_cmp);
    breaks.dedup();
    breaks.insert(0, a);
    breaks.push(b);
    breaks
}

/// `Some(flipped)` when both edges trace the same curve, `flipped` telling
/// whether they run in opposite directions.
fn coincident_edges(a: &BrepEdge, b: &BrepEdge, tolerance: f64) -> Option<bool> {
    let (a0, a1) = (a.start_point(), a.end_point());
    let (b0, b1) = (b.start_point(), b.end_point());
    let flipped = if a0.distance_to(b0) <= tolerance && a1.distance_to(b1) <= tolerance {
        false
    } else if a0.distance_to(b1) <= tolerance && a1.distance_to(b0) <= tolerance {
        true
    } else {
        return None;
    };
    let a_curve = a.oriented_curve();
    let b_curve = b.oriented_curve();
    let (ta0, ta1) = a_curve.domain();
    let (tb0, tb1) = b_curve.domain();
    let mid_a = a_curve.point_at(0.5 * (ta0 + ta1));
    let mid_b = b_curve.point_at(0.5 * (tb0 + tb1));
    (mid_a.distance_to(mid_b) <= tolerance).then_some(flipped)
}

fn curve_samples(curve: &Curve, count: usize) -> Vec<Point3> {
    let count = count.max(1);
    let (a, b) = curve.domain();
    match curve {
        Curve::Line(line) => vec![line.start, line.end],
        Curve::Polyline(polyline) => polyline.points().to_vec(),
        _ => (0..=count)
            .map(|i| curve.point_at(a + (b - a) * i as f64 / count as f64))
            .collect(),
    }
}

/// Newell's method; `None` for zero-area polygons.
pub(crate) fn newell_normal(points: &[Point3]) -> Option<Vec3> {
    let mut n = Vec3::ZERO;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    n.normalized()
}

/// The four iso-curves bounding a clamped NURBS surface, counter-clockwise
/// in parameter space: `v = v0`, `u = u1`, `v = v1` reversed, `u = u0` reversed.
fn nurbs_boundary(surface: &NurbsSurface) -> Result<Vec<Curve>, GeometryError> {
    use super::curve::NurbsCurve3;

    let row = |iu: usize| -> Result<NurbsCurve3, GeometryError> {
        let range = iu * surface.v_count..(iu + 1) * surface.v_count;
        NurbsCurve3::new(
            surface.degree_v,
            surface.control_points[range.clone()].to_vec(),
            surface.knots_v.clone(),
            surface.weights.as_ref().map(|w| w[range].to_vec()),
        )
    };
    let column = |iv: usize| -> Result<NurbsCurve3, GeometryError> {
        let indices: Vec<usize> = (0..surface.u_count).map(|iu| iu * surface.v_count + iv).collect();
        NurbsCurve3::new(
            surface.degree_u,
            indices.iter().map(|&i| surface.control_points[i]).collect(),
            surface.knots_u.clone(),
            surface.weights.as_ref().map(|w| indices.iter().map(|&i| w[i]).collect()),
        )
    };

    Ok(vec![
        Curve::Nurbs(column(0)?),
        Curve::Nurbs(row(surface.u_count - 1)?),
        Curve::Nurbs(column(surface.v_count - 1)?.reversed()),
        Curve::Nurbs(row(0)?.reversed()),
    ])
}
