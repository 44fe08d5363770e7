//! Drives the host brep builder from a source [`Brep`].
//!
//! Each distinct source edge is segmented and registered once; every trim
//! referencing it reuses the same host edges in its own direction. A face
//! that the host refuses is dropped and reported, and assembly carries on
//! with the remaining faces.

use std::collections::HashMap;

use crate::geom::{
    Brep, BrepFace, BrepLoop, BrepTrim, Curve, Curve3, GeometryValue, NurbsSurface, SolidOrientation, Surface,
};
use crate::host::{
    BrepBuilder, BrepKind, BuildOutcome, EdgeId, FaceId, HostError, HostKernel, HostPlane, HostSolid, HostSurface,
};
use crate::knots::{KnotOwner, KnotTolerance, normalize_knots};
use crate::units::GeometryTolerance;

use super::context::ConversionContext;
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::error::ConversionError;
use super::segmenter::Segmenter;

/// What direct assembly produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    Complete(HostSolid),
    /// Usable, but `discarded_faces` faces were dropped along the way.
    Partial { solid: HostSolid, discarded_faces: usize },
    /// Nothing usable; the interchange fallback may still succeed.
    Nothing { discarded_faces: usize },
}

#[must_use]
pub fn brep_kind(orientation: SolidOrientation) -> BrepKind {
    match orientation {
        SolidOrientation::Outward => BrepKind::Solid,
        SolidOrientation::Inward => BrepKind::Void,
        SolidOrientation::None => BrepKind::OpenShell,
    }
}

/// Host form of a source surface. NURBS knots are snapped; discontinuities
/// the host cannot hold are reported as unsupported.
pub fn host_surface(surface: &Surface, knots: &KnotTolerance) -> Result<HostSurface, ConversionError> {
    match surface {
        Surface::Plane(plane) => {
            let x_dir = plane.u_axis.normalized();
            let normal = plane.normal().normalized();
            let (Some(x_dir), Some(normal)) = (x_dir, normal) else {
                return Err(ConversionError::unsupported("plane", "degenerate axes"));
            };
            Ok(HostSurface::Plane(HostPlane {
                origin: plane.origin,
                x_dir,
                y_dir: normal.cross(x_dir),
            }))
        }
        Surface::Nurbs(nurbs) => {
            let (clean, u_kinks, v_kinks) = snapped_surface(nurbs, knots);
            if !u_kinks.is_empty() || !v_kinks.is_empty() {
                return Err(ConversionError::unsupported(
                    "nurbs surface",
                    format!("surface is discontinuous at u {u_kinks:?} / v {v_kinks:?}"),
                ));
            }
            Ok(HostSurface::Nurbs(clean))
        }
    }
}

/// `nurbs` with near-duplicate knots snapped, plus its kink parameters in
/// `u` and `v`.
pub(crate) fn snapped_surface(nurbs: &NurbsSurface, knots: &KnotTolerance) -> (NurbsSurface, Vec<f64>, Vec<f64>) {
    let u = normalize_knots(&nurbs.knots_u, nurbs.degree_u, KnotOwner::Surface, knots);
    let v = normalize_knots(&nurbs.knots_v, nurbs.degree_v, KnotOwner::Surface, knots);
    let mut clean = nurbs.clone();
    clean.knots_u = u.knots;
    clean.knots_v = v.knots;
    (clean, u.kinks, v.kinks)
}

pub struct Assembler<'a, K: HostKernel + ?Sized> {
    kernel: &'a K,
    segmenter: Segmenter,
    tolerance: GeometryTolerance,
    knots: KnotTolerance,
    diagnostics: &'a mut Diagnostics,
}

impl<'a, K: HostKernel + ?Sized> Assembler<'a, K> {
    /// `tolerance` is in host units; the brep passed to [`Self::assemble`]
    /// must already be scaled.
    pub fn new(
        kernel: &'a K,
        tolerance: GeometryTolerance,
        knots: KnotTolerance,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            kernel,
            segmenter: Segmenter::new(tolerance, knots),
            tolerance,
            knots,
            diagnostics,
        }
    }

    pub fn assemble(&mut self, brep: &Brep, context: &ConversionContext) -> Assembly {
        let (split, origins) = self.split_faces(brep);
        let brep = &split;
        let kind = brep_kind(brep.orientation);
        log::debug!(
            "assembling {} with {} face(s), {} edge(s)",
            kind.as_str(),
            brep.faces.len(),
            brep.edges.len()
        );
        let mut builder = self.kernel.brep_builder(kind);
        let mut edges: HashMap<usize, Option<Vec<EdgeId>>> = HashMap::new();
        let mut discarded_faces = 0;

        for (face, &index) in brep.faces.iter().zip(&origins) {
            if let Err(err) = self.add_face(builder.as_mut(), brep, index, face, context, &mut edges) {
                discarded_faces += 1;
                self.diagnostics.emit(
                    Diagnostic::warning(
                        DiagnosticKind::PartialAssemblyFailure,
                        format!("face {index} was dropped: {err}"),
                    )
                    .with_subject(face.surface.clone()),
                );
            }
        }

        match builder.finish() {
            BuildOutcome::Success(solid) if discarded_faces == 0 => Assembly::Complete(solid),
            BuildOutcome::Success(solid) | BuildOutcome::Salvaged(solid) => {
                if solid.kind != kind {
                    self.diagnostics.emit(Diagnostic::warning(
                        DiagnosticKind::PartialAssemblyFailure,
                        format!("{} came out as {}", kind.as_str(), solid.kind.as_str()),
                    ));
                }
                Assembly::Partial { solid, discarded_faces }
            }
            BuildOutcome::Nothing => Assembly::Nothing { discarded_faces },
        }
    }

    /// Splits NURBS faces at surface kinks and across closed directions so
    /// every piece has a surface the host can hold. Returns the split brep
    /// and the source face index of each of its faces.
    fn split_faces(&self, brep: &Brep) -> (Brep, Vec<usize>) {
        let mut split = brep.clone();
        let mut origins: Vec<usize> = (0..brep.faces.len()).collect();
        let gap = self.tolerance.closed_curve_gap();

        for index in 0..brep.faces.len() {
            let Surface::Nurbs(nurbs) = &split.faces[index].surface else {
                continue;
            };
            let (clean, mut u_params, mut v_params) = snapped_surface(nurbs, &self.knots);
            if clean.is_closed_u(gap) {
                let (a, b) = clean.domain_u();
                u_params.push(0.5 * (a + b));
            }
            if clean.is_closed_v(gap) {
                let (a, b) = clean.domain_v();
                v_params.push(0.5 * (a + b));
            }
            if u_params.is_empty() && v_params.is_empty() {
                continue;
            }

            let mut candidate = split.clone();
            candidate.faces[index].surface = Surface::Nurbs(clean);
            match candidate.split_face(index, &u_params, &v_params, self.tolerance.short_curve) {
                Ok(pieces) => {
                    log::debug!("face {index} split into {} pieces at u {u_params:?} / v {v_params:?}", pieces.len());
                    origins.extend(std::iter::repeat_n(index, pieces.len() - 1));
                    split = candidate;
                }
                Err(err) => log::debug!("face {index} kept whole: {err}"),
            }
        }
        (split, origins)
    }

    fn add_face(
        &mut self,
        builder: &mut dyn BrepBuilder,
        brep: &Brep,
        index: usize,
        face: &BrepFace,
        context: &ConversionContext,
        edges: &mut HashMap<usize, Option<Vec<EdgeId>>>,
    ) -> Result<(), ConversionError> {
        let surface = host_surface(&face.surface, &self.knots)?;
        let face_id = builder.add_face(surface, face.reversed)?;
        if let Some(material) = context.face_material(index) {
            builder.set_face_material(face_id, material);
        }

        let result = self.add_loops(builder, brep, face, face_id, edges);
        match result {
            Ok(()) => builder.finish_face(face_id).map_err(|err| {
                builder.remove_face(face_id);
                err.into()
            }),
            Err(err) => {
                builder.remove_face(face_id);
                Err(err)
            }
        }
    }

    fn add_loops(
        &mut self,
        builder: &mut dyn BrepBuilder,
        brep: &Brep,
        face: &BrepFace,
        face_id: FaceId,
        edges: &mut HashMap<usize, Option<Vec<EdgeId>>>,
    ) -> Result<(), ConversionError> {
        for (loop_index, brep_loop) in face.loops.iter().enumerate() {
            let coedges = self.loop_coedges(builder, brep, face, brep_loop, edges)?;
            if coedges.is_empty() {
                if loop_index == 0 {
                    return Err(HostError::InvalidTopology("outer loop has no usable edges".to_owned()).into());
                }
                self.diagnostics.emit(Diagnostic::warning(
                    DiagnosticKind::ToleranceViolation,
                    format!("inner loop {loop_index} collapsed below tolerance and was skipped"),
                ));
                continue;
            }
            let loop_id = builder.add_loop(face_id)?;
            for (edge, reversed) in coedges {
                builder.add_coedge(loop_id, edge, reversed)?;
            }
            builder.finish_loop(loop_id)?;
        }
        Ok(())
    }

    /// Coedges of one loop in face-normal order.
    fn loop_coedges(
        &mut self,
        builder: &mut dyn BrepBuilder,
        brep: &Brep,
        face: &BrepFace,
        brep_loop: &BrepLoop,
        edges: &mut HashMap<usize, Option<Vec<EdgeId>>>,
    ) -> Result<Vec<(EdgeId, bool)>, ConversionError> {
        let mut coedges = Vec::new();
        let mut trims: Vec<&BrepTrim> = brep_loop.trims.iter().collect();
        if face.reversed {
            trims.reverse();
        }
        for trim in trims {
            let Some(edge_index) = trim.edge else {
                continue;
            };
            let segments = match edges.get(&edge_index) {
                Some(segments) => segments.clone(),
                None => {
                    let segments = self.register_edge(builder, brep, edge_index);
                    edges.insert(edge_index, segments.clone());
                    segments
                }
            };
            let segments = segments.ok_or_else(|| {
                ConversionError::from(HostError::InvalidCurve(format!("edge {edge_index} could not be built")))
            })?;
            let reversed = trim.reversed ^ face.reversed;
            if reversed {
                coedges.extend(segments.iter().rev().map(|&e| (e, true)));
            } else {
                coedges.extend(segments.iter().map(|&e| (e, false)));
            }
        }
        Ok(coedges)
    }

    /// Host edges for one source edge, in edge direction. `None` when the
    /// host rejected it; an empty list when the whole edge is too short.
    fn register_edge(&mut self, builder: &mut dyn BrepBuilder, brep: &Brep, index: usize) -> Option<Vec<EdgeId>> {
        let edge = brep.edges.get(index)?;
        if edge.tolerance > self.tolerance.vertex {
            self.diagnostics.emit(
                Diagnostic::warning(
                    DiagnosticKind::ToleranceViolation,
                    format!(
                        "edge {index} is only accurate to {:.6}, the host expects {:.6}",
                        edge.tolerance, self.tolerance.vertex
                    ),
                )
                .with_subject(edge.curve.clone()),
            );
        }

        let curve = edge.oriented_curve();
        let segmentation = match self.segmenter.segment(&curve) {
            Ok(segmentation) => segmentation,
            Err(ConversionError::UnsupportedGeometry { .. }) if curve_is_short(&curve, &self.tolerance) => {
                self.diagnostics.emit(
                    Diagnostic::warning(
                        DiagnosticKind::ToleranceViolation,
                        format!("edge {index} is shorter than the short-curve tolerance and was dropped"),
                    )
                    .with_subject(curve),
                );
                return Some(Vec::new());
            }
            Err(err) => {
                self.diagnostics.emit(
                    Diagnostic::warning(DiagnosticKind::UnsupportedGeometry, format!("edge {index}: {err}"))
                        .with_subject(curve),
                );
                return None;
            }
        };
        for piece in segmentation.dropped {
            self.diagnostics.emit(
                Diagnostic::remark(
                    DiagnosticKind::ToleranceViolation,
                    format!("a sub-tolerance piece of edge {index} was dropped"),
                )
                .with_subject(piece),
            );
        }

        let mut ids = Vec::with_capacity(segmentation.curves.len());
        for curve in segmentation.curves {
            match builder.add_edge(curve.clone()) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    self.diagnostics.emit(
                        Diagnostic::warning(DiagnosticKind::HostPlatformFailure, format!("edge {index}: {err}"))
                            .with_subject(GeometryValue::Curve(curve.to_curve())),
                    );
                    return None;
                }
            }
        }
        Some(ids)
    }
}

fn curve_is_short(curve: &Curve, tolerance: &GeometryTolerance) -> bool {
    curve.length() < tolerance.short_curve
}
