//! Host geometry back to source geometry.

use crate::geom::{
    Brep, BrepEdge, BrepFace, BrepLoop, BrepTrim, Curve, Curve3, GeometryValue, LoopKind, PlaneSurface,
    SolidOrientation, Surface, TrimKind,
};
use crate::host::{BrepKind, HostGeometry, HostSolid, HostSurface};
use crate::units::GeometryTolerance;

use super::config::NgonConfig;
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::error::ConversionError;
use super::mesh::decode_mesh;

/// Decodes `geometry` in host units; the caller rescales the result.
pub fn decode_geometry(
    geometry: &HostGeometry,
    tolerance: &GeometryTolerance,
    ngon: &NgonConfig,
    diagnostics: &mut Diagnostics,
) -> Result<GeometryValue, ConversionError> {
    Ok(match geometry {
        HostGeometry::Point(p) => GeometryValue::Point(*p),
        HostGeometry::Points(points) => GeometryValue::PointCloud(points.clone()),
        HostGeometry::Curves(curves) => match curves.as_slice() {
            [] => return Err(ConversionError::NothingProduced { kind: "curves" }),
            [single] => GeometryValue::Curve(single.to_curve()),
            many => GeometryValue::Curve(Curve::PolyCurve(many.iter().map(|c| c.to_curve()).collect())),
        },
        HostGeometry::Solid(solid) => GeometryValue::Brep(decode_solid(solid, tolerance, diagnostics)?),
        HostGeometry::Mesh(mesh) => GeometryValue::Mesh(decode_mesh(mesh, ngon, tolerance)),
    })
}

/// Rebuilds a source brep from a host solid, joining naked edges that
/// coincide within the vertex tolerance.
pub fn decode_solid(
    solid: &HostSolid,
    tolerance: &GeometryTolerance,
    diagnostics: &mut Diagnostics,
) -> Result<Brep, ConversionError> {
    if solid.faces.is_empty() {
        return Err(ConversionError::NothingProduced { kind: "solid" });
    }
    let edges = solid.edges.iter().map(|c| BrepEdge::new(c.to_curve())).collect();

    let mut faces = Vec::with_capacity(solid.faces.len());
    for face in &solid.faces {
        let loops: Vec<BrepLoop> = face
            .loops
            .iter()
            .enumerate()
            .map(|(index, coedges)| {
                let mut trims: Vec<BrepTrim> = coedges
                    .iter()
                    .map(|c| BrepTrim {
                        edge: Some(c.edge),
                        reversed: c.reversed ^ face.reversed,
                        kind: if coedges.iter().filter(|o| o.edge == c.edge).count() > 1 {
                            TrimKind::Seam
                        } else {
                            TrimKind::Boundary
                        },
                    })
                    .collect();
                if face.reversed {
                    trims.reverse();
                }
                BrepLoop {
                    kind: if index == 0 { LoopKind::Outer } else { LoopKind::Inner },
                    trims,
                }
            })
            .collect();

        let surface = match &face.surface {
            HostSurface::Plane(plane) => {
                let mut u_domain = (0.0_f64, 0.0_f64);
                let mut v_domain = (0.0_f64, 0.0_f64);
                let ends = face
                    .loops
                    .iter()
                    .flatten()
                    .filter_map(|c| solid.coedge_curve(c))
                    .flat_map(|c| [c.start_point(), c.end_point()]);
                for p in ends {
                    let d = p - plane.origin;
                    let (u, v) = (d.dot(plane.x_dir), d.dot(plane.y_dir));
                    u_domain = (u_domain.0.min(u), u_domain.1.max(u));
                    v_domain = (v_domain.0.min(v), v_domain.1.max(v));
                }
                Surface::Plane(PlaneSurface {
                    origin: plane.origin,
                    u_axis: plane.x_dir,
                    v_axis: plane.y_dir,
                    u_domain,
                    v_domain,
                })
            }
            HostSurface::Nurbs(nurbs) => Surface::Nurbs(nurbs.clone()),
        };
        faces.push(BrepFace {
            surface,
            reversed: face.reversed,
            loops,
        });
    }

    let mut brep = Brep {
        faces,
        edges,
        orientation: SolidOrientation::None,
    };
    brep.refresh_trim_kinds();
    let joined = brep.join_naked_edges(tolerance.vertex);
    if joined > 0 {
        diagnostics.emit(Diagnostic::remark(
            DiagnosticKind::ToleranceViolation,
            format!("joined {joined} pair(s) of naked edges"),
        ));
    }

    brep.orientation = match solid.kind {
        BrepKind::Solid if brep.is_closed() => SolidOrientation::Outward,
        BrepKind::Void if brep.is_closed() => SolidOrientation::Inward,
        BrepKind::OpenShell => SolidOrientation::None,
        kind => {
            diagnostics.emit(Diagnostic::warning(
                DiagnosticKind::PartialAssemblyFailure,
                format!("host {} is not closed; decoded as an open shell", kind.as_str()),
            ));
            SolidOrientation::None
        }
    };
    Ok(brep)
}
