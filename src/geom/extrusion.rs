//! Profile curves swept along a straight direction.
//!
//! An [`Extrusion`] is lowered to a [`Brep`] before conversion: one side face
//! per profile segment (planar for lines, ruled NURBS otherwise) plus two
//! planar caps when the profile is closed and `capped` is set.

use super::brep::{Brep, BrepEdge, BrepFace, BrepLoop, BrepTrim, LoopKind, SolidOrientation, TrimKind, newell_normal};
use super::core::{Point3, Vec3};
use super::curve::{Curve, Curve3, Line3, NurbsCurve3};
use super::error::GeometryError;
use super::surface::{NurbsSurface, PlaneSurface, Surface};

const PROFILE_SAMPLES: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Extrusion {
    pub profile: Curve,
    pub direction: Vec3,
    pub capped: bool,
}

impl Extrusion {
    #[must_use]
    pub const fn new(profile: Curve, direction: Vec3, capped: bool) -> Self {
        Self {
            profile,
            direction,
            capped,
        }
    }

    /// Profile segments with polylines broken into lines.
    fn segments(profile: &Curve) -> Vec<Curve> {
        profile
            .exploded()
            .into_iter()
            .flat_map(|segment| match segment {
                Curve::Polyline(polyline) => polyline.segments().map(Curve::Line).collect(),
                other => vec![other.clone()],
            })
            .collect()
    }

    /// Lowers the extrusion to a Brep. `closure_gap` decides whether the
    /// profile is closed.
    pub fn to_brep(&self, closure_gap: f64) -> Result<Brep, GeometryError> {
        let d = self.direction;
        if d.length() <= closure_gap {
            return Err(GeometryError::Degenerate("extrusion direction has zero length".to_owned()));
        }
        let closed = self.profile.is_closed_within(closure_gap);
        if self.capped && !closed {
            return Err(GeometryError::InvalidTopology("cannot cap an open profile".to_owned()));
        }

        let mut segments = Self::segments(&self.profile);
        if segments.is_empty() {
            return Err(GeometryError::TooFewPoints {
                kind: "extrusion profile",
                required: 1,
                actual: 0,
            });
        }

        // Closed profiles run counter-clockwise around the extrusion
        // direction so that side faces face outward.
        let mut normal = None;
        if closed {
            let samples = profile_samples(&segments);
            let n = newell_normal(&samples)
                .ok_or_else(|| GeometryError::Degenerate("extrusion profile encloses no area".to_owned()))?;
            if n.dot(d) < 0.0 {
                segments = segments.iter().rev().map(Curve::reversed).collect();
                normal = Some(-n);
            } else {
                normal = Some(n);
            }
        }

        let count = segments.len();
        let rail_count = if closed { count } else { count + 1 };
        let mut edges = Vec::with_capacity(2 * count + rail_count);
        for segment in &segments {
            edges.push(BrepEdge::new(segment.clone()));
        }
        for segment in &segments {
            edges.push(BrepEdge::new(translated(segment, d)));
        }
        for i in 0..rail_count {
            let start = if i < count { segments[i].start_point() } else { segments[count - 1].end_point() };
            edges.push(BrepEdge::new(Curve::Line(Line3::new(start, start + d))));
        }
        let bottom = |i: usize| i;
        let top = |i: usize| count + i;
        let rail = |i: usize| 2 * count + i % rail_count;

        let trim = |edge: usize, reversed: bool| BrepTrim {
            edge: Some(edge),
            reversed,
            kind: TrimKind::Boundary,
        };

        let mut faces = Vec::with_capacity(count + 2);
        for (i, segment) in segments.iter().enumerate() {
            let seam = closed && count == 1;
            let mut trims = vec![
                trim(bottom(i), false),
                trim(rail(i + 1), false),
                trim(top(i), true),
                trim(rail(i), true),
            ];
            if seam {
                trims[1].kind = TrimKind::Seam;
                trims[3].kind = TrimKind::Seam;
            }
            faces.push(BrepFace {
                surface: side_surface(segment, d)?,
                reversed: false,
                loops: vec![BrepLoop {
                    kind: LoopKind::Outer,
                    trims,
                }],
            });
        }

        if let (true, Some(n)) = (self.capped, normal) {
            let samples = profile_samples(&segments);
            let base = samples[0];
            let lifted: Vec<Point3> = samples.iter().map(|p| *p + d).collect();
            faces.push(BrepFace {
                surface: Surface::Plane(PlaneSurface::fitted(base, -n, &samples)?),
                reversed: false,
                loops: vec![BrepLoop {
                    kind: LoopKind::Outer,
                    trims: (0..count).rev().map(|i| trim(bottom(i), true)).collect(),
                }],
            });
            faces.push(BrepFace {
                surface: Surface::Plane(PlaneSurface::fitted(base + d, n, &lifted)?),
                reversed: false,
                loops: vec![BrepLoop {
                    kind: LoopKind::Outer,
                    trims: (0..count).map(|i| trim(top(i), false)).collect(),
                }],
            });
        }

        let mut brep = Brep {
            faces,
            edges,
            orientation: SolidOrientation::None,
        };
        brep.refresh_trim_kinds();
        brep.orientation = brep.compute_orientation();
        Ok(brep)
    }
}

fn profile_samples(segments: &[Curve]) -> Vec<Point3> {
    let mut samples = Vec::with_capacity(segments.len() * PROFILE_SAMPLES);
    for segment in segments {
        let (a, b) = segment.domain();
        let steps = if matches!(segment, Curve::Line(_)) { 1 } else { PROFILE_SAMPLES };
        samples.extend((0..steps).map(|k| segment.point_at(a + (b - a) * k as f64 / steps as f64)));
    }
    samples
}

fn translated(curve: &Curve, d: Vec3) -> Curve {
    match curve {
        Curve::Line(line) => Curve::Line(Line3::new(line.start + d, line.end + d)),
        Curve::Arc(arc) => {
            let mut arc = *arc;
            arc.center = arc.center + d;
            Curve::Arc(arc)
        }
        Curve::Ellipse(ellipse) => {
            let mut ellipse = *ellipse;
            ellipse.center = ellipse.center + d;
            Curve::Ellipse(ellipse)
        }
        Curve::Nurbs(nurbs) => Curve::Nurbs(NurbsCurve3 {
            control_points: nurbs.control_points.iter().map(|p| *p + d).collect(),
            ..nurbs.clone()
        }),
        Curve::Polyline(_) | Curve::PolyCurve(_) => Curve::PolyCurve(
            curve.exploded().into_iter().map(|segment| translated(segment, d)).collect(),
        ),
    }
}

/// Surface swept by `segment` along `d`, with `u` along the segment and `v`
/// along `d`.
fn side_surface(segment: &Curve, d: Vec3) -> Result<Surface, GeometryError> {
    if let Curve::Line(line) = segment {
        let normal = line.direction().cross(d);
        let corners = [line.start, line.end, line.end + d, line.start + d];
        return Ok(Surface::Plane(PlaneSurface::fitted(line.start, normal, &corners)?));
    }

    let rail = segment
        .to_nurbs()
        .ok_or_else(|| GeometryError::InvalidNurbs("profile segment has no NURBS form".to_owned()))?;
    let mut control_points = Vec::with_capacity(2 * rail.control_points.len());
    let mut weights = Vec::with_capacity(2 * rail.control_points.len());
    for (i, p) in rail.control_points.iter().enumerate() {
        control_points.push(*p);
        control_points.push(*p + d);
        weights.push(rail.weight(i));
        weights.push(rail.weight(i));
    }
    let u_count = rail.control_points.len();
    Ok(Surface::Nurbs(NurbsSurface::new(
        rail.degree,
        1,
        u_count,
        2,
        control_points,
        rail.knots,
        vec![0.0, 0.0, 1.0, 1.0],
        rail.weights.is_some().then_some(weights),
    )?))
}
