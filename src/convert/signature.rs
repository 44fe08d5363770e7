//! Structural content hashes used as cache keys.
//!
//! Two values get the same signature when they would convert to the same host
//! geometry: control points are compared after scaling to host units and
//! rounding to the vertex tolerance, knots after normalising to `[0, 1]`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::geom::{Brep, Curve, Curve3, GeometryValue, Mesh, NurbsCurve3, NurbsSurface, Point3, Surface, Vec3};

/// Resolution for weights, knots, angles and unit vectors.
const FINE: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometrySignature(pub u64);

impl GeometrySignature {
    /// Signature of `value` once scaled by `factor` into host units.
    #[must_use]
    pub fn of(value: &GeometryValue, factor: f64, vertex_tolerance: f64) -> Self {
        let mut hasher = SignatureHasher {
            state: DefaultHasher::new(),
            factor,
            step: if vertex_tolerance.is_finite() && vertex_tolerance > 0.0 {
                vertex_tolerance
            } else {
                f64::EPSILON
            },
        };
        factor.to_bits().hash(&mut hasher.state);
        hasher.value(value);
        Self(hasher.state.finish())
    }
}

struct SignatureHasher {
    state: DefaultHasher,
    factor: f64,
    step: f64,
}

#[allow(clippy::cast_possible_truncation)]
fn quantize(value: f64, resolution: f64) -> i64 {
    (value * resolution).round() as i64
}

impl SignatureHasher {
    fn tag(&mut self, tag: &str) {
        tag.hash(&mut self.state);
    }

    fn count(&mut self, n: usize) {
        n.hash(&mut self.state);
    }

    fn flag(&mut self, b: bool) {
        b.hash(&mut self.state);
    }

    fn length(&mut self, value: f64) {
        quantize(value * self.factor, 1.0 / self.step).hash(&mut self.state);
    }

    fn fine(&mut self, value: f64) {
        quantize(value, FINE).hash(&mut self.state);
    }

    fn point(&mut self, p: Point3) {
        self.length(p.x);
        self.length(p.y);
        self.length(p.z);
    }

    fn direction(&mut self, v: Vec3) {
        self.fine(v.x);
        self.fine(v.y);
        self.fine(v.z);
    }

    fn points(&mut self, points: &[Point3]) {
        self.count(points.len());
        for p in points {
            self.point(*p);
        }
    }

    fn weights(&mut self, weights: Option<&Vec<f64>>) {
        self.flag(weights.is_some());
        for w in weights.into_iter().flatten() {
            self.fine(*w);
        }
    }

    fn knots(&mut self, knots: &[f64]) {
        self.count(knots.len());
        let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
            return;
        };
        let span = last - first;
        for k in knots {
            let normalized = if span > 0.0 { (k - first) / span } else { 0.0 };
            self.fine(normalized);
        }
    }

    fn nurbs_curve(&mut self, nurbs: &NurbsCurve3) {
        self.count(nurbs.degree);
        self.flag(nurbs.is_rational());
        self.points(&nurbs.control_points);
        self.weights(nurbs.weights.as_ref());
        self.knots(&nurbs.knots);
    }

    fn curve(&mut self, curve: &Curve) {
        self.tag(curve.kind_name());
        match curve {
            Curve::Line(line) => {
                self.point(line.start);
                self.point(line.end);
            }
            Curve::Polyline(polyline) => self.points(polyline.points()),
            Curve::Arc(arc) => {
                self.point(arc.center);
                self.direction(arc.x_axis);
                self.direction(arc.y_axis);
                self.length(arc.radius);
                self.fine(arc.start_angle);
                self.fine(arc.sweep_angle);
            }
            Curve::Ellipse(ellipse) => {
                self.point(ellipse.center);
                self.direction(ellipse.x_axis);
                self.direction(ellipse.y_axis);
                self.length(ellipse.radius_x);
                self.length(ellipse.radius_y);
                self.fine(ellipse.start_angle);
                self.fine(ellipse.sweep_angle);
            }
            Curve::Nurbs(nurbs) => self.nurbs_curve(nurbs),
            Curve::PolyCurve(segments) => {
                self.count(segments.len());
                for segment in segments {
                    self.curve(segment);
                }
            }
        }
    }

    fn nurbs_surface(&mut self, nurbs: &NurbsSurface) {
        self.count(nurbs.degree_u);
        self.count(nurbs.degree_v);
        self.count(nurbs.u_count);
        self.count(nurbs.v_count);
        self.flag(nurbs.is_rational());
        self.points(&nurbs.control_points);
        self.weights(nurbs.weights.as_ref());
        self.knots(&nurbs.knots_u);
        self.knots(&nurbs.knots_v);
    }

    fn surface(&mut self, surface: &Surface) {
        match surface {
            Surface::Plane(plane) => {
                self.tag("plane");
                self.point(plane.origin);
                self.direction(plane.u_axis);
                self.direction(plane.v_axis);
                for bound in [plane.u_domain.0, plane.u_domain.1, plane.v_domain.0, plane.v_domain.1] {
                    self.length(bound);
                }
            }
            Surface::Nurbs(nurbs) => {
                self.tag("nurbs surface");
                self.nurbs_surface(nurbs);
            }
        }
    }

    fn brep(&mut self, brep: &Brep) {
        self.count(brep.faces.len());
        self.count(brep.edges.len());
        brep.orientation.hash(&mut self.state);
        for face in &brep.faces {
            self.flag(face.reversed);
            self.surface(&face.surface);
            self.count(face.loops.len());
            for brep_loop in &face.loops {
                self.count(brep_loop.trims.len());
                for trim in &brep_loop.trims {
                    trim.edge.hash(&mut self.state);
                    self.flag(trim.reversed);
                }
            }
        }
        for edge in &brep.edges {
            self.flag(edge.reversed);
            let (t0, t1) = edge.curve.domain();
            self.fine(t0);
            self.fine(t1);
            self.curve(&edge.curve);
        }
    }

    fn mesh(&mut self, mesh: &Mesh) {
        self.points(&mesh.vertices);
        self.count(mesh.faces.len());
        for face in &mesh.faces {
            face.hash(&mut self.state);
        }
    }

    fn value(&mut self, value: &GeometryValue) {
        self.tag(value.kind_name());
        match value {
            GeometryValue::Point(p) => self.point(*p),
            GeometryValue::Curve(curve) => self.curve(curve),
            GeometryValue::Surface(surface) => self.surface(surface),
            GeometryValue::Brep(brep) => self.brep(brep),
            GeometryValue::Mesh(mesh) => self.mesh(mesh),
            GeometryValue::SubD(subd) => {
                self.points(&subd.vertices);
                subd.faces.hash(&mut self.state);
                subd.creases.hash(&mut self.state);
            }
            GeometryValue::Extrusion(extrusion) => {
                self.curve(&extrusion.profile);
                self.length(extrusion.direction.x);
                self.length(extrusion.direction.y);
                self.length(extrusion.direction.z);
                self.flag(extrusion.capped);
            }
            GeometryValue::PointCloud(points) => self.points(points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Line3, NurbsCurve3};

    const VERTEX: f64 = 1e-3;

    fn cubic(offset: f64) -> GeometryValue {
        let points = (0..5)
            .map(|i| Point3::new(f64::from(i), f64::from(i % 2) + offset, 0.0))
            .collect();
        GeometryValue::Curve(Curve::Nurbs(NurbsCurve3::clamped_uniform(3, points).expect("cubic")))
    }

    #[test]
    fn identical_content_hashes_equal() {
        assert_eq!(GeometrySignature::of(&cubic(0.0), 1.0, VERTEX), GeometrySignature::of(&cubic(0.0), 1.0, VERTEX));
    }

    #[test]
    fn sub_tolerance_noise_is_ignored() {
        assert_eq!(
            GeometrySignature::of(&cubic(0.0), 1.0, VERTEX),
            GeometrySignature::of(&cubic(1e-6), 1.0, VERTEX)
        );
        assert_ne!(
            GeometrySignature::of(&cubic(0.0), 1.0, VERTEX),
            GeometrySignature::of(&cubic(0.5), 1.0, VERTEX)
        );
    }

    #[test]
    fn scale_factor_is_part_of_the_key() {
        let line = GeometryValue::Curve(Curve::Line(Line3::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0))));
        assert_ne!(
            GeometrySignature::of(&line, 1.0, VERTEX),
            GeometrySignature::of(&line, 0.3048, VERTEX)
        );
    }

    #[test]
    fn knot_parameterisation_does_not_matter() {
        let GeometryValue::Curve(Curve::Nurbs(mut nurbs)) = cubic(0.0) else {
            unreachable!();
        };
        let original = GeometryValue::Curve(Curve::Nurbs(nurbs.clone()));
        for k in &mut nurbs.knots {
            *k = *k * 10.0 + 5.0;
        }
        assert_eq!(
            GeometrySignature::of(&original, 1.0, VERTEX),
            GeometrySignature::of(&GeometryValue::Curve(Curve::Nurbs(nurbs)), 1.0, VERTEX)
        );
    }
}
