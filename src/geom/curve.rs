use std::f64::consts::{FRAC_PI_2, TAU};

use super::core::{Point3, Tolerance, Vec3};
use super::error::GeometryError;

/// Parametric curve in model space.
pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::DERIVATIVE.relative_to(span);
        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        (self.point_at(t1) - self.point_at(t0)) * (1.0 / (t1 - t0))
    }

    #[must_use]
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }

    #[must_use]
    fn start_point(&self) -> Point3 {
        self.point_at(self.domain().0)
    }

    #[must_use]
    fn end_point(&self) -> Point3 {
        self.point_at(self.domain().1)
    }

    /// Arc length between two parameters.
    #[must_use]
    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        integrate_speed(|t| self.derivative_at(t).length(), t0, t1, 32)
    }

    #[must_use]
    fn length(&self) -> f64 {
        let (a, b) = self.domain();
        self.length_between(a, b)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    pub start: Point3,
    pub end: Point3,
}

impl Line3 {
    #[must_use]
    pub const fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn direction(self) -> Vec3 {
        self.end - self.start
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::new(self.end, self.start)
    }
}

impl Curve3 for Line3 {
    fn point_at(&self, t: f64) -> Point3 {
        self.start + self.direction() * t
    }

    fn derivative_at(&self, _t: f64) -> Vec3 {
        self.direction()
    }

    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        self.direction().length() * (t1 - t0).abs()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polyline3
// ─────────────────────────────────────────────────────────────────────────────

/// Polyline parameterised by vertex index, `domain() == (0, n - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline3 {
    points: Vec<Point3>,
}

impl Polyline3 {
    pub fn new(points: Vec<Point3>) -> Result<Self, GeometryError> {
        if points.len() < 2 {
            return Err(GeometryError::TooFewPoints {
                kind: "polyline",
                required: 2,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Point3] {
        &mut self.points
    }

    #[must_use]
    pub fn segments(&self) -> impl Iterator<Item = Line3> + '_ {
        self.points.windows(2).map(|w| Line3::new(w[0], w[1]))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2
            && Tolerance::DEFAULT.approx_eq_point3(self.points[0], self.points[self.points.len() - 1])
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }
}

impl Curve3 for Polyline3 {
    fn point_at(&self, t: f64) -> Point3 {
        let last = self.points.len() - 1;
        let t = t.clamp(0.0, last as f64);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = (t.floor() as usize).min(last - 1);
        self.points[index].lerp(self.points[index + 1], t - index as f64)
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, (self.points.len() - 1) as f64)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let last = self.points.len() - 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = (t.clamp(0.0, last as f64).floor() as usize).min(last - 1);
        self.points[index + 1] - self.points[index]
    }

    fn length(&self) -> f64 {
        self.segments().map(|s| s.direction().length()).sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arc3 / Ellipse3
// ─────────────────────────────────────────────────────────────────────────────

/// Circular arc in the plane spanned by `x_axis`/`y_axis` (orthonormal).
///
/// A sweep of `TAU` is a full circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc3 {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
}

impl Arc3 {
    #[must_use]
    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        radius: f64,
        start_angle: f64,
        sweep_angle: f64,
    ) -> Self {
        let (x_axis, y_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Self {
            center,
            x_axis,
            y_axis,
            radius,
            start_angle,
            sweep_angle,
        }
    }

    #[must_use]
    pub fn circle(center: Point3, normal: Vec3, radius: f64) -> Self {
        let normal = normal.normalized().unwrap_or(Vec3::Z);
        Self::from_center_xaxis_normal(center, normal.any_perpendicular(), normal, radius, 0.0, TAU)
    }

    /// Arc through three points, `None` when they are collinear.
    #[must_use]
    pub fn from_three_points(start: Point3, interior: Point3, end: Point3) -> Option<Self> {
        let a = interior - start;
        let b = end - start;
        let normal = a.cross(b);
        let n2 = normal.length_squared();
        if n2 <= Tolerance::ZERO_LENGTH.eps || !n2.is_finite() {
            return None;
        }

        // Circumcenter of the triangle (start, interior, end).
        let offset = (b.cross(normal) * a.length_squared() + normal.cross(a) * b.length_squared())
            * (1.0 / (2.0 * n2));
        let center = start + offset;
        let radius = offset.length();
        let x_axis = (start - center).normalized()?;
        let normal = normal.normalized()?;
        let y_axis = normal.cross(x_axis);

        let angle_of = |p: Point3| {
            let v = p - center;
            v.dot(y_axis).atan2(v.dot(x_axis)).rem_euclid(TAU)
        };
        Some(Self {
            center,
            x_axis,
            y_axis,
            radius,
            start_angle: 0.0,
            sweep_angle: angle_of(end),
        })
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.x_axis.cross(self.y_axis)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sweep_angle.abs() >= TAU - Tolerance::DEFAULT.eps
    }

    #[must_use]
    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        self.center + self.x_axis * (self.radius * angle.cos()) + self.y_axis * (self.radius * angle.sin())
    }

    /// Same arc with a reparameterised sub-range of angles.
    #[must_use]
    pub fn sub_arc(&self, start_angle: f64, sweep_angle: f64) -> Self {
        Self {
            start_angle,
            sweep_angle,
            ..*self
        }
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            y_axis: -self.y_axis,
            start_angle: -(self.start_angle + self.sweep_angle),
            ..*self
        }
    }

    #[must_use]
    pub fn to_nurbs(&self) -> NurbsCurve3 {
        conic_to_nurbs(
            self.center,
            self.x_axis * self.radius,
            self.y_axis * self.radius,
            self.start_angle,
            self.sweep_angle,
        )
    }
}

impl Curve3 for Arc3 {
    fn point_at(&self, t: f64) -> Point3 {
        self.point_at_angle(self.start_angle + self.sweep_angle * t.clamp(0.0, 1.0))
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let angle = self.start_angle + self.sweep_angle * t.clamp(0.0, 1.0);
        (self.x_axis * (-angle.sin()) + self.y_axis * angle.cos()) * (self.radius * self.sweep_angle)
    }

    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        (self.radius * self.sweep_angle * (t1 - t0)).abs()
    }
}

/// Elliptical arc; a sweep of `TAU` is a full ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse3 {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius_x: f64,
    pub radius_y: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
}

impl Ellipse3 {
    #[must_use]
    pub fn new(center: Point3, x_axis: Vec3, y_axis: Vec3, radius_x: f64, radius_y: f64) -> Self {
        let (x_axis, y_axis) = frame_axes_from_xy(x_axis, y_axis);
        Self {
            center,
            x_axis,
            y_axis,
            radius_x,
            radius_y,
            start_angle: 0.0,
            sweep_angle: TAU,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sweep_angle.abs() >= TAU - Tolerance::DEFAULT.eps
    }

    #[must_use]
    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        self.center
            + self.x_axis * (self.radius_x * angle.cos())
            + self.y_axis * (self.radius_y * angle.sin())
    }

    #[must_use]
    pub fn sub_arc(&self, start_angle: f64, sweep_angle: f64) -> Self {
        Self {
            start_angle,
            sweep_angle,
            ..*self
        }
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            y_axis: -self.y_axis,
            start_angle: -(self.start_angle + self.sweep_angle),
            ..*self
        }
    }

    #[must_use]
    pub fn to_nurbs(&self) -> NurbsCurve3 {
        conic_to_nurbs(
            self.center,
            self.x_axis * self.radius_x,
            self.y_axis * self.radius_y,
            self.start_angle,
            self.sweep_angle,
        )
    }
}

impl Curve3 for Ellipse3 {
    fn point_at(&self, t: f64) -> Point3 {
        self.point_at_angle(self.start_angle + self.sweep_angle * t.clamp(0.0, 1.0))
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let angle = self.start_angle + self.sweep_angle * t.clamp(0.0, 1.0);
        (self.x_axis * (-self.radius_x * angle.sin()) + self.y_axis * (self.radius_y * angle.cos()))
            * self.sweep_angle
    }
}

/// Rational quadratic form of `center + u cos(a) + v sin(a)` for `a` in
/// `[start, start + sweep]`, with at most a quarter turn per span.
fn conic_to_nurbs(center: Point3, u: Vec3, v: Vec3, start: f64, sweep: f64) -> NurbsCurve3 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let spans = ((sweep.abs() / FRAC_PI_2) - 1e-9).ceil().max(1.0) as usize;
    let delta = sweep / spans as f64;
    let w_mid = (delta * 0.5).cos();
    let at = |a: f64| center + u * a.cos() + v * a.sin();

    let mut control_points = Vec::with_capacity(2 * spans + 1);
    let mut weights = Vec::with_capacity(2 * spans + 1);
    let mut knots = vec![0.0; 3];
    control_points.push(at(start));
    weights.push(1.0);
    for i in 0..spans {
        let a0 = start + delta * i as f64;
        let mid = a0 + delta * 0.5;
        control_points.push(center + (u * mid.cos() + v * mid.sin()) * (1.0 / w_mid));
        weights.push(w_mid);
        control_points.push(at(a0 + delta));
        weights.push(1.0);
        let k = (i + 1) as f64 / spans as f64;
        if i + 1 < spans {
            knots.push(k);
            knots.push(k);
        }
    }
    knots.extend([1.0; 3]);

    NurbsCurve3 {
        degree: 2,
        control_points,
        knots,
        weights: Some(weights),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NurbsCurve3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve3 {
    pub degree: usize,
    pub control_points: Vec<Point3>,
    pub knots: Vec<f64>,
    pub weights: Option<Vec<f64>>,
}

/// Closed-form conic recovered from a rational quadratic span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conic {
    Line(Line3),
    Arc(Arc3),
    Ellipse(Ellipse3),
}

impl NurbsCurve3 {
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        knots: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, GeometryError> {
        if degree == 0 {
            return Err(GeometryError::InvalidNurbs("degree must be >= 1".to_owned()));
        }
        if control_points.len() <= degree {
            return Err(GeometryError::InvalidNurbs(format!(
                "degree {degree} needs more than {degree} control points, got {}",
                control_points.len()
            )));
        }

        let expected_knot_len = control_points.len() + degree + 1;
        if knots.len() != expected_knot_len {
            return Err(GeometryError::InvalidNurbs(format!(
                "knot length must be {expected_knot_len}, got {}",
                knots.len()
            )));
        }
        if !is_non_decreasing(&knots) || knots.iter().any(|k| !k.is_finite()) {
            return Err(GeometryError::InvalidNurbs("knots must be finite and non-decreasing".to_owned()));
        }
        if knots[degree] >= knots[control_points.len()] {
            return Err(GeometryError::InvalidNurbs("empty knot domain".to_owned()));
        }

        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() {
                return Err(GeometryError::InvalidNurbs(
                    "weights length must match control point count".to_owned(),
                ));
            }
            if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err(GeometryError::InvalidNurbs("weights must be finite and > 0".to_owned()));
            }
        }

        Ok(Self {
            degree,
            control_points,
            knots,
            weights,
        })
    }

    /// Clamped, uniform B-spline through the given control points.
    pub fn clamped_uniform(degree: usize, control_points: Vec<Point3>) -> Result<Self, GeometryError> {
        let n = control_points.len();
        if n <= degree {
            return Err(GeometryError::TooFewPoints {
                kind: "nurbs curve",
                required: degree + 1,
                actual: n,
            });
        }
        let interior = n - degree - 1;
        let mut knots = vec![0.0; degree + 1];
        knots.extend((1..=interior).map(|i| i as f64));
        knots.extend(std::iter::repeat_n((interior + 1) as f64, degree + 1));
        Self::new(degree, control_points, knots, None)
    }

    /// Closed periodic B-spline: the first `degree` points are wrapped onto
    /// the end and the knot vector is uniform and unclamped.
    pub fn periodic(degree: usize, control_points: &[Point3]) -> Result<Self, GeometryError> {
        if control_points.len() <= degree {
            return Err(GeometryError::TooFewPoints {
                kind: "periodic nurbs curve",
                required: degree + 1,
                actual: control_points.len(),
            });
        }
        let mut points = control_points.to_vec();
        points.extend_from_slice(&control_points[..degree]);
        let knot_count = points.len() + degree + 1;
        let knots = (0..knot_count).map(|i| i as f64 - degree as f64).collect();
        Self::new(degree, points, knots, None)
    }

    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights.as_ref().is_some_and(|w| {
            let first = w[0];
            w.iter().any(|x| (x - first).abs() > Tolerance::DEFAULT.eps * first.abs().max(1.0))
        })
    }

    #[must_use]
    pub fn weight(&self, index: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[index])
    }

    #[must_use]
    pub fn span_count(&self) -> usize {
        self.interior_knots().len() + 1
    }

    /// Distinct knot values strictly inside the domain, in increasing order.
    #[must_use]
    pub fn interior_knots(&self) -> Vec<f64> {
        let (a, b) = self.domain();
        let mut result: Vec<f64> = Vec::new();
        for &k in &self.knots {
            if k > a && k < b && result.last() != Some(&k) {
                result.push(k);
            }
        }
        result
    }

    /// Exact multiplicity of the knot value `u`.
    #[must_use]
    pub fn multiplicity(&self, u: f64) -> usize {
        self.knots.iter().filter(|&&k| k == u).count()
    }

    #[must_use]
    pub fn is_clamped(&self) -> bool {
        let p = self.degree;
        let n = self.control_points.len();
        let start = self.knots[p];
        let end = self.knots[n];
        self.knots[..=p].iter().all(|&k| k == start) && self.knots[n..].iter().all(|&k| k == end)
    }

    fn homogeneous_points(&self) -> Vec<HPoint4> {
        self.control_points
            .iter()
            .enumerate()
            .map(|(i, p)| HPoint4::from_point(*p, self.weight(i)))
            .collect()
    }

    fn from_homogeneous(degree: usize, points: &[HPoint4], knots: Vec<f64>, rational: bool) -> Self {
        let control_points = points.iter().map(|h| h.to_point3().unwrap_or(Point3::ORIGIN)).collect();
        let weights = rational.then(|| points.iter().map(|h| h.w).collect());
        Self {
            degree,
            control_points,
            knots,
            weights,
        }
    }

    /// Inserts `u` once (Boehm). `u` must lie inside the domain.
    #[must_use]
    pub fn insert_knot(&self, u: f64) -> Self {
        let p = self.degree;
        let n = self.control_points.len() - 1;
        let k = insertion_span(&self.knots, n, u);
        let s = self.knots[..=k].iter().rev().take_while(|&&x| x == u).count();
        let old = self.homogeneous_points();

        let mut new_points = Vec::with_capacity(old.len() + 1);
        for i in 0..=n + 1 {
            let q = if i + p <= k {
                old[i]
            } else if i + s > k {
                old[i - 1]
            } else {
                let denom = self.knots[i + p] - self.knots[i];
                let alpha = if denom == 0.0 { 0.0 } else { (u - self.knots[i]) / denom };
                old[i - 1].lerp(old[i], alpha)
            };
            new_points.push(q);
        }

        let mut knots = self.knots.clone();
        knots.insert(k + 1, u);
        Self::from_homogeneous(p, &new_points, knots, self.weights.is_some())
    }

    fn refined_to(&self, u: f64, multiplicity: usize) -> Self {
        let mut curve = self.clone();
        while curve.multiplicity(u) < multiplicity {
            curve = curve.insert_knot(u);
        }
        curve
    }

    fn knot_run(&self, u: f64) -> (usize, usize) {
        let first = self.knots.iter().position(|&k| k == u).unwrap_or(0);
        (first, self.multiplicity(u))
    }

    /// Equivalent curve with a clamped knot vector at both ends.
    #[must_use]
    pub fn clamped(&self) -> Self {
        if self.is_clamped() {
            return self.clone();
        }
        let p = self.degree;
        let (a, b) = self.domain();

        let refined = self.refined_to(a, p);
        let (first, count) = refined.knot_run(a);
        let cut = first + count - p;
        let mut knots = vec![a];
        knots.extend_from_slice(&refined.knots[cut..]);
        let head = Self {
            degree: p,
            control_points: refined.control_points[cut - 1..].to_vec(),
            knots,
            weights: refined.weights.as_ref().map(|w| w[cut - 1..].to_vec()),
        };

        let refined = head.refined_to(b, p);
        let (first, _) = refined.knot_run(b);
        let mut knots = refined.knots[..first + p].to_vec();
        knots.push(b);
        Self {
            degree: p,
            control_points: refined.control_points[..first].to_vec(),
            knots,
            weights: refined.weights.as_ref().map(|w| w[..first].to_vec()),
        }
    }

    /// Splits at an interior parameter; both halves come back clamped.
    #[must_use]
    pub fn split_at(&self, u: f64) -> Option<(Self, Self)> {
        let (a, b) = self.domain();
        if !(u > a && u < b) {
            return None;
        }
        let p = self.degree;
        let refined = self.clamped().refined_to(u, p);
        let (first, count) = refined.knot_run(u);

        let mut left_knots = refined.knots[..first + p].to_vec();
        left_knots.push(u);
        let left = Self {
            degree: p,
            control_points: refined.control_points[..first].to_vec(),
            knots: left_knots,
            weights: refined.weights.as_ref().map(|w| w[..first].to_vec()),
        };

        let tail = first + count - p;
        let mut right_knots = vec![u];
        right_knots.extend_from_slice(&refined.knots[tail..]);
        let right = Self {
            degree: p,
            control_points: refined.control_points[tail - 1..].to_vec(),
            knots: right_knots,
            weights: refined.weights.as_ref().map(|w| w[tail - 1..].to_vec()),
        };
        Some((left, right))
    }

    /// Splits at every parameter in `params` that lies inside the domain.
    #[must_use]
    pub fn split_at_parameters(&self, params: &[f64]) -> Vec<Self> {
        let mut pieces = Vec::with_capacity(params.len() + 1);
        let mut rest = self.clone();
        for &t in params {
            if let Some((left, right)) = rest.split_at(t) {
                pieces.push(left);
                rest = right;
            }
        }
        pieces.push(rest);
        pieces
    }

    /// Single-span pieces, one per distinct knot interval.
    #[must_use]
    pub fn spans(&self) -> Vec<Self> {
        self.split_at_parameters(&self.interior_knots())
    }

    #[must_use]
    pub fn subcurve(&self, t0: f64, t1: f64) -> Self {
        let (a, b) = self.domain();
        let mut curve = self.clamped();
        if t0 > a {
            if let Some((_, right)) = curve.split_at(t0) {
                curve = right;
            }
        }
        if t1 < b {
            if let Some((left, _)) = curve.split_at(t1) {
                curve = left;
            }
        }
        curve
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        let (a, b) = self.domain();
        let mut control_points = self.control_points.clone();
        control_points.reverse();
        let knots = self.knots.iter().rev().map(|k| a + b - k).collect();
        let weights = self.weights.as_ref().map(|w| w.iter().rev().copied().collect());
        Self {
            degree: self.degree,
            control_points,
            knots,
            weights,
        }
    }

    /// Recognises a single-span rational quadratic as a line, circular arc
    /// or elliptical arc. Every sampled point must lie within `tolerance`.
    #[must_use]
    pub fn as_conic(&self, tolerance: f64) -> Option<Conic> {
        if self.degree != 2 || self.control_points.len() != 3 {
            return None;
        }
        let [p0, p1, p2] = [self.control_points[0], self.control_points[1], self.control_points[2]];
        let (w0, w1, w2) = (self.weight(0), self.weight(1), self.weight(2));
        let w = w1 / (w0 * w2).sqrt();

        let m = p0.midpoint(p2);
        if (p1 - m).length() <= tolerance {
            return Some(Conic::Line(Line3::new(p0, p2)));
        }
        if !(w > 0.0 && w < 1.0 - Tolerance::DEFAULT.eps) {
            return None;
        }

        // Conjugate semi-diameters of the ellipse through the span.
        let w2s = w * w;
        let center = m - (p1 - m) * (w2s / (1.0 - w2s));
        let u = (m - center) * (1.0 / w);
        let v = (p2 - m) * (1.0 / (1.0 - w2s).sqrt());
        let half = w.acos();

        let phi0 = 0.5 * (2.0 * u.dot(v)).atan2(u.length_squared() - v.length_squared());
        let major = u * phi0.cos() + v * phi0.sin();
        let minor = v * phi0.cos() - u * phi0.sin();
        let (a, b) = (major.length(), minor.length());
        let x_axis = major.normalized()?;
        let y_axis = minor.normalized()?;
        let start_angle = -half - phi0;
        let sweep_angle = 2.0 * half;

        let conic = if (a - b).abs() <= tolerance {
            Conic::Arc(Arc3 {
                center,
                x_axis,
                y_axis,
                radius: 0.5 * (a + b),
                start_angle,
                sweep_angle,
            })
        } else {
            Conic::Ellipse(Ellipse3 {
                center,
                x_axis,
                y_axis,
                radius_x: a,
                radius_y: b,
                start_angle,
                sweep_angle,
            })
        };

        let deviation = |q: Point3| -> f64 {
            let d = q - center;
            let (x, y) = (d.dot(x_axis), d.dot(y_axis));
            let off_plane = (d - x_axis * x - y_axis * y).length();
            let r = ((x / a).powi(2) + (y / b).powi(2)).sqrt();
            off_plane + (r - 1.0).abs() * a.min(b)
        };
        let (t0, t1) = self.domain();
        let fits = (0..=8).all(|i| deviation(self.point_at(t0 + (t1 - t0) * f64::from(i) / 8.0)) <= tolerance);
        fits.then_some(conic)
    }
}

impl Curve3 for NurbsCurve3 {
    fn point_at(&self, t: f64) -> Point3 {
        let (a, b) = self.domain();
        let u = t.clamp(a, b);
        eval_homogeneous(&self.homogeneous_points(), &self.knots, self.degree, u)
            .to_point3()
            .unwrap_or(self.control_points[0])
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let u = t.clamp(a, b);
        let p = self.degree;
        let points = self.homogeneous_points();
        let value = eval_homogeneous(&points, &self.knots, p, u);

        let derived: Vec<HPoint4> = points
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let denom = self.knots[i + p + 1] - self.knots[i + 1];
                if denom == 0.0 {
                    HPoint4::default()
                } else {
                    w[1].sub(w[0]).scale(p as f64 / denom)
                }
            })
            .collect();
        let derived_knots = &self.knots[1..self.knots.len() - 1];
        let slope = eval_homogeneous(&derived, derived_knots, p - 1, u);

        if value.w == 0.0 {
            return Vec3::ZERO;
        }
        let c = Vec3::new(value.x, value.y, value.z) * (1.0 / value.w);
        (Vec3::new(slope.x, slope.y, slope.z) - c * slope.w) * (1.0 / value.w)
    }

    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        let mut breaks = vec![lo];
        breaks.extend(self.interior_knots().into_iter().filter(|k| *k > lo && *k < hi));
        breaks.push(hi);
        breaks
            .windows(2)
            .map(|w| integrate_speed(|t| self.derivative_at(t).length(), w[0], w[1], 8))
            .sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Curve (closed set of authoring-side curve kinds)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Line(Line3),
    Polyline(Polyline3),
    Arc(Arc3),
    Ellipse(Ellipse3),
    Nurbs(NurbsCurve3),
    /// Consecutive segments; the domain is `(0, segment_count)`.
    PolyCurve(Vec<Curve>),
}

impl Curve {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Line(_) => "line",
            Self::Polyline(_) => "polyline",
            Self::Arc(_) => "arc",
            Self::Ellipse(_) => "ellipse",
            Self::Nurbs(_) => "nurbs curve",
            Self::PolyCurve(_) => "polycurve",
        }
    }

    /// Closed when the endpoints meet within `gap` (full arcs always are).
    #[must_use]
    pub fn is_closed_within(&self, gap: f64) -> bool {
        let ends_meet = || self.start_point().distance_to(self.end_point()) <= gap;
        match self {
            Self::Line(_) => false,
            Self::Arc(arc) => arc.is_closed() || ends_meet(),
            Self::Ellipse(ellipse) => ellipse.is_closed() || ends_meet(),
            _ => ends_meet(),
        }
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        match self {
            Self::Line(line) => Self::Line(line.reversed()),
            Self::Polyline(polyline) => Self::Polyline(polyline.reversed()),
            Self::Arc(arc) => Self::Arc(arc.reversed()),
            Self::Ellipse(ellipse) => Self::Ellipse(ellipse.reversed()),
            Self::Nurbs(nurbs) => Self::Nurbs(nurbs.reversed()),
            Self::PolyCurve(segments) => Self::PolyCurve(segments.iter().rev().map(Self::reversed).collect()),
        }
    }

    /// Exact NURBS form of a single curve; `None` for poly-curves.
    #[must_use]
    pub fn to_nurbs(&self) -> Option<NurbsCurve3> {
        match self {
            Self::Line(line) => Some(NurbsCurve3 {
                degree: 1,
                control_points: vec![line.start, line.end],
                knots: vec![0.0, 0.0, 1.0, 1.0],
                weights: None,
            }),
            Self::Polyline(polyline) => {
                let n = polyline.points().len();
                let mut knots = vec![0.0];
                knots.extend((0..n).map(|i| i as f64));
                knots.push((n - 1) as f64);
                Some(NurbsCurve3 {
                    degree: 1,
                    control_points: polyline.points().to_vec(),
                    knots,
                    weights: None,
                })
            }
            Self::Arc(arc) => Some(arc.to_nurbs()),
            Self::Ellipse(ellipse) => Some(ellipse.to_nurbs()),
            Self::Nurbs(nurbs) => Some(nurbs.clone()),
            Self::PolyCurve(_) => None,
        }
    }

    /// Parameter at which the arc length from the domain start equals `length`.
    #[must_use]
    pub fn parameter_at_length(&self, length: f64) -> f64 {
        let (a, b) = self.domain();
        let (mut lo, mut hi) = (a, b);
        for _ in 0..64 {
            let mid = 0.5 * (lo + hi);
            if self.length_between(a, mid) < length {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// Parameter of the point on the curve nearest to `point`.
    #[must_use]
    pub fn closest_parameter(&self, point: Point3) -> f64 {
        const SAMPLES: usize = 64;
        let (a, b) = self.domain();
        let at = |i: usize| a + (b - a) * i as f64 / SAMPLES as f64;
        let distance = |t: f64| self.point_at(t).distance_to(point);
        let best = (0..=SAMPLES)
            .min_by(|&i, &j| distance(at(i)).total_cmp(&distance(at(j))))
            .unwrap_or(0);

        let (mut lo, mut hi) = (at(best.saturating_sub(1)), at((best + 1).min(SAMPLES)));
        let ratio = 0.5 * (5.0_f64.sqrt() - 1.0);
        for _ in 0..80 {
            let left = hi - ratio * (hi - lo);
            let right = lo + ratio * (hi - lo);
            if distance(left) <= distance(right) {
                hi = right;
            } else {
                lo = left;
            }
        }
        let t = 0.5 * (lo + hi);
        // Results next to a knot land on it.
        let Self::Nurbs(nurbs) = self else {
            return t;
        };
        nurbs
            .interior_knots()
            .into_iter()
            .filter(|k| (k - t).abs() <= 1e-9 * (b - a))
            .min_by(|x, y| (x - t).abs().total_cmp(&(y - t).abs()))
            .unwrap_or(t)
    }

    /// Splits at an interior parameter, keeping the direction of both halves.
    #[must_use]
    pub fn split_at(&self, t: f64) -> Option<(Self, Self)> {
        let (a, b) = self.domain();
        if !(t > a && t < b) {
            return None;
        }
        match self {
            Self::Line(line) => {
                let p = line.point_at(t);
                Some((Self::Line(Line3::new(line.start, p)), Self::Line(Line3::new(p, line.end))))
            }
            Self::Polyline(polyline) => {
                let points = polyline.points();
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = t.floor() as usize;
                let p = polyline.point_at(t);
                let mut head = points[..=index].to_vec();
                #[allow(clippy::float_cmp)]
                let at_vertex = t == index as f64;
                let tail_start = if at_vertex { points[index] } else { p };
                if !at_vertex {
                    head.push(p);
                }
                let mut tail = vec![tail_start];
                tail.extend_from_slice(&points[index + 1..]);
                Some((
                    Self::Polyline(Polyline3::new(head).ok()?),
                    Self::Polyline(Polyline3::new(tail).ok()?),
                ))
            }
            Self::Arc(arc) => {
                let sweep = arc.sweep_angle * t;
                Some((
                    Self::Arc(arc.sub_arc(arc.start_angle, sweep)),
                    Self::Arc(arc.sub_arc(arc.start_angle + sweep, arc.sweep_angle - sweep)),
                ))
            }
            Self::Ellipse(ellipse) => {
                let sweep = ellipse.sweep_angle * t;
                Some((
                    Self::Ellipse(ellipse.sub_arc(ellipse.start_angle, sweep)),
                    Self::Ellipse(ellipse.sub_arc(ellipse.start_angle + sweep, ellipse.sweep_angle - sweep)),
                ))
            }
            Self::Nurbs(nurbs) => {
                let (head, tail) = nurbs.split_at(t)?;
                Some((Self::Nurbs(head), Self::Nurbs(tail)))
            }
            Self::PolyCurve(segments) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = t.floor() as usize;
                let mut head = segments[..index].to_vec();
                let mut tail = Vec::with_capacity(segments.len() - index);
                let segment = &segments[index];
                let (sa, sb) = segment.domain();
                let local = sa + (sb - sa) * (t - index as f64);
                match segment.split_at(local) {
                    Some((left, right)) => {
                        head.push(left);
                        tail.push(right);
                    }
                    None => tail.push(segment.clone()),
                }
                tail.extend_from_slice(&segments[index + 1..]);
                if head.is_empty() {
                    return None;
                }
                Some((Self::PolyCurve(head), Self::PolyCurve(tail)))
            }
        }
    }

    /// Flattens nested poly-curves into their leaf segments.
    #[must_use]
    pub fn exploded(&self) -> Vec<&Self> {
        match self {
            Self::PolyCurve(segments) => segments.iter().flat_map(Self::exploded).collect(),
            other => vec![other],
        }
    }

    fn segment_at(segments: &[Self], t: f64) -> (&Self, f64) {
        let last = segments.len() - 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = (t.max(0.0).floor() as usize).min(last);
        let segment = &segments[index];
        let (a, b) = segment.domain();
        let local = (t - index as f64).clamp(0.0, 1.0);
        (segment, a + (b - a) * local)
    }
}

impl Curve3 for Curve {
    fn point_at(&self, t: f64) -> Point3 {
        match self {
            Self::Line(c) => c.point_at(t),
            Self::Polyline(c) => c.point_at(t),
            Self::Arc(c) => c.point_at(t),
            Self::Ellipse(c) => c.point_at(t),
            Self::Nurbs(c) => c.point_at(t),
            Self::PolyCurve(segments) if segments.is_empty() => Point3::ORIGIN,
            Self::PolyCurve(segments) => {
                let (segment, local) = Self::segment_at(segments, t);
                segment.point_at(local)
            }
        }
    }

    fn domain(&self) -> (f64, f64) {
        match self {
            Self::Line(c) => c.domain(),
            Self::Polyline(c) => c.domain(),
            Self::Arc(c) => c.domain(),
            Self::Ellipse(c) => c.domain(),
            Self::Nurbs(c) => c.domain(),
            Self::PolyCurve(segments) => (0.0, segments.len() as f64),
        }
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        match self {
            Self::Line(c) => c.derivative_at(t),
            Self::Polyline(c) => c.derivative_at(t),
            Self::Arc(c) => c.derivative_at(t),
            Self::Ellipse(c) => c.derivative_at(t),
            Self::Nurbs(c) => c.derivative_at(t),
            Self::PolyCurve(segments) if segments.is_empty() => Vec3::ZERO,
            Self::PolyCurve(segments) => {
                let (segment, local) = Self::segment_at(segments, t);
                let (a, b) = segment.domain();
                segment.derivative_at(local) * (b - a)
            }
        }
    }

    fn length_between(&self, t0: f64, t1: f64) -> f64 {
        match self {
            Self::Line(c) => c.length_between(t0, t1),
            Self::Arc(c) => c.length_between(t0, t1),
            Self::Nurbs(c) => c.length_between(t0, t1),
            Self::Polyline(c) => {
                let mut breaks = vec![t0];
                let mut vertex = t0.floor() + 1.0;
                while vertex < t1 {
                    breaks.push(vertex);
                    vertex += 1.0;
                }
                breaks.push(t1);
                breaks.windows(2).map(|w| c.point_at(w[0]).distance_to(c.point_at(w[1]))).sum()
            }
            Self::Ellipse(c) => integrate_speed(|t| c.derivative_at(t).length(), t0, t1, 64),
            Self::PolyCurve(segments) => {
                let mut total = 0.0;
                for (i, segment) in segments.iter().enumerate() {
                    let lo = t0.max(i as f64);
                    let hi = t1.min((i + 1) as f64);
                    if hi > lo {
                        let (a, b) = segment.domain();
                        let map = |t: f64| a + (b - a) * (t - i as f64);
                        total += segment.length_between(map(lo), map(hi));
                    }
                }
                total
            }
        }
    }
}

impl From<Line3> for Curve {
    fn from(value: Line3) -> Self {
        Self::Line(value)
    }
}

impl From<Arc3> for Curve {
    fn from(value: Arc3) -> Self {
        Self::Arc(value)
    }
}

impl From<NurbsCurve3> for Curve {
    fn from(value: NurbsCurve3) -> Self {
        Self::Nurbs(value)
    }
}

impl From<Conic> for Curve {
    fn from(value: Conic) -> Self {
        match value {
            Conic::Line(line) => Self::Line(line),
            Conic::Arc(arc) => Self::Arc(arc),
            Conic::Ellipse(ellipse) => Self::Ellipse(ellipse),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Five-point Gauss–Legendre over `pieces` equal sub-intervals.
fn integrate_speed(speed: impl Fn(f64) -> f64, t0: f64, t1: f64, pieces: usize) -> f64 {
    const NODES: [f64; 5] = [
        0.0,
        -0.538_469_310_105_683_1,
        0.538_469_310_105_683_1,
        -0.906_179_845_938_664,
        0.906_179_845_938_664,
    ];
    const WEIGHTS: [f64; 5] = [
        0.568_888_888_888_888_9,
        0.478_628_670_499_366_5,
        0.478_628_670_499_366_5,
        0.236_926_885_056_189_1,
        0.236_926_885_056_189_1,
    ];
    if t1 == t0 {
        return 0.0;
    }
    let pieces = pieces.max(1);
    let h = (t1 - t0) / pieces as f64;
    let mut total = 0.0;
    for i in 0..pieces {
        let mid = t0 + h * (i as f64 + 0.5);
        for (node, weight) in NODES.iter().zip(WEIGHTS) {
            total += weight * speed(mid + 0.5 * h * node);
        }
    }
    (total * 0.5 * h).abs()
}

fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let projected = x_axis - z * x_axis.dot(z);
    let x = projected.normalized().unwrap_or_else(|| z.any_perpendicular());
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y)
}

fn frame_axes_from_xy(x_axis: Vec3, y_axis: Vec3) -> (Vec3, Vec3) {
    let x = x_axis.normalized().unwrap_or(Vec3::X);
    let z = x.cross(y_axis).normalized().unwrap_or(Vec3::Z);
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y)
}

pub(crate) fn is_non_decreasing(knots: &[f64]) -> bool {
    knots.windows(2).all(|w| w[0] <= w[1])
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct HPoint4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl HPoint4 {
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub const fn from_point(p: Point3, w: f64) -> Self {
        Self::new(p.x * w, p.y * w, p.z * w, w)
    }

    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        let s = 1.0 - t;
        Self::new(
            self.x * s + rhs.x * t,
            self.y * s + rhs.y * t,
            self.z * s + rhs.z * t,
            self.w * s + rhs.w * t,
        )
    }

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }

    fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    pub fn to_point3(self) -> Option<Point3> {
        if self.w.is_finite() && self.w != 0.0 {
            Some(Point3::new(self.x / self.w, self.y / self.w, self.z / self.w))
        } else {
            None
        }
    }
}

/// Knot span index `k` with `knots[k] <= u < knots[k + 1]`, clamped to the
/// last non-empty span.
pub(crate) fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        let mut k = n;
        while k > p && knots[k] == knots[n + 1] {
            k -= 1;
        }
        return k;
    }
    if u <= knots[p] {
        let mut k = p;
        while k < n && knots[k + 1] <= u {
            k += 1;
        }
        return k;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Largest `k <= n + 1` with `knots[k] <= u`, used for knot insertion.
fn insertion_span(knots: &[f64], n: usize, u: f64) -> usize {
    let mut k = n + 1;
    while k > 0 && knots[k] > u {
        k -= 1;
    }
    k
}

pub(crate) fn eval_homogeneous(points: &[HPoint4], knots: &[f64], p: usize, u: f64) -> HPoint4 {
    let n = points.len() - 1;
    let span = find_span(n, p, u, knots);
    let mut d: Vec<HPoint4> = (0..=p).map(|j| points[span - p + j]).collect();
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
    d[p]
}
