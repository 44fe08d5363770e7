use super::core::{Point3, Tolerance, Vec3};
use super::curve::{HPoint4, NurbsCurve3, eval_homogeneous, is_non_decreasing};
use super::error::GeometryError;

/// Bounded plane patch: `origin + u * u_axis + v * v_axis` over the given
/// parameter intervals. The axes are orthonormal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub u_domain: (f64, f64),
    pub v_domain: (f64, f64),
}

impl PlaneSurface {
    /// Plane through `origin` with the given normal, bounded so that it covers
    /// every point in `extent`.
    pub fn fitted(origin: Point3, normal: Vec3, extent: &[Point3]) -> Result<Self, GeometryError> {
        let normal = normal
            .normalized()
            .ok_or_else(|| GeometryError::Degenerate("plane normal has zero length".to_owned()))?;
        let u_axis = normal.any_perpendicular();
        let v_axis = normal.cross(u_axis);

        let mut u_domain = (0.0_f64, 0.0_f64);
        let mut v_domain = (0.0_f64, 0.0_f64);
        for p in extent {
            let d = *p - origin;
            let (u, v) = (d.dot(u_axis), d.dot(v_axis));
            u_domain = (u_domain.0.min(u), u_domain.1.max(u));
            v_domain = (v_domain.0.min(v), v_domain.1.max(v));
        }
        Ok(Self {
            origin,
            u_axis,
            v_axis,
            u_domain,
            v_domain,
        })
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.u_axis.cross(self.v_axis)
    }

    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin + self.u_axis * u + self.v_axis * v
    }

    #[must_use]
    pub fn distance_to(&self, p: Point3) -> f64 {
        (p - self.origin).dot(self.normal()).abs()
    }
}

/// Tensor-product NURBS surface. Control points are stored row-major with
/// `u` as the outer index: `control_points[iu * v_count + iv]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub u_count: usize,
    pub v_count: usize,
    pub control_points: Vec<Point3>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub weights: Option<Vec<f64>>,
}

impl NurbsSurface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, GeometryError> {
        if degree_u == 0 || degree_v == 0 {
            return Err(GeometryError::InvalidNurbs("surface degrees must be >= 1".to_owned()));
        }
        if degree_u >= u_count || degree_v >= v_count {
            return Err(GeometryError::InvalidNurbs(
                "surface degrees must be < control point counts".to_owned(),
            ));
        }
        if control_points.len() != u_count * v_count {
            return Err(GeometryError::InvalidNurbs(format!(
                "control net must hold {} points, got {}",
                u_count * v_count,
                control_points.len()
            )));
        }
        if knots_u.len() != u_count + degree_u + 1 || knots_v.len() != v_count + degree_v + 1 {
            return Err(GeometryError::InvalidNurbs("surface knot vector length mismatch".to_owned()));
        }
        if !is_non_decreasing(&knots_u) || !is_non_decreasing(&knots_v) {
            return Err(GeometryError::InvalidNurbs("surface knots must be non-decreasing".to_owned()));
        }
        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() || weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err(GeometryError::InvalidNurbs(
                    "surface weights must be positive, one per control point".to_owned(),
                ));
            }
        }

        Ok(Self {
            degree_u,
            degree_v,
            u_count,
            v_count,
            control_points,
            knots_u,
            knots_v,
            weights,
        })
    }

    /// Degree 1x1 patch over four corners, `p00 → p10` along `u`.
    pub fn bilinear(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Result<Self, GeometryError> {
        Self::new(
            1,
            1,
            2,
            2,
            vec![p00, p01, p10, p11],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            None,
        )
    }

    #[must_use]
    pub fn domain_u(&self) -> (f64, f64) {
        (self.knots_u[self.degree_u], self.knots_u[self.u_count])
    }

    #[must_use]
    pub fn domain_v(&self) -> (f64, f64) {
        (self.knots_v[self.degree_v], self.knots_v[self.v_count])
    }

    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights.as_ref().is_some_and(|w| {
            let first = w[0];
            w.iter().any(|x| (x - first).abs() > Tolerance::DEFAULT.eps * first.abs().max(1.0))
        })
    }

    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let (u, v) = (u.clamp(u0, u1), v.clamp(v0, v1));

        let column: Vec<HPoint4> = (0..self.u_count)
            .map(|iu| {
                let row: Vec<HPoint4> = (0..self.v_count)
                    .map(|iv| {
                        let index = iu * self.v_count + iv;
                        let w = self.weights.as_ref().map_or(1.0, |w| w[index]);
                        HPoint4::from_point(self.control_points[index], w)
                    })
                    .collect();
                eval_homogeneous(&row, &self.knots_v, self.degree_v, v)
            })
            .collect();
        eval_homogeneous(&column, &self.knots_u, self.degree_u, u)
            .to_point3()
            .unwrap_or(self.control_points[0])
    }
}

impl NurbsSurface {
    /// Curves running along `u`, one per `v` control index.
    fn u_curves(&self) -> Vec<NurbsCurve3> {
        (0..self.v_count)
            .map(|iv| {
                let indices: Vec<usize> = (0..self.u_count).map(|iu| iu * self.v_count + iv).collect();
                NurbsCurve3 {
                    degree: self.degree_u,
                    control_points: indices.iter().map(|&i| self.control_points[i]).collect(),
                    knots: self.knots_u.clone(),
                    weights: self.weights.as_ref().map(|w| indices.iter().map(|&i| w[i]).collect()),
                }
            })
            .collect()
    }

    /// Reassembles a surface from `u` curves that share one knot vector.
    fn with_u_curves(&self, curves: &[NurbsCurve3]) -> Self {
        let first = &curves[0];
        let u_count = first.control_points.len();
        let v_count = curves.len();
        let mut control_points = Vec::with_capacity(u_count * v_count);
        let mut weights = Vec::with_capacity(u_count * v_count);
        for iu in 0..u_count {
            for curve in curves {
                control_points.push(curve.control_points[iu]);
                weights.push(curve.weight(iu));
            }
        }
        Self {
            degree_u: first.degree,
            degree_v: self.degree_v,
            u_count,
            v_count,
            control_points,
            knots_u: first.knots.clone(),
            knots_v: self.knots_v.clone(),
            weights: self.weights.is_some().then_some(weights),
        }
    }

    /// Same surface with `u` and `v` swapped.
    #[must_use]
    pub fn transposed(&self) -> Self {
        let mut control_points = Vec::with_capacity(self.control_points.len());
        let mut weights = Vec::with_capacity(self.control_points.len());
        for iv in 0..self.v_count {
            for iu in 0..self.u_count {
                let index = iu * self.v_count + iv;
                control_points.push(self.control_points[index]);
                weights.push(self.weights.as_ref().map_or(1.0, |w| w[index]));
            }
        }
        Self {
            degree_u: self.degree_v,
            degree_v: self.degree_u,
            u_count: self.v_count,
            v_count: self.u_count,
            control_points,
            knots_u: self.knots_v.clone(),
            knots_v: self.knots_u.clone(),
            weights: self.weights.is_some().then_some(weights),
        }
    }

    /// Equivalent surface with clamped knot vectors in both directions.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let clamp_u = |surface: &Self| {
            let curves: Vec<NurbsCurve3> = surface.u_curves().iter().map(NurbsCurve3::clamped).collect();
            surface.with_u_curves(&curves)
        };
        clamp_u(&clamp_u(self).transposed()).transposed()
    }

    /// Pieces between the interior `u` parameters in `params`, in order.
    #[must_use]
    pub fn split_u(&self, params: &[f64]) -> Vec<Self> {
        let rows: Vec<Vec<NurbsCurve3>> = self
            .clamped()
            .u_curves()
            .iter()
            .map(|curve| curve.split_at_parameters(params))
            .collect();
        let count = rows.first().map_or(0, Vec::len);
        (0..count)
            .map(|k| {
                let curves: Vec<NurbsCurve3> = rows.iter().map(|pieces| pieces[k].clone()).collect();
                self.with_u_curves(&curves).clamped()
            })
            .collect()
    }

    /// Pieces between the interior `v` parameters in `params`, in order.
    #[must_use]
    pub fn split_v(&self, params: &[f64]) -> Vec<Self> {
        self.transposed().split_u(params).iter().map(Self::transposed).collect()
    }

    /// The `u = u0` and `u = u1` boundaries coincide within `gap`.
    #[must_use]
    pub fn is_closed_u(&self, gap: f64) -> bool {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        (0..=8).all(|i| {
            let v = v0 + (v1 - v0) * f64::from(i) / 8.0;
            self.point_at(u0, v).distance_to(self.point_at(u1, v)) <= gap
        })
    }

    #[must_use]
    pub fn is_closed_v(&self, gap: f64) -> bool {
        self.transposed().is_closed_u(gap)
    }
}

/// Authoring-side surface kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Plane(PlaneSurface),
    Nurbs(NurbsSurface),
}

impl Surface {
    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        match self {
            Self::Plane(plane) => plane.point_at(u, v),
            Self::Nurbs(nurbs) => nurbs.point_at(u, v),
        }
    }

    #[must_use]
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        match self {
            Self::Plane(plane) => (plane.u_domain, plane.v_domain),
            Self::Nurbs(nurbs) => (nurbs.domain_u(), nurbs.domain_v()),
        }
    }

    /// Normal from central differences at the centre of the domain.
    #[must_use]
    pub fn center_normal(&self) -> Option<Vec3> {
        match self {
            Self::Plane(plane) => plane.normal().normalized(),
            Self::Nurbs(_) => {
                let ((u0, u1), (v0, v1)) = self.domain();
                let (u, v) = (0.5 * (u0 + u1), 0.5 * (v0 + v1));
                let hu = Tolerance::DERIVATIVE.relative_to(u1 - u0);
                let hv = Tolerance::DERIVATIVE.relative_to(v1 - v0);
                let du = self.point_at(u + hu, v) - self.point_at(u - hu, v);
                let dv = self.point_at(u, v + hv) - self.point_at(u, v - hv);
                du.cross(dv).normalized()
            }
        }
    }

    /// Corner and mid-edge samples, used for bounding boxes.
    #[must_use]
    pub fn sample_points(&self) -> Vec<Point3> {
        let ((u0, u1), (v0, v1)) = self.domain();
        let mut points = Vec::with_capacity(9);
        for i in 0..3 {
            for j in 0..3 {
                let u = u0 + (u1 - u0) * f64::from(i) * 0.5;
                let v = v0 + (v1 - v0) * f64::from(j) * 0.5;
                points.push(self.point_at(u, v));
            }
        }
        points
    }
}
