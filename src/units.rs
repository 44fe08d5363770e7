//! Unit systems, scale factors and tolerance bookkeeping.
//!
//! The host works internally in feet. Every value crossing the boundary is
//! multiplied by the factor of its unit system exactly once, at dispatch.

use std::borrow::Cow;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geom::{
    Arc3, Brep, Curve, Ellipse3, Extrusion, GeometryValue, Line3, Mesh, NurbsCurve3, NurbsSurface, PlaneSurface,
    Point3, Polyline3, SubD, Surface, Vec3,
};

/// Host absolute tolerance: one sixteenth of an inch, in feet.
pub const HOST_ABSOLUTE_TOLERANCE: f64 = (1.0 / 12.0) / 16.0;

/// Closed curves whose ends are this many short-curve tolerances apart are
/// still treated as closed.
pub const CLOSED_GAP_FACTOR: f64 = 1.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UnitSystem {
    Millimeters,
    Centimeters,
    Meters,
    Kilometers,
    Inches,
    #[default]
    Feet,
    Yards,
}

impl UnitSystem {
    /// The host's internal unit.
    pub const HOST: Self = Self::Feet;

    #[must_use]
    pub const fn meters_per_unit(self) -> f64 {
        match self {
            Self::Millimeters => 0.001,
            Self::Centimeters => 0.01,
            Self::Meters => 1.0,
            Self::Kilometers => 1000.0,
            Self::Inches => 0.0254,
            Self::Feet => 0.3048,
            Self::Yards => 0.9144,
        }
    }

    /// Multiplier taking a length in `self` to host units.
    #[must_use]
    pub fn to_host_factor(self) -> f64 {
        if self == Self::HOST {
            1.0
        } else {
            self.meters_per_unit() / Self::HOST.meters_per_unit()
        }
    }

    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Millimeters => "mm",
            Self::Centimeters => "cm",
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Inches => "in",
            Self::Feet => "ft",
            Self::Yards => "yd",
        }
    }
}

#[must_use]
pub fn to_host_units(value: f64, units: UnitSystem) -> f64 {
    value * units.to_host_factor()
}

#[must_use]
pub fn to_source_units(value: f64, units: UnitSystem) -> f64 {
    value / units.to_host_factor()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerances
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToleranceScope {
    /// Host internal units.
    Internal,
    /// The authoring document's model units.
    Model,
    /// The authoring document's page units.
    Page,
}

/// Angle, vertex and short-curve tolerances for one unit system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryTolerance {
    pub angle: f64,
    pub vertex: f64,
    pub short_curve: f64,
}

impl GeometryTolerance {
    /// Every value is NaN until the host supplies its constants.
    pub const UNINITIALIZED: Self = Self {
        angle: f64::NAN,
        vertex: f64::NAN,
        short_curve: f64::NAN,
    };

    /// The host's own constants, in feet.
    #[must_use]
    pub const fn host_defaults() -> Self {
        Self {
            angle: PI / 180.0,
            vertex: HOST_ABSOLUTE_TOLERANCE / 10.0,
            short_curve: HOST_ABSOLUTE_TOLERANCE / 2.0,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.angle.is_finite() && self.vertex.is_finite() && self.short_curve.is_finite()
    }

    /// Largest end gap of a curve still considered closed.
    #[must_use]
    pub fn closed_curve_gap(&self) -> f64 {
        self.short_curve * CLOSED_GAP_FACTOR
    }

    /// Same tolerances expressed in `units`, given they are in host units.
    #[must_use]
    pub fn in_units(&self, units: UnitSystem) -> Self {
        Self {
            angle: self.angle,
            vertex: to_source_units(self.vertex, units),
            short_curve: to_source_units(self.short_curve, units),
        }
    }
}

impl Default for GeometryTolerance {
    fn default() -> Self {
        Self::UNINITIALIZED
    }
}

/// Host base tolerances plus the unit systems they are requested in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceContext {
    base: GeometryTolerance,
    pub model_units: UnitSystem,
    pub page_units: UnitSystem,
}

impl ToleranceContext {
    #[must_use]
    pub const fn new(model_units: UnitSystem, page_units: UnitSystem) -> Self {
        Self {
            base: GeometryTolerance::UNINITIALIZED,
            model_units,
            page_units,
        }
    }

    pub fn initialize(&mut self, base: GeometryTolerance) {
        log::debug!(
            "host tolerances: vertex {:.6} ft, short curve {:.6} ft, angle {:.6} rad",
            base.vertex,
            base.short_curve,
            base.angle
        );
        self.base = base;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.base.is_initialized()
    }

    #[must_use]
    pub fn get(&self, scope: ToleranceScope) -> GeometryTolerance {
        match scope {
            ToleranceScope::Internal => self.base,
            ToleranceScope::Model => self.base.in_units(self.model_units),
            ToleranceScope::Page => self.base.in_units(self.page_units),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scale
// ─────────────────────────────────────────────────────────────────────────────

/// Uniform scaling about the origin.
pub trait Scale: Clone {
    fn scale(&mut self, factor: f64);

    /// Scaled copy; borrows `self` when `factor` is exactly one.
    #[must_use]
    #[allow(clippy::float_cmp)]
    fn in_other_units(&self, factor: f64) -> Cow<'_, Self> {
        if factor == 1.0 {
            Cow::Borrowed(self)
        } else {
            let mut scaled = self.clone();
            scaled.scale(factor);
            Cow::Owned(scaled)
        }
    }

    /// Consuming form of [`Scale::in_other_units`].
    #[must_use]
    #[allow(clippy::float_cmp)]
    fn into_other_units(mut self, factor: f64) -> Self {
        if factor != 1.0 {
            self.scale(factor);
        }
        self
    }
}

impl Scale for Point3 {
    fn scale(&mut self, factor: f64) {
        *self = self.scaled(factor);
    }
}

impl Scale for Vec3 {
    fn scale(&mut self, factor: f64) {
        *self = *self * factor;
    }
}

impl Scale for Vec<Point3> {
    fn scale(&mut self, factor: f64) {
        for p in self.iter_mut() {
            p.scale(factor);
        }
    }
}

impl Scale for Line3 {
    fn scale(&mut self, factor: f64) {
        self.start.scale(factor);
        self.end.scale(factor);
    }
}

impl Scale for Polyline3 {
    fn scale(&mut self, factor: f64) {
        for p in self.points_mut() {
            p.scale(factor);
        }
    }
}

impl Scale for Arc3 {
    fn scale(&mut self, factor: f64) {
        self.center.scale(factor);
        self.radius *= factor;
    }
}

impl Scale for Ellipse3 {
    fn scale(&mut self, factor: f64) {
        self.center.scale(factor);
        self.radius_x *= factor;
        self.radius_y *= factor;
    }
}

impl Scale for NurbsCurve3 {
    fn scale(&mut self, factor: f64) {
        self.control_points.scale(factor);
    }
}

impl Scale for Curve {
    fn scale(&mut self, factor: f64) {
        match self {
            Self::Line(c) => c.scale(factor),
            Self::Polyline(c) => c.scale(factor),
            Self::Arc(c) => c.scale(factor),
            Self::Ellipse(c) => c.scale(factor),
            Self::Nurbs(c) => c.scale(factor),
            Self::PolyCurve(segments) => {
                for segment in segments {
                    segment.scale(factor);
                }
            }
        }
    }
}

impl Scale for PlaneSurface {
    fn scale(&mut self, factor: f64) {
        self.origin.scale(factor);
        self.u_domain = (self.u_domain.0 * factor, self.u_domain.1 * factor);
        self.v_domain = (self.v_domain.0 * factor, self.v_domain.1 * factor);
    }
}

impl Scale for NurbsSurface {
    fn scale(&mut self, factor: f64) {
        self.control_points.scale(factor);
    }
}

impl Scale for Surface {
    fn scale(&mut self, factor: f64) {
        match self {
            Self::Plane(s) => s.scale(factor),
            Self::Nurbs(s) => s.scale(factor),
        }
    }
}

impl Scale for Brep {
    fn scale(&mut self, factor: f64) {
        for edge in &mut self.edges {
            edge.curve.scale(factor);
            edge.tolerance *= factor;
        }
        for face in &mut self.faces {
            face.surface.scale(factor);
        }
    }
}

impl Scale for Mesh {
    fn scale(&mut self, factor: f64) {
        self.vertices.scale(factor);
    }
}

impl Scale for SubD {
    fn scale(&mut self, factor: f64) {
        self.vertices.scale(factor);
    }
}

impl Scale for Extrusion {
    fn scale(&mut self, factor: f64) {
        self.profile.scale(factor);
        self.direction.scale(factor);
    }
}

impl Scale for GeometryValue {
    fn scale(&mut self, factor: f64) {
        match self {
            Self::Point(p) => p.scale(factor),
            Self::Curve(c) => c.scale(factor),
            Self::Surface(s) => s.scale(factor),
            Self::Brep(b) => b.scale(factor),
            Self::Mesh(m) => m.scale(factor),
            Self::SubD(s) => s.scale(factor),
            Self::Extrusion(e) => e.scale(factor),
            Self::PointCloud(points) => points.scale(factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Curve3;

    #[test]
    fn feet_is_identity() {
        assert_eq!(UnitSystem::Feet.to_host_factor(), 1.0);
        assert!((to_host_units(1.0, UnitSystem::Meters) - 1.0 / 0.3048).abs() < 1e-12);
        assert!((to_source_units(to_host_units(42.0, UnitSystem::Millimeters), UnitSystem::Millimeters) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn unit_factor_borrows() {
        let line = Curve::Line(Line3::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)));
        assert!(matches!(line.in_other_units(1.0), Cow::Borrowed(_)));
        let scaled = line.in_other_units(304.8);
        assert!(matches!(scaled, Cow::Owned(_)));
        assert!((scaled.length() - 304.8).abs() < 1e-9);
    }

    #[test]
    fn uninitialized_tolerances_are_nan() {
        let context = ToleranceContext::new(UnitSystem::Meters, UnitSystem::Millimeters);
        assert!(!context.is_initialized());
        assert!(context.get(ToleranceScope::Model).vertex.is_nan());
    }

    #[test]
    fn tolerances_follow_scope_units() {
        let mut context = ToleranceContext::new(UnitSystem::Inches, UnitSystem::Feet);
        context.initialize(GeometryTolerance::host_defaults());
        let internal = context.get(ToleranceScope::Internal);
        let model = context.get(ToleranceScope::Model);
        assert!((internal.short_curve - 1.0 / 384.0).abs() < 1e-15);
        assert!((model.short_curve - 1.0 / 32.0).abs() < 1e-12);
        assert_eq!(context.get(ToleranceScope::Page), internal);
        assert!((internal.closed_curve_gap() - internal.short_curve * 1.01).abs() < 1e-18);
    }

    #[test]
    fn arc_scales_radius() {
        let mut arc = Arc3::circle(Point3::new(1.0, 0.0, 0.0), Vec3::Z, 2.0);
        arc.scale(0.3048);
        assert!((arc.radius - 0.6096).abs() < 1e-12);
        assert!((arc.center.x - 0.3048).abs() < 1e-12);
    }
}
