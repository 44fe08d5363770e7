use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::geom::{Arc3, Curve, Curve3, Ellipse3, Line3, Point3, Polyline3, Tolerance, Vec3};

#[test]
fn arc_has_expected_endpoints_with_explicit_frame() {
    let arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.0, 0.0, FRAC_PI_2);
    let tol = Tolerance::new(1e-9);
    assert!(tol.approx_eq_point3(arc.point_at(0.0), Point3::new(1.0, 0.0, 0.0)));
    assert!(tol.approx_eq_point3(arc.point_at(1.0), Point3::new(0.0, 1.0, 0.0)));
    assert!((arc.length() - FRAC_PI_2).abs() < 1e-9);
}

#[test]
fn arc_through_three_points_recovers_circle() {
    let arc = Arc3::from_three_points(
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(-1.0, 0.0, 0.0),
    )
    .expect("non-collinear points");
    assert!(arc.center.distance_to(Point3::ORIGIN) < 1e-12);
    assert!((arc.radius - 1.0).abs() < 1e-12);
    assert!((arc.sweep_angle - PI).abs() < 1e-12);
}

#[test]
fn collinear_points_give_no_arc() {
    assert!(Arc3::from_three_points(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)).is_none());
}

#[test]
fn reversed_arc_runs_backwards() {
    let arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 2.0, 0.25, 1.0);
    let rev = arc.reversed();
    let tol = Tolerance::new(1e-9);
    assert!(tol.approx_eq_point3(rev.start_point(), arc.end_point()));
    assert!(tol.approx_eq_point3(rev.end_point(), arc.start_point()));
    assert!(tol.approx_eq_point3(rev.point_at(0.5), arc.point_at(0.5)));
}

#[test]
fn ellipse_seam_is_stable() {
    let ellipse = Ellipse3::new(Point3::ORIGIN, Vec3::X, Vec3::Y, 3.0, 1.5);
    assert!(ellipse.is_closed());
    assert!(ellipse.point_at(0.0).distance_to(ellipse.point_at(1.0)) < 1e-12);
}

#[test]
fn circle_nurbs_stays_on_circle() {
    let circle = Arc3::circle(Point3::new(1.0, 2.0, 3.0), Vec3::Z, 2.5);
    let nurbs = circle.to_nurbs();
    for i in 0..=20 {
        let p = nurbs.point_at(f64::from(i) / 20.0);
        assert!((p.distance_to(circle.center) - 2.5).abs() < 1e-9);
    }
    assert!((nurbs.length() - TAU * 2.5).abs() < 1e-6);
}

#[test]
fn polyline_length_between_vertices() {
    let polyline = Curve::Polyline(
        Polyline3::new(vec![
            Point3::ORIGIN,
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
        ])
        .expect("polyline"),
    );
    assert!((polyline.length() - 7.0).abs() < 1e-12);
    assert!((polyline.length_between(0.5, 1.5) - 3.5).abs() < 1e-12);
    let t = polyline.parameter_at_length(5.0);
    assert!(polyline.point_at(t).distance_to(Point3::new(3.0, 2.0, 0.0)) < 1e-9);
}

#[test]
fn polycurve_reverses_segment_order() {
    let a = Curve::Line(Line3::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)));
    let b = Curve::Line(Line3::new(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)));
    let poly = Curve::PolyCurve(vec![a, b]);
    assert!((poly.length() - 2.0).abs() < 1e-12);
    let rev = poly.reversed();
    assert_eq!(rev.start_point(), Point3::new(1.0, 1.0, 0.0));
    assert_eq!(rev.end_point(), Point3::ORIGIN);
    assert_eq!(poly.exploded().len(), 2);
}

#[test]
fn closure_uses_gap() {
    let poly = Curve::Polyline(
        Polyline3::new(vec![
            Point3::ORIGIN,
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1e-4, 0.0),
        ])
        .expect("polyline"),
    );
    assert!(!poly.is_closed_within(1e-6));
    assert!(poly.is_closed_within(1e-3));
    assert!(Curve::Arc(Arc3::circle(Point3::ORIGIN, Vec3::Z, 1.0)).is_closed_within(0.0));
}
