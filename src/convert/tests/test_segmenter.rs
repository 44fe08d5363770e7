use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::convert::{ConversionError, Segmenter};
use crate::geom::{Arc3, Curve, Curve3, Line3, NurbsCurve3, Point3, Polyline3, Vec3};
use crate::host::reference::ReferenceKernel;
use crate::host::{HostCurve, HostKernel};
use crate::knots::KnotTolerance;
use crate::units::GeometryTolerance;

fn segmenter() -> Segmenter {
    Segmenter::new(GeometryTolerance::host_defaults(), KnotTolerance::DEFAULT)
}

fn zigzag(count: usize) -> Vec<Point3> {
    (0..count)
        .map(|i| Point3::new(i as f64, if i % 2 == 0 { 0.0 } else { 1.0 }, 0.0))
        .collect()
}

#[test]
fn closed_circle_splits_into_open_halves() {
    let circle = Curve::Arc(Arc3::circle(Point3::ORIGIN, Vec3::Z, 2.0));
    let out = segmenter().segment(&circle).expect("segmented");
    assert_eq!(out.curves.len(), 2);
    let tolerance = GeometryTolerance::host_defaults();
    for piece in &out.curves {
        assert!(matches!(piece, HostCurve::Arc(_)));
        assert!(piece.start_point().distance_to(piece.end_point()) > tolerance.short_curve);
    }
    let total: f64 = out.curves.iter().map(Curve3::length).sum();
    assert!((total - TAU * 2.0).abs() < tolerance.short_curve);
    assert!(out.curves[0].start_point().distance_to(circle.start_point()) < 1e-12);
}

#[test]
fn every_piece_is_accepted_by_the_host() {
    let kernel = ReferenceKernel::new();
    let periodic = NurbsCurve3::periodic(3, &zigzag(5)).expect("periodic");
    let curves = [
        Curve::Arc(Arc3::circle(Point3::ORIGIN, Vec3::Z, 1.0)),
        Curve::Nurbs(periodic),
        Curve::Nurbs(NurbsCurve3::clamped_uniform(2, zigzag(5)).expect("quadratic")),
    ];
    for curve in &curves {
        for piece in segmenter().segment(curve).expect("segmented").curves {
            kernel.create_curve(piece).expect("host accepts piece");
        }
    }
}

#[test]
fn short_polyline_segments_are_dropped() {
    let polyline = Polyline3::new(vec![
        Point3::ORIGIN,
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0 + 1e-4, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ])
    .expect("polyline");
    let out = segmenter().segment(&Curve::Polyline(polyline)).expect("segmented");
    assert_eq!(out.curves.len(), 2);
    assert_eq!(out.dropped.len(), 1);
}

#[test]
fn curve_below_tolerance_is_unsupported() {
    let tiny = Curve::Line(Line3::new(Point3::ORIGIN, Point3::new(1e-4, 0.0, 0.0)));
    assert!(matches!(
        segmenter().segment(&tiny),
        Err(ConversionError::UnsupportedGeometry { kind: "line", .. })
    ));
}

#[test]
fn uninitialized_tolerances_are_reported() {
    let segmenter = Segmenter::new(GeometryTolerance::UNINITIALIZED, KnotTolerance::DEFAULT);
    let line = Curve::Line(Line3::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)));
    assert_eq!(segmenter.segment(&line), Err(ConversionError::ToleranceUnavailable));
}

#[test]
fn quadratic_splines_come_out_one_span_each() {
    let quadratic = NurbsCurve3::clamped_uniform(2, zigzag(5)).expect("quadratic");
    assert_eq!(quadratic.span_count(), 3);
    let out = segmenter().segment(&Curve::Nurbs(quadratic)).expect("segmented");
    assert_eq!(out.curves.len(), 3);
    for piece in &out.curves {
        let HostCurve::NurbSpline(span) = piece else {
            panic!("parabolic spans stay splines");
        };
        assert_eq!(span.span_count(), 1);
    }
}

#[test]
fn rational_quadratic_span_becomes_an_arc() {
    let quarter = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 3.0, 0.0, FRAC_PI_2);
    let out = segmenter().segment(&Curve::Nurbs(quarter.to_nurbs())).expect("segmented");
    assert_eq!(out.curves.len(), 1);
    let HostCurve::Arc(arc) = out.curves[0] else {
        panic!("expected an arc");
    };
    assert!((arc.radius - 3.0).abs() < 1e-9);
    assert!((arc.sweep_angle - FRAC_PI_2).abs() < 1e-9);
}

#[test]
fn cubic_is_split_at_its_kink() {
    let nurbs = NurbsCurve3::new(
        3,
        zigzag(7),
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0],
        None,
    )
    .expect("kinked cubic");
    let out = segmenter().segment(&Curve::Nurbs(nurbs.clone())).expect("segmented");
    assert_eq!(out.kinks, vec![1.0]);
    assert_eq!(out.curves.len(), 2);
    let first = &out.curves[0];
    let last = &out.curves[1];
    assert!(first.start_point().distance_to(nurbs.start_point()) < 1e-9);
    assert!(first.end_point().distance_to(last.start_point()) < 1e-9);
    assert!(last.end_point().distance_to(nurbs.end_point()) < 1e-9);
}

#[test]
fn near_duplicate_knots_are_snapped_before_hand_over() {
    let nurbs = NurbsCurve3 {
        degree: 3,
        control_points: zigzag(6),
        knots: vec![0.0, 0.0, 0.0, 0.0, 1.0 - 1e-12, 1.0, 2.0, 2.0, 2.0, 2.0],
        weights: None,
    };
    let out = segmenter().segment(&Curve::Nurbs(nurbs)).expect("segmented");
    assert_eq!(out.snapped_knots, 1);
    assert!(out.kinks.is_empty());
    let [HostCurve::NurbSpline(clean)] = out.curves.as_slice() else {
        panic!("expected a single spline");
    };
    assert_eq!(clean.knots[4].to_bits(), clean.knots[5].to_bits());
    ReferenceKernel::new()
        .create_curve(HostCurve::NurbSpline(clean.clone()))
        .expect("host accepts snapped knots");
}

#[test]
fn large_knot_ranges_snap_relative_near_duplicates() {
    let nurbs = NurbsCurve3 {
        degree: 3,
        control_points: zigzag(6),
        knots: vec![0.0, 0.0, 0.0, 0.0, 500.0 - 1e-7, 500.0, 1000.0, 1000.0, 1000.0, 1000.0],
        weights: None,
    };
    let out = segmenter().segment(&Curve::Nurbs(nurbs)).expect("segmented");
    assert_eq!(out.snapped_knots, 1);
    let [HostCurve::NurbSpline(clean)] = out.curves.as_slice() else {
        panic!("expected a single spline");
    };
    assert_eq!(clean.knots[4].to_bits(), clean.knots[5].to_bits());
    ReferenceKernel::new()
        .create_curve(HostCurve::NurbSpline(clean.clone()))
        .expect("host accepts snapped knots");
}

#[test]
fn nearly_closed_arc_is_split_like_a_full_circle() {
    let arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.0, 0.0, TAU - 1e-4);
    let curve = Curve::Arc(arc);
    assert!(curve.start_point().distance_to(curve.end_point()) < GeometryTolerance::host_defaults().short_curve);
    let out = segmenter().segment(&curve).expect("segmented");
    assert_eq!(out.curves.len(), 2);
    let kernel = ReferenceKernel::new();
    for piece in out.curves {
        kernel.create_curve(piece).expect("host accepts half arc");
    }
}

#[test]
fn negative_sweep_arcs_keep_their_direction() {
    let arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.0, 0.0, -PI / 3.0);
    let out = segmenter().segment(&Curve::Arc(arc)).expect("segmented");
    let HostCurve::Arc(host) = out.curves[0] else {
        panic!("expected an arc");
    };
    assert!(host.sweep_angle > 0.0);
    assert!(host.start_point().distance_to(arc.start_point()) < 1e-12);
    assert!(host.end_point().distance_to(arc.end_point()) < 1e-12);
}

#[test]
fn poly_curves_keep_segment_order() {
    let a = Point3::ORIGIN;
    let b = Point3::new(1.0, 0.0, 0.0);
    let c = Point3::new(1.0, 1.0, 0.0);
    let poly = Curve::PolyCurve(vec![Curve::Line(Line3::new(a, b)), Curve::Line(Line3::new(b, c))]);
    let out = segmenter().segment(&poly).expect("segmented");
    assert_eq!(out.curves.len(), 2);
    assert_eq!(out.curves[0].start_point(), a);
    assert_eq!(out.curves[1].end_point(), c);
}
