use std::cell::Cell;
use std::f64::consts::TAU;
use std::rc::Rc;

use crate::convert::{CachePolicy, ConversionContext, ConversionError, ConversionSession, DiagnosticKind, EngineConfig};
use crate::geom::{
    Arc3, Brep, Curve, Extrusion, GeometryValue, NurbsSurface, PlaneSurface, Point3, Polyline3, SubD, Surface, Vec3,
};
use crate::host::reference::ReferenceKernel;
use crate::host::{BrepKind, DocumentId, GraphicsStyleId, HostGeometry, HostSurface, MaterialId};
use crate::units::{GeometryTolerance, ToleranceScope, UnitSystem};

fn session() -> ConversionSession<ReferenceKernel> {
    ConversionSession::new(ReferenceKernel::new(), EngineConfig::default())
}

fn solid_kind(geometry: &HostGeometry) -> BrepKind {
    match geometry {
        HostGeometry::Solid(solid) => solid.kind,
        other => panic!("expected a solid, got {}", other.kind_name()),
    }
}

fn pinched_face() -> Brep {
    let polygon = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ];
    Brep::from_planar_polygons(&[polygon], 1e-9).expect("pinched face")
}

#[test]
fn encoding_needs_host_tolerances() {
    let kernel = ReferenceKernel::with_tolerances(GeometryTolerance::UNINITIALIZED);
    let mut session = ConversionSession::new(kernel, EngineConfig::default());
    assert!(session.tolerance(ToleranceScope::Internal).vertex.is_nan());
    let point = GeometryValue::Point(Point3::ORIGIN);
    assert_eq!(session.encode(&point), Err(ConversionError::ToleranceUnavailable));
}

#[test]
fn tolerances_follow_the_requested_scope() {
    let config = EngineConfig {
        model_units: UnitSystem::Millimeters,
        ..EngineConfig::default()
    };
    let session = ConversionSession::new(ReferenceKernel::new(), config);
    let internal = session.tolerance(ToleranceScope::Internal);
    let model = session.tolerance(ToleranceScope::Model);
    assert!((model.vertex - internal.vertex * 304.8).abs() < 1e-9);
    assert_eq!(model.angle, internal.angle);
}

#[test]
fn context_scope_restores_the_previous_context() {
    let mut session = session();
    session.context_mut().material = Some(MaterialId(1));
    {
        let mut scope = session.enter_context(ConversionContext {
            material: Some(MaterialId(2)),
            ..ConversionContext::default()
        });
        assert_eq!(scope.context().material, Some(MaterialId(2)));
        let nested = scope.enter_context(ConversionContext::default());
        assert_eq!(nested.context().material, None);
    }
    assert_eq!(session.context().material, Some(MaterialId(1)));
}

#[test]
fn switching_documents_drops_graphics_attributes() {
    let mut session = session();
    *session.context_mut() = ConversionContext {
        graphics_style: Some(GraphicsStyleId(4)),
        ..ConversionContext::for_document(DocumentId(1))
    };
    {
        let same = session.enter_document(DocumentId(1));
        assert_eq!(same.context().graphics_style, Some(GraphicsStyleId(4)));
    }
    {
        let other = session.enter_document(DocumentId(2));
        assert_eq!(other.context().graphics_style, None);
        assert_eq!(other.context().document, Some(DocumentId(2)));
    }
    assert_eq!(session.context().document, Some(DocumentId(1)));
}

#[test]
fn invalid_points_are_skipped_and_reported() {
    let mut session = session();
    session.set_cache_policy(CachePolicy::Disabled);
    let cloud = GeometryValue::PointCloud(vec![
        Point3::ORIGIN,
        Point3::new(f64::NAN, 0.0, 0.0),
        Point3::new(1.0, 2.0, 3.0),
    ]);
    let handle = session.encode(&cloud).expect("points");
    let HostGeometry::Points(points) = handle.as_ref() else {
        panic!("expected points");
    };
    assert_eq!(points.len(), 2);
    assert_eq!(session.take_diagnostics().len(), 1);
    assert!(session.diagnostics().is_empty());
}

#[test]
fn surface_becomes_an_open_shell() {
    let mut session = session();
    let plane = PlaneSurface {
        origin: Point3::ORIGIN,
        u_axis: Vec3::X,
        v_axis: Vec3::Y,
        u_domain: (0.0, 2.0),
        v_domain: (0.0, 3.0),
    };
    let handle = session.encode(&GeometryValue::Surface(Surface::Plane(plane))).expect("surface");
    assert_eq!(solid_kind(&handle), BrepKind::OpenShell);
}

#[test]
fn capped_extrusion_becomes_a_solid() {
    let profile = Polyline3::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
    ])
    .expect("profile");
    let extrusion = Extrusion::new(Curve::Polyline(profile), Vec3::new(0.0, 0.0, 3.0), true);
    let handle = session().encode(&GeometryValue::Extrusion(extrusion)).expect("extrusion");
    assert_eq!(solid_kind(&handle), BrepKind::Solid);
}

#[test]
fn subd_cage_becomes_a_solid() {
    let cage = SubD::box_cage(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 4.0, 4.0));
    let handle = session().encode(&GeometryValue::SubD(cage)).expect("subd");
    assert_eq!(solid_kind(&handle), BrepKind::Solid);
}

#[test]
fn decoded_values_come_back_in_model_units() {
    let config = EngineConfig {
        model_units: UnitSystem::Millimeters,
        ..EngineConfig::default()
    };
    let mut session = ConversionSession::new(ReferenceKernel::new(), config);
    let handle = session.encode(&GeometryValue::Point(Point3::new(1000.0, 0.0, 0.0))).expect("point");
    let HostGeometry::Point(host) = handle.as_ref() else {
        panic!("expected a point");
    };
    assert!((host.x - 1000.0 / 304.8).abs() < 1e-9);
    let GeometryValue::Point(back) = session.decode(&handle).expect("decoded") else {
        panic!("expected a point");
    };
    assert!((back.x - 1000.0).abs() < 1e-9);
    assert_eq!(session.stats().decoded, 1);
}

#[test]
fn callback_sees_each_diagnostic_as_it_is_emitted() {
    let seen = Rc::new(Cell::new(0));
    let mut session = session();
    let counter = Rc::clone(&seen);
    session.set_diagnostic_callback(move |d| {
        assert_eq!(d.kind, DiagnosticKind::ToleranceViolation);
        counter.set(counter.get() + 1);
    });
    let polyline = Polyline3::new(vec![
        Point3::ORIGIN,
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0 + 1e-4, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ])
    .expect("polyline");
    let handle = session.encode(&GeometryValue::Curve(Curve::Polyline(polyline))).expect("curve");
    let HostGeometry::Curves(curves) = handle.as_ref() else {
        panic!("expected curves");
    };
    assert_eq!(curves.len(), 2);
    assert_eq!(seen.get(), 1);
    assert_eq!(session.diagnostics().len(), 1);
}

#[test]
fn disabled_fallback_reports_nothing_produced() {
    let config = EngineConfig {
        interchange_fallback: false,
        ..EngineConfig::default()
    };
    let mut session = ConversionSession::new(ReferenceKernel::new(), config);
    let result = session.encode(&GeometryValue::Brep(pinched_face()));
    assert_eq!(result, Err(ConversionError::NothingProduced { kind: "brep" }));
    let stats = session.stats();
    assert_eq!(stats.fallback_invocations, 0);
    assert_eq!(stats.discarded_faces, 1);
    assert!(session.scratch_document().is_none());
}

#[test]
fn disabled_cache_converts_every_time() {
    let mut session = session();
    session.set_cache_policy(CachePolicy::Disabled);
    let value = GeometryValue::Point(Point3::new(1.0, 1.0, 1.0));
    let first = session.encode(&value).expect("first");
    let second = session.encode(&value).expect("second");
    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert_eq!(session.stats().cache.hits, 0);
    assert_eq!(session.stats().encoded, 2);
}

#[test]
fn arc_with_meeting_ends_is_encoded_in_two_pieces() {
    let arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.0, 0.0, TAU - 1e-4);
    let handle = session().encode(&GeometryValue::Curve(Curve::Arc(arc))).expect("nearly closed arc");
    let HostGeometry::Curves(curves) = handle.as_ref() else {
        panic!("expected curves");
    };
    assert_eq!(curves.len(), 2);
}

/// Degree (2, 1) strip with a full-multiplicity `u = 1` knot; `lift` moves
/// the second half off the first.
fn strip_with_seam(lift: f64) -> Surface {
    let profile = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, lift), (3.0, 1.0), (4.0, 2.0)];
    let points = profile
        .iter()
        .flat_map(|&(x, z)| [Point3::new(x, 0.0, z), Point3::new(x, 1.0, z)])
        .collect();
    let surface = NurbsSurface::new(
        2,
        1,
        6,
        2,
        points,
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
        vec![0.0, 0.0, 1.0, 1.0],
        None,
    )
    .expect("strip");
    Surface::Nurbs(surface)
}

#[test]
fn creased_surface_is_encoded_as_two_faces() {
    let mut session = session();
    let handle = session.encode(&GeometryValue::Surface(strip_with_seam(0.0))).expect("creased strip");
    let HostGeometry::Solid(solid) = handle.as_ref() else {
        panic!("expected a solid");
    };
    assert_eq!(solid.faces.len(), 2);
    assert_eq!(session.stats().fallback_invocations, 0);
}

#[test]
fn folded_surface_is_never_flattened() {
    let mut session = session();
    let handle = session.encode(&GeometryValue::Surface(strip_with_seam(0.5))).expect("folded strip");
    let HostGeometry::Solid(solid) = handle.as_ref() else {
        panic!("expected a solid");
    };
    assert_eq!(session.stats().fallback_invocations, 1);
    assert!(
        solid.faces.iter().all(|f| matches!(f.surface, HostSurface::Nurbs(_))),
        "folded faces must keep a curved surface"
    );
    assert!(
        session
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnsupportedGeometry)
    );
}
