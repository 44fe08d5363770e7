use crate::convert::{Assembler, Assembly, ConversionContext, DiagnosticKind, Diagnostics};
use crate::geom::{Brep, NurbsSurface, Point3, SolidOrientation, Surface, Vec3};
use crate::host::reference::ReferenceKernel;
use crate::host::{BrepKind, HostSurface, MaterialId};
use crate::knots::KnotTolerance;
use crate::units::GeometryTolerance;

fn cube_faces(size: f64) -> Vec<Vec<Point3>> {
    let p = |x: f64, y: f64, z: f64| Point3::new(x * size, y * size, z * size);
    vec![
        vec![p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 0.0, 0.0)],
        vec![p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(1.0, 1.0, 1.0), p(0.0, 1.0, 1.0)],
        vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 0.0, 1.0), p(0.0, 0.0, 1.0)],
        vec![p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 1.0, 1.0), p(1.0, 0.0, 1.0)],
        vec![p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, 1.0, 1.0), p(1.0, 1.0, 1.0)],
        vec![p(0.0, 1.0, 0.0), p(0.0, 0.0, 0.0), p(0.0, 0.0, 1.0), p(0.0, 1.0, 1.0)],
    ]
}

fn cube() -> Brep {
    Brep::from_planar_polygons(&cube_faces(2.0), 1e-9).expect("cube")
}

fn assemble(brep: &Brep, context: &ConversionContext, diagnostics: &mut Diagnostics) -> Assembly {
    let kernel = ReferenceKernel::new();
    Assembler::new(
        &kernel,
        GeometryTolerance::host_defaults(),
        KnotTolerance::DEFAULT,
        diagnostics,
    )
    .assemble(brep, context)
}

#[test]
fn cube_becomes_a_closed_solid() {
    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&cube(), &ConversionContext::default(), &mut diagnostics) else {
        panic!("expected a complete solid");
    };
    assert_eq!(solid.kind, BrepKind::Solid);
    assert_eq!(solid.faces.len(), 6);
    assert_eq!(solid.edges.len(), 12);
    assert!(diagnostics.is_empty());
}

#[test]
fn inverted_cube_becomes_a_void() {
    let faces: Vec<Vec<Point3>> = cube_faces(1.0)
        .into_iter()
        .map(|mut f| {
            f.reverse();
            f
        })
        .collect();
    let brep = Brep::from_planar_polygons(&faces, 1e-9).expect("void");
    assert_eq!(brep.orientation, SolidOrientation::Inward);
    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&brep, &ConversionContext::default(), &mut diagnostics) else {
        panic!("expected a complete void");
    };
    assert_eq!(solid.kind, BrepKind::Void);
}

#[test]
fn reversed_face_with_flipped_surface_is_the_same_solid() {
    let mut brep = cube();
    let face = &mut brep.faces[0];
    let Surface::Plane(plane) = &mut face.surface else {
        panic!("planar cube");
    };
    plane.v_axis = -plane.v_axis;
    plane.v_domain = (-plane.v_domain.1, -plane.v_domain.0);
    face.reversed = true;
    let trims = &mut face.loops[0].trims;
    trims.reverse();
    for trim in trims.iter_mut() {
        trim.reversed = !trim.reversed;
    }

    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&brep, &ConversionContext::default(), &mut diagnostics) else {
        panic!("expected a complete solid");
    };
    assert_eq!(solid.kind, BrepKind::Solid);
    assert!(solid.faces[0].reversed);
}

#[test]
fn rejected_face_is_dropped_and_reported() {
    let mut brep = cube();
    let Surface::Plane(plane) = &mut brep.faces[3].surface else {
        panic!("planar cube");
    };
    plane.u_axis = Vec3::ZERO;

    let mut diagnostics = Diagnostics::default();
    let Assembly::Partial { solid, discarded_faces } =
        assemble(&brep, &ConversionContext::default(), &mut diagnostics)
    else {
        panic!("expected a partial result");
    };
    assert_eq!(discarded_faces, 1);
    assert_eq!(solid.faces.len(), 5);
    assert_eq!(solid.kind, BrepKind::OpenShell);
    assert!(diagnostics.count(DiagnosticKind::PartialAssemblyFailure) >= 1);
    assert!(diagnostics.entries()[0].subject.is_some());
}

#[test]
fn self_touching_loop_assembles_nothing() {
    let polygon = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ];
    let brep = Brep::from_planar_polygons(&[polygon], 1e-9).expect("pinched face");
    let mut diagnostics = Diagnostics::default();
    assert_eq!(
        assemble(&brep, &ConversionContext::default(), &mut diagnostics),
        Assembly::Nothing { discarded_faces: 1 }
    );
    assert_eq!(diagnostics.count(DiagnosticKind::PartialAssemblyFailure), 1);
}

#[test]
fn per_face_materials_reach_the_host_faces() {
    let context = ConversionContext {
        material: Some(MaterialId(1)),
        face_materials: vec![None, Some(MaterialId(7))],
        ..ConversionContext::default()
    };
    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&cube(), &context, &mut diagnostics) else {
        panic!("expected a complete solid");
    };
    assert_eq!(solid.faces[0].material, Some(MaterialId(1)));
    assert_eq!(solid.faces[1].material, Some(MaterialId(7)));
    assert_eq!(solid.faces[5].material, Some(MaterialId(1)));
}

#[test]
fn sub_tolerance_edge_is_dropped_without_losing_the_solid() {
    let near = Point3::new(0.001, 0.0, 0.0);
    let mut faces = cube_faces(1.0);
    faces[0].push(near);
    faces[2].insert(1, near);
    let brep = Brep::from_planar_polygons(&faces, 1e-9).expect("cube with sliver edge");
    assert_eq!(brep.edges.len(), 13);

    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&brep, &ConversionContext::default(), &mut diagnostics) else {
        panic!("expected a complete solid");
    };
    assert_eq!(solid.kind, BrepKind::Solid);
    assert_eq!(solid.edges.len(), 12);
    assert_eq!(diagnostics.count(DiagnosticKind::ToleranceViolation), 1);
}

/// Degree (2, 1) strip whose `u = 1` knot has full multiplicity; `folded`
/// moves the second half away so the surface also tears there.
fn creased_strip(folded: bool) -> NurbsSurface {
    let lift = if folded { 0.5 } else { 0.0 };
    let profile = [
        (0.0, 0.0),
        (1.0, 0.0),
        (2.0, 0.0),
        (2.0, lift),
        (3.0, 1.0),
        (4.0, 2.0),
    ];
    let points = profile
        .iter()
        .flat_map(|&(x, z)| [Point3::new(x, 0.0, z), Point3::new(x, 1.0, z)])
        .collect();
    NurbsSurface::new(
        2,
        1,
        6,
        2,
        points,
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
        vec![0.0, 0.0, 1.0, 1.0],
        None,
    )
    .expect("creased strip")
}

#[test]
fn creased_surface_becomes_one_host_face_per_smooth_piece() {
    let brep = Brep::from_surface(Surface::Nurbs(creased_strip(false)), 1e-9).expect("strip face");
    let context = ConversionContext {
        face_materials: vec![Some(MaterialId(3))],
        ..ConversionContext::default()
    };
    let mut diagnostics = Diagnostics::default();
    let Assembly::Complete(solid) = assemble(&brep, &context, &mut diagnostics) else {
        panic!("expected every piece to assemble");
    };
    assert_eq!(solid.kind, BrepKind::OpenShell);
    assert_eq!(solid.faces.len(), 2);
    for face in &solid.faces {
        let HostSurface::Nurbs(surface) = &face.surface else {
            panic!("pieces keep their nurbs surface");
        };
        assert_eq!(surface.u_count, 3, "each piece is a single span");
        assert_eq!(face.material, Some(MaterialId(3)));
    }
    assert_eq!(diagnostics.count(DiagnosticKind::PartialAssemblyFailure), 0);
}

#[test]
fn torn_surface_is_still_reported() {
    let brep = Brep::from_surface(Surface::Nurbs(creased_strip(true)), 1e-9).expect("strip face");
    let mut diagnostics = Diagnostics::default();
    let outcome = assemble(&brep, &ConversionContext::default(), &mut diagnostics);
    assert!(!matches!(outcome, Assembly::Complete(_)));
    assert!(diagnostics.count(DiagnosticKind::PartialAssemblyFailure) >= 1);
}
