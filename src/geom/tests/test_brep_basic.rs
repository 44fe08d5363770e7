use crate::geom::{
    Brep, Curve3, Mesh, MeshFace, NurbsSurface, PlaneSurface, Point3, SolidOrientation, Surface, TrimKind, Vec3,
};

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

#[test]
fn planar_cube_is_closed_and_outward() {
    let brep = Brep::from_planar_polygons(&cube_faces(2.0), 1e-9).expect("cube");
    assert_eq!(brep.faces.len(), 6);
    assert_eq!(brep.edges.len(), 12);
    assert!(brep.is_closed());
    assert_eq!(brep.orientation, SolidOrientation::Outward);
    assert!((brep.signed_volume() - 8.0).abs() < 1e-9);
    let mated = brep
        .faces
        .iter()
        .flat_map(|f| &f.loops)
        .flat_map(|l| &l.trims)
        .all(|t| t.kind == TrimKind::Mated);
    assert!(mated);
}

#[test]
fn shared_edges_are_used_in_opposite_directions() {
    let brep = Brep::from_planar_polygons(&cube_faces(1.0), 1e-9).expect("cube");
    let mut directions = vec![Vec::new(); brep.edges.len()];
    for trim in brep.faces.iter().flat_map(|f| &f.loops).flat_map(|l| &l.trims) {
        directions[trim.edge.expect("edge")].push(trim.reversed);
    }
    assert!(directions.iter().all(|d| d.len() == 2 && d[0] != d[1]));
}

#[test]
fn inverted_cube_is_a_void() {
    let faces: Vec<Vec<Point3>> = cube_faces(1.0)
        .into_iter()
        .map(|mut f| {
            f.reverse();
            f
        })
        .collect();
    let brep = Brep::from_planar_polygons(&faces, 1e-9).expect("cube");
    assert_eq!(brep.orientation, SolidOrientation::Inward);
    assert!(brep.signed_volume() < 0.0);
}

#[test]
fn naked_edges_join_when_coincident() {
    let left = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let right = vec![
        Point3::new(1.0 + 1e-7, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 1.0, 0.0),
        Point3::new(1.0 + 1e-7, 1.0, 0.0),
    ];
    let mut brep = Brep::from_planar_polygons(&[left, right], 1e-12).expect("two quads");
    assert_eq!(brep.edges.len(), 8);
    assert_eq!(brep.join_naked_edges(1e-6), 1);
    assert_eq!(brep.edges.len(), 7);
    assert_eq!(brep.edge_use_counts().iter().filter(|&&c| c == 2).count(), 1);
}

#[test]
fn plane_surface_becomes_single_open_face() {
    let corners = [Point3::ORIGIN, Point3::new(2.0, 1.0, 0.0)];
    let plane = PlaneSurface::fitted(Point3::ORIGIN, Vec3::Z, &corners).expect("plane");
    let brep = Brep::from_surface(Surface::Plane(plane), 1e-6).expect("face");
    assert_eq!(brep.faces.len(), 1);
    assert_eq!(brep.edges.len(), 4);
    assert_eq!(brep.orientation, SolidOrientation::None);
    let trims = &brep.faces[0].loops[0].trims;
    for pair in trims.windows(2) {
        let a = brep.trim_curve(&pair[0]).expect("curve");
        let b = brep.trim_curve(&pair[1]).expect("curve");
        assert!(a.end_point().distance_to(b.start_point()) < 1e-9);
    }
}

#[test]
fn collapsed_surface_side_becomes_singular_trim() {
    let apex = Point3::new(0.0, 0.0, 1.0);
    let surface =
        NurbsSurface::bilinear(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), apex, apex).expect("triangle patch");
    let brep = Brep::from_surface(Surface::Nurbs(surface), 1e-6).expect("face");
    assert_eq!(brep.edges.len(), 3);
    let singular = brep.faces[0].loops[0].trims.iter().filter(|t| t.kind == TrimKind::Singular).count();
    assert_eq!(singular, 1);
}

#[test]
fn warped_mesh_quad_becomes_two_faces() {
    let mesh = Mesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.3),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![MeshFace::Quad(0, 1, 2, 3)],
    );
    let brep = Brep::from_mesh(&mesh, 1e-9).expect("brep");
    assert_eq!(brep.faces.len(), 2);
    assert_eq!(brep.edges.len(), 5);
}

/// Degree (2, 1) strip creased at `u = 1`, one unit wide in `y`.
fn creased_strip() -> NurbsSurface {
    let profile = [
        (0.0, 0.0),
        (1.0, 0.0),
        (2.0, 0.0),
        (2.0, 0.0),
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
fn surface_split_keeps_the_shape() {
    let surface = creased_strip();
    let pieces = surface.split_u(&[1.0]);
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0].domain_u(), (0.0, 1.0));
    assert_eq!(pieces[1].domain_u(), (1.0, 2.0));
    for (u, v) in [(0.25, 0.5), (0.75, 0.0), (1.0, 1.0)] {
        assert!(pieces[0].point_at(u, v).distance_to(surface.point_at(u, v)) < 1e-9);
        assert!(pieces[1].point_at(u + 1.0, v).distance_to(surface.point_at(u + 1.0, v)) < 1e-9);
    }
    let halves = surface.split_v(&[0.5]);
    assert_eq!(halves.len(), 2);
    assert!(halves[1].point_at(1.5, 0.75).distance_to(surface.point_at(1.5, 0.75)) < 1e-9);
}

#[test]
fn split_face_shares_the_cut_and_splits_boundary_edges() {
    let mut brep = Brep::from_surface(Surface::Nurbs(creased_strip()), 1e-9).expect("strip face");
    assert_eq!(brep.edges.len(), 4);

    let pieces = brep.split_face(0, &[1.0], &[], 1e-7).expect("split at the crease");
    assert_eq!(pieces, vec![0, 1]);
    assert_eq!(brep.faces.len(), 2);
    // Bottom and top are cut in two, plus the shared crease edge.
    assert_eq!(brep.edges.len(), 7);
    assert!(brep.validate().is_ok());

    let counts = brep.edge_use_counts();
    assert_eq!(counts.iter().filter(|&&c| c == 2).count(), 1);
    assert_eq!(counts.iter().filter(|&&c| c == 1).count(), 6);

    for face in &brep.faces {
        let trims = &face.loops[0].trims;
        assert_eq!(trims.len(), 4);
        for (k, trim) in trims.iter().enumerate() {
            let next = &trims[(k + 1) % trims.len()];
            let end = brep.trim_curve(trim).expect("edge").end_point();
            let start = brep.trim_curve(next).expect("edge").start_point();
            assert!(end.distance_to(start) < 1e-9, "loop of {face:?} is broken at trim {k}");
        }
    }
    let crease = Point3::new(2.0, 0.5, 0.0);
    let shared = counts.iter().position(|&c| c == 2).expect("shared edge");
    let curve = &brep.edges[shared].curve;
    let (a, b) = curve.domain();
    assert!(curve.point_at(0.5 * (a + b)).distance_to(crease) < 1e-9);
}

#[test]
fn split_face_without_interior_parameters_is_a_no_op() {
    let mut brep = Brep::from_surface(Surface::Nurbs(creased_strip()), 1e-9).expect("strip face");
    let before = brep.clone();
    assert_eq!(brep.split_face(0, &[0.0, 2.0], &[], 1e-7), Ok(vec![0]));
    assert_eq!(brep, before);
}
