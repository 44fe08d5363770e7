use crate::convert::{ConversionContext, ConversionError, DiagnosticKind, Diagnostics, NgonConfig, decode_mesh, encode_mesh};
use crate::geom::{Mesh, MeshFace, Point3};
use crate::host::reference::ReferenceKernel;
use crate::host::{HostMesh, MaterialId};
use crate::units::GeometryTolerance;

fn tolerance() -> GeometryTolerance {
    GeometryTolerance::host_defaults()
}

/// `n` x `n` grid of unit squares split into triangles, wound counter-clockwise.
fn host_grid(n: u32, lift_last_column: bool) -> HostMesh {
    let mut vertices = Vec::new();
    for j in 0..=n {
        for i in 0..=n {
            let z = if lift_last_column && i == n { 1.0 } else { 0.0 };
            vertices.push(Point3::new(f64::from(i), f64::from(j), z));
        }
    }
    let id = |i: u32, j: u32| j * (n + 1) + i;
    let mut triangles = Vec::new();
    for j in 0..n {
        for i in 0..n {
            triangles.push([id(i, j), id(i + 1, j), id(i + 1, j + 1)]);
            triangles.push([id(i, j), id(i + 1, j + 1), id(i, j + 1)]);
        }
    }
    let materials = vec![None; triangles.len()];
    HostMesh {
        vertices,
        triangles,
        materials,
    }
}

#[test]
fn planar_and_warped_quads_reach_the_host() {
    let mesh = Mesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.5),
            Point3::new(2.0, 1.0, 0.0),
        ],
        vec![MeshFace::Quad(0, 1, 2, 3), MeshFace::Quad(1, 4, 5, 2)],
    );
    let context = ConversionContext {
        face_materials: vec![Some(MaterialId(1)), Some(MaterialId(2))],
        ..ConversionContext::default()
    };
    let mut diagnostics = Diagnostics::default();
    let host = encode_mesh(&ReferenceKernel::new(), &mesh, &tolerance(), &context, &mut diagnostics).expect("mesh");
    assert_eq!(host.triangles.len(), 4);
    assert_eq!(host.vertices.len(), 6);
    assert_eq!(
        host.materials,
        vec![Some(MaterialId(1)), Some(MaterialId(1)), Some(MaterialId(2)), Some(MaterialId(2))]
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn sliver_faces_collapse_and_fall_back_to_the_element_material() {
    let mesh = Mesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.001, 1.0, 0.0),
        ],
        vec![MeshFace::Triangle(0, 1, 2), MeshFace::Triangle(1, 3, 2)],
    );
    let context = ConversionContext {
        material: Some(MaterialId(9)),
        face_materials: vec![Some(MaterialId(1)), Some(MaterialId(2))],
        ..ConversionContext::default()
    };
    let mut diagnostics = Diagnostics::default();
    let host = encode_mesh(&ReferenceKernel::new(), &mesh, &tolerance(), &context, &mut diagnostics).expect("mesh");
    assert_eq!(host.triangles.len(), 1);
    assert_eq!(host.materials, vec![Some(MaterialId(9))]);
    assert_eq!(diagnostics.count(DiagnosticKind::ToleranceViolation), 2);
}

#[test]
fn mesh_that_collapses_entirely_produces_nothing() {
    let mesh = Mesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.001, 0.0, 0.0),
            Point3::new(0.0, 0.001, 0.0),
        ],
        vec![MeshFace::Triangle(0, 1, 2)],
    );
    let mut diagnostics = Diagnostics::default();
    let result = encode_mesh(
        &ReferenceKernel::new(),
        &mesh,
        &tolerance(),
        &ConversionContext::default(),
        &mut diagnostics,
    );
    assert_eq!(result, Err(ConversionError::NothingProduced { kind: "mesh" }));
}

#[test]
fn coplanar_triangles_regroup_into_one_ngon() {
    let mesh = decode_mesh(&host_grid(2, false), &NgonConfig::default(), &tolerance());
    assert_eq!(mesh.faces.len(), 8);
    assert_eq!(mesh.ngons.len(), 1);
    let ngon = &mesh.ngons[0];
    assert_eq!(ngon.faces.len(), 8);
    assert_eq!(ngon.boundary.len(), 8);
    assert!(!ngon.boundary.contains(&4));
}

#[test]
fn folded_regions_become_separate_ngons() {
    let mesh = decode_mesh(&host_grid(2, true), &NgonConfig::default(), &tolerance());
    assert_eq!(mesh.ngons.len(), 2);
    let grouped: usize = mesh.ngons.iter().map(|n| n.faces.len()).sum();
    assert_eq!(grouped, 8);
}

#[test]
fn small_regions_stay_triangles() {
    let config = NgonConfig {
        min_vertex_count: 4,
        min_face_count: 3,
    };
    let mesh = decode_mesh(&host_grid(1, false), &config, &tolerance());
    assert!(mesh.ngons.is_empty());
}
