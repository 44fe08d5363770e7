//! Mesh transfer in both directions.
//!
//! Outgoing meshes are cleaned the way the host expects (planar facets, no
//! edges below the short-curve tolerance, no duplicate vertices) and handed
//! to the host mesh builder face by face. Incoming triangle meshes get their
//! planar regions regrouped into ngons.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::geom::{Mesh, MeshFace, Ngon, Point3, Vec3};
use crate::host::{HostKernel, HostMesh, MaterialId};
use crate::units::GeometryTolerance;

use super::config::NgonConfig;
use super::context::ConversionContext;
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::error::ConversionError;

/// Cleans `mesh` (already in host units) and builds it on the host.
pub fn encode_mesh<K: HostKernel + ?Sized>(
    kernel: &K,
    mesh: &Mesh,
    tolerance: &GeometryTolerance,
    context: &ConversionContext,
    diagnostics: &mut Diagnostics,
) -> Result<HostMesh, ConversionError> {
    mesh.validate()
        .map_err(|err| ConversionError::unsupported("mesh", err.to_string()))?;

    // Materials follow faces through the quad split.
    let mut materials: Vec<Option<MaterialId>> = Vec::with_capacity(mesh.faces.len());
    for (index, face) in mesh.faces.iter().enumerate() {
        let copies = if mesh.is_quad_planar(face, tolerance.vertex) { 1 } else { 2 };
        materials.extend(std::iter::repeat_n(context.face_material(index), copies));
    }

    let mut clean = mesh.clone();
    let split = clean.split_non_planar_quads(tolerance.vertex);
    let mut collapsed = 0;
    loop {
        let pass = clean.collapse_short_edges(tolerance.short_curve);
        if pass == 0 {
            break;
        }
        collapsed += pass;
    }
    let merged = clean.merge_duplicate_vertices(tolerance.vertex);
    log::debug!("mesh clean-up: {split} quad(s) split, {collapsed} edge(s) collapsed, {merged} vertex(es) merged");

    if collapsed > 0 || merged > 0 {
        diagnostics.emit(
            Diagnostic::remark(
                DiagnosticKind::ToleranceViolation,
                format!("{collapsed} short edge(s) collapsed and {merged} duplicate vertex(es) merged"),
            )
            .with_subject(mesh.clone()),
        );
    }
    if clean.faces.is_empty() {
        return Err(ConversionError::NothingProduced { kind: "mesh" });
    }
    if clean.faces.len() != materials.len() {
        if !context.face_materials.is_empty() {
            diagnostics.emit(Diagnostic::warning(
                DiagnosticKind::ToleranceViolation,
                "faces were removed during clean-up; per-face materials were replaced by the element material",
            ));
        }
        materials = vec![context.material; clean.faces.len()];
    }

    let mut builder = kernel.mesh_builder();
    for (face, material) in clean.faces.iter().zip(materials) {
        let corners: Vec<Point3> = face.indices().iter().map(|&i| clean.vertices[i as usize]).collect();
        if let Err(err) = builder.add_facet(&corners, material) {
            diagnostics.emit(Diagnostic::warning(
                DiagnosticKind::HostPlatformFailure,
                format!("mesh facet skipped: {err}"),
            ));
        }
    }
    Ok(builder.finish()?)
}

/// Source mesh from a host triangle mesh, with planar regions regrouped as
/// ngons.
#[must_use]
pub fn decode_mesh(host: &HostMesh, config: &NgonConfig, tolerance: &GeometryTolerance) -> Mesh {
    let faces = host
        .triangles
        .iter()
        .map(|&[a, b, c]| MeshFace::Triangle(a, b, c))
        .collect();
    let mut mesh = Mesh::new(host.vertices.clone(), faces);
    mesh.ngons = rebuild_ngons(&mesh, config, tolerance);
    mesh
}

fn triangle_normal(mesh: &Mesh, face: &MeshFace) -> Option<Vec3> {
    let ids = face.indices();
    let [a, b, c] = [ids[0], ids[1], ids[2]].map(|i| mesh.vertices[i as usize]);
    (b - a).cross(c - a).normalized()
}

/// Greedily grows coplanar regions of adjacent triangles. Regions with a
/// single boundary loop and enough faces and corners become ngons.
fn rebuild_ngons(mesh: &Mesh, config: &NgonConfig, tolerance: &GeometryTolerance) -> Vec<Ngon> {
    let normals: Vec<Option<Vec3>> = mesh.faces.iter().map(|f| triangle_normal(mesh, f)).collect();
    let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (index, face) in mesh.faces.iter().enumerate() {
        let ids = face.indices();
        for k in 0..ids.len() {
            let (a, b) = (ids[k], ids[(k + 1) % ids.len()]);
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(index);
        }
    }

    let min_dot = tolerance.angle.cos();
    let mut visited = vec![false; mesh.faces.len()];
    let mut ngons = Vec::new();
    for seed in 0..mesh.faces.len() {
        let Some(normal) = normals[seed] else {
            continue;
        };
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let origin = mesh.vertices[mesh.faces[seed].indices()[0] as usize];
        let coplanar = |face: usize| {
            normals[face].is_some_and(|n| n.dot(normal) >= min_dot)
                && mesh.faces[face]
                    .indices()
                    .iter()
                    .all(|&i| (mesh.vertices[i as usize] - origin).dot(normal).abs() <= tolerance.vertex)
        };

        let mut region = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(face) = queue.pop_front() {
            let ids = mesh.faces[face].indices();
            for k in 0..ids.len() {
                let (a, b) = (ids[k], ids[(k + 1) % ids.len()]);
                let neighbours = &edge_faces[&(a.min(b), a.max(b))];
                if neighbours.len() != 2 {
                    continue;
                }
                for &next in neighbours {
                    if !visited[next] && coplanar(next) {
                        visited[next] = true;
                        region.push(next);
                        queue.push_back(next);
                    }
                }
            }
        }

        if region.len() < config.min_face_count {
            continue;
        }
        if let Some(boundary) = single_boundary(mesh, &region) {
            if boundary.len() >= config.min_vertex_count {
                region.sort_unstable();
                #[allow(clippy::cast_possible_truncation)]
                let faces = region.iter().map(|&f| f as u32).collect();
                ngons.push(Ngon { boundary, faces });
            }
        }
    }
    ngons
}

/// Boundary of a face region as one ordered vertex loop; `None` when the
/// region has holes or touches itself.
fn single_boundary(mesh: &Mesh, region: &[usize]) -> Option<Vec<u32>> {
    let mut directed: HashSet<(u32, u32)> = HashSet::new();
    for &face in region {
        let ids = mesh.faces[face].indices();
        for k in 0..ids.len() {
            directed.insert((ids[k], ids[(k + 1) % ids.len()]));
        }
    }
    let mut next: HashMap<u32, u32> = HashMap::new();
    for &(a, b) in &directed {
        if directed.contains(&(b, a)) {
            continue;
        }
        if next.insert(a, b).is_some() {
            return None;
        }
    }
    let start = *next.keys().min()?;
    let mut boundary = vec![start];
    let mut current = next[&start];
    while current != start {
        if boundary.len() > next.len() {
            return None;
        }
        boundary.push(current);
        current = *next.get(&current)?;
    }
    (boundary.len() == next.len()).then_some(boundary)
}
