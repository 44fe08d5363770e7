//! Subdivision-surface control cages.
//!
//! A [`SubD`] is lowered to a polygon [`Mesh`] before it leaves the authoring
//! side: the cage is relaxed `density - 1` times and every face becomes a
//! triangle, a quad, or a centroid fan.
//!
//! # Example
//! ```ignore
//! let cage = SubD::new(points, faces)?;
//! let mesh = cage.to_mesh(2);
//! ```

use std::collections::BTreeSet;

use super::core::{BBox, Point3};
use super::error::GeometryError;
use super::mesh::{Mesh, MeshFace};

#[derive(Debug, Clone, PartialEq)]
pub struct SubD {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Vec<u32>>,
    /// Edges kept sharp while relaxing, as `(min, max)` vertex pairs.
    pub creases: BTreeSet<(u32, u32)>,
}

impl SubD {
    pub fn new(vertices: Vec<Point3>, faces: Vec<Vec<u32>>) -> Result<Self, GeometryError> {
        for (index, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(GeometryError::TooFewPoints {
                    kind: "subd face",
                    required: 3,
                    actual: face.len(),
                });
            }
            if face.iter().any(|&v| v as usize >= vertices.len()) {
                return Err(GeometryError::InvalidTopology(format!(
                    "subd face {index} references a vertex out of range"
                )));
            }
        }
        Ok(Self {
            vertices,
            faces,
            creases: BTreeSet::new(),
        })
    }

    /// Axis-aligned box cage; six quads wound outward.
    #[must_use]
    pub fn box_cage(min: Point3, max: Point3) -> Self {
        let vertices = vec![
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        Self {
            vertices,
            faces,
            creases: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BBox> {
        BBox::from_points(self.vertices.iter().copied())
    }

    fn edges(&self) -> BTreeSet<(u32, u32)> {
        let mut edges = BTreeSet::new();
        for face in &self.faces {
            for k in 0..face.len() {
                let (a, b) = (face[k], face[(k + 1) % face.len()]);
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges
    }

    /// Laplacian relaxation; creased edges do not pull their endpoints.
    fn relax(&mut self, iterations: usize) {
        let edges = self.edges();
        let n = self.vertices.len();
        for _ in 0..iterations {
            let mut sums = vec![Point3::ORIGIN.to_vec3(); n];
            let mut counts = vec![0usize; n];
            for &(a, b) in edges.iter().filter(|e| !self.creases.contains(e)) {
                let (a, b) = (a as usize, b as usize);
                sums[a] = sums[a] + self.vertices[b].to_vec3();
                sums[b] = sums[b] + self.vertices[a].to_vec3();
                counts[a] += 1;
                counts[b] += 1;
            }
            for (i, vertex) in self.vertices.iter_mut().enumerate() {
                if counts[i] == 0 {
                    continue;
                }
                let avg = sums[i] * (1.0 / counts[i] as f64);
                *vertex = vertex.midpoint(Point3::new(avg.x, avg.y, avg.z));
            }
        }
    }

    /// Lowers the cage to a polygon mesh (`density` 1 keeps the cage).
    #[must_use]
    pub fn to_mesh(&self, density: usize) -> Mesh {
        let mut cage = self.clone();
        cage.relax(density.saturating_sub(1));

        let mut vertices = cage.vertices.clone();
        let mut faces = Vec::with_capacity(cage.faces.len());
        for face in &cage.faces {
            match face[..] {
                [a, b, c] => faces.push(MeshFace::Triangle(a, b, c)),
                [a, b, c, d] => faces.push(MeshFace::Quad(a, b, c, d)),
                _ => {
                    let sum = face
                        .iter()
                        .fold(Point3::ORIGIN.to_vec3(), |acc, &v| acc + cage.vertices[v as usize].to_vec3());
                    let centroid = sum * (1.0 / face.len() as f64);
                    #[allow(clippy::cast_possible_truncation)]
                    let center = vertices.len() as u32;
                    vertices.push(Point3::new(centroid.x, centroid.y, centroid.z));
                    for k in 0..face.len() {
                        faces.push(MeshFace::Triangle(face[k], face[(k + 1) % face.len()], center));
                    }
                }
            }
        }
        Mesh::new(vertices, faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_cage_lowers_to_six_quads() {
        let cage = SubD::box_cage(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let mesh = cage.to_mesh(1);
        assert_eq!(mesh.faces.len(), 6);
        assert_eq!(mesh.vertices.len(), 8);
    }

    #[test]
    fn pentagon_becomes_fan() {
        let pts: Vec<Point3> = (0..5)
            .map(|i| {
                let a = f64::from(i) * std::f64::consts::TAU / 5.0;
                Point3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        let cage = SubD::new(pts, vec![vec![0, 1, 2, 3, 4]]).expect("valid cage");
        let mesh = cage.to_mesh(1);
        assert_eq!(mesh.faces.len(), 5);
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn relaxing_shrinks_the_cage() {
        let cage = SubD::box_cage(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let mesh = cage.to_mesh(3);
        let bbox = mesh.bounding_box().expect("bbox");
        assert!(bbox.diagonal() < 2.0 * 3.0_f64.sqrt());
    }
}
