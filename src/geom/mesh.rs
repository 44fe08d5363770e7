//! Authoring-side polygon mesh and the clean-up passes the authoring kernel
//! offers before a mesh leaves it.

use std::collections::HashMap;

use super::core::{BBox, Point3, Tolerance};
use super::error::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFace {
    Triangle(u32, u32, u32),
    Quad(u32, u32, u32, u32),
}

impl MeshFace {
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        match *self {
            Self::Triangle(a, b, c) => vec![a, b, c],
            Self::Quad(a, b, c, d) => vec![a, b, c, d],
        }
    }

    fn remapped(&self, remap: &[u32]) -> Self {
        let m = |i: u32| remap[i as usize];
        match *self {
            Self::Triangle(a, b, c) => Self::Triangle(m(a), m(b), m(c)),
            Self::Quad(a, b, c, d) => Self::Quad(m(a), m(b), m(c), m(d)),
        }
    }

    /// Drops repeated corners; `None` when fewer than three remain.
    fn without_repeats(&self) -> Option<Self> {
        let mut ids = self.indices();
        ids.dedup();
        if ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        match ids[..] {
            [a, b, c] if a != c => Some(Self::Triangle(a, b, c)),
            [a, b, c, d] if a != c && b != d => Some(Self::Quad(a, b, c, d)),
            _ => None,
        }
    }
}

/// Planar polygon made of several mesh faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ngon {
    /// Boundary vertex indices in order.
    pub boundary: Vec<u32>,
    /// Indices into [`Mesh::faces`].
    pub faces: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<MeshFace>,
    pub ngons: Vec<Ngon>,
}

impl Mesh {
    #[must_use]
    pub fn new(vertices: Vec<Point3>, faces: Vec<MeshFace>) -> Self {
        Self {
            vertices,
            faces,
            ngons: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let count = self.vertices.len();
        for (index, face) in self.faces.iter().enumerate() {
            if face.indices().iter().any(|&i| i as usize >= count) {
                return Err(GeometryError::InvalidTopology(format!(
                    "mesh face {index} references a vertex out of range"
                )));
            }
        }
        if self.vertices.iter().any(|p| !p.is_finite()) {
            return Err(GeometryError::Degenerate("mesh has non-finite vertices".to_owned()));
        }
        Ok(())
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BBox> {
        BBox::from_points(self.vertices.iter().copied())
    }

    /// A quad is planar when its fourth corner lies within `tolerance` of
    /// the plane through the first three.
    #[must_use]
    pub fn is_quad_planar(&self, face: &MeshFace, tolerance: f64) -> bool {
        let MeshFace::Quad(a, b, c, d) = *face else {
            return true;
        };
        let [a, b, c, d] = [a, b, c, d].map(|i| self.vertices[i as usize]);
        let Some(normal) = (b - a).cross(c - a).normalized() else {
            return false;
        };
        (d - a).dot(normal).abs() <= tolerance
    }

    /// Splits non-planar quads along their shorter diagonal. Returns the
    /// number of quads split.
    pub fn split_non_planar_quads(&mut self, tolerance: f64) -> usize {
        let mut split = 0;
        let mut faces = Vec::with_capacity(self.faces.len());
        for face in std::mem::take(&mut self.faces) {
            match face {
                MeshFace::Quad(a, b, c, d) if !self.is_quad_planar(&face, tolerance) => {
                    let p = |i: u32| self.vertices[i as usize];
                    if p(a).distance_to(p(c)) <= p(b).distance_to(p(d)) {
                        faces.push(MeshFace::Triangle(a, b, c));
                        faces.push(MeshFace::Triangle(a, c, d));
                    } else {
                        faces.push(MeshFace::Triangle(a, b, d));
                        faces.push(MeshFace::Triangle(b, c, d));
                    }
                    split += 1;
                }
                other => faces.push(other),
            }
        }
        self.faces = faces;
        if split > 0 {
            self.ngons.clear();
        }
        split
    }

    /// One pass collapsing every face edge shorter than `min_length` onto
    /// its start vertex. Faces that lose their area are removed. Returns the
    /// number of collapsed edges; call until it returns zero.
    pub fn collapse_short_edges(&mut self, min_length: f64) -> usize {
        let mut remap: Vec<u32> = (0..self.vertices.len() as u32).collect();
        let mut collapsed = 0;
        let root = |remap: &[u32], mut i: u32| {
            while remap[i as usize] != i {
                i = remap[i as usize];
            }
            i
        };

        for face in &self.faces {
            let ids = face.indices();
            for k in 0..ids.len() {
                let a = root(&remap, ids[k]);
                let b = root(&remap, ids[(k + 1) % ids.len()]);
                if a != b && self.vertices[a as usize].distance_to(self.vertices[b as usize]) < min_length {
                    let midpoint = self.vertices[a as usize].midpoint(self.vertices[b as usize]);
                    self.vertices[a as usize] = midpoint;
                    remap[b as usize] = a;
                    collapsed += 1;
                }
            }
        }
        if collapsed == 0 {
            return 0;
        }

        let resolved: Vec<u32> = (0..remap.len() as u32).map(|i| root(&remap, i)).collect();
        self.faces = self
            .faces
            .iter()
            .filter_map(|f| f.remapped(&resolved).without_repeats())
            .collect();
        self.ngons.clear();
        self.compact_vertices();
        collapsed
    }

    /// Merges vertices closer than `tolerance` using a spatial hash. Returns
    /// the number of vertices removed.
    pub fn merge_duplicate_vertices(&mut self, tolerance: f64) -> usize {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return 0;
        }
        let tol = Tolerance::new(tolerance);
        let inv = 1.0 / tolerance;
        #[allow(clippy::cast_possible_truncation)]
        let cell = |p: Point3| ((p.x * inv).floor() as i64, (p.y * inv).floor() as i64, (p.z * inv).floor() as i64);

        let mut buckets: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut merged_points: Vec<Point3> = Vec::with_capacity(self.vertices.len());

        for p in self.vertices.iter().copied() {
            let key = cell(p);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(candidates) = buckets.get(&(key.0 + dx, key.1 + dy, key.2 + dz)) else {
                            continue;
                        };
                        if let Some(&hit) = candidates.iter().find(|&&c| tol.approx_eq_point3(merged_points[c as usize], p)) {
                            found = Some(hit);
                            break 'search;
                        }
                    }
                }
            }
            let index = found.unwrap_or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                let index = merged_points.len() as u32;
                merged_points.push(p);
                buckets.entry(key).or_default().push(index);
                index
            });
            remap.push(index);
        }

        let removed = self.vertices.len() - merged_points.len();
        if removed > 0 {
            self.vertices = merged_points;
            self.faces = self.faces.iter().filter_map(|f| f.remapped(&remap).without_repeats()).collect();
            for ngon in &mut self.ngons {
                for v in &mut ngon.boundary {
                    *v = remap[*v as usize];
                }
            }
        }
        removed
    }

    /// Removes vertices no face references.
    fn compact_vertices(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for face in &self.faces {
            for i in face.indices() {
                used[i as usize] = true;
            }
        }
        let mut remap = vec![0u32; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for (index, p) in self.vertices.iter().enumerate() {
            if used[index] {
                #[allow(clippy::cast_possible_truncation)]
                let new_index = kept.len() as u32;
                remap[index] = new_index;
                kept.push(*p);
            }
        }
        self.vertices = kept;
        self.faces = self.faces.iter().map(|f| f.remapped(&remap)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Mesh {
        Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![MeshFace::Quad(0, 1, 2, 3)],
        )
    }

    #[test]
    fn planar_quad_is_kept() {
        let mut mesh = square();
        assert_eq!(mesh.split_non_planar_quads(1e-6), 0);
        assert_eq!(mesh.faces.len(), 1);
    }

    #[test]
    fn warped_quad_is_split() {
        let mut mesh = square();
        mesh.vertices[2].z = 0.5;
        assert_eq!(mesh.split_non_planar_quads(1e-6), 1);
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.faces.iter().all(|f| matches!(f, MeshFace::Triangle(..))));
    }

    #[test]
    fn duplicate_vertices_merge() {
        let mut mesh = Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 1e-9),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![MeshFace::Triangle(0, 1, 2), MeshFace::Triangle(3, 4, 2)],
        );
        assert_eq!(mesh.merge_duplicate_vertices(1e-6), 1);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces[1], MeshFace::Triangle(1, 3, 2));
    }
}
