// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh buffers
//!
//! [`MeshBuilder`] is the mutable buffer processors write into.
//! [`Geometry`] is the validated, immutable result: tight bounds and the
//! content hash are computed once at construction and never go stale
//! because nothing can mutate the buffers afterwards.

use nalgebra::{Matrix4, Point3, Vector3};
use stepview_core::EntityKind;
use xxhash_rust::xxh3::Xxh3;

use crate::bounds::Aabb;
use crate::error::{Error, Result};

/// How the index buffer is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Filled triangles
    Triangles,
    /// Line segments stored as degenerate triangles `(a, b, b)`
    Lines,
}

/// Growable triangle mesh with flat f32 buffers
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl MeshBuilder {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex with normal, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend_from_slice(&[position.x as f32, position.y as f32, position.z as f32]);
        self.normals
            .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
        index
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Add a line segment as the degenerate triangle `(a, b, b)`
    #[inline]
    pub fn add_segment(&mut self, a: u32, b: u32) {
        self.indices.extend_from_slice(&[a, b, b]);
    }

    /// Merge another mesh into this one
    pub fn merge(&mut self, other: &MeshBuilder) {
        if other.is_empty() {
            return;
        }
        let vertex_offset = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Transform positions and normals (normals by the inverse transpose)
    pub fn apply_transform(&mut self, transform: &Matrix4<f64>) {
        self.positions.chunks_exact_mut(3).for_each(|chunk| {
            let point = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = transform.transform_point(&point);
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });

        let normal_matrix = transform.try_inverse().unwrap_or(*transform).transpose();
        self.normals.chunks_exact_mut(3).for_each(|chunk| {
            let normal = Vector3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = (normal_matrix * normal.to_homogeneous()).xyz();
            let t = t.try_normalize(1e-12).unwrap_or(t);
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });
    }

    /// Multiply every position by `factor`
    pub fn scale(&mut self, factor: f32) {
        if factor != 1.0 {
            self.positions.iter_mut().for_each(|v| *v *= factor);
        }
    }

    /// Recompute smooth normals by accumulating face normals per vertex
    pub fn recompute_normals(&mut self) {
        let mut accumulated = vec![Vector3::<f32>::zeros(); self.vertex_count()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p = |i: usize| {
                Vector3::new(
                    self.positions[i * 3],
                    self.positions[i * 3 + 1],
                    self.positions[i * 3 + 2],
                )
            };
            let face = (p(b) - p(a)).cross(&(p(c) - p(a)));
            accumulated[a] += face;
            accumulated[b] += face;
            accumulated[c] += face;
        }
        self.normals.clear();
        for n in accumulated {
            let n = n.try_normalize(1e-12).unwrap_or_else(|| Vector3::z());
            self.normals.extend_from_slice(&[n.x, n.y, n.z]);
        }
    }
}

/// Immutable, validated mesh for one source entity
#[derive(Debug, Clone)]
pub struct Geometry {
    source_entity: u64,
    kind: EntityKind,
    primitive: Primitive,
    positions: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
    color: [f32; 3],
    bounds: Aabb,
    content_hash: u64,
}

impl Geometry {
    /// Validate buffers and freeze them
    pub fn new(
        source_entity: u64,
        kind: EntityKind,
        primitive: Primitive,
        mut mesh: MeshBuilder,
        color: [f32; 3],
    ) -> Result<Self> {
        if mesh.is_empty() || mesh.indices.is_empty() {
            return Err(Error::EmptyMesh(format!("#{}", source_entity)));
        }
        if mesh.positions.len() % 3 != 0 || mesh.indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "#{}: buffer length not a multiple of 3",
                source_entity
            )));
        }
        let vertex_count = mesh.vertex_count() as u32;
        if let Some(bad) = mesh.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InvalidMesh(format!(
                "#{}: index {} out of range ({} vertices)",
                source_entity, bad, vertex_count
            )));
        }
        if mesh.positions.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidMesh(format!(
                "#{}: non-finite position",
                source_entity
            )));
        }
        if mesh.normals.len() != mesh.positions.len() {
            mesh.recompute_normals();
        }

        let bounds = Aabb::from_positions(&mesh.positions);
        let content_hash = content_hash(primitive, &mesh.positions, &mesh.indices);
        Ok(Self {
            source_entity,
            kind,
            primitive,
            positions: mesh.positions,
            normals: mesh.normals,
            indices: mesh.indices,
            color,
            bounds,
            content_hash,
        })
    }

    /// Build a simplified variant that keeps this geometry's identity
    pub fn derive(&self, primitive: Primitive, mesh: MeshBuilder) -> Result<Self> {
        Self::new(self.source_entity, self.kind.clone(), primitive, mesh, self.color)
    }

    pub fn source_entity(&self) -> u64 {
        self.source_entity
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// Per-vertex colors (the entity color repeated)
    pub fn vertex_colors(&self) -> Vec<f32> {
        self.color.repeat(self.vertex_count())
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Hash of primitive, positions and indices; equal shapes share it
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn vertex(&self, index: u32) -> Point3<f32> {
        let i = index as usize * 3;
        Point3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    /// Corners of triangle `index`
    #[inline]
    pub fn triangle(&self, index: usize) -> [Point3<f32>; 3] {
        let i = index * 3;
        [
            self.vertex(self.indices[i]),
            self.vertex(self.indices[i + 1]),
            self.vertex(self.indices[i + 2]),
        ]
    }

    /// Copy of the buffers for building a derived mesh
    pub fn to_builder(&self) -> MeshBuilder {
        MeshBuilder {
            positions: self.positions.clone(),
            normals: self.normals.clone(),
            indices: self.indices.clone(),
        }
    }
}

fn content_hash(primitive: Primitive, positions: &[f32], indices: &[u32]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&[primitive as u8]);
    for v in positions {
        hasher.update(&v.to_bits().to_le_bytes());
    }
    for i in indices {
        hasher.update(&i.to_le_bytes());
    }
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshBuilder {
        let mut mesh = MeshBuilder::new();
        let n = Vector3::new(0.0, 0.0, 1.0);
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), n);
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), n);
        let c = mesh.add_vertex(Point3::new(0.0, 2.0, 0.5), n);
        mesh.add_triangle(a, b, c);
        mesh
    }

    #[test]
    fn test_geometry_bounds_are_tight() {
        let g = Geometry::new(1, EntityKind::Wall, Primitive::Triangles, triangle(), [1.0; 3]).unwrap();
        assert_eq!(g.bounds().min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(g.bounds().max, Point3::new(1.0, 2.0, 0.5));
        assert_eq!(g.vertex_colors().len(), 9);
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mut mesh = triangle();
        mesh.add_triangle(0, 1, 7);
        let err = Geometry::new(1, EntityKind::Wall, Primitive::Triangles, mesh, [1.0; 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }

    #[test]
    fn test_rejects_empty() {
        let err = Geometry::new(1, EntityKind::Wall, Primitive::Triangles, MeshBuilder::new(), [1.0; 3])
            .unwrap_err();
        assert!(matches!(err, Error::EmptyMesh(_)));
    }

    #[test]
    fn test_hash_ignores_identity_and_color() {
        let a = Geometry::new(1, EntityKind::Wall, Primitive::Triangles, triangle(), [1.0; 3]).unwrap();
        let b = Geometry::new(2, EntityKind::Slab, Primitive::Triangles, triangle(), [0.5; 3]).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let mut moved = triangle();
        moved.positions[0] = 0.25;
        let c = Geometry::new(3, EntityKind::Wall, Primitive::Triangles, moved, [1.0; 3]).unwrap();
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = triangle();
        a.merge(&triangle());
        assert_eq!(a.vertex_count(), 6);
        assert_eq!(&a.indices[3..], &[3, 4, 5]);
    }
}
