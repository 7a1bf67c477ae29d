// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Level of detail
//!
//! Variants are built once per distinct geometry at load time and selected
//! per frame by a pure distance lookup.
//!
//! ## Simplification
//!
//! Medium and Low use vertex clustering: vertices are snapped to a uniform
//! grid over the geometry's bounds, each occupied cell collapses to the
//! mean of its vertices, and triangles that lose a corner are dropped. The
//! error metric is the cell size: no vertex moves further than one cell
//! diagonal. Minimal is the twelve-edge bounding-box wireframe.
//!
//! Medium and Low are kept only when they have strictly fewer vertices
//! than the previous kept variant; Minimal is kept unless it would have
//! more. Requests for a missing level fall back to the
//! nearest more detailed level, so the selected vertex count never grows
//! with distance.

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use serde::Serialize;
use stepview_geometry::{Geometry, MeshBuilder, Primitive};

use crate::error::{Error, Result};

/// Grid cells along the longest axis for [`LodLevel::Medium`]
pub const MEDIUM_GRID_CELLS: f32 = 12.0;
/// Grid cells along the longest axis for [`LodLevel::Low`]
pub const LOW_GRID_CELLS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LodLevel {
    High,
    Medium,
    Low,
    Minimal,
}

impl LodLevel {
    pub const ALL: [LodLevel; 4] = [Self::High, Self::Medium, Self::Low, Self::Minimal];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
        }
    }
}

impl std::fmt::Display for LodLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distances (metres) at which each coarser level starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LodThresholds {
    pub medium: f32,
    pub low: f32,
    pub minimal: f32,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            medium: 10.0,
            low: 50.0,
            minimal: 150.0,
        }
    }
}

impl LodThresholds {
    /// Thresholds must be finite, positive and strictly increasing
    pub fn new(medium: f32, low: f32, minimal: f32) -> Result<Self> {
        let valid = medium.is_finite()
            && low.is_finite()
            && minimal.is_finite()
            && 0.0 < medium
            && medium < low
            && low < minimal;
        if !valid {
            return Err(Error::Config(format!(
                "LOD thresholds must increase: {} < {} < {}",
                medium, low, minimal
            )));
        }
        Ok(Self {
            medium,
            low,
            minimal,
        })
    }

    /// Level for a camera-to-object distance: High `[0, medium)`, Medium
    /// `[medium, low)`, Low `[low, minimal)`, Minimal beyond
    #[inline]
    pub fn select(&self, distance: f32) -> LodLevel {
        if distance < self.medium {
            LodLevel::High
        } else if distance < self.low {
            LodLevel::Medium
        } else if distance < self.minimal {
            LodLevel::Low
        } else {
            LodLevel::Minimal
        }
    }
}

/// Precomputed variants of one geometry, most detailed first
#[derive(Debug, Clone)]
pub struct LodSet {
    variants: Vec<(LodLevel, Geometry)>,
}

impl LodSet {
    /// Build every level from the full-resolution geometry
    pub fn build(high: Geometry) -> Self {
        let mut variants = vec![(LodLevel::High, high)];
        let candidates = {
            let high = &variants[0].1;
            let extent = high.bounds().size().max();
            let mut out = Vec::with_capacity(3);
            if extent > 0.0 {
                out.push((LodLevel::Medium, cluster(high, extent / MEDIUM_GRID_CELLS)));
                out.push((LodLevel::Low, cluster(high, extent / LOW_GRID_CELLS)));
            }
            out.push((LodLevel::Minimal, bounding_box_wireframe(high)));
            out
        };

        for (level, candidate) in candidates {
            let Some(geometry) = candidate else {
                continue;
            };
            let previous = variants.last().map_or(usize::MAX, |(_, g)| g.vertex_count());
            let keep = match level {
                LodLevel::Minimal => geometry.vertex_count() <= previous,
                _ => geometry.vertex_count() < previous,
            };
            if keep {
                variants.push((level, geometry));
            }
        }
        Self { variants }
    }

    /// Full-resolution geometry
    pub fn high(&self) -> &Geometry {
        &self.variants[0].1
    }

    /// Exact variant for `level`, if it was kept
    pub fn get(&self, level: LodLevel) -> Option<&Geometry> {
        self.variants
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, g)| g)
    }

    /// Variant to draw for `level`: the most simplified kept variant not
    /// coarser than `level`
    pub fn select(&self, level: LodLevel) -> (LodLevel, &Geometry) {
        let (actual, geometry) = self
            .variants
            .iter()
            .rev()
            .find(|(l, _)| *l <= level)
            .unwrap_or(&self.variants[0]);
        (*actual, geometry)
    }

    pub fn levels(&self) -> impl Iterator<Item = LodLevel> + '_ {
        self.variants.iter().map(|(l, _)| *l)
    }
}

#[derive(Default)]
struct Cluster {
    sum: Vector3<f64>,
    normal: Vector3<f64>,
    count: u32,
    index: Option<u32>,
}

/// Vertex-clustering simplification on a grid of `cell` sized cubes
fn cluster(geometry: &Geometry, cell: f32) -> Option<Geometry> {
    if !(cell > 0.0) {
        return None;
    }
    let origin = geometry.bounds().min;
    let mut cells: FxHashMap<[i32; 3], usize> = FxHashMap::default();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut vertex_cluster = Vec::with_capacity(geometry.vertex_count());

    let positions = geometry.positions();
    let normals = geometry.normals();
    for v in 0..geometry.vertex_count() {
        let p = Vector3::new(positions[v * 3], positions[v * 3 + 1], positions[v * 3 + 2]);
        let key = [0, 1, 2].map(|axis| ((p[axis] - origin[axis]) / cell).floor() as i32);
        let id = *cells.entry(key).or_insert_with(|| {
            clusters.push(Cluster::default());
            clusters.len() - 1
        });
        let c = &mut clusters[id];
        c.sum += p.cast::<f64>();
        c.normal += Vector3::new(normals[v * 3], normals[v * 3 + 1], normals[v * 3 + 2]).cast::<f64>();
        c.count += 1;
        vertex_cluster.push(id);
    }

    let mut mesh = MeshBuilder::new();
    let lines = geometry.primitive() == Primitive::Lines;
    for tri in geometry.indices().chunks_exact(3) {
        let [a, b, c] = [0, 1, 2].map(|i| vertex_cluster[tri[i] as usize]);
        let keep = if lines { a != b } else { a != b && b != c && a != c };
        if !keep {
            continue;
        }
        let [ia, ib, ic] = [a, b, c].map(|id| {
            let cluster = &mut clusters[id];
            *cluster.index.get_or_insert_with(|| {
                let n = cluster.count as f64;
                let normal = cluster.normal.try_normalize(1e-12).unwrap_or_else(Vector3::z);
                mesh.add_vertex(Point3::from(cluster.sum / n), normal)
            })
        });
        mesh.add_triangle(ia, ib, ic);
    }

    if mesh.indices.is_empty() {
        return None;
    }
    geometry.derive(geometry.primitive(), mesh).ok()
}

/// Twelve bounding-box edges as degenerate line triangles
fn bounding_box_wireframe(geometry: &Geometry) -> Option<Geometry> {
    const EDGES: [(u32, u32); 12] = [
        (0, 1), (2, 3), (4, 5), (6, 7), // along x
        (0, 2), (1, 3), (4, 6), (5, 7), // along y
        (0, 4), (1, 5), (2, 6), (3, 7), // along z
    ];
    let bounds = geometry.bounds();
    if bounds.is_empty() {
        return None;
    }
    let mut mesh = MeshBuilder::with_capacity(8, EDGES.len() * 3);
    for corner in bounds.corners() {
        mesh.add_vertex(corner.cast::<f64>(), Vector3::z());
    }
    for (a, b) in EDGES {
        mesh.add_segment(a, b);
    }
    geometry.derive(Primitive::Lines, mesh).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepview_core::EntityKind;
    use stepview_geometry::{extrude_profile, Profile2D};

    fn disc() -> Geometry {
        let profile = Profile2D::circle(10.0).unwrap();
        let mesh = extrude_profile(&profile, 2.0, None, None).unwrap();
        Geometry::new(1, EntityKind::Column, Primitive::Triangles, mesh, [1.0; 3]).unwrap()
    }

    #[test]
    fn test_threshold_boundaries() {
        let t = LodThresholds::default();
        assert_eq!(t.select(0.0), LodLevel::High);
        assert_eq!(t.select(9.99), LodLevel::High);
        assert_eq!(t.select(10.0), LodLevel::Medium);
        assert_eq!(t.select(50.0), LodLevel::Low);
        assert_eq!(t.select(150.0), LodLevel::Minimal);
        assert_eq!(t.select(f32::INFINITY), LodLevel::Minimal);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(LodThresholds::new(50.0, 10.0, 150.0).is_err());
        assert!(LodThresholds::new(0.0, 10.0, 150.0).is_err());
        assert!(LodThresholds::new(1.0, 2.0, 3.0).is_ok());
    }

    #[test]
    fn test_variants_shrink() {
        let lods = LodSet::build(disc());
        let counts: Vec<usize> = lods
            .levels()
            .map(|l| lods.get(l).unwrap().vertex_count())
            .collect();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]));
        assert!(lods.get(LodLevel::Medium).is_some());
        assert!(counts[1] < counts[0]);
        assert_eq!(lods.levels().last(), Some(LodLevel::Minimal));

        let minimal = lods.get(LodLevel::Minimal).unwrap();
        assert_eq!(minimal.primitive(), Primitive::Lines);
        assert_eq!(minimal.triangle_count(), 12);
        assert_eq!(minimal.bounds(), lods.high().bounds());
    }

    #[test]
    fn test_fallback_to_more_detail() {
        // A single triangle has only three vertices: nothing simpler is kept
        let mut mesh = MeshBuilder::new();
        let n = Vector3::z();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), n);
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), n);
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0), n);
        mesh.add_triangle(a, b, c);
        let tri = Geometry::new(2, EntityKind::Plate, Primitive::Triangles, mesh, [1.0; 3]).unwrap();

        let lods = LodSet::build(tri);
        assert_eq!(lods.levels().count(), 1);
        for level in LodLevel::ALL {
            assert_eq!(lods.select(level).0, LodLevel::High);
        }
    }
}
