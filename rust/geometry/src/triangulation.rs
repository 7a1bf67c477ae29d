// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation
//!
//! Small and convex polygons are fanned directly; everything else goes
//! through earcutr.

use nalgebra::{Point2, Point3, Vector3};

use crate::error::{Error, Result};

const EPS: f64 = 1e-10;

/// All turns in the same direction
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let (p0, p1, p2) = (&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);
        if cross.abs() <= EPS {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if sign != cross.signum() {
            return false;
        }
    }
    true
}

fn fan(n: usize) -> Vec<usize> {
    (1..n - 1).flat_map(|i| [0, i, i + 1]).collect()
}

fn flatten<'a>(rings: impl Iterator<Item = &'a [Point2<f64>]>, capacity: usize) -> Vec<f64> {
    let mut vertices = Vec::with_capacity(capacity * 2);
    for ring in rings {
        vertices.extend(ring.iter().flat_map(|p| [p.x, p.y]));
    }
    vertices
}

/// Triangle indices into `points` for a simple polygon
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    match points.len() {
        n if n < 3 => Err(Error::TriangulationError(format!(
            "polygon with {} points",
            n
        ))),
        3 => Ok(vec![0, 1, 2]),
        4 if is_convex(points) => Ok(vec![0, 1, 2, 0, 2, 3]),
        n if n <= 8 && is_convex(points) => Ok(fan(n)),
        n => {
            let vertices = flatten(std::iter::once(points), n);
            earcutr::earcut(&vertices, &[], 2)
                .map_err(|e| Error::TriangulationError(format!("{:?}", e)))
        }
    }
}

/// Triangle indices into the concatenation of `outer` and every hole
/// with at least three points, in order
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    let holes: Vec<&[Point2<f64>]> = holes
        .iter()
        .filter(|h| h.len() >= 3)
        .map(Vec::as_slice)
        .collect();
    if holes.is_empty() {
        return triangulate_polygon(outer);
    }
    if outer.len() < 3 {
        return Err(Error::TriangulationError(format!(
            "outer boundary with {} points",
            outer.len()
        )));
    }

    let mut hole_starts = Vec::with_capacity(holes.len());
    let mut offset = outer.len();
    for hole in &holes {
        hole_starts.push(offset);
        offset += hole.len();
    }
    let vertices = flatten(std::iter::once(outer).chain(holes.iter().copied()), offset);
    earcutr::earcut(&vertices, &hole_starts, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))
}

/// Orthonormal frame of a plane, used to flatten 3D loops
#[derive(Debug, Clone, Copy)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl PlaneBasis {
    /// Frame in the plane through `origin` with the given normal
    pub fn new(origin: Point3<f64>, normal: &Vector3<f64>) -> Self {
        // Pick the axis least parallel to the normal
        let reference = if normal.x.abs() <= normal.y.abs() && normal.x.abs() <= normal.z.abs() {
            Vector3::x()
        } else if normal.y.abs() <= normal.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = normal.cross(&reference).normalize();
        let v = normal.cross(&u).normalize();
        Self { origin, u, v }
    }

    pub fn project(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points
            .iter()
            .map(|p| {
                let d = p - self.origin;
                Point2::new(d.dot(&self.u), d.dot(&self.v))
            })
            .collect()
    }
}

/// Unit normal of a planar loop (Newell's method, +Z when degenerate)
pub fn polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    if n < 3 {
        return Vector3::z();
    }
    let mut normal = Vector3::<f64>::zeros();
    for i in 0..n {
        let (a, b) = (&points[i], &points[(i + 1) % n]);
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal.try_normalize(EPS).unwrap_or_else(Vector3::z)
}

/// Signed area, positive for counter-clockwise loops
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (&points[i], &points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        * 0.5
}
