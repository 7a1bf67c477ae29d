// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! View frustum planes and conservative box tests

use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use stepview_geometry::Aabb;

/// Plane `normal · p + d = 0` with the inside on the normal's side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Plane {
    fn from_row(row: Vector4<f32>) -> Self {
        let normal = Vector3::new(row.x, row.y, row.z);
        let len = normal.norm();
        if len > f32::EPSILON {
            Self {
                normal: normal / len,
                d: row.w / len,
            }
        } else {
            // Degenerate plane accepts everything
            Self {
                normal: Vector3::zeros(),
                d: 0.0,
            }
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: &Point3<f32>) -> f32 {
        self.normal.dot(&p.coords) + self.d
    }
}

/// Six planes: left, right, bottom, top, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of an OpenGL-style view-projection matrix
    /// (clip depth in `[-w, w]`)
    pub fn from_view_projection(m: &Matrix4<f32>) -> Self {
        let row = |i: usize| -> Vector4<f32> { m.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r3 + r2),
                Plane::from_row(r3 - r2),
            ],
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// `false` only when the box lies entirely outside one plane. Boxes
    /// near frustum corners may pass although invisible; visible boxes
    /// never fail.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if aabb.is_empty() {
            return false;
        }
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal
            let p = Point3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.signed_distance(&p) >= 0.0
        })
    }

    pub fn contains_point(&self, p: &Point3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    fn unit_box(center: Point3<f32>) -> Aabb {
        let h = Vector3::new(0.5, 0.5, 0.5);
        Aabb::new(center - h, center + h)
    }

    fn frustum() -> Frustum {
        // Looking along +Y from the origin
        let camera = Camera::looking_at(Point3::origin(), Point3::new(0.0, 10.0, 0.0), (800, 800));
        Frustum::from_view_projection(&camera.view_projection())
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let f = frustum();
        assert!(f.intersects_aabb(&unit_box(Point3::new(0.0, 10.0, 0.0))));
        assert!(f.contains_point(&Point3::new(0.0, 10.0, 0.0)));
    }

    #[test]
    fn test_box_behind_is_culled() {
        let f = frustum();
        assert!(!f.intersects_aabb(&unit_box(Point3::new(0.0, -10.0, 0.0))));
        assert!(!f.intersects_aabb(&unit_box(Point3::new(100.0, 10.0, 0.0))));
        assert!(!f.intersects_aabb(&Aabb::empty()));
    }

    #[test]
    fn test_box_straddling_a_plane_is_kept() {
        let f = frustum();
        // Half-angle is 22.5 degrees: at y = 10 the right plane is x ≈ 4.14
        let straddling = Aabb::new(Point3::new(3.5, 9.5, -0.5), Point3::new(5.0, 10.5, 0.5));
        assert!(f.intersects_aabb(&straddling));
    }

    #[test]
    fn test_every_point_inside_means_box_kept() {
        let f = frustum();
        for i in 0..20 {
            let c = Point3::new(i as f32 * 0.3 - 3.0, 5.0 + i as f32, (i % 5) as f32 - 2.0);
            if f.contains_point(&c) {
                assert!(f.intersects_aabb(&unit_box(c)));
            }
        }
    }
}
