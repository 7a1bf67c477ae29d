// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clipping planes and section boxes
//!
//! A plane keeps the half-space its normal points into. Objects whose
//! world bounds lie entirely on the clipped side of any enabled plane are
//! not drawn, and pick hits on the clipped side are ignored.

use nalgebra::{Point3, Vector3};
use stepview_geometry::Aabb;

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippingPlane {
    /// Unit normal towards the kept side
    pub normal: Vector3<f32>,
    /// Offset of the plane along `normal`
    pub distance: f32,
    pub enabled: bool,
    /// Keep the other side instead
    pub flip: bool,
}

impl ClippingPlane {
    /// Plane through `point`; `None` for a zero normal
    pub fn from_point_normal(point: Point3<f32>, normal: Vector3<f32>) -> Option<Self> {
        let normal = normal.try_normalize(EPSILON)?;
        Some(Self {
            normal,
            distance: normal.dot(&point.coords),
            enabled: true,
            flip: false,
        })
    }

    /// Keeps everything above `height`
    pub fn horizontal(height: f32) -> Self {
        Self::axis(Vector3::z(), height)
    }

    /// Keeps everything with x greater than `x`
    pub fn vertical_x(x: f32) -> Self {
        Self::axis(Vector3::x(), x)
    }

    /// Keeps everything with y greater than `y`
    pub fn vertical_y(y: f32) -> Self {
        Self::axis(Vector3::y(), y)
    }

    fn axis(normal: Vector3<f32>, distance: f32) -> Self {
        Self {
            normal,
            distance,
            enabled: true,
            flip: false,
        }
    }

    /// Positive on the kept side
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f32>) -> f32 {
        let d = self.normal.dot(&p.coords) - self.distance;
        if self.flip {
            -d
        } else {
            d
        }
    }

    pub fn clips_point(&self, p: &Point3<f32>) -> bool {
        self.enabled && self.signed_distance(p) < 0.0
    }

    /// Every corner of `aabb` is clipped
    pub fn clips_aabb(&self, aabb: &Aabb) -> bool {
        self.enabled
            && !aabb.is_empty()
            && aabb.corners().iter().all(|c| self.signed_distance(c) < 0.0)
    }

    /// `aabb` has corners on both sides
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if !self.enabled || aabb.is_empty() {
            return false;
        }
        let corners = aabb.corners();
        corners.iter().any(|c| self.signed_distance(c) >= 0.0)
            && corners.iter().any(|c| self.signed_distance(c) <= 0.0)
    }
}

/// Active clipping planes of a view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClippingPlanes {
    planes: Vec<ClippingPlane>,
}

impl ClippingPlanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plane and return its index
    pub fn add(&mut self, plane: ClippingPlane) -> usize {
        self.planes.push(plane);
        self.planes.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<ClippingPlane> {
        (index < self.planes.len()).then(|| self.planes.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&ClippingPlane> {
        self.planes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ClippingPlane> {
        self.planes.get_mut(index)
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for plane in &mut self.planes {
            plane.enabled = enabled;
        }
    }

    pub fn clear(&mut self) {
        self.planes.clear();
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ClippingPlane> {
        self.planes.iter().filter(|p| p.enabled)
    }

    /// At least one plane clips something
    pub fn is_active(&self) -> bool {
        self.enabled().next().is_some()
    }

    pub fn clips_point(&self, p: &Point3<f32>) -> bool {
        self.planes.iter().any(|plane| plane.clips_point(p))
    }

    /// `aabb` lies entirely on the clipped side of some plane
    pub fn clips_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().any(|plane| plane.clips_aabb(aabb))
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().any(|plane| plane.intersects_aabb(aabb))
    }
}

/// Axis-aligned region outside of which everything is clipped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionBox {
    pub bounds: Aabb,
    pub enabled: bool,
}

impl SectionBox {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            enabled: true,
        }
    }

    /// The six inward-facing planes; none when disabled
    pub fn to_planes(&self) -> ClippingPlanes {
        let mut planes = ClippingPlanes::new();
        if !self.enabled {
            return planes;
        }
        let (min, max) = (self.bounds.min, self.bounds.max);
        for axis in 0..3 {
            let mut normal = Vector3::zeros();
            normal[axis] = 1.0;
            planes.add(ClippingPlane::axis(normal, min[axis]));
            planes.add(ClippingPlane::axis(-normal, -max[axis]));
        }
        planes
    }

    pub fn contains_point(&self, p: &Point3<f32>) -> bool {
        !self.enabled || self.bounds.contains(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(min: [f32; 3], max: [f32; 3]) -> Aabb {
        Aabb::new(Point3::from(min), Point3::from(max))
    }

    #[test]
    fn test_horizontal_plane() {
        let plane = ClippingPlane::horizontal(5.0);
        assert!(plane.clips_point(&Point3::new(0.0, 0.0, 3.0)));
        assert!(!plane.clips_point(&Point3::new(0.0, 0.0, 7.0)));

        let flipped = ClippingPlane { flip: true, ..plane };
        assert!(!flipped.clips_point(&Point3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn test_box_against_plane() {
        let plane = ClippingPlane::horizontal(5.0);
        assert!(plane.clips_aabb(&aabb([0.0; 3], [10.0, 10.0, 4.0])));
        assert!(!plane.clips_aabb(&aabb([0.0, 0.0, 6.0], [10.0; 3])));

        let straddling = aabb([0.0, 0.0, 4.0], [10.0, 10.0, 6.0]);
        assert!(!plane.clips_aabb(&straddling));
        assert!(plane.intersects_aabb(&straddling));

        let disabled = ClippingPlane { enabled: false, ..plane };
        assert!(!disabled.clips_aabb(&aabb([0.0; 3], [1.0; 3])));
    }

    #[test]
    fn test_point_normal_plane() {
        let plane = ClippingPlane::from_point_normal(Point3::new(2.0, 0.0, 0.0), Vector3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(plane.normal, Vector3::x());
        assert!(plane.clips_point(&Point3::new(1.0, 0.0, 0.0)));
        assert!(ClippingPlane::from_point_normal(Point3::origin(), Vector3::zeros()).is_none());
    }

    #[test]
    fn test_plane_set() {
        let mut planes = ClippingPlanes::new();
        planes.add(ClippingPlane::horizontal(5.0));
        let x = planes.add(ClippingPlane::vertical_x(10.0));
        assert!(planes.clips_point(&Point3::new(15.0, 0.0, 3.0)));
        assert!(planes.clips_point(&Point3::new(8.0, 0.0, 7.0)));
        assert!(!planes.clips_point(&Point3::new(12.0, 0.0, 7.0)));

        planes.set_all_enabled(false);
        assert!(!planes.is_active());
        assert!(!planes.clips_point(&Point3::new(8.0, 0.0, 3.0)));

        assert!(planes.remove(x).is_some());
        assert!(planes.remove(x).is_none());
        assert_eq!(planes.len(), 1);
    }

    #[test]
    fn test_section_box_keeps_inside() {
        let section = SectionBox::new(aabb([0.0; 3], [10.0; 3]));
        assert!(section.contains_point(&Point3::new(5.0, 5.0, 5.0)));
        assert!(!section.contains_point(&Point3::new(15.0, 5.0, 5.0)));

        let planes = section.to_planes();
        assert_eq!(planes.len(), 6);
        assert!(!planes.clips_point(&Point3::new(5.0, 5.0, 5.0)));
        assert!(planes.clips_point(&Point3::new(5.0, -1.0, 5.0)));
        assert!(planes.clips_point(&Point3::new(5.0, 5.0, 11.0)));
        assert!(planes.clips_aabb(&aabb([20.0; 3], [21.0; 3])));
        assert!(!planes.clips_aabb(&aabb([9.0; 3], [12.0; 3])));

        let off = SectionBox { enabled: false, ..section };
        assert!(off.to_planes().is_empty());
        assert!(off.contains_point(&Point3::new(50.0, 0.0, 0.0)));
    }
}
