// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray picking against the drawn geometry

use nalgebra::{Matrix4, Point2, Point3, Vector3, Vector4};
use stepview_geometry::Primitive;

use crate::camera::Camera;
use crate::frustum::Frustum;
use crate::lod::LodThresholds;
use crate::scene::{ObjectKey, SceneIndex};
use crate::visibility::{requested_level, VisibilityFilter};

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Option<Self> {
        let direction = direction.try_normalize(EPSILON)?;
        Some(Self { origin, direction })
    }

    /// Ray through a point in normalized device coordinates, from the near
    /// plane towards the far plane
    pub fn from_screen(ndc: Point2<f32>, inverse_view_projection: &Matrix4<f32>) -> Option<Self> {
        let unproject = |z: f32| -> Option<Point3<f32>> {
            let p = inverse_view_projection * Vector4::new(ndc.x, ndc.y, z, 1.0);
            (p.w.abs() > EPSILON).then(|| Point3::new(p.x / p.w, p.y / p.w, p.z / p.w))
        };
        let near = unproject(-1.0)?;
        let far = unproject(1.0)?;
        Self::new(near, far - near)
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// Möller–Trumbore, both faces. Returns the ray parameter of a hit in
/// front of the origin.
pub fn intersect_triangle(
    origin: &Point3<f32>,
    direction: &Vector3<f32>,
    [v0, v1, v2]: &[Point3<f32>; 3],
) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < EPSILON {
        return None;
    }
    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(&q);
    (t > EPSILON).then_some(t)
}

/// Closest surface under a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub object: ObjectKey,
    pub entity_id: u64,
    pub triangle_index: usize,
    pub world_point: Point3<f32>,
    /// Along the ray from its origin
    pub distance: f32,
}

impl PickHit {
    pub(crate) fn new(
        object: ObjectKey,
        entity_id: u64,
        triangle_index: usize,
        world_point: Point3<f32>,
        distance: f32,
    ) -> Self {
        Self {
            object,
            entity_id,
            triangle_index,
            world_point,
            distance,
        }
    }
}

/// Cast `ray` against every visible, pickable object at its active level.
/// The smallest distance wins; on equal distances the earlier object wins.
/// Hits on the clipped side of the filter's clipping planes are ignored.
pub fn pick_ray(
    scene: &SceneIndex,
    ray: &Ray,
    frustum: &Frustum,
    eye: &Point3<f32>,
    thresholds: &LodThresholds,
    filter: &VisibilityFilter,
) -> Option<PickHit> {
    // Distances are only world distances along a unit direction
    let direction = ray.direction.try_normalize(EPSILON)?;
    let ray = Ray {
        origin: ray.origin,
        direction,
    };
    let clipping = filter.clipping();
    let mut best: Option<PickHit> = None;

    for (key, object) in scene.objects() {
        if filter.is_hidden(object)
            || clipping.clips_aabb(&object.world_bounds)
            || !frustum.intersects_aabb(&object.world_bounds)
        {
            continue;
        }
        let Some(entry) = object.world_bounds.ray_intersection(&ray.origin, &ray.direction) else {
            continue;
        };
        if best.is_some_and(|hit| entry > hit.distance) {
            continue;
        }
        let Some(inverse) = object.inverse.as_ref() else {
            continue;
        };
        let level = requested_level(object, eye, thresholds);
        let Some((_, geometry)) = scene.active_geometry(object, level) else {
            continue;
        };
        if geometry.primitive() == Primitive::Lines {
            continue;
        }

        // `ray.direction` has unit length in world space and the inverse is
        // affine, so the local ray parameter t is the world distance
        let local_origin = inverse.transform_point(&ray.origin);
        let local_direction = inverse.transform_vector(&ray.direction);
        if geometry
            .bounds()
            .ray_intersection(&local_origin, &local_direction)
            .is_none()
        {
            continue;
        }

        for index in 0..geometry.triangle_count() {
            let triangle = geometry.triangle(index);
            let Some(t) = intersect_triangle(&local_origin, &local_direction, &triangle) else {
                continue;
            };
            if best.map_or(true, |hit| t < hit.distance) {
                let point = ray.at(t);
                if clipping.clips_point(&point) {
                    continue;
                }
                best = Some(PickHit::new(key, object.entity_id, index, point, t));
            }
        }
    }
    best
}

/// Pick at a pixel position of the camera's viewport
pub fn pick(
    scene: &SceneIndex,
    camera: &Camera,
    screen: Point2<f32>,
    thresholds: &LodThresholds,
    filter: &VisibilityFilter,
) -> Option<PickHit> {
    let view_projection = camera.view_projection();
    let inverse = view_projection.try_inverse()?;
    let ray = Ray::from_screen(camera.screen_to_ndc(screen), &inverse)?;
    let frustum = Frustum::from_view_projection(&view_projection);
    pick_ray(scene, &ray, &frustum, &camera.eye(), thresholds, filter)
}
