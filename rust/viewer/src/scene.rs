// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene index: arena-owned geometries and the objects that place them.
//!
//! Geometries are deduplicated by content hash, so identical meshes are
//! stored (and LOD-simplified) once and referenced by every object that
//! uses them. Keys are generational `slotmap` indices; a scene is
//! immutable once built and shared behind an `Arc`.

use nalgebra::Matrix4;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use stepview_core::EntityKind;
use stepview_geometry::{Aabb, ExtractedObject, Geometry};

use crate::lod::{LodLevel, LodSet};

new_key_type! {
    /// Key for a distinct geometry (shared by instances).
    pub struct GeometryKey;

    /// Key for a placed object (one per extracted entity).
    pub struct ObjectKey;
}

/// A distinct geometry with its precomputed LOD variants
#[derive(Debug, Clone)]
pub struct GeometryEntry {
    pub lods: LodSet,
}

impl GeometryEntry {
    pub fn content_hash(&self) -> u64 {
        self.lods.high().content_hash()
    }
}

/// One placed instance of a geometry
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub entity_id: u64,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub geometry: GeometryKey,
    pub transform: Matrix4<f32>,
    /// `None` when the placement is singular; such objects are drawn but
    /// cannot be picked
    pub inverse: Option<Matrix4<f32>>,
    pub world_bounds: Aabb,
    pub color: [f32; 3],
}

#[derive(Debug, Default)]
pub struct SceneIndex {
    geometries: SlotMap<GeometryKey, GeometryEntry>,
    objects: SlotMap<ObjectKey, SceneObject>,
    /// Objects in extraction order
    order: Vec<ObjectKey>,
    by_entity: FxHashMap<u64, ObjectKey>,
    bounds: Aabb,
}

impl SceneIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index extracted objects, building LOD variants for each distinct
    /// geometry in parallel
    pub fn build(objects: Vec<ExtractedObject>) -> Self {
        let mut distinct: Vec<Geometry> = Vec::new();
        let mut slot_of_hash: FxHashMap<u64, usize> = FxHashMap::default();
        let mut placed = Vec::with_capacity(objects.len());

        for object in objects {
            let hash = object.geometry.content_hash();
            let slot = *slot_of_hash.entry(hash).or_insert_with(|| {
                distinct.push(object.geometry.clone());
                distinct.len() - 1
            });
            placed.push((slot, object));
        }

        let lod_sets: Vec<LodSet> = distinct.into_par_iter().map(LodSet::build).collect();

        let mut geometries = SlotMap::with_capacity_and_key(lod_sets.len());
        let keys: Vec<GeometryKey> = lod_sets
            .into_iter()
            .map(|lods| geometries.insert(GeometryEntry { lods }))
            .collect();

        let mut scene = Self {
            geometries,
            objects: SlotMap::with_capacity_and_key(placed.len()),
            order: Vec::with_capacity(placed.len()),
            by_entity: FxHashMap::default(),
            bounds: Aabb::empty(),
        };

        for (slot, object) in placed {
            let geometry = object.geometry;
            let world_bounds = geometry.bounds().transformed(&object.transform);
            let inverse = object.transform.try_inverse();
            if inverse.is_none() {
                tracing::debug!(entity = object.entity_id, "singular placement, object not pickable");
            }
            scene.bounds = scene.bounds.union(&world_bounds);
            let key = scene.objects.insert(SceneObject {
                entity_id: object.entity_id,
                kind: object.kind,
                name: object.name,
                geometry: keys[slot],
                transform: object.transform,
                inverse,
                world_bounds,
                color: geometry.color(),
            });
            scene.order.push(key);
            scene.by_entity.insert(object.entity_id, key);
        }

        tracing::debug!(
            objects = scene.order.len(),
            geometries = scene.geometries.len(),
            "scene indexed"
        );
        scene
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn object_count(&self) -> usize {
        self.order.len()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Union of all world-space object bounds
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn object(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.objects.get(key)
    }

    pub fn geometry(&self, key: GeometryKey) -> Option<&GeometryEntry> {
        self.geometries.get(key)
    }

    /// Objects in extraction order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &SceneObject)> + '_ {
        self.order
            .iter()
            .filter_map(move |&key| self.objects.get(key).map(|object| (key, object)))
    }

    pub fn find_entity(&self, entity_id: u64) -> Option<ObjectKey> {
        self.by_entity.get(&entity_id).copied()
    }

    /// Full-resolution triangles over all instances
    pub fn triangle_count(&self) -> usize {
        self.objects()
            .filter_map(|(_, object)| self.geometries.get(object.geometry))
            .map(|entry| entry.lods.high().triangle_count())
            .sum()
    }

    /// Distinct geometries that carry their own variant for each level
    pub fn lod_variant_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for entry in self.geometries.values() {
            for level in entry.lods.levels() {
                counts[level.index()] += 1;
            }
        }
        counts
    }

    /// Geometry drawn for `object` at `level`, after fallback
    pub fn active_geometry(&self, object: &SceneObject, level: LodLevel) -> Option<(LodLevel, &Geometry)> {
        self.geometries
            .get(object.geometry)
            .map(|entry| entry.lods.select(level))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use stepview_geometry::{extrude_profile, Primitive, Profile2D};

    pub(crate) fn box_object(entity_id: u64, offset: Vector3<f32>) -> ExtractedObject {
        let profile = Profile2D::rectangle(1.0, 1.0).unwrap();
        let mesh = extrude_profile(&profile, 1.0, None, None).unwrap();
        ExtractedObject {
            entity_id,
            kind: EntityKind::Wall,
            name: Some(format!("Box {}", entity_id)),
            geometry: Geometry::new(entity_id, EntityKind::Wall, Primitive::Triangles, mesh, [0.8; 3]).unwrap(),
            transform: Matrix4::new_translation(&offset),
        }
    }

    #[test]
    fn test_identical_geometry_is_shared() {
        let scene = SceneIndex::build(vec![
            box_object(1, Vector3::zeros()),
            box_object(2, Vector3::new(5.0, 0.0, 0.0)),
            box_object(3, Vector3::new(10.0, 0.0, 0.0)),
        ]);
        assert_eq!(scene.object_count(), 3);
        assert_eq!(scene.geometry_count(), 1);
        assert_eq!(scene.triangle_count(), 36);

        let keys: Vec<_> = scene.objects().map(|(_, o)| o.geometry).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_world_bounds_and_lookup() {
        let scene = SceneIndex::build(vec![
            box_object(10, Vector3::zeros()),
            box_object(11, Vector3::new(5.0, 0.0, 0.0)),
        ]);
        let key = scene.find_entity(11).unwrap();
        let object = scene.object(key).unwrap();
        assert_eq!(object.world_bounds.min, Point3::new(4.5, -0.5, 0.0));
        assert_eq!(object.name.as_deref(), Some("Box 11"));
        assert_eq!(scene.bounds().max, Point3::new(5.5, 0.5, 1.0));
        assert!(scene.find_entity(99).is_none());
    }

    #[test]
    fn test_singular_transform_is_kept() {
        let mut object = box_object(1, Vector3::zeros());
        object.transform = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0));
        let scene = SceneIndex::build(vec![object]);
        let (_, placed) = scene.objects().next().unwrap();
        assert!(placed.inverse.is_none());
    }

    #[test]
    fn test_empty_scene() {
        let scene = SceneIndex::build(Vec::new());
        assert!(scene.is_empty());
        assert!(scene.bounds().is_empty());
        assert_eq!(scene.lod_variant_counts(), [0; 4]);
    }
}
