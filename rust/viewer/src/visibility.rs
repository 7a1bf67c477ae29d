// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-frame visibility: user hiding, clipping, frustum culling, LOD
//! selection and grouping into instanced batches.

use nalgebra::{Matrix4, Point3};
use rustc_hash::{FxHashMap, FxHashSet};
use stepview_core::{EntityKind, SpatialTree};

use crate::clipping::{ClippingPlanes, SectionBox};
use crate::frustum::Frustum;
use crate::lod::{LodLevel, LodThresholds};
use crate::scene::{GeometryKey, ObjectKey, SceneIndex, SceneObject};

/// Objects the user chose not to see
#[derive(Debug, Clone, Default)]
pub struct VisibilityFilter {
    objects: FxHashSet<u64>,
    kinds: FxHashSet<EntityKind>,
    /// Spatial node id to the elements it contained when hidden
    subtrees: FxHashMap<u64, FxHashSet<u64>>,
    clipping: ClippingPlanes,
}

impl VisibilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hide_entity(&mut self, entity_id: u64) {
        self.objects.insert(entity_id);
    }

    pub fn show_entity(&mut self, entity_id: u64) {
        self.objects.remove(&entity_id);
    }

    pub fn hide_kind(&mut self, kind: EntityKind) {
        self.kinds.insert(kind);
    }

    pub fn show_kind(&mut self, kind: &EntityKind) {
        self.kinds.remove(kind);
    }

    /// Hide everything contained in spatial node `node` and its children.
    /// Returns the number of elements affected.
    pub fn hide_subtree(&mut self, tree: &SpatialTree, node: u64) -> usize {
        let elements: FxHashSet<u64> = tree.elements_under(node).into_iter().collect();
        let count = elements.len();
        self.subtrees.insert(node, elements);
        count
    }

    pub fn show_subtree(&mut self, node: u64) {
        self.subtrees.remove(&node);
    }

    /// Undo every hide toggle. Clipping planes stay.
    pub fn show_all(&mut self) {
        self.objects.clear();
        self.kinds.clear();
        self.subtrees.clear();
    }

    pub fn clipping(&self) -> &ClippingPlanes {
        &self.clipping
    }

    pub fn clipping_mut(&mut self) -> &mut ClippingPlanes {
        &mut self.clipping
    }

    pub fn set_clipping(&mut self, planes: ClippingPlanes) {
        self.clipping = planes;
    }

    /// Replace the clipping planes with the six faces of `section`
    pub fn set_section_box(&mut self, section: &SectionBox) {
        self.clipping = section.to_planes();
    }

    pub fn clear_clipping(&mut self) {
        self.clipping.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.kinds.is_empty()
            && self.subtrees.is_empty()
            && !self.clipping.is_active()
    }

    pub fn is_hidden(&self, object: &SceneObject) -> bool {
        self.objects.contains(&object.entity_id)
            || self.kinds.contains(&object.kind)
            || self
                .subtrees
                .values()
                .any(|elements| elements.contains(&object.entity_id))
    }
}

/// One object in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub object: ObjectKey,
    pub transform: Matrix4<f32>,
    pub color: [f32; 3],
}

/// Visible objects sharing one geometry variant, drawn with one call
#[derive(Debug, Clone)]
pub struct Batch {
    pub geometry: GeometryKey,
    pub level: LodLevel,
    pub content_hash: u64,
    pub instances: Vec<Instance>,
}

/// Output of [`collect_batches`]
#[derive(Debug, Clone, Default)]
pub struct VisibleSet {
    /// Batches in the order their first instance was met
    pub batches: Vec<Batch>,
    /// Visible objects per drawn level (after fallback)
    pub lod_counts: [usize; 4],
    pub visible: usize,
    pub culled: usize,
    pub hidden: usize,
    /// Entirely on the clipped side of a clipping plane
    pub clipped: usize,
}

impl VisibleSet {
    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }
}

/// Level requested for `object` seen from `eye`
#[inline]
pub fn requested_level(object: &SceneObject, eye: &Point3<f32>, thresholds: &LodThresholds) -> LodLevel {
    thresholds.select(object.world_bounds.distance_to(eye))
}

/// Cull, pick levels and group the scene into batches
pub fn collect_batches(
    scene: &SceneIndex,
    frustum: &Frustum,
    eye: &Point3<f32>,
    thresholds: &LodThresholds,
    filter: &VisibilityFilter,
) -> VisibleSet {
    let mut out = VisibleSet::default();
    let mut batch_of_hash: FxHashMap<u64, usize> = FxHashMap::default();

    for (key, object) in scene.objects() {
        if filter.is_hidden(object) {
            out.hidden += 1;
            continue;
        }
        if filter.clipping().clips_aabb(&object.world_bounds) {
            out.clipped += 1;
            continue;
        }
        if !frustum.intersects_aabb(&object.world_bounds) {
            out.culled += 1;
            continue;
        }
        let requested = requested_level(object, eye, thresholds);
        let Some((level, geometry)) = scene.active_geometry(object, requested) else {
            continue;
        };
        out.visible += 1;
        out.lod_counts[level.index()] += 1;

        let hash = geometry.content_hash();
        let index = *batch_of_hash.entry(hash).or_insert_with(|| {
            out.batches.push(Batch {
                geometry: object.geometry,
                level,
                content_hash: hash,
                instances: Vec::new(),
            });
            out.batches.len() - 1
        });
        out.batches[index].instances.push(Instance {
            object: key,
            transform: object.transform,
            color: object.color,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::clipping::ClippingPlane;
    use crate::scene::tests::box_object;
    use nalgebra::Vector3;

    fn scene() -> SceneIndex {
        SceneIndex::build(vec![
            box_object(1, Vector3::new(0.0, 5.0, 0.0)),
            box_object(2, Vector3::new(2.0, 5.0, 0.0)),
            box_object(3, Vector3::new(0.0, -20.0, 0.0)),
        ])
    }

    fn view() -> (Frustum, Point3<f32>) {
        let camera = Camera::looking_at(Point3::new(0.0, 0.0, 0.5), Point3::new(0.0, 10.0, 0.5), (800, 800));
        (Frustum::from_view_projection(&camera.view_projection()), camera.eye())
    }

    #[test]
    fn test_identical_visible_objects_share_a_batch() {
        let scene = scene();
        let (frustum, eye) = view();
        let set = collect_batches(&scene, &frustum, &eye, &LodThresholds::default(), &VisibilityFilter::new());
        assert_eq!(set.visible, 2);
        assert_eq!(set.culled, 1);
        assert_eq!(set.batches.len(), 1);
        assert_eq!(set.instance_count(), 2);
        assert_eq!(set.lod_counts[LodLevel::High.index()], 2);
    }

    #[test]
    fn test_hidden_objects_are_counted_separately() {
        let scene = scene();
        let (frustum, eye) = view();
        let mut filter = VisibilityFilter::new();
        filter.hide_entity(1);
        let set = collect_batches(&scene, &frustum, &eye, &LodThresholds::default(), &filter);
        assert_eq!((set.visible, set.culled, set.hidden), (1, 1, 1));

        filter.show_entity(1);
        filter.hide_kind(EntityKind::Wall);
        let set = collect_batches(&scene, &frustum, &eye, &LodThresholds::default(), &filter);
        assert_eq!(set.hidden, 3);
        assert!(set.batches.is_empty());

        filter.show_all();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_clipped_objects_are_not_drawn() {
        let scene = scene();
        let (frustum, eye) = view();
        let mut filter = VisibilityFilter::new();
        // Keep x > 1: box 1 spans [-0.5, 0.5], box 2 spans [1.5, 2.5]
        filter.clipping_mut().add(ClippingPlane::vertical_x(1.0));
        assert!(!filter.is_empty());
        let set = collect_batches(&scene, &frustum, &eye, &LodThresholds::default(), &filter);
        assert_eq!(set.clipped, 2);
        assert_eq!(set.visible, 1);
        assert_eq!(set.instance_count(), 1);

        // A straddling box stays
        filter.set_clipping(ClippingPlanes::new());
        filter.clipping_mut().add(ClippingPlane::vertical_x(0.0));
        let set = collect_batches(&scene, &frustum, &eye, &LodThresholds::default(), &filter);
        assert_eq!(set.visible, 2);

        filter.show_all();
        assert_eq!(filter.clipping().len(), 1);
        filter.clear_clipping();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_far_objects_use_coarser_levels() {
        let scene = scene();
        let (frustum, eye) = view();
        let near = LodThresholds::new(0.5, 1.0, 2.0).unwrap();
        let set = collect_batches(&scene, &frustum, &eye, &near, &VisibilityFilter::new());
        assert_eq!(set.visible, 2);
        // Both visible boxes are beyond 2 m
        assert_eq!(set.lod_counts[LodLevel::Minimal.index()], 2);
        assert_eq!(set.batches[0].level, LodLevel::Minimal);
    }
}
