// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The viewer session: model lifecycle, camera, selection, visibility and
//! measurement around one render backend.
//!
//! ```text
//! Idle ──load──▶ Loading ──ok──▶ Loaded ◀──pause── Rendering
//!                   │                └────frame────▶
//!                   └──not STEP──▶ LoadFailed
//! ```
//!
//! `load` is accepted in every state and cancels the load in flight. The
//! current scene keeps rendering until a new one has been fully indexed.
//! A load that is cancelled or whose task vanishes returns the viewer to
//! the state it had before loading.

use std::sync::Arc;

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use serde::Serialize;
use stepview_core::{EntityKind, EntityQuery, ResolvedGraph, SpatialTree};
use stepview_geometry::Progress;

use crate::camera::{Camera, CameraInput};
use crate::clipping::{ClippingPlanes, SectionBox};
use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::loader::{load_model, LoadHandle, LoadReport, LoadedModel};
use crate::measurement::MeasurementSession;
use crate::picking::{pick, PickHit};
use crate::render::{render_frame, FrameContext, FrameMetrics, FrameStats, RenderBackend};
use crate::scene::{ObjectKey, SceneIndex};
use crate::stats::ModelStats;
use crate::visibility::VisibilityFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerState {
    Idle,
    Loading,
    Loaded,
    Rendering,
    LoadFailed,
}

pub struct Viewer<B: RenderBackend> {
    config: ViewerConfig,
    backend: B,
    state: ViewerState,
    /// State to return to when a load ends without a verdict on the file
    resume_state: ViewerState,
    scene: Arc<SceneIndex>,
    graph: Arc<ResolvedGraph>,
    spatial: Arc<SpatialTree>,
    report: Option<LoadReport>,
    last_error: Option<String>,
    pending: Option<LoadHandle>,
    camera: Camera,
    filter: VisibilityFilter,
    selection: FxHashSet<ObjectKey>,
    measurement: MeasurementSession,
    measuring: bool,
    metrics: FrameMetrics,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(backend: B, config: ViewerConfig) -> Self {
        let camera = Camera::new(config.viewport);
        Self {
            config,
            backend,
            state: ViewerState::Idle,
            resume_state: ViewerState::Idle,
            scene: Arc::new(SceneIndex::empty()),
            graph: Arc::new(ResolvedGraph::default()),
            spatial: Arc::new(SpatialTree::default()),
            report: None,
            last_error: None,
            pending: None,
            camera,
            filter: VisibilityFilter::new(),
            selection: FxHashSet::default(),
            measurement: MeasurementSession::new(),
            measuring: false,
            metrics: FrameMetrics::default(),
        }
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn scene(&self) -> &Arc<SceneIndex> {
        &self.scene
    }

    pub fn spatial(&self) -> &SpatialTree {
        &self.spatial
    }

    /// Resolved entities of the current model
    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// Start a query over the current model's entities
    pub fn query(&self) -> EntityQuery<'_> {
        EntityQuery::new(&self.graph)
    }

    /// Scene objects drawn for the entities matching `query`
    pub fn objects_matching(&self, query: &EntityQuery<'_>) -> Vec<ObjectKey> {
        query
            .ids()
            .into_iter()
            .filter_map(|id| self.scene.find_entity(id))
            .collect()
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    /// Message of the last failed load
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    /// Progress of the load in flight
    pub fn load_progress(&self) -> Option<&Progress> {
        self.pending.as_ref().map(LoadHandle::progress)
    }

    /// Start loading a file in the background, replacing any load in flight
    pub fn load(&mut self, bytes: impl Into<Arc<[u8]>>) {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
            tracing::debug!("previous load superseded");
        }
        self.pending = Some(LoadHandle::spawn(bytes.into(), self.config.clone()));
        self.begin_loading();
    }

    fn begin_loading(&mut self) {
        if self.state != ViewerState::Loading {
            self.resume_state = self.state;
        }
        self.state = ViewerState::Loading;
    }

    /// Load on the calling thread and swap the result in
    pub fn load_blocking(&mut self, bytes: &[u8]) -> Result<&LoadReport> {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }
        self.begin_loading();
        let result = load_model(bytes, &self.config, &Default::default(), &Progress::new());
        self.finish_load(result)?;
        self.report.as_ref().ok_or(Error::LoaderDisconnected)
    }

    /// Check the load in flight without blocking. Returns `None` while
    /// nothing finished, otherwise the outcome of the finished load.
    pub fn poll_load(&mut self) -> Option<Result<()>> {
        let result = self.pending.as_ref()?.try_recv()?;
        self.pending = None;
        Some(self.finish_load(result))
    }

    /// Block until the load in flight finishes
    pub fn wait_for_load(&mut self) -> Option<Result<()>> {
        let handle = self.pending.take()?;
        Some(self.finish_load(handle.wait()))
    }

    fn finish_load(&mut self, result: Result<LoadedModel>) -> Result<()> {
        match result {
            Ok(model) => {
                self.swap_scene(model);
                Ok(())
            }
            Err(err) if err.is_load_failure() => {
                tracing::warn!(error = %err, "load failed");
                self.last_error = Some(err.to_string());
                self.state = ViewerState::LoadFailed;
                Err(err)
            }
            Err(err) => {
                tracing::debug!(error = %err, state = ?self.resume_state, "load abandoned");
                self.state = self.resume_state;
                Err(err)
            }
        }
    }

    fn swap_scene(&mut self, model: LoadedModel) {
        self.scene = model.scene;
        self.graph = model.graph;
        self.spatial = model.spatial;
        self.report = Some(model.report);
        self.last_error = None;
        // Keys of the previous scene mean nothing in the new one
        self.selection.clear();
        self.filter.show_all();
        self.camera.fit_to(self.scene.bounds());
        self.state = ViewerState::Loaded;
    }

    /// Apply camera input and render one frame. Finished background loads
    /// are swapped in first.
    pub fn frame(&mut self, inputs: &[CameraInput]) -> FrameStats {
        if let Some(Err(err)) = self.poll_load() {
            tracing::debug!(error = %err, "load finished with an error");
        }
        for input in inputs {
            self.camera.apply(*input);
        }

        let ctx = FrameContext {
            scene: &self.scene,
            camera: &self.camera,
            thresholds: &self.config.lod,
            filter: &self.filter,
            selection: &self.selection,
            highlight: self.config.highlight_color,
        };
        let stats = render_frame(&mut self.backend, &ctx);
        self.metrics.record(&stats);
        if self.state == ViewerState::Loaded {
            self.state = ViewerState::Rendering;
        }
        stats
    }

    /// Stop rendering; the model stays loaded
    pub fn pause(&mut self) {
        if self.state == ViewerState::Rendering {
            self.state = ViewerState::Loaded;
        }
    }

    pub fn fit_camera(&mut self) {
        self.camera.fit_to(self.scene.bounds());
    }

    /// Object under a viewport pixel
    pub fn pick(&self, screen: Point2<f32>) -> Option<PickHit> {
        pick(&self.scene, &self.camera, screen, &self.config.lod, &self.filter)
    }

    pub fn select(&mut self, object: ObjectKey) {
        if self.scene.object(object).is_some() {
            self.selection.insert(object);
        }
    }

    /// Flip the selection of `object`; returns whether it is now selected
    pub fn toggle_selection(&mut self, object: ObjectKey) -> bool {
        if self.selection.remove(&object) {
            return false;
        }
        self.select(object);
        self.selection.contains(&object)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &FxHashSet<ObjectKey> {
        &self.selection
    }

    /// Pick and make the hit object the only selection
    pub fn select_at(&mut self, screen: Point2<f32>) -> Option<PickHit> {
        let hit = self.pick(screen);
        self.selection.clear();
        if let Some(hit) = &hit {
            self.selection.insert(hit.object);
        }
        hit
    }

    pub fn hide_entity(&mut self, entity_id: u64) {
        self.filter.hide_entity(entity_id);
    }

    pub fn show_entity(&mut self, entity_id: u64) {
        self.filter.show_entity(entity_id);
    }

    pub fn hide_kind(&mut self, kind: EntityKind) {
        self.filter.hide_kind(kind);
    }

    pub fn show_kind(&mut self, kind: &EntityKind) {
        self.filter.show_kind(kind);
    }

    /// Hide a spatial structure node (storey, building, ...) and its contents
    pub fn hide_subtree(&mut self, node: u64) -> usize {
        self.filter.hide_subtree(&self.spatial, node)
    }

    pub fn show_subtree(&mut self, node: u64) {
        self.filter.show_subtree(node);
    }

    pub fn show_all(&mut self) {
        self.filter.show_all();
    }

    pub fn clipping(&self) -> &ClippingPlanes {
        self.filter.clipping()
    }

    pub fn clipping_mut(&mut self) -> &mut ClippingPlanes {
        self.filter.clipping_mut()
    }

    pub fn set_section_box(&mut self, section: &SectionBox) {
        self.filter.set_section_box(section);
    }

    pub fn clear_clipping(&mut self) {
        self.filter.clear_clipping();
    }

    /// Entering or leaving measure mode starts a new session
    pub fn set_measuring(&mut self, enabled: bool) {
        if enabled != self.measuring {
            self.measurement.reset();
        }
        self.measuring = enabled;
    }

    pub fn is_measuring(&self) -> bool {
        self.measuring
    }

    /// Pick and, while measuring, add the hit as a measurement point
    pub fn measure_at(&mut self, screen: Point2<f32>) -> Option<PickHit> {
        let hit = self.pick(screen)?;
        if self.measuring {
            self.measurement.add_point(&hit);
        }
        Some(hit)
    }

    pub fn measurement(&self) -> &MeasurementSession {
        &self.measurement
    }

    pub fn measurement_mut(&mut self) -> &mut MeasurementSession {
        &mut self.measurement
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats::new(self.report.as_ref(), &self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;

    const ONE_WALL: &str = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCDIRECTION((0.,0.,1.));
#3=IFCDIRECTION((1.,0.,0.));
#4=IFCAXIS2PLACEMENT3D(#1,#2,#3);
#5=IFCGEOMETRICREPRESENTATIONCONTEXT($,'Model',3,1.E-05,#4,$);
#6=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,4.,0.2);
#7=IFCEXTRUDEDAREASOLID(#6,#4,#2,3.);
#8=IFCSHAPEREPRESENTATION(#5,'Body','SweptSolid',(#7));
#9=IFCPRODUCTDEFINITIONSHAPE($,$,(#8));
#10=IFCLOCALPLACEMENT($,#4);
#11=IFCWALL('a',$,'A',$,$,#10,#9,$);
ENDSEC;
END-ISO-10303-21;
";

    fn viewer() -> Viewer<HeadlessBackend> {
        Viewer::new(HeadlessBackend::new(), ViewerConfig::default())
    }

    #[test]
    fn test_loaded_and_rendering_alternate() {
        let mut viewer = viewer();
        assert_eq!(viewer.state(), ViewerState::Idle);
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        assert_eq!(viewer.state(), ViewerState::Loaded);
        let stats = viewer.frame(&[]);
        assert_eq!(viewer.state(), ViewerState::Rendering);
        assert_eq!(stats.visible, 1);
        viewer.pause();
        assert_eq!(viewer.state(), ViewerState::Loaded);
    }

    #[test]
    fn test_failed_load_keeps_previous_scene() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        assert!(viewer.load_blocking(b"not a step file").is_err());
        assert_eq!(viewer.state(), ViewerState::LoadFailed);
        assert!(viewer.last_error().is_some());
        assert_eq!(viewer.scene().object_count(), 1);
    }

    #[test]
    fn test_selection_is_cleared_on_swap() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        let key = viewer.scene().find_entity(11).unwrap();
        assert!(viewer.toggle_selection(key));
        assert!(!viewer.toggle_selection(key));
        viewer.select(key);
        assert_eq!(viewer.selection().len(), 1);

        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        assert!(viewer.selection().is_empty());
    }

    #[test]
    fn test_abandoned_load_keeps_loaded_model() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        assert_eq!(viewer.state(), ViewerState::Loaded);

        for err in [Error::Cancelled, Error::LoaderDisconnected] {
            viewer.begin_loading();
            assert_eq!(viewer.state(), ViewerState::Loading);
            assert!(viewer.finish_load(Err(err)).is_err());
            assert_eq!(viewer.state(), ViewerState::Loaded);
            assert!(viewer.last_error().is_none());
            assert_eq!(viewer.scene().object_count(), 1);
        }

        // A rendering viewer goes back to rendering
        viewer.frame(&[]);
        viewer.load(ONE_WALL.as_bytes().to_vec());
        let handle = viewer.pending.take().unwrap();
        handle.cancel();
        assert!(viewer.finish_load(Err(Error::Cancelled)).is_err());
        assert_eq!(viewer.state(), ViewerState::Rendering);
    }

    #[test]
    fn test_measure_mode_starts_fresh_sessions() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        let (w, h) = viewer.camera().viewport();
        let center = Point2::new(w as f32 / 2.0, h as f32 / 2.0);

        viewer.measure_at(center).unwrap();
        assert!(viewer.measurement().is_empty());

        viewer.set_measuring(true);
        viewer.measure_at(center).unwrap();
        viewer.measure_at(center).unwrap();
        assert_eq!(viewer.measurement().len(), 2);
        // Staying in the mode keeps the session
        viewer.set_measuring(true);
        assert_eq!(viewer.measurement().len(), 2);

        viewer.set_measuring(false);
        assert!(viewer.measurement().is_empty());
        viewer.set_measuring(true);
        assert!(viewer.measurement().is_empty());
        viewer.measure_at(center).unwrap();
        assert_eq!(viewer.measurement().len(), 1);
    }

    #[test]
    fn test_query_finds_scene_objects() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        let query = viewer.query().kind(EntityKind::Wall).name_equals("A");
        let keys = viewer.objects_matching(&query);
        assert_eq!(keys, vec![viewer.scene().find_entity(11).unwrap()]);
        assert!(viewer.query().global_id("missing").first().is_none());
    }

    #[test]
    fn test_section_box_clips_frames_and_picks() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        let (w, h) = viewer.camera().viewport();
        let center = Point2::new(w as f32 / 2.0, h as f32 / 2.0);

        let far_away = stepview_geometry::Aabb::new(
            nalgebra::Point3::new(100.0, 100.0, 100.0),
            nalgebra::Point3::new(110.0, 110.0, 110.0),
        );
        viewer.set_section_box(&SectionBox::new(far_away));
        let stats = viewer.frame(&[]);
        assert_eq!(stats.clipped, 1);
        assert_eq!(stats.visible, 0);
        assert!(viewer.pick(center).is_none());

        viewer.clear_clipping();
        assert_eq!(viewer.frame(&[]).visible, 1);
        assert!(viewer.pick(center).is_some());
    }

    #[test]
    fn test_center_pick_after_fit() {
        let mut viewer = viewer();
        viewer.load_blocking(ONE_WALL.as_bytes()).unwrap();
        let (w, h) = viewer.camera().viewport();
        let hit = viewer.select_at(Point2::new(w as f32 / 2.0, h as f32 / 2.0)).unwrap();
        assert_eq!(hit.entity_id, 11);
        assert_eq!(viewer.selection().len(), 1);
    }
}
