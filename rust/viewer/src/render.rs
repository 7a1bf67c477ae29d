// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Render loop
//!
//! [`render_frame`] runs one frame against a [`RenderBackend`]: LOD
//! selection, culling and batching, then one instance upload and one draw
//! call per batch. A batch the backend rejects is logged and skipped; the
//! frame always completes and reports [`FrameStats`].

use std::time::Instant;

use nalgebra::Matrix4;
use rustc_hash::FxHashSet;
use serde::Serialize;
use stepview_geometry::Geometry;

use crate::camera::Camera;
use crate::frustum::Frustum;
use crate::lod::{LodLevel, LodThresholds};
use crate::scene::{ObjectKey, SceneIndex};
use crate::visibility::{collect_batches, Instance, VisibilityFilter};

/// Errors reported by a backend for one batch or frame
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("out of GPU memory uploading {requested} instances")]
    OutOfMemory { requested: usize },

    #[error("draw failed: {0}")]
    Draw(String),

    #[error("no frame in progress")]
    NoFrame,
}

/// Seam to the graphics device
pub trait RenderBackend {
    fn begin_frame(&mut self, view_projection: &Matrix4<f32>) -> Result<(), RenderError>;

    /// Upload the per-instance data of the next draw
    fn upload_instances(&mut self, instances: &[Instance]) -> Result<(), RenderError>;

    /// Draw `geometry` once per uploaded instance
    fn draw(&mut self, geometry: &Geometry, instance_count: usize) -> Result<(), RenderError>;

    fn end_frame(&mut self) -> Result<(), RenderError>;
}

/// Recorded draw call of [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub content_hash: u64,
    pub instances: usize,
    pub triangles: usize,
    /// Colors of the uploaded instances, in upload order
    pub colors: Vec<[f32; 3]>,
}

/// Backend without a device: records calls and can simulate exhaustion
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    /// Largest instance upload accepted; `None` is unlimited
    pub instance_capacity: Option<usize>,
    /// Fail every draw of geometry with this content hash
    pub fail_hash: Option<u64>,
    in_frame: bool,
    pending: Vec<[f32; 3]>,
    frame_calls: Vec<DrawCall>,
    frames: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance_capacity(capacity: usize) -> Self {
        Self {
            instance_capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Draw calls of the current or last completed frame
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.frame_calls
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl RenderBackend for HeadlessBackend {
    fn begin_frame(&mut self, _view_projection: &Matrix4<f32>) -> Result<(), RenderError> {
        self.in_frame = true;
        self.frame_calls.clear();
        Ok(())
    }

    fn upload_instances(&mut self, instances: &[Instance]) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        if let Some(capacity) = self.instance_capacity {
            if instances.len() > capacity {
                self.pending.clear();
                return Err(RenderError::OutOfMemory {
                    requested: instances.len(),
                });
            }
        }
        self.pending = instances.iter().map(|i| i.color).collect();
        Ok(())
    }

    fn draw(&mut self, geometry: &Geometry, instance_count: usize) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        if self.fail_hash == Some(geometry.content_hash()) {
            return Err(RenderError::Draw(format!("geometry {:016x}", geometry.content_hash())));
        }
        self.frame_calls.push(DrawCall {
            content_hash: geometry.content_hash(),
            instances: instance_count,
            triangles: geometry.triangle_count() * instance_count,
            colors: std::mem::take(&mut self.pending),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        self.in_frame = false;
        self.frames += 1;
        Ok(())
    }
}

/// Counters of one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameStats {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub minimal: usize,
    pub visible: usize,
    pub culled: usize,
    pub hidden: usize,
    pub clipped: usize,
    pub batches: usize,
    pub draw_calls: usize,
    pub failed_batches: usize,
    pub triangles: usize,
    pub frame_ms: f64,
}

impl FrameStats {
    pub fn lod_count(&self, level: LodLevel) -> usize {
        match level {
            LodLevel::High => self.high,
            LodLevel::Medium => self.medium,
            LodLevel::Low => self.low,
            LodLevel::Minimal => self.minimal,
        }
    }
}

/// Inputs of one frame besides the backend
pub struct FrameContext<'a> {
    pub scene: &'a SceneIndex,
    pub camera: &'a Camera,
    pub thresholds: &'a LodThresholds,
    pub filter: &'a VisibilityFilter,
    pub selection: &'a FxHashSet<ObjectKey>,
    pub highlight: [f32; 3],
}

/// Render one frame. Backend failures never abort the frame.
pub fn render_frame<B: RenderBackend>(backend: &mut B, ctx: &FrameContext<'_>) -> FrameStats {
    let start = Instant::now();
    let view_projection = ctx.camera.view_projection();
    let frustum = Frustum::from_view_projection(&view_projection);
    let eye = ctx.camera.eye();
    let mut visible = collect_batches(ctx.scene, &frustum, &eye, ctx.thresholds, ctx.filter);

    let mut stats = FrameStats {
        high: visible.lod_counts[LodLevel::High.index()],
        medium: visible.lod_counts[LodLevel::Medium.index()],
        low: visible.lod_counts[LodLevel::Low.index()],
        minimal: visible.lod_counts[LodLevel::Minimal.index()],
        visible: visible.visible,
        culled: visible.culled,
        hidden: visible.hidden,
        clipped: visible.clipped,
        batches: visible.batches.len(),
        ..FrameStats::default()
    };

    if let Err(err) = backend.begin_frame(&view_projection) {
        tracing::warn!(error = %err, "frame skipped");
        stats.failed_batches = stats.batches;
        stats.frame_ms = start.elapsed().as_secs_f64() * 1000.0;
        return stats;
    }

    for batch in &mut visible.batches {
        let Some(geometry) = ctx
            .scene
            .geometry(batch.geometry)
            .and_then(|entry| entry.lods.get(batch.level))
        else {
            stats.failed_batches += 1;
            continue;
        };
        if !ctx.selection.is_empty() {
            for instance in &mut batch.instances {
                if ctx.selection.contains(&instance.object) {
                    instance.color = ctx.highlight;
                }
            }
        }
        let drawn = backend
            .upload_instances(&batch.instances)
            .and_then(|()| backend.draw(geometry, batch.instances.len()));
        match drawn {
            Ok(()) => {
                stats.draw_calls += 1;
                stats.triangles += geometry.triangle_count() * batch.instances.len();
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    hash = batch.content_hash,
                    instances = batch.instances.len(),
                    "batch skipped"
                );
                stats.failed_batches += 1;
            }
        }
    }

    if let Err(err) = backend.end_frame() {
        tracing::warn!(error = %err, "end of frame failed");
    }
    stats.frame_ms = start.elapsed().as_secs_f64() * 1000.0;
    stats
}

/// Running frame-time aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub frames: u64,
    pub mean_frame_ms: f64,
    pub max_frame_ms: f64,
    pub last: FrameStats,
}

impl FrameMetrics {
    pub fn record(&mut self, stats: &FrameStats) {
        self.frames += 1;
        self.mean_frame_ms += (stats.frame_ms - self.mean_frame_ms) / self.frames as f64;
        self.max_frame_ms = self.max_frame_ms.max(stats.frame_ms);
        self.last = *stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::box_object;
    use nalgebra::{Point3, Vector3};

    fn scene() -> SceneIndex {
        SceneIndex::build(vec![
            box_object(1, Vector3::new(0.0, 5.0, 0.0)),
            box_object(2, Vector3::new(2.0, 5.0, 0.0)),
            box_object(3, Vector3::new(0.0, -20.0, 0.0)),
        ])
    }

    fn camera() -> Camera {
        Camera::looking_at(Point3::new(0.0, 0.0, 0.5), Point3::new(0.0, 10.0, 0.5), (800, 800))
    }

    fn render(backend: &mut HeadlessBackend, scene: &SceneIndex, selection: &FxHashSet<ObjectKey>) -> FrameStats {
        let camera = camera();
        let ctx = FrameContext {
            scene,
            camera: &camera,
            thresholds: &LodThresholds::default(),
            filter: &VisibilityFilter::new(),
            selection,
            highlight: [1.0, 0.0, 0.0],
        };
        render_frame(backend, &ctx)
    }

    #[test]
    fn test_one_draw_call_per_batch() {
        let scene = scene();
        let mut backend = HeadlessBackend::new();
        let stats = render(&mut backend, &scene, &FxHashSet::default());
        assert_eq!(stats.visible, 2);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.triangles, 24);
        assert_eq!(stats.high, 2);
        assert_eq!(backend.draw_calls()[0].instances, 2);
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn test_failing_batch_is_skipped() {
        let scene = scene();
        let mut backend = HeadlessBackend::with_instance_capacity(1);
        let stats = render(&mut backend, &scene, &FxHashSet::default());
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn test_selected_objects_are_highlighted() {
        let scene = scene();
        let mut selection = FxHashSet::default();
        selection.insert(scene.find_entity(2).unwrap());
        let mut backend = HeadlessBackend::new();
        render(&mut backend, &scene, &selection);
        let colors = &backend.draw_calls()[0].colors;
        assert_eq!(colors[0], [0.8; 3]);
        assert_eq!(colors[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_metrics_track_mean_and_max() {
        let mut metrics = FrameMetrics::default();
        for ms in [2.0, 4.0, 6.0] {
            metrics.record(&FrameStats {
                frame_ms: ms,
                ..FrameStats::default()
            });
        }
        assert_eq!(metrics.frames, 3);
        assert!((metrics.mean_frame_ms - 4.0).abs() < 1e-9);
        assert_eq!(metrics.max_frame_ms, 6.0);
    }
}
