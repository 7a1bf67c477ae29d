// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! StepView Viewer
//!
//! Interactive side of the pipeline: a scene index over extracted
//! geometry, distance-based LOD, frustum culling with instanced batches,
//! clipping planes, ray picking and measurement, driven by a [`Viewer`]
//! state machine that loads models in the background.
//!
//! ```rust,ignore
//! use stepview_viewer::{HeadlessBackend, Viewer, ViewerConfig};
//!
//! let mut viewer = Viewer::new(HeadlessBackend::new(), ViewerConfig::from_env());
//! viewer.load(std::fs::read("model.ifc")?);
//! loop {
//!     let stats = viewer.frame(&[]);
//!     // ...
//! }
//! ```

pub mod camera;
pub mod clipping;
pub mod config;
pub mod error;
pub mod frustum;
pub mod loader;
pub mod lod;
pub mod measurement;
pub mod picking;
pub mod render;
pub mod scene;
pub mod stats;
pub mod viewer;
pub mod visibility;

pub use camera::{Camera, CameraInput};
pub use clipping::{ClippingPlane, ClippingPlanes, SectionBox};
pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use frustum::{Frustum, Plane};
pub use loader::{load_model, LoadHandle, LoadReport, LoadedModel};
pub use lod::{LodLevel, LodSet, LodThresholds};
pub use measurement::{format_distance, MeasuredPoint, MeasurementSession};
pub use picking::{intersect_triangle, pick, pick_ray, PickHit, Ray};
pub use render::{
    render_frame, DrawCall, FrameContext, FrameMetrics, FrameStats, HeadlessBackend,
    RenderBackend, RenderError,
};
pub use scene::{GeometryEntry, GeometryKey, ObjectKey, SceneIndex, SceneObject};
pub use stats::{LodCounts, ModelStats};
pub use viewer::{Viewer, ViewerState};
pub use visibility::{collect_batches, Batch, Instance, VisibilityFilter, VisibleSet};

// Re-export the pipeline crates
pub use stepview_core as core;
pub use stepview_geometry as geometry;
