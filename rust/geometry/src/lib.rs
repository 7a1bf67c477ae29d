// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! StepView Geometry
//!
//! Turns a resolved IFC entity graph into immutable, hashed triangle and
//! line meshes using earcutr triangulation and nalgebra transforms.
//!
//! ```rust,ignore
//! use stepview_geometry::{extract, CancelToken, ExtractorConfig, Progress};
//!
//! let out = extract(&resolved, &ExtractorConfig::default(), &CancelToken::new(), &Progress::new())?;
//! println!("{} objects, {} skipped", out.summary.extracted, out.summary.skipped_unsupported);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialize support for [`ExtractionSummary`]

pub mod bounds;
pub mod error;
pub mod extractor;
pub mod extrusion;
pub mod mesh;
pub mod placement;
pub mod processors;
pub mod profile;
pub mod router;
pub mod task;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector3};

pub use bounds::Aabb;
pub use error::{Error, Result};
pub use extractor::{
    extract, ExtractedObject, Extraction, ExtractionRule, ExtractionSummary, Extractor,
    ExtractorConfig, Strategy, DEFAULT_BATCH_SIZE, DEFAULT_COLOR,
};
pub use extrusion::extrude_profile;
pub use mesh::{Geometry, MeshBuilder, Primitive};
pub use profile::Profile2D;
pub use router::{GeometryProcessor, GeometryRouter};
pub use task::{CancelToken, LoadStage, Progress};
pub use triangulation::{triangulate_polygon, triangulate_polygon_with_holes};
