// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Processors
//!
//! One module per family of representation items:
//!
//! - `extrusion`: ExtrudedAreaSolid (extruded profiles, the common case)
//! - `tessellated`: TriangulatedFaceSet (pre-tessellated meshes)
//! - `brep`: FacetedBrep, ShellBasedSurfaceModel and loose face bounds
//! - `curve`: Polyline and IndexedPolyCurve as line strips

mod brep;
mod curve;
mod extrusion;
mod tessellated;

pub use brep::FacetedBrepProcessor;
pub use curve::CurveProcessor;
pub use extrusion::ExtrudedAreaSolidProcessor;
pub use tessellated::TriangulatedFaceSetProcessor;

#[cfg(test)]
pub(crate) fn test_graph(data: &str) -> stepview_core::ResolvedGraph {
    let content = format!("ISO-10303-21;\nDATA;\n{}\nENDSEC;\n", data);
    stepview_core::ResolvedGraph::resolve(stepview_core::EntityGraph::parse(&content).unwrap())
}
