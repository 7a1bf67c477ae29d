// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polylines as line strips

use nalgebra::Vector3;
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph};

use crate::error::{Error, Result};
use crate::mesh::{MeshBuilder, Primitive};
use crate::profile::curve_points;
use crate::router::GeometryProcessor;

/// Handles IfcPolyline and IfcIndexedPolyCurve. Each segment is stored as
/// the degenerate triangle `(a, b, b)`.
pub struct CurveProcessor;

impl GeometryProcessor for CurveProcessor {
    fn process(&self, item: &ResolvedEntity, graph: &ResolvedGraph) -> Result<MeshBuilder> {
        let points = curve_points(graph, item)?;
        if points.len() < 2 {
            return Err(Error::EmptyMesh(format!(
                "#{}: curve with {} points",
                item.id,
                points.len()
            )));
        }

        let mut mesh = MeshBuilder::with_capacity(points.len(), (points.len() - 1) * 3);
        let first = mesh.add_vertex(points[0], Vector3::z());
        let mut previous = first;
        for point in &points[1..] {
            let next = mesh.add_vertex(*point, Vector3::z());
            mesh.add_segment(previous, next);
            previous = next;
        }
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<EntityKind> {
        vec![EntityKind::Polyline, EntityKind::IndexedPolyCurve]
    }

    fn primitive(&self) -> Primitive {
        Primitive::Lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_graph;

    #[test]
    fn test_polyline_segments() {
        let g = test_graph(
            "#1=IFCCARTESIANPOINT((0.,0.));\n\
             #2=IFCCARTESIANPOINT((5.,0.));\n\
             #3=IFCCARTESIANPOINT((5.,5.));\n\
             #4=IFCPOLYLINE((#1,#2,#3));",
        );
        let mesh = CurveProcessor.process(g.by_id(4).unwrap(), &g).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 1, 1, 2, 2]);
        assert_eq!(mesh.positions[5], 0.0);
    }

    #[test]
    fn test_single_point_rejected() {
        let g = test_graph("#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCPOLYLINE((#1));");
        assert!(CurveProcessor.process(g.by_id(2).unwrap(), &g).is_err());
    }
}
